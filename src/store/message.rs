//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use chrono::prelude::*;

use super::content::Content;
use super::model::*;

/// One message stored in a mailbox.
///
/// Everything but the flags is fixed when the message is appended. Only the
/// owning mailbox changes the flags; a `Message` handed out to a caller is a
/// snapshot, and later changes to the mailbox are not reflected in it.
#[derive(Clone, Debug)]
pub struct Message {
    uid: Uid,
    pub(super) flags: FlagSet,
    internal_date: DateTime<FixedOffset>,
    content: Content,
}

impl Message {
    pub(super) fn new(
        uid: Uid,
        flags: FlagSet,
        internal_date: DateTime<FixedOffset>,
        content: Content,
    ) -> Self {
        Message {
            uid,
            flags,
            internal_date,
            content,
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    pub fn internal_date(&self) -> DateTime<FixedOffset> {
        self.internal_date
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// The size of the message in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}
