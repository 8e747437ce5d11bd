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

use std::convert::{TryFrom, TryInto};
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};

use serde::{Deserialize, Serialize};

pub use super::flags::{Flag, FlagMode, FlagSet};

/// Uniquely identifies a message within a single mailbox incarnation.
///
/// UIDs start at 1 and increase monotonically as messages are added to the
/// mailbox. UIDs are never reused, not even after the message they were
/// assigned to has been expunged.
///
/// The value space is 63 bits so that it survives a round-trip through
/// environments lacking unsigned 64-bit integers.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Uid(pub NonZeroU64);

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({})", self.0.get())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl Uid {
    // Unsafe because new() isn't const for some reason
    pub const MIN: Self = unsafe { Uid(NonZeroU64::new_unchecked(1)) };
    pub const MAX: Self =
        unsafe { Uid(NonZeroU64::new_unchecked((1u64 << 63) - 1)) };

    pub fn of(uid: u64) -> Option<Self> {
        NonZeroU64::new(uid).map(Uid).filter(|&u| u <= Uid::MAX)
    }

    pub fn next(self) -> Option<Self> {
        if Uid::MAX == self {
            None
        } else {
            Uid::of(self.0.get() + 1)
        }
    }

    #[cfg(test)]
    pub fn u(uid: u64) -> Self {
        Uid::of(uid).unwrap()
    }
}

impl TryFrom<u64> for Uid {
    type Error = ();

    fn try_from(v: u64) -> Result<Self, ()> {
        Self::of(v).ok_or(())
    }
}

impl From<Uid> for u64 {
    fn from(uid: Uid) -> u64 {
        uid.0.get()
    }
}

/// The transient, 1-based position of a message among the messages currently
/// in a mailbox.
///
/// A sequence number is never stored anywhere. It is derived from the
/// position of the message in the mailbox at the moment it is needed, and
/// shifts down whenever an earlier message is expunged.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Seqnum(pub NonZeroU32);

impl Seqnum {
    // Unsafe because new() isn't const for some reason
    pub const MIN: Self = unsafe { Seqnum(NonZeroU32::new_unchecked(1)) };
    pub const MAX: Self =
        unsafe { Seqnum(NonZeroU32::new_unchecked(u32::MAX)) };

    pub fn of(seqnum: u32) -> Option<Self> {
        NonZeroU32::new(seqnum).map(Seqnum)
    }

    #[cfg(test)]
    pub fn u(seqnum: u32) -> Self {
        Seqnum::of(seqnum).unwrap()
    }

    pub fn to_index(self) -> usize {
        let u: Result<usize, _> = self.0.get().try_into();
        u.unwrap() - 1
    }

    /// Convert a 0-based index into the message list into a sequence number.
    ///
    /// Mailboxes refuse to grow past `u32::MAX` messages, so this cannot
    /// overflow for any index obtained from a mailbox.
    pub fn from_index(ix: usize) -> Self {
        Seqnum::of((ix + 1).try_into().unwrap()).unwrap()
    }
}

impl fmt::Debug for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Seqnum({})", self.0.get())
    }
}

impl fmt::Display for Seqnum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl From<Seqnum> for u32 {
    fn from(seqnum: Seqnum) -> u32 {
        seqnum.0.get()
    }
}

/// Attributes reported for mailboxes in listings.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum MailboxAttribute {
    // RFC 3501
    Noselect,
    // RFC 3348
    HasChildren,
    HasNoChildren,
}

impl MailboxAttribute {
    pub fn name(&self) -> &'static str {
        match *self {
            MailboxAttribute::Noselect => "\\Noselect",
            MailboxAttribute::HasChildren => "\\HasChildren",
            MailboxAttribute::HasNoChildren => "\\HasNoChildren",
        }
    }
}

impl fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for MailboxAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <MailboxAttribute as fmt::Display>::fmt(self, f)
    }
}

/// One entry in the result of `Namespace::list_responses`.
///
/// The fields in this struct are sorted to permit deriving `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct ListResponse {
    /// The full hierarchical name of the mailbox.
    pub name: String,
    /// Any attributes on this mailbox.
    pub attributes: Vec<MailboxAttribute>,
}

/// Which fields a status report should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRequest {
    /// Return the number of messages.
    pub messages: bool,
    /// Return the number of \Recent messages.
    pub recent: bool,
    /// Return the next UID value
    pub uidnext: bool,
    /// Return the UID validity
    pub uidvalidity: bool,
    /// Return the number of not-\Seen messages.
    pub unseen: bool,
}

impl StatusRequest {
    /// A request for every field.
    pub fn all() -> Self {
        StatusRequest {
            messages: true,
            recent: true,
            uidnext: true,
            uidvalidity: true,
            unseen: true,
        }
    }
}

/// A status report.
///
/// Fields are only set if requested in the request. Those fields' meanings
/// correspond exactly to the fields of the same name in `StatusRequest`.
///
/// The `Display` format lists the present fields in the canonical order
/// (which is also the declaration order here), e.g.
/// `MESSAGES 3 UIDNEXT 4 UNSEEN 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusResponse {
    /// The mailbox being reported
    pub name: String,
    pub messages: Option<usize>,
    pub recent: Option<usize>,
    pub uidnext: Option<Uid>,
    pub uidvalidity: Option<u32>,
    pub unseen: Option<usize>,
}

impl fmt::Display for StatusResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut items = Vec::new();
        if let Some(messages) = self.messages {
            items.push(format!("MESSAGES {}", messages));
        }
        if let Some(recent) = self.recent {
            items.push(format!("RECENT {}", recent));
        }
        if let Some(uidnext) = self.uidnext {
            items.push(format!("UIDNEXT {}", uidnext));
        }
        if let Some(uidvalidity) = self.uidvalidity {
            items.push(format!("UIDVALIDITY {}", uidvalidity));
        }
        if let Some(unseen) = self.unseen {
            items.push(format!("UNSEEN {}", unseen));
        }

        write!(f, "{}", items.join(" "))
    }
}
