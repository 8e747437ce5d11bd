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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mailbox name")]
    InvalidName,
    #[error("Mailbox has inferiors")]
    MailboxHasInferiors,
    #[error("Mailbox still contains messages")]
    MailboxHasMessages,
    #[error("Unsupported wildcard placement in pattern")]
    UnsupportedPattern,
    #[error("No such message")]
    NxMessage,
    #[error("No such mailbox")]
    NxMailbox,
    #[error("Mailbox already exists")]
    MailboxExists,
    #[error("Mailbox is not selectable")]
    MailboxUnselectable,
    #[error("Mailbox has been deleted")]
    MailboxDeleted,
    #[error("Mailbox UID space exhausted")]
    MailboxFull,
    #[error("Operation not permitted on the namespace root")]
    BadOperationOnRoot,
    #[error("Non-existent system flag")]
    NxFlag,
    #[error("Unsafe flag or keyword")]
    UnsafeName,
    #[error("Listener failed: {0}")]
    Listener(String),
    #[error("Storage failure: {0}")]
    Storage(#[from] io::Error),
    #[error("Bad configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Whether this is one of the "mailbox is not empty" errors returned when
    /// a deletion's preconditions are not met.
    pub fn is_not_empty(&self) -> bool {
        matches!(self, Error::MailboxHasInferiors | Error::MailboxHasMessages)
    }

    /// Whether this error indicates the mailbox cannot be operated on at all,
    /// either because it is a pure naming placeholder or because the
    /// incarnation was destroyed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::MailboxUnselectable | Error::MailboxDeleted)
    }
}
