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

//! Support for working with a single mailbox.
//!
//! A mailbox is an ordered sequence of messages plus the metadata IMAP needs
//! to talk about them: the UID validity of this incarnation, the next UID to
//! assign, and the set of listeners to tell about changes.
//!
//! Messages are only ever added at the tail, and UIDs are assigned in
//! strictly ascending order, so UID order and sequence number order are
//! always the same. Sequence numbers are never stored; a message's sequence
//! number is simply its position plus one at the moment it is asked for.
//!
//! All state lives behind one `RwLock` per mailbox. Anything that changes the
//! state holds the write lock for its entire duration, including delivering
//! notifications to listeners, which gives these guarantees:
//!
//! - Two concurrent appends never get the same UID.
//!
//! - When a mutating call returns, every listener has already heard about it.
//!
//! - A listener being added or removed either sees a notification in full or
//!   not at all.
//!
//! - Readers never observe a half-finished expunge.
//!
//! Copying between mailboxes locks the source, takes a reference to the
//! content, and releases the source before locking the destination, so no
//! operation ever holds two mailbox locks.
//!
//! ## About the layout of this module
//!
//! This module is collectively a single abstraction, i.e., it should be
//! thought of as one large rust file. It is simply split apart because it's
//! unwieldy otherwise.

// Basic struct definitions, listener registration
mod defs;
pub use defs::Mailbox;

mod messages; // APPEND, COPY, FETCH
mod flags; // STORE
mod expunge; // EXPUNGE, UID EXPUNGE
mod search; // SEARCH
mod select; // STATUS, counters
