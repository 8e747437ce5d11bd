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

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::store::listener::{Listeners, MailboxListener};
use crate::store::message::Message;
use crate::store::model::*;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

/// One incarnation of a mailbox.
///
/// A `Mailbox` is shared between sessions through an `Arc`. Operations which
/// only read take a shared lock on the mailbox state; operations which
/// mutate it take an exclusive lock and deliver their notifications before
/// releasing it.
///
/// Deleting a mailbox from the namespace permanently kills the incarnation:
/// every mutation on it thereafter fails with `MailboxDeleted`. A new
/// mailbox created under the same name is a different `Mailbox` with a
/// different UID validity.
pub struct Mailbox {
    pub(super) name: RwLock<String>,
    pub(super) uid_validity: u32,
    pub(super) selectable: bool,
    pub(super) log_prefix: LogPrefix,
    pub(super) state: RwLock<MailboxState>,
}

pub(super) struct MailboxState {
    pub(super) deleted: bool,
    /// Ordered by UID, which is also sequence number order.
    pub(super) messages: Vec<Message>,
    pub(super) next_uid: Uid,
    pub(super) listeners: Listeners,
}

impl MailboxState {
    /// Find the index of the message with the given UID.
    pub(super) fn index_of(&self, uid: Uid) -> Result<usize, Error> {
        self.messages
            .binary_search_by_key(&uid, Message::uid)
            .map_err(|_| Error::NxMessage)
    }
}

// The most recently allocated UID validity, so that mailboxes created in the
// same second still get distinct, ascending values.
static LAST_UID_VALIDITY: AtomicU32 = AtomicU32::new(0);

/// Allocate a UID validity value for a new mailbox incarnation.
///
/// This is the UNIX time in seconds, shifted to a 2020-01-01 epoch to delay
/// wrapping until 2156, and bumped forward ("time creep") if that would not
/// be strictly greater than the last value handed out by this process.
fn allocate_uid_validity() -> u32 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0) as u32;
    let now = now.wrapping_sub(1577836800).max(1);

    let mut last = LAST_UID_VALIDITY.load(Ordering::SeqCst);
    loop {
        let uid_validity = now.max(last.wrapping_add(1).max(1));
        match LAST_UID_VALIDITY.compare_exchange_weak(
            last,
            uid_validity,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => return uid_validity,
            Err(actual) => last = actual,
        }
    }
}

impl Mailbox {
    /// Create a new, empty mailbox incarnation with a fresh UID validity.
    ///
    /// This does not place it in any namespace; see `Namespace::create`.
    pub(crate) fn new(
        name: String,
        selectable: bool,
        log_prefix: LogPrefix,
    ) -> Self {
        let uid_validity = allocate_uid_validity();
        let this = Mailbox {
            name: RwLock::new(name),
            uid_validity,
            selectable,
            log_prefix,
            state: RwLock::new(MailboxState {
                deleted: false,
                messages: Vec::new(),
                next_uid: Uid::MIN,
                listeners: Listeners::default(),
            }),
        };

        if selectable {
            info!(
                "{} Created with UID validity {}",
                this.log_prefix(),
                uid_validity
            );
        }

        this
    }

    /// The full hierarchical name of this mailbox.
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
    }

    /// Whether this mailbox can hold messages.
    ///
    /// Non-selectable mailboxes are pure naming placeholders in the
    /// hierarchy.
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Whether this incarnation has been deleted from its namespace.
    pub fn is_deleted(&self) -> bool {
        self.read().deleted
    }

    pub fn uid_validity(&self) -> u32 {
        self.uid_validity
    }

    pub(super) fn log_prefix(&self) -> String {
        self.log_prefix.for_mailbox(&self.name())
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, MailboxState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, MailboxState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail if this mailbox cannot be operated upon, given its locked state.
    pub(super) fn check_available(
        &self,
        state: &MailboxState,
    ) -> Result<(), Error> {
        if state.deleted {
            Err(Error::MailboxDeleted)
        } else if !self.selectable {
            Err(Error::MailboxUnselectable)
        } else {
            Ok(())
        }
    }

    /// Register `listener` to receive notifications about this mailbox.
    ///
    /// Registering the same listener more than once has no further effect.
    /// This waits for any notification currently being delivered to finish,
    /// and the listener does not receive that notification.
    pub fn add_listener(&self, listener: Arc<dyn MailboxListener>) {
        self.write().listeners.add(listener);
    }

    /// Stop delivering notifications to `listener`.
    ///
    /// Unregistering a listener which is not registered has no effect. Once
    /// this returns, `listener` will receive no further notifications.
    pub fn remove_listener(&self, listener: &Arc<dyn MailboxListener>) {
        self.write().listeners.remove(listener);
    }

    /// Kill this incarnation, telling all listeners about it.
    ///
    /// Fails with `MailboxHasMessages` if there are any messages. The check
    /// and the deletion happen under the same lock, so a concurrent append
    /// either lands first and fails the deletion or fails itself.
    pub(crate) fn delete_if_empty(&self) -> Result<(), Error> {
        let mut state = self.write();
        if state.deleted {
            return Err(Error::MailboxDeleted);
        }
        if !state.messages.is_empty() {
            return Err(Error::MailboxHasMessages);
        }

        state.deleted = true;
        let log_prefix = self.log_prefix();
        state
            .listeners
            .notify(&log_prefix, None, |l| l.mailbox_deleted());
        state.listeners.clear();
        info!("{} Deleted", log_prefix);
        Ok(())
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Mailbox({:?}, uv={})", self.name(), self.uid_validity)
    }
}
