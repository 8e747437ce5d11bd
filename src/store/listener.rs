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

//! Change notification from mailboxes to the sessions observing them.
//!
//! A mailbox calls its listeners synchronously while holding its write lock,
//! so a listener must not block and must never call back into the mailbox
//! that is notifying it. `EventQueue` is a listener that satisfies this by
//! just queueing the events for its session to pick up later.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use log::warn;

use super::model::*;
use crate::support::error::Error;

/// Receives notifications about changes to a mailbox.
///
/// An `Err` return (or a panic) is logged by the mailbox and otherwise
/// ignored; it does not affect the operation being reported nor the delivery
/// to other listeners.
pub trait MailboxListener: Send + Sync {
    /// A message was appended and now has the given sequence number.
    fn added(&self, seqnum: Seqnum) -> Result<(), Error>;

    /// The message with the given sequence number was expunged. All later
    /// messages have already shifted down by one when this is called again.
    fn expunged(&self, seqnum: Seqnum) -> Result<(), Error>;

    /// The flags of a message changed.
    ///
    /// `uid` is only provided if the mutating caller asked for it.
    fn flags_updated(
        &self,
        seqnum: Seqnum,
        flags: &FlagSet,
        uid: Option<Uid>,
    ) -> Result<(), Error>;

    /// The mailbox was deleted. No further notifications will be sent.
    fn mailbox_deleted(&self) -> Result<(), Error>;
}

/// Whether `a` and `b` are the same listener object.
pub fn same_listener(
    a: &Arc<dyn MailboxListener>,
    b: &Arc<dyn MailboxListener>,
) -> bool {
    // Compare data pointers only; vtable pointers for the same type may
    // differ between codegen units.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// The set of listeners registered on one mailbox, in registration order.
///
/// This carries no locking of its own. It lives inside the mailbox state,
/// so registration and delivery are serialised by the mailbox lock.
#[derive(Default)]
pub struct Listeners {
    listeners: Vec<Arc<dyn MailboxListener>>,
}

impl Listeners {
    /// Register `listener`. Returns whether it was not already registered.
    pub fn add(&mut self, listener: Arc<dyn MailboxListener>) -> bool {
        if self.contains(&listener) {
            false
        } else {
            self.listeners.push(listener);
            true
        }
    }

    /// Unregister `listener`. Returns whether it was registered.
    pub fn remove(&mut self, listener: &Arc<dyn MailboxListener>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        before != self.listeners.len()
    }

    pub fn contains(&self, listener: &Arc<dyn MailboxListener>) -> bool {
        self.listeners.iter().any(|l| same_listener(l, listener))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Invoke `f` on every listener except `except`, in registration order.
    ///
    /// Failures are logged with `log_prefix` and do not stop delivery.
    pub fn notify(
        &self,
        log_prefix: &str,
        except: Option<&Arc<dyn MailboxListener>>,
        f: impl Fn(&dyn MailboxListener) -> Result<(), Error>,
    ) {
        for listener in &self.listeners {
            if except.map_or(false, |e| same_listener(e, listener)) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| f(&**listener))) {
                Ok(Ok(())) => (),
                Ok(Err(e)) => warn!(
                    "{} Listener rejected notification: {}",
                    log_prefix, e
                ),
                Err(_) => warn!(
                    "{} Listener panicked during notification",
                    log_prefix
                ),
            }
        }
    }
}

/// A notification as queued by `EventQueue`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MailboxEvent {
    Added(Seqnum),
    Expunged(Seqnum),
    FlagsUpdated {
        seqnum: Seqnum,
        flags: FlagSet,
        uid: Option<Uid>,
    },
    MailboxDeleted,
}

/// A listener which queues every event it receives for later consumption by
/// the session that owns it.
pub struct EventQueue {
    sender: Sender<MailboxEvent>,
    receiver: Receiver<MailboxEvent>,
}

impl EventQueue {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = channel::unbounded();
        Arc::new(EventQueue { sender, receiver })
    }

    /// Remove and return all events queued so far, oldest first.
    pub fn drain(&self) -> Vec<MailboxEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn push(&self, event: MailboxEvent) -> Result<(), Error> {
        self.sender
            .send(event)
            .map_err(|e| Error::Listener(e.to_string()))
    }
}

impl MailboxListener for EventQueue {
    fn added(&self, seqnum: Seqnum) -> Result<(), Error> {
        self.push(MailboxEvent::Added(seqnum))
    }

    fn expunged(&self, seqnum: Seqnum) -> Result<(), Error> {
        self.push(MailboxEvent::Expunged(seqnum))
    }

    fn flags_updated(
        &self,
        seqnum: Seqnum,
        flags: &FlagSet,
        uid: Option<Uid>,
    ) -> Result<(), Error> {
        self.push(MailboxEvent::FlagsUpdated {
            seqnum,
            flags: flags.clone(),
            uid,
        })
    }

    fn mailbox_deleted(&self) -> Result<(), Error> {
        self.push(MailboxEvent::MailboxDeleted)
    }
}
