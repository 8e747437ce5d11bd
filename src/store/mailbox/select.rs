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

use log::debug;

use super::defs::*;
use crate::store::model::*;
use crate::support::error::Error;

impl MailboxState {
    fn unseen_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.has_flag(&Flag::Seen))
            .count()
    }

    fn recent_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.has_flag(&Flag::Recent))
            .count()
    }
}

impl Mailbox {
    pub fn message_count(&self) -> usize {
        self.read().messages.len()
    }

    /// The UID the next appended message will receive.
    pub fn uid_next(&self) -> Uid {
        self.read().next_uid
    }

    /// The sequence number of the first message without `\Seen`, if any.
    pub fn first_unseen(&self) -> Option<Seqnum> {
        self.read()
            .messages
            .iter()
            .position(|m| !m.has_flag(&Flag::Seen))
            .map(Seqnum::from_index)
    }

    pub fn unseen_count(&self) -> usize {
        self.read().unseen_count()
    }

    /// Count the messages bearing `\Recent`.
    ///
    /// If `reset` is true, `\Recent` is then cleared from all of them. This
    /// is not a flag change as far as listeners are concerned, so nobody is
    /// notified.
    pub fn recent_count(&self, reset: bool) -> usize {
        if !reset {
            return self.read().recent_count();
        }

        let mut state = self.write();
        let mut count = 0;
        for message in &mut state.messages {
            if message.flags.remove(&Flag::Recent) {
                count += 1;
            }
        }

        if count > 0 {
            debug!(
                "{} Claimed {} \\Recent messages",
                self.log_prefix(),
                count
            );
        }
        count
    }

    /// Produce a status report for the fields selected by `request`.
    ///
    /// The fields are gathered in the canonical order `MESSAGES`, `RECENT`,
    /// `UIDNEXT`, `UIDVALIDITY`, `UNSEEN`, all from the same state of the
    /// mailbox. Requesting `RECENT` does not reset it.
    pub fn status(
        &self,
        request: &StatusRequest,
    ) -> Result<StatusResponse, Error> {
        let state = self.read();
        self.check_available(&state)?;

        let mut response = StatusResponse {
            name: self.name(),
            ..StatusResponse::default()
        };

        if request.messages {
            response.messages = Some(state.messages.len());
        }
        if request.recent {
            response.recent = Some(state.recent_count());
        }
        if request.uidnext {
            response.uidnext = Some(state.next_uid);
        }
        if request.uidvalidity {
            response.uidvalidity = Some(self.uid_validity());
        }
        if request.unseen {
            response.unseen = Some(state.unseen_count());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod test {
    use chrono::prelude::*;

    use super::super::test_prelude::*;
    use super::*;
    use crate::support::log_prefix::LogPrefix;

    #[test]
    fn counters() {
        let mb = set_up();
        assert_eq!(0, mb.message_count());
        assert_eq!(None, mb.first_unseen());
        assert_eq!(Uid::MIN, mb.uid_next());

        let seen = FlagSet::new().with(Flag::Seen);
        mb.append(Utc::now(), &seen, &mut "a".as_bytes()).unwrap();
        simple_append(&mb);
        simple_append(&mb);

        assert_eq!(3, mb.message_count());
        assert_eq!(Some(Seqnum::u(2)), mb.first_unseen());
        assert_eq!(2, mb.unseen_count());
        assert_eq!(Uid::u(4), mb.uid_next());
    }

    #[test]
    fn recent_is_claimed_once() {
        let mb = set_up();
        simple_append(&mb);
        simple_append(&mb);
        let events = listen(&mb);

        assert_eq!(2, mb.recent_count(false));
        assert_eq!(2, mb.recent_count(true));
        assert_eq!(0, mb.recent_count(true));
        assert_eq!(0, mb.recent_count(false));
        assert!(events.drain().is_empty());
        assert!(!mb.get(Uid::u(1)).unwrap().has_flag(&Flag::Recent));

        simple_append(&mb);
        assert_eq!(1, mb.recent_count(true));
    }

    #[test]
    fn status_report() {
        let mb = set_up();
        simple_append(&mb);
        mb.append(
            Utc::now(),
            &FlagSet::new().with(Flag::Seen),
            &mut "b".as_bytes(),
        )
        .unwrap();
        mb.recent_count(true);
        simple_append(&mb);

        let status = mb.status(&StatusRequest::all()).unwrap();
        assert_eq!(
            StatusResponse {
                name: "INBOX".to_owned(),
                messages: Some(3),
                recent: Some(1),
                uidnext: Some(Uid::u(4)),
                uidvalidity: Some(mb.uid_validity()),
                unseen: Some(2),
            },
            status
        );
        // Reporting \Recent does not claim it
        assert_eq!(1, mb.recent_count(false));

        let partial = mb
            .status(&StatusRequest {
                unseen: true,
                messages: true,
                ..StatusRequest::default()
            })
            .unwrap();
        assert_eq!("MESSAGES 3 UNSEEN 2", partial.to_string());
    }

    #[test]
    fn status_of_placeholder() {
        let placeholder = Mailbox::new(
            "Archive".to_owned(),
            false,
            LogPrefix::new("test".to_owned()),
        );
        assert_matches!(
            Err(Error::MailboxUnselectable),
            placeholder.status(&StatusRequest::all())
        );
    }

    #[test]
    fn status_is_a_consistent_snapshot() {
        let mb = set_up();
        let seen = FlagSet::new().with(Flag::Seen);
        let unseen = FlagSet::new();

        rayon::join(
            || {
                for i in 0..500 {
                    let flags = if 0 == i % 2 { &seen } else { &unseen };
                    mb.append(Utc::now(), flags, &mut "x".as_bytes()).unwrap();
                }
            },
            || {
                for _ in 0..2000 {
                    let status = mb.status(&StatusRequest::all()).unwrap();
                    let messages = status.messages.unwrap();
                    assert_eq!(
                        messages as u64 + 1,
                        u64::from(status.uidnext.unwrap())
                    );
                    assert!(status.unseen.unwrap() <= messages);
                    assert!(status.recent.unwrap() <= messages);
                }
            },
        );

        let status = mb.status(&StatusRequest::all()).unwrap();
        assert_eq!(Some(500), status.messages);
        assert_eq!(Some(250), status.unseen);
    }

    #[test]
    fn uid_validity_is_unique_and_ascending() {
        let a = set_up();
        let b = set_up();
        let c = set_up();
        assert!(a.uid_validity() > 0);
        assert!(b.uid_validity() > a.uid_validity());
        assert!(c.uid_validity() > b.uid_validity());
    }
}
