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

use std::io::Read;

use chrono::prelude::*;
use log::{debug, info};

use super::defs::*;
use crate::store::content::Content;
use crate::store::fetch::{FetchGroup, FetchResult};
use crate::store::message::Message;
use crate::store::model::*;
use crate::support::error::Error;

impl Mailbox {
    /// Append a new message to this mailbox.
    ///
    /// `data` is read to completion before the mailbox is locked; if that
    /// fails, the mailbox is left untouched. The new message always carries
    /// `\Recent` in addition to `flags`.
    ///
    /// Returns the UID of the new message.
    pub fn append(
        &self,
        internal_date: impl Into<DateTime<FixedOffset>>,
        flags: &FlagSet,
        data: &mut impl Read,
    ) -> Result<Uid, Error> {
        let content = Content::read_from(data)?;
        self.append_content(internal_date.into(), flags.clone(), content)
    }

    /// Append an already-stored piece of content.
    ///
    /// This is the low-level part of `append`, also used by `copy` so that
    /// the copy shares the original content.
    pub(super) fn append_content(
        &self,
        internal_date: DateTime<FixedOffset>,
        mut flags: FlagSet,
        content: Content,
    ) -> Result<Uid, Error> {
        let mut state = self.write();
        self.check_available(&state)?;

        // Sequence numbers must stay representable
        if state.messages.len() >= u32::MAX as usize {
            return Err(Error::MailboxFull);
        }

        let uid = state.next_uid;
        state.next_uid = uid.next().ok_or(Error::MailboxFull)?;

        flags.insert(Flag::Recent);
        state
            .messages
            .push(Message::new(uid, flags, internal_date, content));
        let seqnum = Seqnum::from_index(state.messages.len() - 1);

        let log_prefix = self.log_prefix();
        state.listeners.notify(&log_prefix, None, |l| l.added(seqnum));
        debug!("{} Appended {:?} as {:?}", log_prefix, uid, seqnum);

        Ok(uid)
    }

    /// Return a snapshot of the message with the given UID, if it exists.
    pub fn get(&self, uid: Uid) -> Option<Message> {
        let state = self.read();
        state
            .index_of(uid)
            .ok()
            .map(|ix| state.messages[ix].clone())
    }

    /// Return the current sequence number of the message with the given UID.
    pub fn seqnum_of(&self, uid: Uid) -> Result<Seqnum, Error> {
        self.read().index_of(uid).map(Seqnum::from_index)
    }

    /// Return the UIDs of all messages, in sequence number order.
    pub fn uids(&self) -> Vec<Uid> {
        self.read().messages.iter().map(Message::uid).collect()
    }

    /// Copy the message with the given UID into `dst`.
    ///
    /// The new message shares the content of the original and starts with
    /// the same flags and internal date. `dst` may be this mailbox.
    ///
    /// Returns the UID of the new message in `dst`.
    pub fn copy(&self, uid: Uid, dst: &Mailbox) -> Result<Uid, Error> {
        // The source lock must be released before `dst` is locked, since
        // another session may be copying in the opposite direction.
        let (internal_date, flags, content) = {
            let state = self.read();
            self.check_available(&state)?;
            let message = &state.messages[state.index_of(uid)?];
            (
                message.internal_date(),
                message.flags().clone(),
                message.content().clone(),
            )
        };

        let new_uid = dst.append_content(internal_date, flags, content)?;
        debug!(
            "{} Copied {:?} to {} as {:?}",
            self.log_prefix(),
            uid,
            dst.name(),
            new_uid
        );
        Ok(new_uid)
    }

    /// Materialise the facets in `group` of the message with the given UID.
    pub fn fetch(
        &self,
        uid: Uid,
        group: FetchGroup,
    ) -> Result<FetchResult, Error> {
        let state = self.read();
        let ix = state.index_of(uid)?;
        Ok(FetchResult::materialize(
            &state.messages[ix],
            Seqnum::from_index(ix),
            group,
        ))
    }

    /// Materialise the facets in `group` of every message, in sequence
    /// number order.
    pub fn fetch_all(&self, group: FetchGroup) -> Vec<FetchResult> {
        self.read()
            .messages
            .iter()
            .enumerate()
            .map(|(ix, message)| {
                FetchResult::materialize(
                    message,
                    Seqnum::from_index(ix),
                    group,
                )
            })
            .collect()
    }

    /// Irrevocably discard every message, without notifying anyone.
    ///
    /// UIDs of the discarded messages are still never reused.
    pub fn delete_all_messages(&self) -> Result<(), Error> {
        let mut state = self.write();
        self.check_available(&state)?;
        let count = state.messages.len();
        state.messages.clear();
        info!("{} Discarded all {} messages", self.log_prefix(), count);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::Arc;

    use rayon::prelude::*;

    use super::super::test_prelude::*;
    use super::*;
    use crate::store::listener::MailboxEvent;
    use crate::support::log_prefix::LogPrefix;

    #[test]
    fn append_assigns_ascending_uids() {
        let mb = set_up();
        let events = listen(&mb);

        let uids: Vec<Uid> = (0..3).map(|_| simple_append(&mb)).collect();
        assert_eq!(vec![Uid::u(1), Uid::u(2), Uid::u(3)], uids);
        assert_eq!(uids, mb.uids());
        assert_eq!(Uid::u(4), mb.uid_next());
        assert_eq!(
            vec![
                MailboxEvent::Added(Seqnum::u(1)),
                MailboxEvent::Added(Seqnum::u(2)),
                MailboxEvent::Added(Seqnum::u(3)),
            ],
            events.drain()
        );

        for (ix, &uid) in uids.iter().enumerate() {
            assert_eq!(Seqnum::from_index(ix), mb.seqnum_of(uid).unwrap());
        }
    }

    #[test]
    fn append_forces_recent_and_keeps_date() {
        let mb = set_up();
        let date = FixedOffset::west(5 * 3600)
            .ymd(2020, 3, 4)
            .and_hms(5, 6, 7);
        let uid = mb
            .append(
                date,
                &FlagSet::new().with(Flag::Flagged),
                &mut "Subject: x\r\n\r\nbody".as_bytes(),
            )
            .unwrap();

        let message = mb.get(uid).unwrap();
        assert_eq!(uid, message.uid());
        assert_eq!(date, message.internal_date());
        assert_eq!(18, message.size());
        assert_eq!(
            &FlagSet::new().with(Flag::Flagged).with(Flag::Recent),
            message.flags()
        );
    }

    #[test]
    fn failed_append_changes_nothing() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
            }
        }

        let mb = set_up();
        let events = listen(&mb);
        simple_append(&mb);
        events.drain();

        assert_matches!(
            Err(Error::Storage(_)),
            mb.append(Utc::now(), &FlagSet::new(), &mut Broken)
        );
        assert_eq!(1, mb.message_count());
        assert_eq!(Uid::u(2), mb.uid_next());
        assert!(events.drain().is_empty());
    }

    #[test]
    fn lookup_of_unknown_uid() {
        let mb = set_up();
        simple_append(&mb);

        assert!(mb.get(Uid::u(2)).is_none());
        assert_matches!(Err(Error::NxMessage), mb.seqnum_of(Uid::u(2)));
        assert_matches!(
            Err(Error::NxMessage),
            mb.fetch(Uid::u(2), FetchGroup::UID)
        );
    }

    #[test]
    fn copy_shares_content() {
        let src = set_up();
        let dst = set_up();
        simple_append(&dst);

        let uid = src
            .append(
                Utc::now(),
                &FlagSet::new().with(Flag::Seen),
                &mut "hello".as_bytes(),
            )
            .unwrap();
        src.apply_flags(uid, FlagMode::Remove, &recent(), None, false)
            .unwrap();

        let copied = src.copy(uid, &dst).unwrap();
        assert_eq!(Uid::u(2), copied);

        let original = src.get(uid).unwrap();
        let copy = dst.get(copied).unwrap();
        assert_eq!(original.content().key(), copy.content().key());
        assert!(original.content().shares_storage_with(copy.content()));
        assert_eq!(original.internal_date(), copy.internal_date());
        assert_eq!(
            &FlagSet::new().with(Flag::Seen).with(Flag::Recent),
            copy.flags()
        );

        assert_matches!(Err(Error::NxMessage), src.copy(Uid::u(99), &dst));
        assert_eq!(2, dst.message_count());
    }

    #[test]
    fn copy_to_self() {
        let mb = set_up();
        let uid = simple_append(&mb);
        assert_eq!(Uid::u(2), mb.copy(uid, &mb).unwrap());
        assert_eq!(2, mb.message_count());
    }

    #[test]
    fn unavailable_mailboxes_refuse_mutation() {
        let placeholder = Mailbox::new(
            "Folder".to_owned(),
            false,
            LogPrefix::new("t".to_owned()),
        );
        assert_matches!(
            Err(Error::MailboxUnselectable),
            placeholder.append(Utc::now(), &FlagSet::new(), &mut "x".as_bytes())
        );

        let mb = set_up();
        let uid = simple_append(&mb);
        let other = set_up();
        assert_matches!(Err(Error::MailboxHasMessages), mb.delete_if_empty());
        mb.delete_all_messages().unwrap();
        mb.delete_if_empty().unwrap();
        assert!(mb.is_deleted());
        assert_matches!(
            Err(Error::MailboxDeleted),
            mb.append(Utc::now(), &FlagSet::new(), &mut "x".as_bytes())
        );
        assert_matches!(Err(Error::MailboxDeleted), mb.delete_all_messages());
        assert_matches!(Err(Error::MailboxDeleted), mb.copy(uid, &other));
        assert_matches!(
            Err(Error::MailboxUnselectable),
            placeholder.copy(uid, &other)
        );

        let uid = simple_append(&other);
        assert_matches!(Err(Error::MailboxDeleted), other.copy(uid, &mb));
        assert_matches!(Err(Error::NxMessage), other.copy(Uid::u(99), &other));
        assert_eq!(1, other.message_count());
    }

    #[test]
    fn delete_all_messages_is_silent() {
        let mb = set_up();
        simple_append(&mb);
        simple_append(&mb);
        let events = listen(&mb);

        mb.delete_all_messages().unwrap();
        assert_eq!(0, mb.message_count());
        assert!(events.drain().is_empty());
        // UIDs are not reused
        assert_eq!(Uid::u(3), simple_append(&mb));
    }

    #[test]
    fn fetch_uses_current_seqnum() {
        let mb = set_up();
        let uids: Vec<Uid> = (0..3).map(|_| simple_append(&mb)).collect();
        mb.apply_flags(uids[0], FlagMode::Add, &deleted(), None, false)
            .unwrap();
        mb.expunge().unwrap();

        let result = mb
            .fetch(uids[2], FetchGroup::UID | FetchGroup::SEQUENCE_NUMBER)
            .unwrap();
        assert_eq!(Some(uids[2]), result.uid);
        assert_eq!(Some(Seqnum::u(2)), result.seqnum);

        let all = mb.fetch_all(FetchGroup::SEQUENCE_NUMBER | FetchGroup::SIZE);
        assert_eq!(2, all.len());
        assert_eq!(Some(Seqnum::u(1)), all[0].seqnum);
        assert_eq!(Some(6), all[1].size);
        assert!(all[1].uid.is_none());
    }

    #[test]
    fn concurrent_appends_never_collide() {
        let mb = set_up();
        let events = listen(&mb);

        let mut uids: Vec<Uid> = (0..200)
            .into_par_iter()
            .map(|_| simple_append(&mb))
            .collect();
        uids.sort();
        uids.dedup();

        assert_eq!(200, uids.len());
        assert_eq!(uids, mb.uids());
        assert_eq!(Uid::u(201), mb.uid_next());

        // Each append was announced exactly once, in order
        let added: Vec<Seqnum> = events
            .drain()
            .into_iter()
            .map(|e| match e {
                MailboxEvent::Added(seqnum) => seqnum,
                e => panic!("Unexpected event: {:?}", e),
            })
            .collect();
        assert_eq!((1..=200).map(Seqnum::u).collect::<Vec<_>>(), added);
    }

    #[test]
    fn concurrent_copies_in_both_directions() {
        let a = set_up();
        let b = set_up();
        let ua = simple_append(&a);
        let ub = simple_append(&b);
        let pair = (Arc::clone(&a), Arc::clone(&b));

        (0..100).into_par_iter().for_each(|i| {
            if 0 == i % 2 {
                pair.0.copy(ua, &pair.1).unwrap();
            } else {
                pair.1.copy(ub, &pair.0).unwrap();
            }
        });

        assert_eq!(51, a.message_count());
        assert_eq!(51, b.message_count());
    }
}
