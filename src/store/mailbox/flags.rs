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

use std::sync::Arc;

use log::debug;

use super::defs::*;
use crate::store::listener::MailboxListener;
use crate::store::model::*;
use crate::support::error::Error;

impl Mailbox {
    /// Change the flags on the message with the given UID.
    ///
    /// `mode` determines how `flags` is combined with the current flags.
    /// `FlagMode::Set` replaces the flags exactly, so it also removes
    /// `\Recent` unless `flags` includes it.
    ///
    /// Every registered listener other than `initiator` is told about the new
    /// flags before this returns. The notification carries the UID only if
    /// `include_uid` is set, i.e., if the change was addressed by UID.
    ///
    /// Returns the new flags of the message.
    pub fn apply_flags(
        &self,
        uid: Uid,
        mode: FlagMode,
        flags: &FlagSet,
        initiator: Option<&Arc<dyn MailboxListener>>,
        include_uid: bool,
    ) -> Result<FlagSet, Error> {
        let mut state = self.write();
        self.check_available(&state)?;
        let ix = state.index_of(uid)?;

        let new_flags = mode.apply(&state.messages[ix].flags, flags);
        state.messages[ix].flags = new_flags.clone();

        let seqnum = Seqnum::from_index(ix);
        let notify_uid = if include_uid { Some(uid) } else { None };
        let log_prefix = self.log_prefix();
        state.listeners.notify(&log_prefix, initiator, |l| {
            l.flags_updated(seqnum, &new_flags, notify_uid)
        });
        debug!(
            "{} {:?} {:?} {} => {}",
            log_prefix, uid, mode, flags, new_flags
        );

        Ok(new_flags)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use rayon::prelude::*;

    use super::super::test_prelude::*;
    use super::*;
    use crate::store::listener::{EventQueue, MailboxEvent};

    fn kw(s: &str) -> Flag {
        Flag::Keyword(s.to_owned())
    }

    #[test]
    fn modes() {
        let mb = set_up();
        let uid = simple_append(&mb);

        let after_add = mb
            .apply_flags(
                uid,
                FlagMode::Add,
                &FlagSet::new().with(Flag::Seen).with(kw("$Junk")),
                None,
                false,
            )
            .unwrap();
        assert_eq!(
            FlagSet::new()
                .with(Flag::Seen)
                .with(Flag::Recent)
                .with(kw("$junk")),
            after_add
        );
        assert_eq!(&after_add, mb.get(uid).unwrap().flags());

        let after_remove = mb
            .apply_flags(uid, FlagMode::Remove, &recent(), None, false)
            .unwrap();
        assert_eq!(
            FlagSet::new().with(Flag::Seen).with(kw("$Junk")),
            after_remove
        );

        let exact = FlagSet::new().with(Flag::Draft);
        assert_eq!(
            exact,
            mb.apply_flags(uid, FlagMode::Set, &exact, None, false)
                .unwrap()
        );
        assert_eq!(&exact, mb.get(uid).unwrap().flags());

        assert_matches!(
            Err(Error::NxMessage),
            mb.apply_flags(Uid::u(2), FlagMode::Add, &exact, None, false)
        );
    }

    #[test]
    fn silent_store_skips_initiator() {
        let mb = set_up();
        let uid = simple_append(&mb);

        let q1 = EventQueue::new();
        let q2 = EventQueue::new();
        let l1: Arc<dyn MailboxListener> = q1.clone();
        mb.add_listener(Arc::clone(&l1));
        mb.add_listener(q2.clone());

        mb.apply_flags(
            uid,
            FlagMode::Add,
            &FlagSet::new().with(Flag::Seen),
            Some(&l1),
            false,
        )
        .unwrap();

        assert!(q1.drain().is_empty());
        assert_eq!(
            vec![MailboxEvent::FlagsUpdated {
                seqnum: Seqnum::u(1),
                flags: FlagSet::new().with(Flag::Seen).with(Flag::Recent),
                uid: None,
            }],
            q2.drain()
        );
    }

    #[test]
    fn uid_store_echoes_uid() {
        let mb = set_up();
        simple_append(&mb);
        let uid = simple_append(&mb);
        let events = listen(&mb);

        mb.apply_flags(uid, FlagMode::Set, &deleted(), None, true)
            .unwrap();
        assert_eq!(
            vec![MailboxEvent::FlagsUpdated {
                seqnum: Seqnum::u(2),
                flags: deleted(),
                uid: Some(uid),
            }],
            events.drain()
        );
    }

    #[test]
    fn removed_listener_hears_nothing() {
        let mb = set_up();
        let uid = simple_append(&mb);
        let queue = EventQueue::new();
        let listener: Arc<dyn MailboxListener> = queue.clone();

        mb.add_listener(Arc::clone(&listener));
        mb.add_listener(Arc::clone(&listener));
        mb.apply_flags(uid, FlagMode::Add, &deleted(), None, false)
            .unwrap();
        mb.remove_listener(&listener);
        mb.remove_listener(&listener);
        mb.apply_flags(uid, FlagMode::Remove, &deleted(), None, false)
            .unwrap();

        // Registered twice, but only notified once
        assert_eq!(1, queue.drain().len());
    }

    #[test]
    fn concurrent_stores_notify_exactly_once() {
        let mb = set_up();
        let uids: Vec<Uid> = (0..50).map(|_| simple_append(&mb)).collect();
        let events = listen(&mb);

        uids.par_iter().for_each(|&uid| {
            mb.apply_flags(uid, FlagMode::Add, &deleted(), None, true)
                .unwrap();
        });

        let mut notified: Vec<Uid> = events
            .drain()
            .into_iter()
            .map(|e| match e {
                MailboxEvent::FlagsUpdated {
                    seqnum,
                    uid: Some(uid),
                    ..
                } => {
                    assert_eq!(mb.seqnum_of(uid).unwrap(), seqnum);
                    uid
                }
                e => panic!("Unexpected event: {:?}", e),
            })
            .collect();
        notified.sort();
        assert_eq!(uids, notified);
    }

    fn arb_flags() -> impl Strategy<Value = FlagSet> {
        prop::collection::vec(
            prop_oneof![
                Just(Flag::Answered),
                Just(Flag::Deleted),
                Just(Flag::Seen),
                Just(Flag::Recent),
                "[xyz]".prop_map(Flag::Keyword),
            ],
            0..5,
        )
        .prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        #[test]
        fn stored_flags_follow_mode(
            initial in arb_flags(),
            change in arb_flags(),
        ) {
            let mb = set_up();
            let uid = simple_append(&mb);
            mb.apply_flags(uid, FlagMode::Set, &initial, None, false)
                .unwrap();

            let added = mb
                .apply_flags(uid, FlagMode::Add, &change, None, false)
                .unwrap();
            prop_assert_eq!(initial.union(&change), added);

            let removed = mb
                .apply_flags(uid, FlagMode::Remove, &change, None, false)
                .unwrap();
            prop_assert_eq!(initial.union(&change).difference(&change),
                            removed.clone());
            let message = mb.get(uid).unwrap();
            prop_assert_eq!(&removed, message.flags());

            let set = mb
                .apply_flags(uid, FlagMode::Set, &change, None, false)
                .unwrap();
            prop_assert_eq!(&change, &set);
            let message = mb.get(uid).unwrap();
            prop_assert_eq!(&change, message.flags());
        }
    }
}
