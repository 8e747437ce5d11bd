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

use super::defs::*;
use crate::store::message::Message;
use crate::store::model::*;
use crate::store::search::SearchQuery;

impl Mailbox {
    /// Return the UIDs of the messages for which `predicate` holds, in
    /// sequence number order.
    ///
    /// The whole evaluation sees one consistent state of the mailbox.
    /// `predicate` must not call back into this mailbox.
    pub fn search(
        &self,
        predicate: impl Fn(&Message, Seqnum) -> bool,
    ) -> Vec<Uid> {
        self.read()
            .messages
            .iter()
            .enumerate()
            .filter(|&(ix, message)| {
                predicate(message, Seqnum::from_index(ix))
            })
            .map(|(_, message)| message.uid())
            .collect()
    }

    /// Return the UIDs of the messages matching `query`, in sequence number
    /// order.
    pub fn search_query(&self, query: &SearchQuery) -> Vec<Uid> {
        self.search(|message, seqnum| query.matches(message, seqnum))
    }
}

#[cfg(test)]
mod test {
    use chrono::prelude::*;

    use super::super::test_prelude::*;
    use super::*;

    #[test]
    fn search_preserves_order() {
        let mb = set_up();
        let uids: Vec<Uid> = (0..6).map(|_| simple_append(&mb)).collect();

        assert_eq!(
            vec![uids[0], uids[2], uids[4]],
            mb.search(|_, seqnum| 1 == u32::from(seqnum) % 2)
        );
        assert_eq!(uids, mb.search(|_, _| true));
        assert!(mb.search(|m, _| m.size() > 100).is_empty());
    }

    #[test]
    fn search_by_query() {
        let mb = set_up();
        simple_append(&mb);
        let wanted = mb
            .append(
                Utc::now(),
                &FlagSet::new().with(Flag::Flagged),
                &mut "Subject: Important\r\n\r\nRead me".as_bytes(),
            )
            .unwrap();
        simple_append(&mb);

        assert_eq!(
            vec![wanted],
            mb.search_query(&SearchQuery::And(vec![
                SearchQuery::HasFlag(Flag::Flagged),
                SearchQuery::Subject("important".to_owned()),
            ]))
        );
        assert_eq!(3, mb.search_query(&SearchQuery::New).len());

        mb.recent_count(true);
        assert!(mb.search_query(&SearchQuery::New).is_empty());
        assert_eq!(3, mb.search_query(&SearchQuery::Old).len());
    }
}
