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

use log::info;

use super::defs::*;
use crate::store::model::*;
use crate::support::error::Error;

impl Mailbox {
    /// Permanently remove every message bearing `\Deleted`.
    ///
    /// Listeners receive one `expunged` notification per removed message,
    /// carrying the sequence number the message had at that moment.
    /// Messages are processed from the highest sequence number down, so each
    /// notified sequence number remains valid until that message is removed.
    ///
    /// Returns the UIDs of the removed messages in ascending order.
    pub fn expunge(&self) -> Result<Vec<Uid>, Error> {
        self.expunge_matching(|_| true)
    }

    /// Like `expunge`, but only removes messages whose UID is in `uids`.
    ///
    /// Messages in `uids` which do not exist or are not `\Deleted` are
    /// silently ignored.
    pub fn expunge_uids(&self, uids: &[Uid]) -> Result<Vec<Uid>, Error> {
        let mut uids = uids.to_vec();
        uids.sort_unstable();
        self.expunge_matching(|uid| uids.binary_search(&uid).is_ok())
    }

    fn expunge_matching(
        &self,
        filter: impl Fn(Uid) -> bool,
    ) -> Result<Vec<Uid>, Error> {
        let mut state = self.write();
        self.check_available(&state)?;

        let log_prefix = self.log_prefix();
        let mut expunged = Vec::new();
        for ix in (0..state.messages.len()).rev() {
            let message = &state.messages[ix];
            if !message.has_flag(&Flag::Deleted) || !filter(message.uid()) {
                continue;
            }

            let seqnum = Seqnum::from_index(ix);
            state
                .listeners
                .notify(&log_prefix, None, |l| l.expunged(seqnum));
            expunged.push(state.messages.remove(ix).uid());
        }

        expunged.reverse();
        if !expunged.is_empty() {
            info!("{} Expunged {:?}", log_prefix, expunged);
        }

        Ok(expunged)
    }
}
