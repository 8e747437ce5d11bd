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

//! Structured search criteria, in the shape of RFC 3501 `SEARCH` keys.

use chrono::prelude::*;

use super::message::Message;
use super::model::*;

/// A search criterion.
///
/// All substring matches are case-insensitive. Date comparisons consider only
/// the calendar date of the internal date, in the time zone it was recorded
/// in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchQuery {
    /// Matches every message.
    All,
    /// Messages whose sequence number is in any of the inclusive ranges.
    Seqnums(Vec<(Seqnum, Seqnum)>),
    /// Messages whose UID is in any of the inclusive ranges.
    Uids(Vec<(Uid, Uid)>),
    /// Messages bearing the given flag or keyword.
    HasFlag(Flag),
    /// Messages not bearing the given flag or keyword.
    LacksFlag(Flag),
    /// `\Recent` but not `\Seen`.
    New,
    /// Not `\Recent`.
    Old,
    /// Messages strictly larger than this many bytes.
    Larger(usize),
    /// Messages strictly smaller than this many bytes.
    Smaller(usize),
    /// Internal date strictly before the given day.
    Before(NaiveDate),
    /// Internal date on the given day.
    On(NaiveDate),
    /// Internal date on or after the given day.
    Since(NaiveDate),
    /// Messages with a header of the given name containing the string. An
    /// empty string matches any message which has the header at all.
    Header(String, String),
    Subject(String),
    From(String),
    To(String),
    /// The body contains the string.
    Body(String),
    /// The headers or body contain the string.
    Text(String),
    Not(Box<SearchQuery>),
    Or(Box<SearchQuery>, Box<SearchQuery>),
    /// All of the given criteria. An empty list matches everything.
    And(Vec<SearchQuery>),
}

impl SearchQuery {
    /// Evaluate this criterion against `message`, which currently has the
    /// sequence number `seqnum`.
    pub fn matches(&self, message: &Message, seqnum: Seqnum) -> bool {
        match *self {
            SearchQuery::All => true,
            SearchQuery::Seqnums(ref ranges) => ranges
                .iter()
                .any(|&(lo, hi)| seqnum >= lo && seqnum <= hi),
            SearchQuery::Uids(ref ranges) => {
                let uid = message.uid();
                ranges.iter().any(|&(lo, hi)| uid >= lo && uid <= hi)
            }
            SearchQuery::HasFlag(ref flag) => message.has_flag(flag),
            SearchQuery::LacksFlag(ref flag) => !message.has_flag(flag),
            SearchQuery::New => {
                message.has_flag(&Flag::Recent)
                    && !message.has_flag(&Flag::Seen)
            }
            SearchQuery::Old => !message.has_flag(&Flag::Recent),
            SearchQuery::Larger(size) => message.size() > size,
            SearchQuery::Smaller(size) => message.size() < size,
            SearchQuery::Before(date) => internal_day(message) < date,
            SearchQuery::On(date) => internal_day(message) == date,
            SearchQuery::Since(date) => internal_day(message) >= date,
            SearchQuery::Header(ref name, ref needle) => {
                header_contains(message, name, needle)
            }
            SearchQuery::Subject(ref needle) => {
                header_contains(message, "Subject", needle)
            }
            SearchQuery::From(ref needle) => {
                header_contains(message, "From", needle)
            }
            SearchQuery::To(ref needle) => {
                header_contains(message, "To", needle)
            }
            SearchQuery::Body(ref needle) => contains_ignore_case(
                &String::from_utf8_lossy(message.content().body().as_bytes()),
                needle,
            ),
            SearchQuery::Text(ref needle) => contains_ignore_case(
                &String::from_utf8_lossy(message.content().as_bytes()),
                needle,
            ),
            SearchQuery::Not(ref sub) => !sub.matches(message, seqnum),
            SearchQuery::Or(ref a, ref b) => {
                a.matches(message, seqnum) || b.matches(message, seqnum)
            }
            SearchQuery::And(ref subs) => {
                subs.iter().all(|sub| sub.matches(message, seqnum))
            }
        }
    }
}

fn internal_day(message: &Message) -> NaiveDate {
    message.internal_date().naive_local().date()
}

fn header_contains(message: &Message, name: &str, needle: &str) -> bool {
    message
        .content()
        .headers()
        .filter(|h| h.is_named(name))
        .any(|h| contains_ignore_case(&h.value, needle))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty()
        || haystack.to_lowercase().contains(&needle.to_lowercase())
}
