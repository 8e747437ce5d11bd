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

//! Selective materialisation of message facets.
//!
//! A caller states what it wants with a `FetchGroup`, and gets back a
//! `FetchResult` carrying those facets (and possibly others). Each facet is
//! computed independently, so asking for the UID never touches the content
//! and asking for the full content never parses the headers.

use bitflags::bitflags;
use chrono::prelude::*;

use super::content::{Content, ContentKey};
use super::message::Message;
use super::model::*;
use crate::mime::header::Header;

pub use crate::mime::header::{get_matching, get_not_matching};

bitflags! {
    /// A set of message facets.
    ///
    /// Used both for requests and to describe what a result actually holds.
    /// The empty set is `MINIMAL`, which every result satisfies.
    pub struct FetchGroup: u32 {
        const MINIMAL = 0;
        const UID = 1 << 0;
        const SEQUENCE_NUMBER = 1 << 1;
        const FLAGS = 1 << 2;
        const SIZE = 1 << 3;
        const INTERNAL_DATE = 1 << 4;
        const CONTENT_KEY = 1 << 5;
        const HEADERS = 1 << 6;
        /// The whole message, headers included. This is the raw payload.
        const FULL_CONTENT = 1 << 7;
        const BODY_CONTENT = 1 << 8;
        /// The MIME structure summary.
        const MIME_DESCRIPTOR = 1 << 9;
    }
}

/// The summary of a message's MIME structure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MimeDescriptor {
    /// The lower-case top-level media type, e.g. `text`.
    pub typ: String,
    /// The lower-case media subtype, e.g. `plain`.
    pub subtype: String,
    /// The `Content-Type` parameters, in order, with lower-case names.
    pub parms: Vec<(String, String)>,
    /// The size of the header block, including the terminating blank line.
    pub header_size: usize,
    /// The size of the body.
    pub body_size: usize,
    /// The number of lines in the body.
    pub body_lines: usize,
}

impl MimeDescriptor {
    pub fn of(content: &Content) -> Self {
        let ct = content.content_type();
        let body = content.body();
        MimeDescriptor {
            typ: ct.typ,
            subtype: ct.subtype,
            parms: ct.parms,
            header_size: content.header_len(),
            body_size: body.len(),
            body_lines: body.line_count(),
        }
    }
}

/// The facets of one message that have been materialised so far.
///
/// A field is `None` if that facet has not been materialised.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchResult {
    pub uid: Option<Uid>,
    pub seqnum: Option<Seqnum>,
    pub flags: Option<FlagSet>,
    pub size: Option<usize>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub content_key: Option<ContentKey>,
    pub headers: Option<Vec<Header>>,
    pub full_content: Option<Content>,
    pub body_content: Option<Content>,
    pub mime: Option<MimeDescriptor>,
}

impl FetchResult {
    /// Build a result carrying exactly the facets in `group`.
    ///
    /// `seqnum` is the message's sequence number at the moment of the call;
    /// it is only consulted if `SEQUENCE_NUMBER` is requested.
    pub fn materialize(
        message: &Message,
        seqnum: Seqnum,
        group: FetchGroup,
    ) -> Self {
        let mut this = FetchResult::default();
        this.merge(message, seqnum, group);
        this
    }

    /// Add the facets in `group` which this result does not yet carry.
    ///
    /// Facets already present are left alone, even if the message has
    /// changed since they were materialised.
    pub fn merge(
        &mut self,
        message: &Message,
        seqnum: Seqnum,
        group: FetchGroup,
    ) {
        let missing = group - self.included_results();

        if missing.contains(FetchGroup::UID) {
            self.uid = Some(message.uid());
        }
        if missing.contains(FetchGroup::SEQUENCE_NUMBER) {
            self.seqnum = Some(seqnum);
        }
        if missing.contains(FetchGroup::FLAGS) {
            self.flags = Some(message.flags().clone());
        }
        if missing.contains(FetchGroup::SIZE) {
            self.size = Some(message.size());
        }
        if missing.contains(FetchGroup::INTERNAL_DATE) {
            self.internal_date = Some(message.internal_date());
        }
        if missing.contains(FetchGroup::CONTENT_KEY) {
            self.content_key = Some(message.content().key());
        }
        if missing.contains(FetchGroup::HEADERS) {
            self.headers = Some(message.content().headers().collect());
        }
        if missing.contains(FetchGroup::FULL_CONTENT) {
            self.full_content = Some(message.content().clone());
        }
        if missing.contains(FetchGroup::BODY_CONTENT) {
            self.body_content = Some(message.content().body());
        }
        if missing.contains(FetchGroup::MIME_DESCRIPTOR) {
            self.mime = Some(MimeDescriptor::of(message.content()));
        }
    }

    /// Return the set of facets this result actually carries.
    pub fn included_results(&self) -> FetchGroup {
        let mut ret = FetchGroup::MINIMAL;
        ret.set(FetchGroup::UID, self.uid.is_some());
        ret.set(FetchGroup::SEQUENCE_NUMBER, self.seqnum.is_some());
        ret.set(FetchGroup::FLAGS, self.flags.is_some());
        ret.set(FetchGroup::SIZE, self.size.is_some());
        ret.set(FetchGroup::INTERNAL_DATE, self.internal_date.is_some());
        ret.set(FetchGroup::CONTENT_KEY, self.content_key.is_some());
        ret.set(FetchGroup::HEADERS, self.headers.is_some());
        ret.set(FetchGroup::FULL_CONTENT, self.full_content.is_some());
        ret.set(FetchGroup::BODY_CONTENT, self.body_content.is_some());
        ret.set(FetchGroup::MIME_DESCRIPTOR, self.mime.is_some());
        ret
    }
}

/// Whether `result` exists and carries every facet in `group`.
///
/// An absent result never satisfies anything, not even `MINIMAL`.
pub fn is_included(result: Option<&FetchResult>, group: FetchGroup) -> bool {
    match result {
        None => false,
        Some(result) => result.included_results().contains(group),
    }
}
