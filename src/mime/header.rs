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

//! Utilities for working with the RFC 5322 header block of a message.
//!
//! Parsing here is deliberately shallow: a header is a name and an unfolded
//! value, nothing more. Structured interpretation is limited to
//! `Content-Type`, which is needed for the MIME descriptor.

use std::borrow::Borrow;

use lazy_static::lazy_static;
use memchr::memchr;
use regex::Regex;

/// A single header from a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// The header name, with the original case.
    pub name: String,
    /// The header value, unfolded, with leading and trailing whitespace
    /// removed.
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether this header has the given name, compared case-insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Lazily parses the header block at the start of a message.
///
/// Iteration stops at the first empty line or at the end of the data.
/// Continuation lines (those starting with a space or tab) are folded into
/// the preceding header. Lines which are neither continuations nor contain a
/// colon are skipped.
#[derive(Clone, Debug)]
pub struct HeaderIter<'a> {
    rest: &'a [u8],
}

impl<'a> HeaderIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        HeaderIter { rest: data }
    }

    fn next_line(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            return None;
        }

        let (line, rest) = split_line(self.rest);
        if is_blank(line) {
            // End of the header block. Leave `rest` pointing at the blank
            // line so that we keep returning `None`.
            return None;
        }

        self.rest = rest;
        Some(line)
    }

    fn continues(&self) -> bool {
        matches!(self.rest.first(), Some(b' ') | Some(b'\t'))
    }
}

impl<'a> Iterator for HeaderIter<'a> {
    type Item = Header;

    fn next(&mut self) -> Option<Header> {
        loop {
            let line = self.next_line()?;
            let colon = match memchr(b':', line) {
                Some(colon) => colon,
                None => {
                    // Garbage (or an orphaned continuation); skip it along
                    // with anything folded into it.
                    while self.continues() {
                        self.next_line();
                    }
                    continue;
                }
            };

            let name =
                String::from_utf8_lossy(&line[..colon]).trim().to_owned();
            let mut value =
                String::from_utf8_lossy(trim_eol(&line[colon + 1..]))
                    .into_owned();
            while self.continues() {
                if let Some(cont) = self.next_line() {
                    value.push_str(&String::from_utf8_lossy(trim_eol(cont)));
                }
            }

            if name.is_empty() {
                continue;
            }

            return Some(Header {
                name,
                value: value.trim().to_owned(),
            });
        }
    }
}

/// Split off the first line of `data`, including its line ending.
fn split_line(data: &[u8]) -> (&[u8], &[u8]) {
    match memchr(b'\n', data) {
        Some(lf) => data.split_at(lf + 1),
        None => (data, &[]),
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_blank(line: &[u8]) -> bool {
    trim_eol(line).is_empty()
}

/// Return the byte offset at which the body of the message in `data` starts.
///
/// This is just past the empty line terminating the header block, or the end
/// of the data if there is no such line.
pub fn body_offset(data: &[u8]) -> usize {
    let mut offset = 0;
    let mut rest = data;
    while !rest.is_empty() {
        let (line, tail) = split_line(rest);
        offset += line.len();
        if is_blank(line) {
            return offset;
        }
        rest = tail;
    }

    data.len()
}

/// Filter `headers` down to those whose name is in `names`,
/// case-insensitively, preserving order.
///
/// This is a plain iterator adapter: if `headers` is a single-use iterator,
/// so is the result; passing a reference to a collection gives a result that
/// can simply be rebuilt.
pub fn get_matching<'a, I, H>(
    names: &'a [&'a str],
    headers: I,
) -> impl Iterator<Item = H> + 'a
where
    I: IntoIterator<Item = H>,
    I::IntoIter: 'a,
    H: Borrow<Header>,
{
    headers
        .into_iter()
        .filter(move |h| names.iter().any(|n| h.borrow().is_named(n)))
}

/// The complement of `get_matching`.
pub fn get_not_matching<'a, I, H>(
    names: &'a [&'a str],
    headers: I,
) -> impl Iterator<Item = H> + 'a
where
    I: IntoIterator<Item = H>,
    I::IntoIter: 'a,
    H: Borrow<Header>,
{
    headers
        .into_iter()
        .filter(move |h| !names.iter().any(|n| h.borrow().is_named(n)))
}

/// A parsed `Content-Type` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    /// The lower-case top-level type, e.g. `text`.
    pub typ: String,
    /// The lower-case subtype, e.g. `plain`.
    pub subtype: String,
    /// Parameters in the order they appear. Names are lower-case; values are
    /// unquoted.
    pub parms: Vec<(String, String)>,
}

impl Default for ContentType {
    /// The RFC 2045 default, `text/plain; charset=us-ascii`.
    fn default() -> Self {
        ContentType {
            typ: "text".to_owned(),
            subtype: "plain".to_owned(),
            parms: vec![("charset".to_owned(), "us-ascii".to_owned())],
        }
    }
}

lazy_static! {
    static ref RX_MEDIA_TYPE: Regex =
        Regex::new(r"^\s*([^/\s;]+)\s*/\s*([^\s;]+)").unwrap();
    static ref RX_PARM: Regex = Regex::new(
        r#";\s*([^=\s;]+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;\s]*))"#
    )
    .unwrap();
}

impl ContentType {
    /// Parse a `Content-Type` header value.
    ///
    /// Returns `None` if the value is not even syntactically a media type.
    pub fn parse(value: &str) -> Option<Self> {
        let media = RX_MEDIA_TYPE.captures(value)?;
        let typ = media.get(1)?.as_str().to_ascii_lowercase();
        let subtype = media.get(2)?.as_str().to_ascii_lowercase();
        let tail = &value[media.get(0)?.end()..];

        let parms = RX_PARM
            .captures_iter(tail)
            .filter_map(|cap| {
                let name = cap.get(1)?.as_str().to_ascii_lowercase();
                let value = if let Some(quoted) = cap.get(2) {
                    unquote(quoted.as_str())
                } else {
                    cap.get(3)?.as_str().to_owned()
                };
                Some((name, value))
            })
            .collect();

        Some(ContentType {
            typ,
            subtype,
            parms,
        })
    }

    /// Find the first `Content-Type` header in `headers` and parse it,
    /// falling back to the default if missing or unparsable.
    pub fn from_headers<H: Borrow<Header>>(
        headers: impl IntoIterator<Item = H>,
    ) -> Self {
        headers
            .into_iter()
            .find(|h| h.borrow().is_named("Content-Type"))
            .and_then(|h| ContentType::parse(&h.borrow().value))
            .unwrap_or_default()
    }

    /// Return the value of the named parameter, if present.
    pub fn parm(&self, name: &str) -> Option<&str> {
        self.parms
            .iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| v as &str)
    }
}

fn unquote(s: &str) -> String {
    let mut ret = String::with_capacity(s.len());
    let mut escaped = false;
    for ch in s.chars() {
        if escaped || '\\' != ch {
            ret.push(ch);
            escaped = false;
        } else {
            escaped = true;
        }
    }
    ret
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &[u8] = b"Subject: Hello\r\n\
To: zim@irk.com\r\n\
From: gir@earth.com\r\n\
Cc: dib@earth.com,\r\n\
\tgaz@earth.com\r\n\
\r\n\
Body text\r\n";

    fn names(headers: impl IntoIterator<Item = Header>) -> Vec<String> {
        headers.into_iter().map(|h| h.name).collect()
    }

    #[test]
    fn parse_headers() {
        let headers: Vec<Header> = HeaderIter::new(SAMPLE).collect();
        assert_eq!(
            vec![
                Header::new("Subject", "Hello"),
                Header::new("To", "zim@irk.com"),
                Header::new("From", "gir@earth.com"),
                Header::new("Cc", "dib@earth.com,\tgaz@earth.com"),
            ],
            headers
        );
    }

    #[test]
    fn parse_headers_edge_cases() {
        assert_eq!(0, HeaderIter::new(b"").count());
        assert_eq!(0, HeaderIter::new(b"\r\nFoo: bar\r\n").count());
        assert_eq!(
            vec!["A".to_owned(), "B".to_owned()],
            names(HeaderIter::new(b"A: 1\ngarbage\n more\nB:2"))
        );
        assert_eq!(
            vec![Header::new("X", "")],
            HeaderIter::new(b"X:\n\nY: z\n").collect::<Vec<_>>()
        );
    }

    #[test]
    fn body_offsets() {
        assert_eq!(SAMPLE.len() - 11, body_offset(SAMPLE));
        assert_eq!(b"Body text\r\n", &SAMPLE[body_offset(SAMPLE)..]);
        // Without a blank line, everything is header
        assert_eq!(9, body_offset(b"A: b\nbody"));
        assert_eq!(6, body_offset(b"A: b\n\nbody"));
        assert_eq!(2, body_offset(b"\r\nbody"));
        assert_eq!(4, body_offset(b"A: b"));
        assert_eq!(0, body_offset(b""));
    }

    #[test]
    fn matching_and_not_matching() {
        let headers = vec![
            Header::new("Subject", "s"),
            Header::new("To", "t"),
            Header::new("From", "f"),
            Header::new("Cc", "c"),
        ];
        let wanted = ["subject", "FROM"];

        assert_eq!(
            vec!["Subject".to_owned(), "From".to_owned()],
            get_matching(&wanted, &headers)
                .map(|h| h.name.clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            vec!["To".to_owned(), "Cc".to_owned()],
            get_not_matching(&wanted, &headers)
                .map(|h| h.name.clone())
                .collect::<Vec<_>>()
        );

        // A single-use source is consumed in one pass
        let mut source = headers.clone().into_iter();
        assert_eq!(2, get_matching(&wanted, source.by_ref()).count());
        assert_eq!(0, get_not_matching(&wanted, source).count());

        // And a lazy parser works directly
        assert_eq!(
            vec!["To".to_owned(), "Cc".to_owned()],
            names(get_not_matching(&wanted, HeaderIter::new(SAMPLE)))
        );
    }

    #[test]
    fn content_type_parsing() {
        let ct = ContentType::parse(
            "Multipart/Mixed; boundary=\"foo \\\"bar\\\"\"; Charset=utf-8",
        )
        .unwrap();
        assert_eq!("multipart", ct.typ);
        assert_eq!("mixed", ct.subtype);
        assert_eq!(Some("foo \"bar\""), ct.parm("boundary"));
        assert_eq!(Some("utf-8"), ct.parm("charset"));

        assert_eq!(None, ContentType::parse("garbage"));
        assert_eq!(
            ContentType::default(),
            ContentType::from_headers(vec![Header::new(
                "content-type",
                "nonsense"
            )])
        );
        assert_eq!(
            "html",
            ContentType::from_headers(vec![Header::new(
                "content-type",
                "text/html"
            )])
            .subtype
        );
    }
}
