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
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mime::header::{self, ContentType, HeaderIter};
use crate::support::error::Error;

/// Identifies a particular stored byte sequence.
///
/// Every distinct piece of content read into the store gets a fresh key.
/// Copying a message to another mailbox shares the content, and therefore
/// the key, so callers may use the key to recognise that two messages are
/// byte-for-byte the same without comparing them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
pub struct ContentKey(pub u64);

static NEXT_CONTENT_KEY: AtomicU64 = AtomicU64::new(1);

impl ContentKey {
    fn allocate() -> Self {
        ContentKey(NEXT_CONTENT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// The immutable content of a message.
///
/// Cloning a `Content` is cheap: the bytes live in a shared buffer that is
/// never modified after construction. The body of a message is a view onto
/// the same buffer.
#[derive(Clone)]
pub struct Content {
    data: Arc<[u8]>,
    offset: usize,
    key: ContentKey,
}

impl Content {
    /// Take ownership of `data` as new content.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Content {
            data: data.into(),
            offset: 0,
            key: ContentKey::allocate(),
        }
    }

    /// Read new content from `reader` until EOF.
    ///
    /// Nothing is retained if reading fails.
    pub fn read_from(reader: &mut impl Read) -> Result<Self, Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Content::new(data))
    }

    pub fn key(&self) -> ContentKey {
        self.key
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    /// Lazily iterate the headers at the start of this content.
    pub fn headers(&self) -> HeaderIter<'_> {
        HeaderIter::new(self.as_bytes())
    }

    /// The length of the header block, including the blank line which
    /// terminates it.
    pub fn header_len(&self) -> usize {
        header::body_offset(self.as_bytes())
    }

    /// Return a view of the body of this content, i.e., everything after the
    /// header block.
    pub fn body(&self) -> Content {
        Content {
            data: Arc::clone(&self.data),
            offset: self.offset + self.header_len(),
            key: self.key,
        }
    }

    /// The number of lines in this content. A final line without a line
    /// ending still counts.
    pub fn line_count(&self) -> usize {
        let bytes = self.as_bytes();
        let newlines = memchr::memchr_iter(b'\n', bytes).count();
        if bytes.last().map_or(false, |&b| b'\n' != b) {
            newlines + 1
        } else {
            newlines
        }
    }

    /// Parse the `Content-Type` of this content.
    pub fn content_type(&self) -> ContentType {
        ContentType::from_headers(self.headers())
    }

    /// Whether this content and `other` are views of the same buffer at the
    /// same position.
    pub fn shares_storage_with(&self, other: &Content) -> bool {
        Arc::ptr_eq(&self.data, &other.data) && self.offset == other.offset
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Content) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Content {}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Content({}, {} bytes)", self.key, self.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MESSAGE: &[u8] = b"Subject: Hi\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
line one\r\n\
line two";

    #[test]
    fn body_shares_buffer() {
        let content = Content::new(MESSAGE);
        let body = content.body();

        assert_eq!(b"line one\r\nline two", body.as_bytes());
        assert_eq!(content.key(), body.key());
        assert_eq!(18, body.len());
        assert_eq!(MESSAGE.len() - 18, content.header_len());
        assert!(Arc::ptr_eq(&content.data, &body.data));
        assert_eq!(2, body.line_count());
        assert_eq!(5, content.line_count());
    }

    #[test]
    fn header_and_body_cover_content() {
        let samples: [&[u8]; 5] =
            [MESSAGE, b"A: b\nbody", b"A: b\n\nbody", b"\r\nbody", b""];
        for data in &samples {
            let content = Content::new(*data);
            assert_eq!(
                data.len(),
                content.header_len() + content.body().len(),
                "{:?}",
                String::from_utf8_lossy(data)
            );
        }

        let headerless = Content::new("A: b\nbody");
        assert_eq!(9, headerless.header_len());
        assert!(headerless.body().is_empty());
    }

    #[test]
    fn keys_are_unique_per_content() {
        let a = Content::new(MESSAGE);
        let b = Content::new(MESSAGE);
        assert_ne!(a.key(), b.key());
        assert_eq!(a, b);
        assert!(!a.shares_storage_with(&b));

        let c = a.clone();
        assert_eq!(a.key(), c.key());
        assert!(a.shares_storage_with(&c));
    }

    #[test]
    fn read_failure_is_storage_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            }
        }

        assert_matches!(
            Err(Error::Storage(_)),
            Content::read_from(&mut Broken)
        );
        let content = Content::read_from(&mut &MESSAGE[..]).unwrap();
        assert_eq!(MESSAGE, content.as_bytes());
    }

    #[test]
    fn headers_and_type() {
        let content = Content::new(MESSAGE);
        assert_eq!(2, content.headers().count());
        let ct = content.content_type();
        assert_eq!("text", ct.typ);
        assert_eq!(Some("utf-8"), ct.parm("charset"));

        let empty = Content::new(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(0, empty.line_count());
        assert_eq!(ContentType::default(), empty.content_type());
        assert!(empty.body().is_empty());
    }
}
