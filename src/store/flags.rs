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

//! Message flags and sets thereof.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::FromIterator;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// A message flag.
///
/// System flags are represented as top-level enum values. Keywords are in the
/// `Keyword` case.
///
/// The `Display` format of this type is the exact string value that would be
/// sent over the wire. `FromStr` does the reverse conversion, and also
/// understands non-standard casing of the system flags.
#[derive(Clone, Serialize, Deserialize)]
pub enum Flag {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Seen,
    Recent,
    Keyword(String),
}

impl Flag {
    fn system(&self) -> Option<SystemFlags> {
        match *self {
            Flag::Answered => Some(SystemFlags::ANSWERED),
            Flag::Deleted => Some(SystemFlags::DELETED),
            Flag::Draft => Some(SystemFlags::DRAFT),
            Flag::Flagged => Some(SystemFlags::FLAGGED),
            Flag::Seen => Some(SystemFlags::SEEN),
            Flag::Recent => Some(SystemFlags::RECENT),
            Flag::Keyword(_) => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            &Flag::Answered => write!(f, "\\Answered"),
            &Flag::Deleted => write!(f, "\\Deleted"),
            &Flag::Draft => write!(f, "\\Draft"),
            &Flag::Flagged => write!(f, "\\Flagged"),
            &Flag::Seen => write!(f, "\\Seen"),
            &Flag::Recent => write!(f, "\\Recent"),
            &Flag::Keyword(ref kw) => write!(f, "{}", kw),
        }
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <Flag as fmt::Display>::fmt(self, f)
    }
}

impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.eq_ignore_ascii_case("\\answered") {
            Ok(Flag::Answered)
        } else if s.eq_ignore_ascii_case("\\deleted") {
            Ok(Flag::Deleted)
        } else if s.eq_ignore_ascii_case("\\draft") {
            Ok(Flag::Draft)
        } else if s.eq_ignore_ascii_case("\\flagged") {
            Ok(Flag::Flagged)
        } else if s.eq_ignore_ascii_case("\\seen") {
            Ok(Flag::Seen)
        } else if s.eq_ignore_ascii_case("\\recent") {
            Ok(Flag::Recent)
        } else if s.starts_with('\\') {
            Err(Error::NxFlag)
        } else if !s.is_empty()
            && s.as_bytes().iter().copied().all(is_atom_char)
        {
            Ok(Flag::Keyword(s.to_owned()))
        } else {
            Err(Error::UnsafeName)
        }
    }
}

fn is_atom_char(ch: u8) -> bool {
    match ch {
        0..=b' ' => false,
        127..=255 => false,
        b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b']' => false,
        _ => true,
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Flag) -> bool {
        match (self, other) {
            // Keywords are compared ASCII-case-insensitively, which is what
            // clients expect even though RFC 3501 does not demand it.
            (&Flag::Keyword(ref a), &Flag::Keyword(ref b)) => {
                a.eq_ignore_ascii_case(b)
            }
            (a, b) => a.system().is_some() && a.system() == b.system(),
        }
    }
}

impl Eq for Flag {}

bitflags! {
    /// The system flags, as a plain bitset.
    #[derive(Default, Serialize, Deserialize)]
    struct SystemFlags: u8 {
        const ANSWERED = 1 << 0;
        const DELETED = 1 << 1;
        const DRAFT = 1 << 2;
        const FLAGGED = 1 << 3;
        const SEEN = 1 << 4;
        const RECENT = 1 << 5;
    }
}

/// A set of flags.
///
/// System flags live in an inline bitset; keywords are kept in a map keyed by
/// their lower-case form so that membership is case-insensitive while the
/// first-seen spelling is preserved.
///
/// All operations are idempotent and independent of insertion order.
/// Iteration yields system flags in declaration order, then keywords ordered
/// by their lower-case form.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct FlagSet {
    system: SystemFlags,
    keywords: BTreeMap<String, String>,
}

impl FlagSet {
    /// Create a new, empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this set with `flag` added.
    pub fn with(mut self, flag: Flag) -> Self {
        self.insert(flag);
        self
    }

    /// Insert `flag`. Returns whether it was not already present.
    pub fn insert(&mut self, flag: Flag) -> bool {
        match flag {
            Flag::Keyword(kw) => {
                let key = kw.to_ascii_lowercase();
                if self.keywords.contains_key(&key) {
                    false
                } else {
                    self.keywords.insert(key, kw);
                    true
                }
            }
            sys => {
                let bit = sys.system().unwrap_or_else(SystemFlags::empty);
                let ret = !self.system.contains(bit);
                self.system |= bit;
                ret
            }
        }
    }

    /// Remove `flag`. Returns whether it was present.
    pub fn remove(&mut self, flag: &Flag) -> bool {
        match *flag {
            Flag::Keyword(ref kw) => {
                self.keywords.remove(&kw.to_ascii_lowercase()).is_some()
            }
            ref sys => {
                let bit = sys.system().unwrap_or_else(SystemFlags::empty);
                let ret = self.system.contains(bit);
                self.system -= bit;
                ret
            }
        }
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        match *flag {
            Flag::Keyword(ref kw) => {
                self.keywords.contains_key(&kw.to_ascii_lowercase())
            }
            ref sys => sys
                .system()
                .map(|bit| self.system.contains(bit))
                .unwrap_or(false),
        }
    }

    /// Return the union of `self` and `other`.
    pub fn union(&self, other: &FlagSet) -> FlagSet {
        let mut ret = self.clone();
        ret.system |= other.system;
        for (key, kw) in &other.keywords {
            ret.keywords
                .entry(key.clone())
                .or_insert_with(|| kw.clone());
        }
        ret
    }

    /// Return `self` without any flags in `other`.
    pub fn difference(&self, other: &FlagSet) -> FlagSet {
        FlagSet {
            system: self.system - other.system,
            keywords: self
                .keywords
                .iter()
                .filter(|&(key, _)| !other.keywords.contains_key(key))
                .map(|(key, kw)| (key.clone(), kw.clone()))
                .collect(),
        }
    }

    /// Whether every flag in `self` is also in `other`.
    pub fn is_subset(&self, other: &FlagSet) -> bool {
        other.system.contains(self.system)
            && self.keywords.keys().all(|k| other.keywords.contains_key(k))
    }

    pub fn len(&self) -> usize {
        self.system.bits().count_ones() as usize + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.keywords.is_empty()
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = Flag> + 'a {
        static SYSTEM: [(SystemFlags, Flag); 6] = [
            (SystemFlags::ANSWERED, Flag::Answered),
            (SystemFlags::DELETED, Flag::Deleted),
            (SystemFlags::DRAFT, Flag::Draft),
            (SystemFlags::FLAGGED, Flag::Flagged),
            (SystemFlags::SEEN, Flag::Seen),
            (SystemFlags::RECENT, Flag::Recent),
        ];

        let system = self.system;
        SYSTEM
            .iter()
            .filter(move |&&(bit, _)| system.contains(bit))
            .map(|&(_, ref flag)| flag.clone())
            .chain(self.keywords.values().cloned().map(Flag::Keyword))
    }
}

impl PartialEq for FlagSet {
    fn eq(&self, other: &FlagSet) -> bool {
        self.system == other.system
            && self.keywords.len() == other.keywords.len()
            && self.keywords.keys().eq(other.keywords.keys())
    }
}

impl Eq for FlagSet {}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(it: I) -> Self {
        let mut this = FlagSet::new();
        for flag in it {
            this.insert(flag);
        }
        this
    }
}

impl Extend<Flag> for FlagSet {
    fn extend<I: IntoIterator<Item = Flag>>(&mut self, it: I) {
        for flag in it {
            self.insert(flag);
        }
    }
}

/// Formats the set in IMAP list syntax, e.g. `(\Seen $Important)`.
impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (ix, flag) in self.iter().enumerate() {
            if ix > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", flag)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FlagSet{}", self)
    }
}

/// How `Mailbox::apply_flags` combines the given flags with the existing
/// ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagMode {
    /// Replace the message's flags with exactly the given set.
    Set,
    /// Add the given flags.
    Add,
    /// Remove the given flags.
    Remove,
}

impl FlagMode {
    /// Compute the new flag set of a message currently bearing `current`.
    pub fn apply(self, current: &FlagSet, flags: &FlagSet) -> FlagSet {
        match self {
            FlagMode::Set => flags.clone(),
            FlagMode::Add => current.union(flags),
            FlagMode::Remove => current.difference(flags),
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn kw(s: &str) -> Flag {
        Flag::Keyword(s.to_owned())
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(Flag::Seen, "\\SEEN".parse::<Flag>().unwrap());
        assert_eq!(Flag::Recent, "\\recent".parse::<Flag>().unwrap());
        assert_eq!(kw("$Junk"), "$junk".parse::<Flag>().unwrap());
        assert_matches!(Err(Error::NxFlag), "\\Bogus".parse::<Flag>());
        assert_matches!(Err(Error::UnsafeName), "foo bar".parse::<Flag>());
        assert_matches!(Err(Error::UnsafeName), "".parse::<Flag>());
        assert_eq!("\\Draft", Flag::Draft.to_string());
        assert_eq!("$Junk", kw("$Junk").to_string());
    }

    #[test]
    fn keyword_case_insensitivity() {
        let mut set = FlagSet::new();
        assert!(set.insert(kw("$Junk")));
        assert!(!set.insert(kw("$JUNK")));
        assert!(set.contains(&kw("$junk")));
        assert_eq!(1, set.len());
        // First spelling wins
        assert_eq!("($Junk)", set.to_string());
        assert!(set.remove(&kw("$jUnK")));
        assert!(set.is_empty());
    }

    #[test]
    fn display_order() {
        let set: FlagSet =
            vec![kw("zzz"), Flag::Recent, Flag::Seen, kw("aaa"), Flag::Answered]
                .into_iter()
                .collect();
        assert_eq!("(\\Answered \\Seen \\Recent aaa zzz)", set.to_string());
    }

    fn arb_flag() -> impl Strategy<Value = Flag> {
        prop_oneof![
            Just(Flag::Answered),
            Just(Flag::Deleted),
            Just(Flag::Draft),
            Just(Flag::Flagged),
            Just(Flag::Seen),
            Just(Flag::Recent),
            "[a-cA-C]{1,2}".prop_map(Flag::Keyword),
        ]
    }

    fn arb_set() -> impl Strategy<Value = FlagSet> {
        prop::collection::vec(arb_flag(), 0..8)
            .prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #[test]
        fn set_algebra(a in arb_set(), b in arb_set(), f in arb_flag()) {
            let union = a.union(&b);
            let diff = a.difference(&b);

            // Commutativity and idempotence
            prop_assert_eq!(&union, &b.union(&a));
            prop_assert_eq!(&union, &union.union(&a));
            prop_assert_eq!(&diff, &diff.difference(&b));

            prop_assert!(a.is_subset(&union));
            prop_assert!(b.is_subset(&union));
            prop_assert!(diff.is_subset(&a));

            prop_assert_eq!(
                a.contains(&f) || b.contains(&f),
                union.contains(&f));
            prop_assert_eq!(
                a.contains(&f) && !b.contains(&f),
                diff.contains(&f));

            // Insertion order independence
            let reversed: FlagSet = {
                let mut v: Vec<Flag> = a.iter().collect();
                v.reverse();
                v.into_iter().collect()
            };
            prop_assert_eq!(&a, &reversed);
            prop_assert_eq!(a.len(), a.iter().count());
        }

        #[test]
        fn flag_modes(a in arb_set(), b in arb_set()) {
            prop_assert_eq!(&b, &FlagMode::Set.apply(&a, &b));
            prop_assert_eq!(a.union(&b), FlagMode::Add.apply(&a, &b));
            prop_assert_eq!(a.difference(&b), FlagMode::Remove.apply(&a, &b));
        }
    }
}
