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

//! The hierarchy of mailboxes belonging to one user.
//!
//! Every mailbox has exactly one parent, except the root, which is an
//! unnamed, non-selectable placeholder. The full name of a mailbox is its
//! parent's full name, the delimiter, and its own local name (or just the
//! local name for children of the root).
//!
//! Names keep the case they were created with, but lookup is
//! case-insensitive at every level, and two siblings may not differ only in
//! case. Each node keeps its children indexed by the case-folded name.
//!
//! Lock order is always namespace first, then mailbox. Mailboxes never lock
//! their namespace.

use std::collections::BTreeMap;
use std::fmt;
use std::ptr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;
use regex::Regex;

use super::mailbox::Mailbox;
use super::model::*;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::NamespaceConfig;

pub struct Namespace {
    delimiter: char,
    log_prefix: LogPrefix,
    root: RwLock<Node>,
}

struct Node {
    local_name: String,
    mailbox: Arc<Mailbox>,
    /// Keyed by case-folded local name
    children: BTreeMap<String, Node>,
}

impl Node {
    fn new(local_name: &str, mailbox: Mailbox) -> Self {
        Node {
            local_name: local_name.to_owned(),
            mailbox: Arc::new(mailbox),
            children: BTreeMap::new(),
        }
    }

    fn is(&self, mailbox: &Mailbox) -> bool {
        ptr::eq(&*self.mailbox, mailbox)
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        for child in self.children.values() {
            f(child);
            child.walk(f);
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn lookup<'a, I>(root: &'a Node, keys: I) -> Option<&'a Node>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut node = root;
    for key in keys {
        node = node.children.get(key.as_ref())?;
    }
    Some(node)
}

fn lookup_mut<'a, I>(root: &'a mut Node, keys: I) -> Option<&'a mut Node>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut node = root;
    for key in keys {
        node = node.children.get_mut(key.as_ref())?;
    }
    Some(node)
}

fn is_wildcard(ch: char) -> bool {
    '*' == ch || '%' == ch
}

impl Namespace {
    /// Create a namespace containing nothing but the root.
    pub fn new(delimiter: char, log_prefix: LogPrefix) -> Self {
        let root = Mailbox::new(String::new(), false, log_prefix.clone());
        Namespace {
            delimiter,
            log_prefix,
            root: RwLock::new(Node::new("", root)),
        }
    }

    /// Create a namespace as described by `config`.
    ///
    /// The inbox and every provisioned mailbox are created, along with any
    /// intermediate placeholders they need. Provisioned mailboxes that
    /// already exist (e.g. the inbox listed again) are left alone, except
    /// that a placeholder created for an earlier entry becomes selectable if
    /// a later entry asks for that.
    pub fn from_config(
        config: &NamespaceConfig,
        log_prefix: LogPrefix,
    ) -> Result<Self, Error> {
        if is_wildcard(config.delimiter) || config.delimiter.is_control() {
            return Err(Error::InvalidName);
        }

        let this = Namespace::new(config.delimiter, log_prefix);
        this.create_path(&config.inbox, true)?;
        for provision in &config.provision {
            match this.create_path(&provision.name, provision.selectable) {
                Ok(_) | Err(Error::MailboxExists) => (),
                Err(e) => return Err(e),
            }
        }

        Ok(this)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The unnamed root of the hierarchy.
    ///
    /// Top-level mailboxes are created as children of the root.
    pub fn root(&self) -> Arc<Mailbox> {
        Arc::clone(&self.read().mailbox)
    }

    /// Find the mailbox with the given full name.
    pub fn resolve(&self, full_name: &str) -> Option<Arc<Mailbox>> {
        if full_name.is_empty() {
            return None;
        }

        let root = self.read();
        lookup(&root, self.keys(full_name)).map(|n| Arc::clone(&n.mailbox))
    }

    /// Create a new mailbox named `local_name` under `parent`.
    ///
    /// Fails with `InvalidName` if `local_name` is empty, contains the
    /// delimiter, or contains a wildcard; with `MailboxExists` if `parent`
    /// already has a child by that name, ignoring case; and with
    /// `NxMailbox` if `parent` is not (or no longer) in this namespace.
    pub fn create(
        &self,
        parent: &Mailbox,
        local_name: &str,
        selectable: bool,
    ) -> Result<Arc<Mailbox>, Error> {
        self.check_local_name(local_name)?;

        let mut root = self.write();
        let parent_node = self.node_mut(&mut root, parent)?;
        let key = fold(local_name);
        if parent_node.children.contains_key(&key) {
            return Err(Error::MailboxExists);
        }

        let full_name = self.join(&parent.name(), local_name);
        let node = Node::new(
            local_name,
            Mailbox::new(full_name, selectable, self.log_prefix.clone()),
        );
        let mailbox = Arc::clone(&node.mailbox);
        parent_node.children.insert(key, node);
        Ok(mailbox)
    }

    /// Create the mailbox with the given full name, creating any missing
    /// intermediate mailboxes as non-selectable placeholders.
    ///
    /// If the final mailbox already exists as a placeholder and `selectable`
    /// is requested, the placeholder is replaced by a new selectable mailbox
    /// which keeps its children; the placeholder itself is deleted.
    /// Otherwise, fails with `MailboxExists` if the final mailbox already
    /// exists. On failure, nothing is created.
    pub fn create_path(
        &self,
        full_name: &str,
        selectable: bool,
    ) -> Result<Arc<Mailbox>, Error> {
        let parts = full_name.split(self.delimiter).collect::<Vec<_>>();
        for part in &parts {
            self.check_local_name(part)?;
        }

        let mut root = self.write();
        let mut node: &mut Node = &mut root;
        for (ix, part) in parts.iter().enumerate() {
            let is_leaf = ix + 1 == parts.len();
            let key = fold(part);
            if is_leaf {
                if let Some(existing) = node.children.get_mut(&key) {
                    return self.promote(existing, selectable);
                }
            }

            // Existing intermediates keep the case they were created with
            let name = self.join(&node.mailbox.name(), part);
            node = node.children.entry(key).or_insert_with(|| {
                Node::new(
                    part,
                    Mailbox::new(
                        name,
                        is_leaf && selectable,
                        self.log_prefix.clone(),
                    ),
                )
            });
        }

        Ok(Arc::clone(&node.mailbox))
    }

    fn promote(
        &self,
        node: &mut Node,
        selectable: bool,
    ) -> Result<Arc<Mailbox>, Error> {
        if !selectable || node.mailbox.is_selectable() {
            return Err(Error::MailboxExists);
        }

        let promoted = Arc::new(Mailbox::new(
            node.mailbox.name(),
            true,
            self.log_prefix.clone(),
        ));
        node.mailbox.delete_if_empty()?;
        node.mailbox = Arc::clone(&promoted);
        Ok(promoted)
    }

    /// Remove `mailbox` from the namespace and kill it.
    ///
    /// Fails with `MailboxHasInferiors` if it has children, or
    /// `MailboxHasMessages` if it contains messages. Listeners on the mailbox
    /// are told it was deleted, and any further mutation through an existing
    /// handle fails with `MailboxDeleted`.
    pub fn delete(&self, mailbox: &Mailbox) -> Result<(), Error> {
        let mut root = self.write();
        let keys = self.keys_of(mailbox);
        let (key, parent_keys) =
            keys.split_last().ok_or(Error::BadOperationOnRoot)?;

        let parent =
            lookup_mut(&mut root, parent_keys).ok_or(Error::NxMailbox)?;
        match parent.children.get(key) {
            Some(node) if node.is(mailbox) => {
                if !node.children.is_empty() {
                    return Err(Error::MailboxHasInferiors);
                }
            }
            _ => return Err(Error::NxMailbox),
        }

        mailbox.delete_if_empty()?;
        parent.children.remove(key);
        info!("{} Deleted mailbox {}", self.log_prefix, mailbox.name());
        Ok(())
    }

    /// Change the local name of `mailbox` to `new_local_name`.
    ///
    /// The mailbox keeps its identity, messages and UID validity. The full
    /// names of all its descendants change accordingly.
    pub fn rename(
        &self,
        mailbox: &Mailbox,
        new_local_name: &str,
    ) -> Result<(), Error> {
        self.check_local_name(new_local_name)?;

        let mut root = self.write();
        let keys = self.keys_of(mailbox);
        let (old_key, parent_keys) =
            keys.split_last().ok_or(Error::BadOperationOnRoot)?;

        let parent =
            lookup_mut(&mut root, parent_keys).ok_or(Error::NxMailbox)?;
        if !parent.children.get(old_key).map_or(false, |n| n.is(mailbox)) {
            return Err(Error::NxMailbox);
        }

        let new_key = fold(new_local_name);
        if new_key != *old_key && parent.children.contains_key(&new_key) {
            return Err(Error::MailboxExists);
        }

        let old_name = mailbox.name();
        let mut node =
            parent.children.remove(old_key).ok_or(Error::NxMailbox)?;
        node.local_name = new_local_name.to_owned();
        let new_name = self.join(&parent.mailbox.name(), new_local_name);
        self.rename_subtree(&node, new_name.clone());
        parent.children.insert(new_key, node);

        info!("{} Renamed {} to {}", self.log_prefix, old_name, new_name);
        Ok(())
    }

    fn rename_subtree(&self, node: &Node, full_name: String) {
        for child in node.children.values() {
            let child_name = self.join(&full_name, &child.local_name);
            self.rename_subtree(child, child_name);
        }
        node.mailbox.set_name(full_name);
    }

    /// Return the children of `parent`, ordered by case-folded name.
    pub fn children(
        &self,
        parent: &Mailbox,
    ) -> Result<Vec<Arc<Mailbox>>, Error> {
        let root = self.read();
        let keys = self.keys_of(parent);
        let node = lookup(&root, &keys)
            .filter(|n| n.is(parent))
            .ok_or(Error::NxMailbox)?;
        Ok(node
            .children
            .values()
            .map(|n| Arc::clone(&n.mailbox))
            .collect())
    }

    /// Return the mailboxes whose full names match `pattern`, in hierarchy
    /// order.
    ///
    /// A wildcard may only appear as the last character of the pattern. `*`
    /// matches anything, including the delimiter; `%` matches anything but
    /// the delimiter. Matching is case-insensitive.
    pub fn list(&self, pattern: &str) -> Result<Vec<Arc<Mailbox>>, Error> {
        self.matching(pattern, |node| Arc::clone(&node.mailbox))
    }

    /// Like `list`, but return the name and attributes of each mailbox.
    pub fn list_responses(
        &self,
        pattern: &str,
    ) -> Result<Vec<ListResponse>, Error> {
        self.matching(pattern, |node| {
            let mut attributes = Vec::new();
            if !node.mailbox.is_selectable() {
                attributes.push(MailboxAttribute::Noselect);
            }
            attributes.push(if node.children.is_empty() {
                MailboxAttribute::HasNoChildren
            } else {
                MailboxAttribute::HasChildren
            });

            ListResponse {
                name: node.mailbox.name(),
                attributes,
            }
        })
    }

    fn matching<T>(
        &self,
        pattern: &str,
        f: impl Fn(&Node) -> T,
    ) -> Result<Vec<T>, Error> {
        let rx = self.pattern_regex(pattern)?;
        let root = self.read();
        let mut ret = Vec::new();
        root.walk(&mut |node| {
            if rx.is_match(&node.mailbox.name()) {
                ret.push(f(node));
            }
        });
        Ok(ret)
    }

    fn pattern_regex(&self, pattern: &str) -> Result<Regex, Error> {
        let (literal, wildcard) = match pattern.char_indices().last() {
            Some((ix, ch)) if is_wildcard(ch) => (&pattern[..ix], Some(ch)),
            _ => (pattern, None),
        };

        if literal.contains(is_wildcard) {
            return Err(Error::UnsupportedPattern);
        }

        let mut rx = format!("(?i)^{}", regex::escape(literal));
        match wildcard {
            Some('*') => rx.push_str(".*"),
            Some('%') => {
                rx.push_str("[^");
                rx.push_str(&regex::escape(&self.delimiter.to_string()));
                rx.push_str("]*");
            }
            _ => (),
        }
        rx.push('$');

        Ok(Regex::new(&rx)?)
    }

    fn check_local_name(&self, name: &str) -> Result<(), Error> {
        let forbidden =
            |c: char| self.delimiter == c || is_wildcard(c) || c.is_control();
        if name.is_empty() || name.chars().any(forbidden) {
            Err(Error::InvalidName)
        } else {
            Ok(())
        }
    }

    fn join(&self, parent: &str, local_name: &str) -> String {
        if parent.is_empty() {
            local_name.to_owned()
        } else {
            format!("{}{}{}", parent, self.delimiter, local_name)
        }
    }

    fn keys<'a>(
        &self,
        full_name: &'a str,
    ) -> impl Iterator<Item = String> + 'a {
        full_name.split(self.delimiter).map(fold)
    }

    /// The path of case-folded keys leading to `mailbox`.
    ///
    /// Must be called with the namespace locked so that the name is not
    /// changed by a concurrent rename.
    fn keys_of(&self, mailbox: &Mailbox) -> Vec<String> {
        let name = mailbox.name();
        if name.is_empty() {
            Vec::new()
        } else {
            self.keys(&name).collect()
        }
    }

    fn node_mut<'a>(
        &self,
        root: &'a mut Node,
        mailbox: &Mailbox,
    ) -> Result<&'a mut Node, Error> {
        lookup_mut(root, self.keys_of(mailbox))
            .filter(|n| n.is(mailbox))
            .ok_or(Error::NxMailbox)
    }

    fn read(&self) -> RwLockReadGuard<'_, Node> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Node> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names = Vec::new();
        self.read().walk(&mut |node| names.push(node.mailbox.name()));
        write!(f, "Namespace({:?}, {:?})", self.delimiter, names)
    }
}
