use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A name the fuzzer knows to exist on both targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Inode seen on the system under test right after creation.
    pub inode: u64,
}

/// The fuzzer's belief about the contents of the fuzzed directory.
///
/// Only mutated after the oracle confirmed an operation on both targets, so
/// at every check point it mirrors what is on disk. Ordered by name so that
/// seeded argument choice is reproducible.
#[derive(Debug, Clone, Default)]
pub struct DirectoryTracker {
    entries: BTreeMap<String, DirectoryEntry>,
}

impl DirectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created entry. Returns the entry it replaced, which
    /// only happens if the targets accepted a duplicate create.
    pub fn insert(&mut self, name: &str, kind: EntryKind, inode: u64) -> Option<DirectoryEntry> {
        let entry = DirectoryEntry {
            name: name.to_string(),
            kind,
            inode,
        };
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => Some(occupied.insert(entry)),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<DirectoryEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn name_set(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }
}
