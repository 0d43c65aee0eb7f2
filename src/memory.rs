//! Last-observed status per (watch, subject).

use std::collections::BTreeMap;

use crate::model::{LiveStatus, StatusKey, WatchKey};

#[derive(Debug, Default)]
pub struct StatusMemory {
    entries: BTreeMap<StatusKey, LiveStatus>,
}

impl StatusMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means the pair has never been observed.
    pub fn get(&self, key: &StatusKey) -> Option<LiveStatus> {
        self.entries.get(key).copied()
    }

    /// Records `status` and reports whether it differs from what was stored.
    pub fn observe(&mut self, key: StatusKey, status: LiveStatus) -> bool {
        self.entries.insert(key, status) != Some(status)
    }

    pub fn insert(&mut self, key: StatusKey, status: LiveStatus) {
        self.entries.insert(key, status);
    }

    /// Drops every entry belonging to `watch`.
    pub fn purge(&mut self, watch: &WatchKey) {
        self.entries.retain(|key, _| &key.watch != watch);
    }

    pub fn entries_for<'a>(
        &'a self,
        watch: &'a WatchKey,
    ) -> impl Iterator<Item = (&'a str, LiveStatus)> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| &key.watch == watch)
            .map(|(key, status)| (key.subject_id.as_str(), *status))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
