//! Active watches and the task driving each one.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{WatchKey, WatchRecord};
use crate::scheduler::TaskHandle;

#[derive(Debug)]
pub struct ActiveWatch {
    pub record: WatchRecord,
    /// Unset only between registration and the first tick being scheduled.
    pub task: Option<TaskHandle>,
}

/// At most one entry, and therefore one task, per [`WatchKey`].
#[derive(Debug, Default)]
pub struct WatchRegistry {
    watches: HashMap<WatchKey, ActiveWatch>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &WatchKey) -> bool {
        self.watches.contains_key(key)
    }

    pub fn get(&self, key: &WatchKey) -> Option<&WatchRecord> {
        self.watches.get(key).map(|w| &w.record)
    }

    pub fn insert(&mut self, record: WatchRecord) -> Result<()> {
        if self.has(&record.key) {
            return Err(Error::AlreadyWatching(record.key));
        }
        self.watches
            .insert(record.key.clone(), ActiveWatch { record, task: None });
        Ok(())
    }

    /// Attaches the scheduled task; a watch already removed gets its task
    /// cancelled instead.
    pub fn attach_task(&mut self, key: &WatchKey, task: TaskHandle) {
        match self.watches.get_mut(key) {
            Some(watch) if watch.task.is_none() => watch.task = Some(task),
            _ => task.cancel(),
        }
    }

    /// Removes the watch and cancels its task.
    pub fn remove(&mut self, key: &WatchKey) -> Option<WatchRecord> {
        let watch = self.watches.remove(key)?;
        if let Some(task) = &watch.task {
            task.cancel();
        }
        Some(watch.record)
    }

    pub fn records_for<'a>(&'a self, owner_user_id: &'a str) -> impl Iterator<Item = &'a WatchRecord> + 'a {
        self.watches
            .values()
            .map(|w| &w.record)
            .filter(move |r| r.owner_user_id == owner_user_id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &WatchKey> {
        self.watches.keys()
    }

    /// Cancels every task, leaving records in place.
    pub fn cancel_all(&self) {
        for task in self.watches.values().filter_map(|w| w.task.as_ref()) {
            task.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
