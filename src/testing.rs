//! In-process fakes for the provider, sink and resolver collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use crate::error::{Error, Result};
use crate::model::{LiveDetails, LiveStatus, Roster, Subject};
use crate::provider::StatusProvider;
use crate::sink::{ChannelResolver, Notification, NotificationSink};

pub fn roster() -> Roster {
    Roster::new(vec![
        Subject {
            key: "a".into(),
            id: "ch-a".into(),
            name: "Alpha".into(),
            aliases: vec![],
        },
        Subject {
            key: "b".into(),
            id: "ch-b".into(),
            name: "Beta".into(),
            aliases: vec![],
        },
    ])
}

/// Replays a per-subject status script; `None` entries are fetch failures.
/// The last entry repeats once the script runs out; unscripted subjects are
/// offline.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Option<LiveStatus>>>>,
    calls: Mutex<HashMap<String, usize>>,
    fail_details: Mutex<bool>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, subject_id: &str, statuses: &[Option<LiveStatus>]) {
        self.scripts
            .lock()
            .unwrap()
            .insert(subject_id.to_string(), statuses.iter().copied().collect());
    }

    pub fn fail_details(&self, fail: bool) {
        *self.fail_details.lock().unwrap() = fail;
    }

    /// Makes status fetches wait until [`ScriptedProvider::release`].
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    /// Resolves once a status fetch is waiting on the gate.
    pub async fn wait_for_fetch(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self, subject_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(subject_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl StatusProvider for ScriptedProvider {
    async fn fetch_status(&self, subject_id: &str) -> Result<LiveStatus> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(subject_id.to_string())
            .or_default() += 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            // Closing the semaphore is what lets waiters through.
            let _ = gate.acquire().await;
        }

        let mut scripts = self.scripts.lock().unwrap();
        let next = match scripts.get_mut(subject_id) {
            Some(script) if script.len() > 1 => script.pop_front().flatten(),
            Some(script) => script.front().copied().flatten(),
            None => Some(LiveStatus::Close),
        };

        next.ok_or_else(|| Error::Api {
            code: 503,
            message: "scripted failure".into(),
        })
    }

    async fn fetch_details(&self, subject_id: &str) -> Result<LiveDetails> {
        if *self.fail_details.lock().unwrap() {
            return Err(Error::Api {
                code: 503,
                message: "scripted failure".into(),
            });
        }
        Ok(LiveDetails {
            title: Some(format!("{subject_id} live")),
            ..LiveDetails::default()
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(String, Notification)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, channel_id: &str, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), notification.clone()));
        Ok(())
    }
}

/// Resolves only the channels it was built with. Channels marked with
/// [`FixedResolver::with_outage`] fail with a transient timeout instead.
pub struct FixedResolver {
    reachable: HashSet<String>,
    timing_out: HashSet<String>,
}

impl FixedResolver {
    pub fn new(channels: &[&str]) -> Self {
        Self {
            reachable: channels.iter().map(|c| (*c).to_string()).collect(),
            timing_out: HashSet::new(),
        }
    }

    pub fn with_outage(mut self, channels: &[&str]) -> Self {
        self.timing_out
            .extend(channels.iter().map(|c| (*c).to_string()));
        self
    }
}

#[async_trait]
impl ChannelResolver for FixedResolver {
    async fn resolve(&self, channel_id: &str) -> Result<()> {
        if self.timing_out.contains(channel_id) {
            Err(Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)))
        } else if self.reachable.contains(channel_id) {
            Ok(())
        } else {
            Err(Error::ChannelUnavailable(channel_id.to_string()))
        }
    }
}
