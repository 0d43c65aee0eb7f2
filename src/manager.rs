//! The watch engine: toggles, per-tick transition detection and
//! write-through persistence.
//!
//! One [`WatchManager`] owns the registry, the status memory and the store
//! behind a single async mutex, so every mutation is serialized. External
//! calls (status provider, notification sink) happen outside the lock.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::memory::StatusMemory;
use crate::model::{
    LiveStatus, Roster, Selector, StatusKey, Subject, WatchKey, WatchRecord,
};
use crate::provider::StatusProvider;
use crate::registry::WatchRegistry;
use crate::scheduler::spawn_repeating;
use crate::sink::{Notification, NotificationSink};
use crate::store::{OwnerState, PersistedState, PersistedWatch, StateStore, StatusSnapshot};

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub period: Duration,
    /// Prefix the subject id is appended to for "watch now" links.
    pub live_url_base: String,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(180),
            live_url_base: "https://chzzk.naver.com/live/".to_string(),
        }
    }
}

/// A start/stop request from the command surface.
#[derive(Debug, Clone)]
pub struct ToggleRequest {
    pub owner_user_id: String,
    pub channel_id: String,
    /// When set, the watch is scoped to the whole guild.
    pub guild_id: Option<String>,
    pub selector_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started(WatchRecord),
    Stopped(WatchRecord),
    UnknownSelector(String),
}

impl ToggleOutcome {
    /// Reply text for the user who issued the toggle.
    pub fn acknowledgement(&self) -> String {
        match self {
            ToggleOutcome::Started(record) => {
                format!("✅ Started background status check for {}.", record.label())
            }
            ToggleOutcome::Stopped(record) => {
                format!("✅ Stopped background status check for {}.", record.label())
            }
            ToggleOutcome::UnknownSelector(text) => {
                format!("❌ **[{text}]** is not on the streamer list. Please check the name!")
            }
        }
    }
}

struct WatchState {
    registry: WatchRegistry,
    memory: StatusMemory,
    store: Box<dyn StateStore>,
}

impl WatchState {
    fn add_watch(&mut self, record: WatchRecord) -> Result<()> {
        let owner = record.owner_user_id.clone();
        self.registry.insert(record)?;
        self.persist(&owner);
        Ok(())
    }

    fn remove_watch(&mut self, key: &WatchKey) -> Option<WatchRecord> {
        let record = self.registry.remove(key)?;
        self.memory.purge(key);
        self.persist(&record.owner_user_id);
        Some(record)
    }

    fn owner_state(&self, owner_user_id: &str) -> OwnerState {
        let mut records: Vec<&WatchRecord> = self.registry.records_for(owner_user_id).collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let mut status_memory = StatusSnapshot::new();
        for record in &records {
            let statuses: BTreeMap<String, LiveStatus> = self
                .memory
                .entries_for(&record.key)
                .map(|(subject_id, status)| (subject_id.to_string(), status))
                .collect();
            if !statuses.is_empty() {
                status_memory.insert(record.key.to_string(), statuses);
            }
        }

        OwnerState {
            watches: records.into_iter().map(PersistedWatch::from_record).collect(),
            status_memory,
        }
    }

    /// Mirrors the owner's in-memory state to the store. Failures are logged;
    /// memory stays authoritative until the next successful write.
    fn persist(&mut self, owner_user_id: &str) {
        let state = self.owner_state(owner_user_id);
        let result = if state.watches.is_empty() {
            self.store.remove(owner_user_id)
        } else {
            self.store.set(owner_user_id, state)
        };

        if let Err(e) = result {
            error!("Failed to persist watch state for {owner_user_id}: {e}");
        }
    }
}

pub struct WatchManager {
    roster: Roster,
    provider: Arc<dyn StatusProvider>,
    sink: Arc<dyn NotificationSink>,
    settings: WatchSettings,
    tasks: CancellationToken,
    state: Mutex<WatchState>,
}

impl WatchManager {
    pub fn new(
        roster: Roster,
        provider: Arc<dyn StatusProvider>,
        sink: Arc<dyn NotificationSink>,
        store: Box<dyn StateStore>,
        settings: WatchSettings,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            roster,
            provider,
            sink,
            settings,
            tasks: shutdown,
            state: Mutex::new(WatchState {
                registry: WatchRegistry::new(),
                memory: StatusMemory::new(),
                store,
            }),
        })
    }

    pub async fn has(&self, key: &WatchKey) -> bool {
        self.state.lock().await.registry.has(key)
    }

    pub async fn active_keys(&self) -> Vec<WatchKey> {
        let mut keys: Vec<WatchKey> = self.state.lock().await.registry.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn status(&self, key: &StatusKey) -> Option<LiveStatus> {
        self.state.lock().await.memory.get(key)
    }

    /// What the store currently holds.
    pub async fn persisted(&self) -> PersistedState {
        self.state.lock().await.store.snapshot()
    }

    /// Builds the record a request would create, or returns the selector
    /// text that failed to resolve.
    pub fn record_for(&self, request: &ToggleRequest) -> std::result::Result<WatchRecord, String> {
        let selector_text = request
            .selector_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        let selector = match selector_text {
            None => Selector::All,
            Some(text) => match self.roster.resolve_text(text) {
                Some(subject) => Selector::Subject(subject.id.clone()),
                None => return Err(text.to_string()),
            },
        };

        let scope = request
            .guild_id
            .clone()
            .unwrap_or_else(|| request.channel_id.clone());

        Ok(WatchRecord {
            key: WatchKey::new(scope, selector),
            owner_user_id: request.owner_user_id.clone(),
            channel_id: request.channel_id.clone(),
            selector_text: selector_text.map(str::to_string),
            created_at: Utc::now(),
        })
    }

    /// Stops the watch if it exists, starts it otherwise.
    pub async fn toggle(self: &Arc<Self>, request: &ToggleRequest) -> Result<ToggleOutcome> {
        let record = match self.record_for(request) {
            Ok(record) => record,
            Err(text) => {
                info!("Toggle from {} rejected: unknown selector {text:?}", request.owner_user_id);
                return Ok(ToggleOutcome::UnknownSelector(text));
            }
        };

        {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.remove_watch(&record.key) {
                info!("Stopped watch {}", existing.key);
                return Ok(ToggleOutcome::Stopped(existing));
            }
            state.add_watch(record.clone())?;
        }

        info!("Started watch {} for {}", record.key, record.owner_user_id);
        self.launch(record.key.clone()).await;
        Ok(ToggleOutcome::Started(record))
    }

    /// Registers a new watch, runs its first tick, then schedules the rest.
    ///
    /// Fails with [`Error::AlreadyWatching`] when the key is active.
    pub async fn start(self: &Arc<Self>, record: WatchRecord) -> Result<()> {
        let key = record.key.clone();
        self.state.lock().await.add_watch(record)?;
        info!("Started watch {key}");
        self.launch(key).await;
        Ok(())
    }

    /// Re-registers a persisted watch with its last known statuses.
    pub async fn restore<I>(self: &Arc<Self>, record: WatchRecord, statuses: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, LiveStatus)>,
    {
        let key = record.key.clone();
        {
            let mut state = self.state.lock().await;
            state.registry.insert(record)?;
            for (subject_id, status) in statuses {
                state
                    .memory
                    .insert(StatusKey::new(key.clone(), subject_id), status);
            }
        }
        debug!("Restored watch {key}");
        self.launch(key).await;
        Ok(())
    }

    /// Cancels the task, drops the record and purges its statuses.
    pub async fn stop(&self, key: &WatchKey) -> Option<WatchRecord> {
        let record = self.state.lock().await.remove_watch(key);
        if record.is_some() {
            info!("Stopped watch {key}");
        }
        record
    }

    /// Rewrites the owner's entry in the store from memory.
    pub async fn persist_owner(&self, owner_user_id: &str) {
        self.state.lock().await.persist(owner_user_id);
    }

    /// Cancels every scheduled task. Records stay persisted for the next start.
    pub async fn shutdown(&self) {
        self.tasks.cancel();
        self.state.lock().await.registry.cancel_all();
    }

    async fn launch(self: &Arc<Self>, key: WatchKey) {
        self.tick(&key).await;

        let manager = Arc::clone(self);
        let task_key = key.clone();
        let task = spawn_repeating(
            key.to_string(),
            self.settings.period,
            &self.tasks,
            move || {
                let manager = Arc::clone(&manager);
                let key = task_key.clone();
                async move { manager.tick(&key).await }
            },
        );

        self.state.lock().await.registry.attach_task(&key, task);
    }

    /// One polling pass for `key`.
    pub async fn tick(&self, key: &WatchKey) {
        let Some(record) = self.state.lock().await.registry.get(key).cloned() else {
            debug!("Tick for inactive watch {key} skipped");
            return;
        };

        let changed = match &key.selector {
            Selector::All => {
                let mut changed = false;
                // Sequential: at most one outstanding provider call per tick.
                for subject in self.roster.iter() {
                    changed |= self.check_subject(&record, subject).await;
                }
                changed
            }
            Selector::Subject(id) => {
                if let Some(subject) = self.roster.by_id(id) {
                    self.check_subject(&record, subject).await
                } else {
                    self.cancel_unknown(&record).await;
                    return;
                }
            }
        };

        if changed {
            self.persist_owner(&record.owner_user_id).await;
        }
    }

    /// Returns whether a transition was recorded.
    async fn check_subject(&self, record: &WatchRecord, subject: &Subject) -> bool {
        let status = match self.provider.fetch_status(&subject.id).await {
            Ok(status) => status,
            Err(e) => {
                warn!("{}: status check for {} failed, skipping: {e}", record.key, subject.name);
                return false;
            }
        };

        let status_key = StatusKey::new(record.key.clone(), subject.id.clone());
        if self.state.lock().await.memory.get(&status_key) == Some(status) {
            debug!("{}: {} still {status}", record.key, subject.name);
            return false;
        }

        let notification = if status.is_live() {
            match self.provider.fetch_details(&subject.id).await {
                Ok(details) => Notification::live_started(
                    &record.owner_user_id,
                    subject,
                    &details,
                    &self.settings.live_url_base,
                ),
                Err(e) => {
                    warn!("{}: detail fetch for {} failed, skipping: {e}", record.key, subject.name);
                    return false;
                }
            }
        } else {
            Notification::live_ended(subject)
        };

        // A stop (or stop and restart) while this check was in flight must not
        // leave a memory entry behind for the key.
        let recorded = {
            let mut state = self.state.lock().await;
            let current = state.registry.get(&record.key) == Some(record);
            if current {
                state.memory.observe(status_key, status);
            }
            current
        };
        if recorded {
            info!("{}: {} is now {status}", record.key, subject.name);
        } else {
            debug!("{}: stopped during check, {} {status} not recorded", record.key, subject.name);
        }
        self.deliver(&record.channel_id, &notification).await;
        recorded
    }

    async fn cancel_unknown(&self, record: &WatchRecord) {
        let text = record
            .selector_text
            .clone()
            .unwrap_or_else(|| record.key.selector.to_string());
        warn!("{}: {}", record.key, Error::UnknownSelector(text.clone()));

        self.deliver(&record.channel_id, &Notification::unknown_subject(&text))
            .await;
        self.stop(&record.key).await;
    }

    async fn deliver(&self, channel_id: &str, notification: &Notification) {
        if let Err(e) = self.sink.send(channel_id, notification).await {
            error!("Failed to send notification to {channel_id}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LiveStatus::{Close, Open};
    use crate::store::JsonFileStore;
    use crate::testing::{RecordingSink, ScriptedProvider, roster};
    use std::path::Path;
    use tempfile::tempdir;

    fn manager(
        provider: &Arc<ScriptedProvider>,
        sink: &Arc<RecordingSink>,
        state_path: &Path,
    ) -> Arc<WatchManager> {
        WatchManager::new(
            roster(),
            provider.clone(),
            sink.clone(),
            Box::new(JsonFileStore::open(state_path)),
            WatchSettings::default(),
            CancellationToken::new(),
        )
    }

    fn request(channel: &str, selector: Option<&str>) -> ToggleRequest {
        ToggleRequest {
            owner_user_id: "owner-1".into(),
            channel_id: channel.into(),
            guild_id: None,
            selector_text: selector.map(str::to_string),
        }
    }

    fn single_key(channel: &str, subject_id: &str) -> WatchKey {
        WatchKey::new(channel, Selector::Subject(subject_id.into()))
    }

    #[tokio::test]
    async fn test_open_open_close_fires_exactly_two_notifications() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open), Some(Open), Some(Close)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let outcome = manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::Started(_)));

        let key = single_key("C", "ch-a");
        let memory_key = StatusKey::new(key.clone(), "ch-a");

        // Tick 1 ran inside the toggle.
        assert_eq!(sink.count(), 1);
        assert!(sink.last().unwrap().1.content.contains("went live"));
        assert_eq!(manager.status(&memory_key).await, Some(Open));

        manager.tick(&key).await;
        assert_eq!(sink.count(), 1);

        manager.tick(&key).await;
        assert_eq!(sink.count(), 2);
        let (channel, ended) = sink.last().unwrap();
        assert_eq!(channel, "C");
        assert!(ended.content.contains("ended"));
        assert_eq!(manager.status(&memory_key).await, Some(Close));

        let outcome = manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::Stopped(_)));
        assert_eq!(manager.status(&memory_key).await, None);
        assert!(!manager.has(&key).await);

        manager.tick(&key).await;
        assert_eq!(sink.count(), 2);
        assert_eq!(provider.calls("ch-a"), 3);
        assert!(manager.persisted().await.is_empty());
    }

    #[tokio::test]
    async fn test_all_selector_checks_each_subject_independently() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[None, Some(Close)]);
        provider.script("ch-b", &[Some(Open), Some(Open)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        manager.toggle(&request("C", None)).await.unwrap();
        let key = WatchKey::new("C", Selector::All);

        // Failed fetch for a leaves its memory untouched.
        assert_eq!(sink.count(), 1);
        assert_eq!(manager.status(&StatusKey::new(key.clone(), "ch-a")).await, None);
        assert_eq!(
            manager.status(&StatusKey::new(key.clone(), "ch-b")).await,
            Some(Open)
        );

        manager.tick(&key).await;
        assert_eq!(sink.count(), 2);
        assert!(sink.last().unwrap().1.content.contains("Alpha"));
        assert_eq!(
            manager.status(&StatusKey::new(key.clone(), "ch-a")).await,
            Some(Close)
        );
        assert_eq!(provider.calls("ch-b"), 2);
    }

    #[tokio::test]
    async fn test_detail_failure_defers_transition() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open)]);
        provider.fail_details(true);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        manager.toggle(&request("C", Some("a"))).await.unwrap();
        let key = single_key("C", "ch-a");
        assert_eq!(sink.count(), 0);
        assert_eq!(manager.status(&StatusKey::new(key.clone(), "ch-a")).await, None);

        provider.fail_details(false);
        manager.tick(&key).await;
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_subject_notifies_once_and_self_cancels() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let record = WatchRecord {
            key: single_key("C", "ch-ghost"),
            owner_user_id: "owner-1".into(),
            channel_id: "C".into(),
            selector_text: Some("ghost".into()),
            created_at: Utc::now(),
        };
        manager.start(record.clone()).await.unwrap();

        assert_eq!(sink.count(), 1);
        assert!(sink.last().unwrap().1.content.contains("ghost"));
        assert!(!manager.has(&record.key).await);

        for _ in 0..3 {
            manager.tick(&record.key).await;
        }
        assert_eq!(sink.count(), 1);
        assert!(manager.persisted().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_during_tick_leaves_no_stale_memory() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        manager.toggle(&request("C", Some("a"))).await.unwrap();
        let key = single_key("C", "ch-a");
        let memory_key = StatusKey::new(key.clone(), "ch-a");
        assert_eq!(sink.count(), 1);

        provider.hold();
        let in_flight = tokio::spawn({
            let manager = Arc::clone(&manager);
            let key = key.clone();
            async move { manager.tick(&key).await }
        });
        provider.wait_for_fetch().await;

        let outcome = manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::Stopped(_)));
        provider.release();
        in_flight.await.unwrap();

        assert_eq!(manager.status(&memory_key).await, None);
        assert!(manager.persisted().await.is_empty());

        // The restarted watch starts cold and announces the live stream again.
        let before = sink.count();
        manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert_eq!(sink.count(), before + 1);
        assert!(sink.last().unwrap().1.content.contains("went live"));
        assert_eq!(manager.status(&memory_key).await, Some(Open));
    }

    #[tokio::test]
    async fn test_toggle_with_unknown_text_registers_nothing() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let outcome = manager.toggle(&request("C", Some("nobody"))).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::UnknownSelector("nobody".into()));
        assert!(outcome.acknowledgement().contains("nobody"));
        assert!(manager.active_keys().await.is_empty());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_guild_scope_and_acknowledgements() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Close)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let mut req = request("C", Some("Alpha"));
        req.guild_id = Some("G".into());
        let started = manager.toggle(&req).await.unwrap();
        assert_eq!(started.acknowledgement(), "✅ Started background status check for Alpha.");
        assert_eq!(manager.active_keys().await, vec![single_key("G", "ch-a")]);

        // Same guild, different channel: same watch.
        req.channel_id = "D".into();
        let stopped = manager.toggle(&req).await.unwrap();
        assert!(matches!(stopped, ToggleOutcome::Stopped(ref r) if r.channel_id == "C"));

        let all = manager.toggle(&request("C", None)).await.unwrap();
        assert!(all.acknowledgement().contains("all streamers"));
    }

    #[tokio::test]
    async fn test_start_rejects_active_key() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let record = manager.record_for(&request("C", Some("b"))).unwrap();
        manager.start(record.clone()).await.unwrap();
        assert!(matches!(
            manager.start(record).await,
            Err(Error::AlreadyWatching(_))
        ));
    }

    #[tokio::test]
    async fn test_state_is_written_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &path);

        manager.toggle(&request("C", Some("a"))).await.unwrap();

        let on_disk = JsonFileStore::open(&path).snapshot();
        let owner = on_disk.get("owner-1").expect("owner persisted");
        assert_eq!(owner.watches.len(), 1);
        assert_eq!(owner.watches[0].selector_text.as_deref(), Some("a"));
        assert_eq!(owner.status_memory["C:ch-a"]["ch-a"], Open);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_authoritative() {
        let dir = tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();

        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &blocked);

        let outcome = manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert!(matches!(outcome, ToggleOutcome::Started(_)));
        assert!(manager.has(&single_key("C", "ch-a")).await);
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_ticks_follow_period_and_stop() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Open), Some(Open), Some(Close)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        manager.toggle(&request("C", Some("a"))).await.unwrap();
        assert_eq!(provider.calls("ch-a"), 1);

        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(provider.calls("ch-a"), 2);
        assert_eq!(sink.count(), 1);

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(provider.calls("ch-a"), 3);
        assert_eq!(sink.count(), 2);

        manager.stop(&single_key("C", "ch-a")).await;
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert_eq!(provider.calls("ch-a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_toggles_leave_at_most_one_task() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-a", &[Some(Close)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        let mut toggles = tokio::task::JoinSet::new();
        for _ in 0..5 {
            let manager = Arc::clone(&manager);
            toggles.spawn(async move { manager.toggle(&request("C", Some("a"))).await });
        }
        while let Some(result) = toggles.join_next().await {
            result.unwrap().unwrap();
        }

        // Odd number of toggles: active, with one schedule.
        let key = single_key("C", "ch-a");
        assert!(manager.has(&key).await);
        let before = provider.calls("ch-a");
        tokio::time::sleep(Duration::from_secs(181)).await;
        assert_eq!(provider.calls("ch-a"), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_tasks_but_keeps_records() {
        let dir = tempdir().unwrap();
        let provider = ScriptedProvider::new();
        provider.script("ch-b", &[Some(Close)]);
        let sink = RecordingSink::new();
        let manager = manager(&provider, &sink, &dir.path().join("state.json"));

        manager.toggle(&request("C", Some("b"))).await.unwrap();
        manager.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(provider.calls("ch-b"), 1);
        assert_eq!(manager.persisted().await.len(), 1);
    }
}
