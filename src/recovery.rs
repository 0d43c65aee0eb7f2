//! Startup rebuild of the watch set from the persisted document.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::Error;
use crate::manager::WatchManager;
use crate::sink::ChannelResolver;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub restored: usize,
    /// Watches whose destination channel is gone or forbidden.
    pub dropped: usize,
}

/// Restores every persisted watch whose channel still resolves.
///
/// Each restored watch behaves as a cold start: seeded memory, an immediate
/// tick, then the regular schedule. Only a definite
/// [`Error::ChannelUnavailable`] drops a watch; other lookup failures restore
/// it. Dropped watches are pruned from the store once the owner's watches
/// have been processed.
pub async fn recover(manager: &Arc<WatchManager>, resolver: &dyn ChannelResolver) -> RecoveryReport {
    let snapshot = manager.persisted().await;
    let mut report = RecoveryReport::default();

    for (owner_user_id, owner) in snapshot {
        let mut dropped_any = false;

        for watch in owner.watches {
            let key = watch.key();
            match resolver.resolve(&watch.channel_id).await {
                Ok(()) => {}
                Err(e @ Error::ChannelUnavailable(_)) => {
                    warn!("Dropping watch {key}: {e}");
                    report.dropped += 1;
                    dropped_any = true;
                    continue;
                }
                // The channel may well still exist; keep the watch rather than
                // erase it over an outage.
                Err(e) => warn!("Could not verify channel for watch {key}, restoring anyway: {e}"),
            }

            let statuses = owner
                .status_memory
                .get(&key.to_string())
                .cloned()
                .unwrap_or_default();

            match manager
                .restore(watch.into_record(&owner_user_id), statuses)
                .await
            {
                Ok(()) => report.restored += 1,
                Err(Error::AlreadyWatching(key)) => debug!("Watch {key} already active"),
                Err(e) => warn!("Could not restore watch {key}: {e}"),
            }
        }

        if dropped_any {
            manager.persist_owner(&owner_user_id).await;
        }
    }

    info!(
        "Recovered {} watches ({} dropped)",
        report.restored, report.dropped
    );
    report
}
