use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::select;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Cancel handle for a repeating task.
///
/// Cancelling stops future ticks only; a tick already running completes.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawns `tick` every `period`, first run one period from now.
///
/// Ticks keep a fixed cadence measured from spawn time, so a slow tick does
/// not push later ones back. A tick that overruns its period delays the next
/// one rather than triggering a burst.
///
/// `parent` cancels every task spawned under it (process shutdown).
pub fn spawn_repeating<F, Fut>(
    name: String,
    period: Duration,
    parent: &CancellationToken,
    mut tick: F,
) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = parent.child_token();
    let handle = TaskHandle {
        token: token.clone(),
    };

    let first = Instant::now() + period;
    tokio::spawn(async move {
        let mut ticks = interval_at(first, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Interruptible wait
            select! {
                _ = ticks.tick() => {},
                () = token.cancelled() => break,
            }

            if token.is_cancelled() {
                break;
            }
            tick().await;
        }
        debug!("Repeating task {name} stopped");
    });

    handle
}
