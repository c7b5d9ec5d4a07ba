use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use super::TimerHandle;
use crate::timer::TimerStatus;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The periodic driver: sends one `Tick` per second while the timer runs.
///
/// The interval restarts whenever a session (re)enters `Running`, so a
/// resumed countdown gets a full second before its next tick. Missed ticks
/// are delivered in a burst, which keeps the countdown close to wall time
/// when the process was briefly starved. Exits once the service is gone.
pub fn spawn_ticker(handle: TimerHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut snapshots = handle.watch();
        loop {
            let session_id = match snapshots
                .wait_for(|s| s.state.status == TimerStatus::Running)
                .await
            {
                Ok(snapshot) => snapshot.state.current_session_id,
                Err(_) => break,
            };

            let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if handle.tick().is_err() {
                            debug!("ticker stopping, service closed");
                            return;
                        }
                    }
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let snapshot = snapshots.borrow_and_update();
                        if snapshot.state.status != TimerStatus::Running
                            || snapshot.state.current_session_id != session_id
                        {
                            break;
                        }
                    }
                }
            }
        }
        debug!("ticker stopped");
    })
}
