//! Heartbeat thread for running executions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::warn;

use emdx_storage::SqliteStore;

/// Granularity of the stop-flag poll inside the sleep loop.
const STOP_POLL: Duration = Duration::from_millis(200);

/// Handle for stopping a heartbeat thread.
pub struct HeartbeatHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    /// Signals the thread to stop and waits for it.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns a thread that refreshes `last_heartbeat` every `interval` until
/// stopped.
///
/// Heartbeat writes are throttled to the interval -- never more often -- so
/// a busy child cannot turn liveness into write pressure. A write failure
/// is logged and retried next tick; it never takes the execution down.
pub fn spawn_heartbeat(
    store: Arc<SqliteStore>,
    execution_id: String,
    interval: Duration,
) -> HeartbeatHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let join = std::thread::Builder::new()
        .name(format!("emdx-heartbeat-{execution_id}"))
        .spawn(move || {
            let mut elapsed = Duration::ZERO;
            loop {
                std::thread::sleep(STOP_POLL);
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                elapsed += STOP_POLL;
                if elapsed < interval {
                    continue;
                }
                elapsed = Duration::ZERO;
                if let Err(e) = store.update_execution_heartbeat(&execution_id) {
                    warn!(execution = %execution_id, error = %e, "heartbeat write failed");
                }
            }
        })
        .expect("heartbeat thread spawn");

    HeartbeatHandle {
        stop,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_core::execution::Execution;

    #[test]
    fn heartbeat_updates_row() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let exec = Execution::pending("hb-test", "task", "/tmp/hb.log");
        store.insert_execution(&exec).unwrap();
        store.mark_execution_running("hb-test", 1).unwrap();
        let before = store.get_execution("hb-test").unwrap().last_heartbeat;

        let handle = spawn_heartbeat(
            Arc::clone(&store),
            "hb-test".into(),
            Duration::from_millis(200),
        );
        std::thread::sleep(Duration::from_millis(700));
        handle.stop();

        let after = store.get_execution("hb-test").unwrap().last_heartbeat;
        assert!(after >= before);
        assert!(after.is_some());
    }

    #[test]
    fn stop_terminates_thread_promptly() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let handle = spawn_heartbeat(store, "missing".into(), Duration::from_secs(3600));
        // Must return well before the interval elapses.
        handle.stop();
    }
}
