//! Fixed-cadence driver around [`DispatchEngine::tick`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::DispatchEngine;

/// Wakes on a fixed interval and runs one engine tick per wake.
///
/// Ticks never queue: if a previous tick is still running when the interval
/// fires, the new wake is dropped. A tick that outlives its interval
/// therefore costs skipped wakes, not a backlog.
pub struct SchedulerDriver {
    engine: Arc<DispatchEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl SchedulerDriver {
    pub fn new(engine: Arc<DispatchEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the tick loop. It runs until `shutdown` flips to true.
    pub fn start(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let period = self.interval;

        tokio::spawn(async move {
            info!(interval_secs = period.as_secs_f64(), "scheduler started");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if running
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_err()
                        {
                            debug!("tick still in flight, skipping this wake");
                            continue;
                        }
                        let engine = Arc::clone(&engine);
                        let running = Arc::clone(&running);
                        tokio::spawn(async move {
                            if let Err(e) = engine.tick().await {
                                warn!(error = %e, "scheduler tick failed");
                            }
                            running.store(false, Ordering::SeqCst);
                        });
                    }
                    changed = shutdown.changed() => {
                        // A dropped sender counts as shutdown.
                        if changed.is_err() || *shutdown.borrow() {
                            info!("scheduler stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
