//! Periodic cycle task

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use crate::controller::Shared;
use crate::error::{DriverError, Result};
use crate::pipeline::Pipeline;

/// Cycles between two mirrors of the source counters (about once a second)
const SOURCE_STATS_EVERY: u64 = 1280;

/// A running cycle; hands the pipeline back when stopped
pub(crate) struct CycleHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Pipeline>,
}

/// Start calling the pipeline every `period`
pub(crate) fn spawn_cycle(period: Duration, shared: Arc<Shared>, mut pipeline: Pipeline) -> CycleHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(period_ns = period.as_nanos() as u64, "cycle started");

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => run_once(&shared, &mut pipeline),
            }
        }

        debug!("cycle stopped");
        pipeline
    });

    CycleHandle { stop_tx, task }
}

/// One invocation; returns at once if a reset holds the sensor
fn run_once(shared: &Shared, pipeline: &mut Pipeline) {
    let Ok(mut guard) = shared.sensor.try_lock() else {
        shared.metrics.record_skipped_cycle();
        return;
    };
    let Some(sensor) = guard.as_mut() else {
        shared.metrics.record_skipped_cycle();
        return;
    };

    let started = Instant::now();
    pipeline.process_data(sensor.as_mut(), shared.metadata.load_full());
    let cycles = shared.metrics.record_cycle();
    observability::record_cycle_duration_us(started.elapsed().as_secs_f64() * 1e6);

    if cycles % SOURCE_STATS_EVERY == 0 {
        observability::record_source_stats(sensor.name(), &sensor.stats());
    }
}

impl CycleHandle {
    /// Stop the schedule and wait until no invocation is in flight
    #[instrument(name = "cycle_stop", skip(self))]
    pub(crate) async fn stop(self) -> Result<Pipeline> {
        // Err only if the task already ended, which join reports below
        let _ = self.stop_tx.send(true);
        self.task
            .await
            .map_err(|e| DriverError::Cycle(e.to_string()))
    }
}
