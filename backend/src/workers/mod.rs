//! Recurring drivers of the automatic transitions.
//!
//! Each driver is one task looping on a `tokio::time::interval` until the
//! shared cancellation token fires. Missed ticks are skipped, never replayed.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::services::{ActivityTracker, EndOfDaySweeper, GeofenceMonitor, OvertimeWorkflow};

#[derive(Debug, Clone, Copy)]
pub struct WorkerIntervals {
    pub geofence: Duration,
    pub overtime: Duration,
    pub break_alerts: Duration,
    pub end_of_day: Duration,
}

impl Default for WorkerIntervals {
    fn default() -> Self {
        Self {
            geofence: Duration::from_secs(60),
            overtime: Duration::from_secs(120),
            break_alerts: Duration::from_secs(60),
            end_of_day: Duration::from_secs(300),
        }
    }
}

#[derive(Clone)]
pub struct WorkerServices {
    pub geofence: GeofenceMonitor,
    pub overtime: OvertimeWorkflow,
    pub activity: ActivityTracker,
    pub end_of_day: EndOfDaySweeper,
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Handles of the running drivers.
pub struct BackgroundWorkers {
    workers: Vec<Worker>,
    shutdown: CancellationToken,
}

impl BackgroundWorkers {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Cancels every driver and waits for the current ticks to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for worker in self.workers {
            if let Err(err) = worker.handle.await {
                tracing::error!(worker = worker.name, error = %err, "Worker ended abnormally");
            }
        }
        tracing::info!("Background workers stopped");
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut tick: F,
) -> Worker
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(worker = name, period_secs = period.as_secs(), "Worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => tick().await,
            }
        }
        tracing::debug!(worker = name, "Worker stopped");
    });
    Worker { name, handle }
}

pub fn spawn_background_workers(
    services: WorkerServices,
    intervals: WorkerIntervals,
    shutdown: CancellationToken,
) -> BackgroundWorkers {
    let mut workers = Vec::with_capacity(4);

    let geofence = services.geofence;
    workers.push(spawn_loop(
        "geofence",
        intervals.geofence,
        shutdown.clone(),
        move || {
            let geofence = geofence.clone();
            async move {
                geofence.run_once().await;
            }
        },
    ));

    let overtime = services.overtime;
    workers.push(spawn_loop(
        "overtime",
        intervals.overtime,
        shutdown.clone(),
        move || {
            let overtime = overtime.clone();
            async move {
                overtime.run_prompts().await;
                overtime.run_timeouts().await;
            }
        },
    ));

    let activity = services.activity;
    workers.push(spawn_loop(
        "break_alerts",
        intervals.break_alerts,
        shutdown.clone(),
        move || {
            let activity = activity.clone();
            async move {
                activity.run_break_alerts().await;
            }
        },
    ));

    let end_of_day = services.end_of_day;
    workers.push(spawn_loop(
        "end_of_day",
        intervals.end_of_day,
        shutdown.clone(),
        move || {
            let end_of_day = end_of_day.clone();
            async move {
                if let Err(err) = end_of_day.run_once().await {
                    tracing::error!(error = %err, "End-of-day sweep failed");
                }
            }
        },
    ));

    BackgroundWorkers { workers, shutdown }
}
