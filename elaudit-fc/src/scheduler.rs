//! Sync scheduler
//!
//! One scheduler owns all periodic work as named tasks with independently
//! configurable intervals. The timers only dispatch [`SyncEngine::tick`],
//! so tests drive ticks directly instead of waiting on wall-clock timers.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use elaudit_common::config::SyncIntervals;

use crate::engine::SyncEngine;

/// Named periodic tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTask {
    /// Incremental update pull from the Hub
    Pull,
    /// Liveness beacon
    Heartbeat,
    /// Active-technician list refresh
    Presence,
    /// Durable snapshot write
    Persist,
}

/// Handle to a running scheduler; dropped timers die with the process,
/// `stop` shuts them down cleanly
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for the timer task to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Start the periodic timers for an engine
///
/// Each interval fires once immediately, giving the session an initial pull,
/// heartbeat and presence refresh right after startup.
pub fn start(engine: Arc<SyncEngine>, intervals: SyncIntervals) -> SchedulerHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut pull = tokio::time::interval(intervals.pull());
        let mut heartbeat = tokio::time::interval(intervals.heartbeat());
        let mut presence = tokio::time::interval(intervals.presence());
        let mut persist = tokio::time::interval(intervals.persist());
        for timer in [&mut pull, &mut heartbeat, &mut presence, &mut persist] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        tracing::info!(
            pull_secs = intervals.pull_secs,
            heartbeat_secs = intervals.heartbeat_secs,
            presence_secs = intervals.presence_secs,
            persist_secs = intervals.persist_secs,
            "Sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = pull.tick() => engine.tick(SyncTask::Pull).await,
                _ = heartbeat.tick() => engine.tick(SyncTask::Heartbeat).await,
                _ = presence.tick() => engine.tick(SyncTask::Presence).await,
                _ = persist.tick() => engine.tick(SyncTask::Persist).await,
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::debug!("Sync scheduler stopped");
    });

    SchedulerHandle { shutdown, task }
}
