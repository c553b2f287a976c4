//! Periodic status polling for the active job.
//!
//! # Design
//!
//! [`StatusPoller::start`] spawns a tokio task that waits one interval, asks
//! the service for the job status, translates the step label, and sends a
//! [`PollReport`] to the session.  Only one status request is ever in flight
//! per poller: a slow response delays the next tick instead of overlapping
//! it.
//!
//! Every report carries a [`PollTicket`] (job generation + sequence number)
//! so the session can drop responses that belong to an older job or arrive
//! after a newer one.
//!
//! The task ends by itself after delivering a terminal status.  Dropping the
//! [`PollerHandle`] aborts it, including any request still in flight, so no
//! timer outlives the stage that started it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ApiError, JobStatus, ServiceApi, TaskId};
use crate::asset::AssetKind;
use crate::steps::StepProgress;

// ---------------------------------------------------------------------------
// PollTicket / PollReport
// ---------------------------------------------------------------------------

/// Identifies one status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    /// Job generation the request was issued for.
    pub generation: u64,
    /// Monotonic per job, starting at 1.
    pub seq: u64,
}

/// A status observation together with its display translation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub progress: StepProgress,
}

/// Outcome of one poll tick.
#[derive(Debug)]
pub struct PollReport {
    pub ticket: PollTicket,
    pub outcome: Result<StatusUpdate, ApiError>,
}

impl PollReport {
    fn is_terminal(&self) -> bool {
        self.outcome
            .as_ref()
            .is_ok_and(|update| update.status.status.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

pub struct StatusPoller {
    api: Arc<dyn ServiceApi>,
    task_id: TaskId,
    asset_kind: AssetKind,
    generation: u64,
    interval: Duration,
    first_seq: u64,
}

impl StatusPoller {
    pub fn new(
        api: Arc<dyn ServiceApi>,
        task_id: TaskId,
        asset_kind: AssetKind,
        generation: u64,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            task_id,
            asset_kind,
            generation,
            interval,
            first_seq: 1,
        }
    }

    /// Continue numbering after `last_seq`, for a poller restarted on the
    /// same job.
    pub fn continuing_after(mut self, last_seq: u64) -> Self {
        self.first_seq = last_seq + 1;
        self
    }

    /// Issue a single status request and translate the result.
    pub async fn poll_once(&self) -> Result<StatusUpdate, ApiError> {
        let status = self.api.job_status(&self.task_id).await?;
        let progress = StepProgress::for_status(self.asset_kind, &status);
        Ok(StatusUpdate { status, progress })
    }

    /// Spawn the polling loop; reports go to `events`.
    pub fn start<E>(self, events: mpsc::Sender<E>) -> PollerHandle
    where
        E: From<PollReport> + Send + 'static,
    {
        let generation = self.generation;
        let task = tokio::spawn(self.run(events));
        PollerHandle { task, generation }
    }

    async fn run<E>(self, events: mpsc::Sender<E>)
    where
        E: From<PollReport> + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the first request goes out
        // one interval after entering Processing.
        ticker.tick().await;

        log::debug!(
            "poller: started for task {} (generation {}, every {:?})",
            self.task_id,
            self.generation,
            self.interval
        );

        let mut seq = self.first_seq;
        loop {
            ticker.tick().await;

            let report = PollReport {
                ticket: PollTicket {
                    generation: self.generation,
                    seq,
                },
                outcome: self.poll_once().await,
            };
            seq += 1;

            let terminal = report.is_terminal();
            if events.send(E::from(report)).await.is_err() {
                log::debug!("poller: session gone, stopping task {}", self.task_id);
                break;
            }
            if terminal {
                log::debug!("poller: task {} reached a terminal state", self.task_id);
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PollerHandle
// ---------------------------------------------------------------------------

/// Owner of a running poll loop.  Dropping it cancels the loop.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
    generation: u64,
}

impl PollerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` once the loop exited (terminal status, or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
