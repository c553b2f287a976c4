//! Session stages and the single owned session state.
//!
//! [`SessionState`] is only ever changed through its named transition
//! methods, which enforce the stage invariants:
//!
//! ```text
//! Intake ──submit ok──▶ Processing ──completed + artifacts──▶ Result
//!   ▲                      │  failed: stays, error retained        │
//!   └──────────── reset (new asset / reset context) ◀──────────────┘
//! ```
//!
//! * `Processing` always has an active job.
//! * `Result` always has an active job whose last status is `completed`,
//!   plus its [`ArtifactSet`].
//! * Metadata and asset can only change in `Intake`.
//!
//! Every job gets a fresh generation number; poll reports and resolutions
//! tagged with another generation are stale and ignored.

use thiserror::Error;

use crate::api::{ApiError, JobState, JobStatus, ProcessRequest, TaskId};
use crate::artifacts::ArtifactSet;
use crate::asset::{AssetKind, AssetRef};
use crate::poller::{PollTicket, StatusUpdate};
use crate::steps::StepProgress;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    /// Collecting metadata and the asset.
    #[default]
    Intake,
    /// A job is running remotely and being polled.
    Processing,
    /// The job completed and its artifacts are available.
    Result,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Intake => "Intake",
            Stage::Processing => "Processing",
            Stage::Result => "Result",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a reset keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Clear asset and job; keep the metadata for the next asset.
    NewAsset,
    /// Clear everything, metadata included.
    ResetContext,
}

// ---------------------------------------------------------------------------
// SessionMetadata
// ---------------------------------------------------------------------------

/// User-supplied project context, required before a job can start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    pub project_id: String,
    pub project_name: String,
    pub agent_name: String,
}

impl SessionMetadata {
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            agent_name: agent_name.into(),
        }
    }

    /// Names of the fields that are empty or whitespace.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("project_id", &self.project_id),
            ("project_name", &self.project_name),
            ("agent_name", &self.agent_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Submit rejected locally, before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no asset selected")]
    MissingAsset,

    #[error("missing project details: {}", .0.join(", "))]
    MissingMetadata(Vec<&'static str>),

    #[error("unsupported asset {0}: expected .mp3, .wav, .m4a or .docx")]
    UnsupportedAsset(String),
}

/// An operation that is not defined for the current stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} in the {stage} stage")]
pub struct TransitionError {
    pub action: &'static str,
    pub stage: Stage,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// A validated submit: everything needed to upload and create the job.
#[derive(Debug)]
pub struct Submission<'a> {
    pub asset: &'a AssetRef,
    pub kind: AssetKind,
    pub metadata: &'a SessionMetadata,
}

impl Submission<'_> {
    /// Job-creation request for the file name the upload returned.
    pub fn process_request(&self, uploaded_filename: &str) -> ProcessRequest {
        ProcessRequest {
            filename: uploaded_filename.to_string(),
            project_id: self.metadata.project_id.clone(),
            project_name: self.metadata.project_name.clone(),
            agent_name: self.metadata.agent_name.clone(),
            skip_transcription: self.kind.skips_transcription(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActiveJob
// ---------------------------------------------------------------------------

/// The one remote job of the session.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    task_id: TaskId,
    generation: u64,
    asset_kind: AssetKind,
    status: JobStatus,
    progress: StepProgress,
    last_seq: u64,
    failure: Option<String>,
    resolving: bool,
    awaiting_retry: bool,
}

impl ActiveJob {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn asset_kind(&self) -> AssetKind {
        self.asset_kind
    }

    /// Last status applied.
    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn progress(&self) -> &StepProgress {
        &self.progress
    }

    /// Sequence number of the newest poll report applied.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Error message once the service reported `failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// `true` between observing `completed` and entering `Result`.
    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    /// `true` after a failed resolution, until `completed` is seen again.
    pub fn is_awaiting_retry(&self) -> bool {
        self.awaiting_retry
    }

    fn accepts_polls(&self) -> bool {
        self.failure.is_none()
            && !self.resolving
            && (self.awaiting_retry || !self.status.status.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// PollOutcome
// ---------------------------------------------------------------------------

/// What applying a poll report did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Report belongs to another job, arrived out of order, or came after
    /// the job stopped accepting updates.
    Stale,
    /// Request failed; prior status kept.
    Tolerated(ApiError),
    /// Status regressed (e.g. `processing` after `completed`); ignored.
    Regressed,
    Updated,
    /// First `completed` observation: artifacts must be resolved now.
    Completed { filename: String },
    /// The service reported `failed`.
    Failed { message: String },
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// Immutable snapshot of the session for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub stage: Stage,
    pub metadata: SessionMetadata,
    pub asset_name: Option<String>,
    pub asset_kind: Option<AssetKind>,
    pub task_id: Option<TaskId>,
    pub status: Option<JobStatus>,
    pub progress: StepProgress,
    pub failure: Option<String>,
    pub artifacts: Option<ArtifactSet>,
    pub notice: Option<String>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SessionState {
    stage: Stage,
    metadata: SessionMetadata,
    asset: Option<AssetRef>,
    job: Option<ActiveJob>,
    artifacts: Option<ArtifactSet>,
    notice: Option<String>,
    generations: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn asset(&self) -> Option<&AssetRef> {
        self.asset.as_ref()
    }

    pub fn job(&self) -> Option<&ActiveJob> {
        self.job.as_ref()
    }

    pub fn artifacts(&self) -> Option<&ArtifactSet> {
        self.artifacts.as_ref()
    }

    /// Last user-facing failure notice (submit or resolution failure).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// `true` when `generation` is the active job's.
    pub fn is_current(&self, generation: u64) -> bool {
        self.job.as_ref().is_some_and(|j| j.generation == generation)
    }

    pub fn view(&self) -> SessionView {
        let job = self.job.as_ref();
        SessionView {
            stage: self.stage,
            metadata: self.metadata.clone(),
            asset_name: self.asset.as_ref().map(|a| a.name().to_string()),
            asset_kind: self.asset.as_ref().and_then(AssetRef::kind),
            task_id: job.map(|j| j.task_id.clone()),
            status: job.map(|j| j.status.clone()),
            progress: job
                .map(|j| j.progress.clone())
                .unwrap_or_else(StepProgress::initializing),
            failure: job.and_then(|j| j.failure.clone()),
            artifacts: self.artifacts.clone(),
            notice: self.notice.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    pub fn set_metadata(&mut self, metadata: SessionMetadata) -> Result<(), TransitionError> {
        self.require(Stage::Intake, "edit project details")?;
        self.metadata = metadata;
        Ok(())
    }

    pub fn select_asset(&mut self, asset: AssetRef) -> Result<(), TransitionError> {
        self.require(Stage::Intake, "select an asset")?;
        self.asset = Some(asset);
        Ok(())
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// Validate a submit without touching the state.
    pub fn prepare_submission(&self) -> Result<Submission<'_>, ValidationError> {
        let missing = self.metadata.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingMetadata(missing));
        }

        let asset = self.asset.as_ref().ok_or(ValidationError::MissingAsset)?;
        let kind = asset
            .kind()
            .ok_or_else(|| ValidationError::UnsupportedAsset(asset.name().to_string()))?;

        Ok(Submission {
            asset,
            kind,
            metadata: &self.metadata,
        })
    }

    /// `Intake → Processing` once the job exists remotely.
    ///
    /// Returns the generation assigned to the job.
    pub fn begin_processing(
        &mut self,
        task_id: TaskId,
        uploaded_filename: &str,
        kind: AssetKind,
    ) -> Result<u64, TransitionError> {
        self.require(Stage::Intake, "start processing")?;

        self.generations += 1;
        let status = JobStatus::starting(uploaded_filename);
        self.job = Some(ActiveJob {
            task_id,
            generation: self.generations,
            asset_kind: kind,
            progress: StepProgress::for_status(kind, &status),
            status,
            last_seq: 0,
            failure: None,
            resolving: false,
            awaiting_retry: false,
        });
        self.artifacts = None;
        self.notice = None;
        self.stage = Stage::Processing;
        Ok(self.generations)
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// Apply one poll report.
    pub fn apply_poll(
        &mut self,
        ticket: PollTicket,
        outcome: Result<StatusUpdate, ApiError>,
    ) -> PollOutcome {
        if self.stage != Stage::Processing {
            return PollOutcome::Stale;
        }
        let Some(job) = self.job.as_mut() else {
            return PollOutcome::Stale;
        };
        if job.generation != ticket.generation || ticket.seq <= job.last_seq || !job.accepts_polls()
        {
            return PollOutcome::Stale;
        }
        job.last_seq = ticket.seq;

        let mut update = match outcome {
            Ok(update) => update,
            Err(e) => return PollOutcome::Tolerated(e),
        };
        let regressed = update.status.status.rank() < job.status.status.rank()
            || (job.awaiting_retry && update.status.status != JobState::Completed);
        if regressed {
            return PollOutcome::Regressed;
        }

        if update.status.filename.is_empty() {
            update.status.filename = job.status.filename.clone();
        }
        job.status = update.status;
        job.progress = update.progress;

        match job.status.status {
            JobState::Completed => {
                job.awaiting_retry = false;
                job.resolving = true;
                PollOutcome::Completed {
                    filename: job.status.filename.clone(),
                }
            }
            JobState::Failed => {
                let message = job
                    .status
                    .error
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "processing failed".to_string());
                job.failure = Some(message.clone());
                PollOutcome::Failed { message }
            }
            JobState::Pending | JobState::Processing => PollOutcome::Updated,
        }
    }

    /// Resolution of `generation` failed; accept polls again so the next
    /// `completed` observation retries it.  The observed status is kept.
    ///
    /// Returns `false` if `generation` is no longer current.
    pub fn resolution_failed(&mut self, generation: u64, notice: impl Into<String>) -> bool {
        if self.stage != Stage::Processing || !self.is_current(generation) {
            return false;
        }
        if let Some(job) = self.job.as_mut() {
            job.resolving = false;
            job.awaiting_retry = true;
        }
        self.notice = Some(notice.into());
        true
    }

    /// `Processing → Result` with the resolved artifacts of `generation`.
    pub fn enter_result(
        &mut self,
        generation: u64,
        artifacts: ArtifactSet,
    ) -> Result<(), TransitionError> {
        self.require(Stage::Processing, "show results")?;
        let ready = self.job.as_ref().is_some_and(|j| {
            j.generation == generation && j.resolving && j.status.status == JobState::Completed
        });
        if !ready {
            return Err(TransitionError {
                action: "show results for a job that has not completed",
                stage: self.stage,
            });
        }

        if let Some(job) = self.job.as_mut() {
            job.resolving = false;
        }
        self.artifacts = Some(artifacts);
        self.notice = None;
        self.stage = Stage::Result;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Back to `Intake`, discarding job-scoped state.
    pub fn reset(&mut self, mode: ResetMode) {
        self.stage = Stage::Intake;
        self.asset = None;
        self.job = None;
        self.artifacts = None;
        self.notice = None;
        if mode == ResetMode::ResetContext {
            self.metadata = SessionMetadata::default();
        }
    }

    fn require(&self, stage: Stage, action: &'static str) -> Result<(), TransitionError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(TransitionError {
                action,
                stage: self.stage,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
