//! Wire types exchanged with the processing service.

use serde::{Deserialize, Serialize};

use crate::artifacts::Preview;

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Opaque job identifier issued by the service at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// JobState / JobStatus
// ---------------------------------------------------------------------------

/// Coarse job state reported by the service.
///
/// A job only moves forward: `Pending`/`Processing` → `Completed`/`Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Position in the forward-only ordering, used to reject regressions.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Processing => 1,
            JobState::Completed | JobState::Failed => 2,
        }
    }
}

/// Body of `GET /api/status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default)]
    pub filename: String,
    /// Free-form progress label owned by the service.
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Duration of the uploaded recording, in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Wall-clock seconds the pipeline took.
    #[serde(default)]
    pub total_time: Option<f64>,
    #[serde(default, alias = "cost_mad")]
    pub cost: Option<f64>,
}

impl JobStatus {
    /// Local placeholder installed right after job creation.
    pub fn starting(filename: impl Into<String>) -> Self {
        Self {
            status: JobState::Pending,
            filename: filename.into(),
            step: "Starting".into(),
            error: None,
            duration: None,
            total_time: None,
            cost: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

/// Job-creation parameters assembled by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRequest {
    pub filename: String,
    pub project_id: String,
    pub project_name: String,
    pub agent_name: String,
    pub skip_transcription: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileList {
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentResponse {
    pub content: Preview,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
