//! Core `ServiceApi` trait and the `ApiError` type.
//!
//! The session never talks HTTP directly; it goes through this trait so the
//! transport can be swapped for a scripted double in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::api::types::{JobStatus, ProcessRequest, TaskId};
use crate::artifacts::Preview;
use crate::asset::AssetRef;

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the processing service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-2xx status code.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The response body did not have the expected shape.
    #[error("failed to parse response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },

    /// The configured base URL cannot carry API paths.
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceApi trait
// ---------------------------------------------------------------------------

/// The remote processing service, one method per endpoint.
///
/// Implementors must be `Send + Sync` so they can be shared with the poller
/// and resolver tasks behind an `Arc<dyn ServiceApi>`.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// `GET /health`.
    async fn health(&self) -> Result<(), ApiError>;

    /// `POST /api/upload`; returns the filename the service stored it under.
    async fn upload(&self, asset: &AssetRef) -> Result<String, ApiError>;

    /// `POST /api/process`; returns the id of the new job.
    async fn create_job(&self, request: &ProcessRequest) -> Result<TaskId, ApiError>;

    /// `GET /api/status/{task_id}`.
    async fn job_status(&self, task_id: &TaskId) -> Result<JobStatus, ApiError>;

    /// `GET /api/outputs`, in the order the service lists them.
    async fn list_outputs(&self) -> Result<Vec<String>, ApiError>;

    /// `GET /api/files`: assets already uploaded.
    async fn list_uploads(&self) -> Result<Vec<String>, ApiError>;

    /// `GET /api/content/{filename}`.
    async fn fetch_preview(&self, filename: &str) -> Result<Preview, ApiError>;

    /// Link target for `GET /api/download/{filename}`. Never fetched here.
    fn download_url(&self, filename: &str) -> String;
}

// Compile-time assertion: Box<dyn ServiceApi> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ServiceApi>) {}
};
