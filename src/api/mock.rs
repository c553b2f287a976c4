//! Scripted in-memory [`ServiceApi`] for unit tests.
//!
//! Status responses are served from a queue; once the queue runs dry the
//! last successful status is repeated, the way the real service keeps
//! reporting a finished job.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::client::{ApiError, ServiceApi};
use crate::api::types::{JobState, JobStatus, ProcessRequest, TaskId};
use crate::artifacts::Preview;
use crate::asset::AssetRef;

pub fn http_error(status: u16) -> ApiError {
    ApiError::Status {
        endpoint: "mock".into(),
        status,
    }
}

/// Shorthand for a status body.
pub fn status(state: JobState, filename: &str, step: &str) -> JobStatus {
    JobStatus {
        status: state,
        filename: filename.into(),
        step: step.into(),
        error: None,
        duration: None,
        total_time: None,
        cost: None,
    }
}

#[derive(Default)]
pub struct MockServiceApi {
    upload_error: Option<ApiError>,
    create_error: Option<ApiError>,
    outputs_error: Option<ApiError>,
    statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    last_status: Mutex<Option<JobStatus>>,
    outputs: Vec<String>,
    previews: HashMap<String, Result<Preview, ApiError>>,
    process_requests: Mutex<Vec<ProcessRequest>>,
    upload_calls: AtomicUsize,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    outputs_calls: AtomicUsize,
    preview_calls: Mutex<Vec<String>>,
}

impl MockServiceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<JobStatus, ApiError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_outputs(mut self, files: &[&str]) -> Self {
        self.outputs = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_preview(mut self, filename: &str, preview: Preview) -> Self {
        self.previews.insert(filename.into(), Ok(preview));
        self
    }

    pub fn with_preview_error(mut self, filename: &str, error: ApiError) -> Self {
        self.previews.insert(filename.into(), Err(error));
        self
    }

    pub fn failing_upload(mut self, error: ApiError) -> Self {
        self.upload_error = Some(error);
        self
    }

    pub fn failing_create(mut self, error: ApiError) -> Self {
        self.create_error = Some(error);
        self
    }

    pub fn failing_outputs(mut self, error: ApiError) -> Self {
        self.outputs_error = Some(error);
        self
    }

    /// Total number of HTTP-equivalent calls made so far.
    pub fn network_calls(&self) -> usize {
        self.upload_calls() + self.create_calls() + self.status_calls() + self.outputs_calls()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn outputs_calls(&self) -> usize {
        self.outputs_calls.load(Ordering::SeqCst)
    }

    pub fn preview_calls(&self) -> Vec<String> {
        self.preview_calls.lock().unwrap().clone()
    }

    pub fn process_requests(&self) -> Vec<ProcessRequest> {
        self.process_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceApi for MockServiceApi {
    async fn health(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn upload(&self, asset: &AssetRef) -> Result<String, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        match &self.upload_error {
            Some(e) => Err(e.clone()),
            None => Ok(asset.name().to_string()),
        }
    }

    async fn create_job(&self, request: &ProcessRequest) -> Result<TaskId, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.process_requests.lock().unwrap().push(request.clone());
        match &self.create_error {
            Some(e) => Err(e.clone()),
            None => Ok(TaskId::new("task-1")),
        }
    }

    async fn job_status(&self, _task_id: &TaskId) -> Result<JobStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(Ok(status)) => {
                *self.last_status.lock().unwrap() = Some(status.clone());
                Ok(status)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last_status
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| http_error(404)),
        }
    }

    async fn list_outputs(&self) -> Result<Vec<String>, ApiError> {
        self.outputs_calls.fetch_add(1, Ordering::SeqCst);
        match &self.outputs_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.outputs.clone()),
        }
    }

    async fn list_uploads(&self) -> Result<Vec<String>, ApiError> {
        Ok(Vec::new())
    }

    async fn fetch_preview(&self, filename: &str) -> Result<Preview, ApiError> {
        self.preview_calls.lock().unwrap().push(filename.to_string());
        self.previews
            .get(filename)
            .cloned()
            .unwrap_or_else(|| Err(http_error(404)))
    }

    fn download_url(&self, filename: &str) -> String {
        format!("http://mock/api/download/{filename}")
    }
}
