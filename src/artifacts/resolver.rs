//! Turns a completed job into an [`ArtifactSet`].
//!
//! Resolution lists the service outputs, keeps the job's files, and fetches
//! a preview for every previewable one.  A failed preview only costs that
//! artifact its preview; a failed listing fails the whole resolution.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiError, ServiceApi};

use super::{select_for_job, Artifact, ArtifactKind, ArtifactSet};

/// Result of a background resolution, tagged with the job generation that
/// requested it.
#[derive(Debug)]
pub struct ResolutionReport {
    pub generation: u64,
    pub result: Result<ArtifactSet, ApiError>,
}

pub struct ArtifactResolver {
    api: Arc<dyn ServiceApi>,
}

impl ArtifactResolver {
    pub fn new(api: Arc<dyn ServiceApi>) -> Self {
        Self { api }
    }

    /// Resolve the artifacts of the job that processed `job_filename`.
    ///
    /// # Errors
    ///
    /// Only the output listing can fail the call; preview failures are
    /// logged and skipped.
    pub async fn resolve(&self, job_filename: &str) -> Result<ArtifactSet, ApiError> {
        let files = self.api.list_outputs().await?;
        let selected = select_for_job(&files, job_filename);
        log::debug!(
            "resolver: {} of {} outputs belong to {job_filename}",
            selected.len(),
            files.len()
        );

        let mut artifacts = Vec::with_capacity(selected.len());
        for name in selected {
            let kind = ArtifactKind::from_filename(name);
            let preview = if kind.is_previewable() {
                match self.api.fetch_preview(name).await {
                    Ok(preview) => Some(preview),
                    Err(e) => {
                        log::warn!("resolver: preview of {name} unavailable: {e}");
                        None
                    }
                }
            } else {
                None
            };

            artifacts.push(Artifact {
                name: name.to_string(),
                kind,
                download_url: self.api.download_url(name),
                preview,
            });
        }

        Ok(ArtifactSet::new(artifacts))
    }

    /// Run [`resolve`](Self::resolve) on a tokio task and deliver the report
    /// on `events`.  Dropping the returned handle abandons the resolution.
    pub fn spawn<E>(
        self,
        job_filename: String,
        generation: u64,
        events: mpsc::Sender<E>,
    ) -> ResolutionHandle
    where
        E: From<ResolutionReport> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = self.resolve(&job_filename).await;
            let report = ResolutionReport { generation, result };
            if events.send(E::from(report)).await.is_err() {
                log::debug!("resolver: session gone, dropping artifacts of {job_filename}");
            }
        });
        ResolutionHandle { task }
    }
}

/// Owner of a background resolution task; aborts it on drop.
#[derive(Debug)]
pub struct ResolutionHandle {
    task: JoinHandle<()>,
}

impl ResolutionHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ResolutionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
