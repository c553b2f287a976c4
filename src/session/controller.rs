//! Session controller: drives one [`SessionState`] against the service.
//!
//! [`SessionController`] owns the state, the active [`PollerHandle`] and the
//! active [`ResolutionHandle`].  Background tasks never touch the state;
//! they send [`SessionEvent`]s back over a `tokio::sync::mpsc` channel and
//! the controller applies them in arrival order.
//!
//! # Flow
//!
//! ```text
//! submit()
//!   └─▶ validate ─▶ upload ─▶ create job          [Intake → Processing]
//!         └─▶ StatusPoller (every interval)
//!               ├─ pending / processing ─▶ update progress
//!               ├─ request error        ─▶ keep last status, keep polling
//!               ├─ failed               ─▶ stop polling, keep the error
//!               └─ completed            ─▶ stop polling, ArtifactResolver
//!                     ├─ Ok  ─▶ artifacts                     [→ Result]
//!                     └─ Err ─▶ notice + resume polling (retry)
//! ```
//!
//! After every change the controller publishes a [`SessionView`] on a
//! `tokio::sync::watch` channel; renderers call [`subscribe`] and read it.
//!
//! [`subscribe`]: SessionController::subscribe

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::api::{ApiError, ServiceApi, TaskId};
use crate::artifacts::{ArtifactResolver, ArtifactSet, ResolutionHandle, ResolutionReport};
use crate::asset::{AssetKind, AssetRef};
use crate::config::PollingConfig;
use crate::poller::{PollReport, PollerHandle, StatusPoller};

use super::state::{
    ActiveJob, PollOutcome, ResetMode, SessionMetadata, SessionState, SessionView, Stage,
    TransitionError, ValidationError,
};

const EVENT_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// A submit request failed; the session stayed in `Intake`.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        source: ApiError,
    },

    /// The service reported the job as failed.
    #[error("processing failed: {0}")]
    JobFailure(String),

    #[error("session event channel closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Messages from the background tasks to the controller.
#[derive(Debug)]
pub enum SessionEvent {
    Poll(PollReport),
    Resolved(ResolutionReport),
}

impl From<PollReport> for SessionEvent {
    fn from(report: PollReport) -> Self {
        SessionEvent::Poll(report)
    }
}

impl From<ResolutionReport> for SessionEvent {
    fn from(report: ResolutionReport) -> Self {
        SessionEvent::Resolved(report)
    }
}

/// User actions accepted by [`SessionController::run`].
#[derive(Debug)]
pub enum SessionCommand {
    SetMetadata(SessionMetadata),
    SelectAsset(AssetRef),
    Submit,
    Reset(ResetMode),
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Drives one session from intake to results.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use falcon_client::api::HttpServiceClient;
/// use falcon_client::asset::AssetRef;
/// use falcon_client::config::AppConfig;
/// use falcon_client::session::{SessionController, SessionMetadata};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = AppConfig::default();
/// let api = Arc::new(HttpServiceClient::from_config(&config.service)?);
/// let mut session = SessionController::new(api, &config.polling);
///
/// session.set_metadata(SessionMetadata::new("PRJ-1", "Support Q3", "Yassine B."))?;
/// session.select_asset(AssetRef::from_path("call_42.mp3").await?)?;
/// session.submit().await?;
///
/// let artifacts = session.wait_for_outcome().await?;
/// println!("{:?}", artifacts.names());
/// # Ok(())
/// # }
/// ```
pub struct SessionController {
    state: SessionState,
    api: Arc<dyn ServiceApi>,
    poll_interval: Duration,
    poller: Option<PollerHandle>,
    resolution: Option<ResolutionHandle>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    view_tx: watch::Sender<SessionView>,
}

impl SessionController {
    pub fn new(api: Arc<dyn ServiceApi>, polling: &PollingConfig) -> Self {
        let state = SessionState::new();
        let (view_tx, _) = watch::channel(state.view());
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        Self {
            state,
            api,
            poll_interval: polling.interval(),
            poller: None,
            resolution: None,
            events_tx,
            events_rx,
            view_tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receiver of the latest [`SessionView`].
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// `true` while a poll loop is running.
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    pub fn set_metadata(&mut self, metadata: SessionMetadata) -> Result<(), SessionError> {
        self.state.set_metadata(metadata)?;
        self.publish();
        Ok(())
    }

    pub fn select_asset(&mut self, asset: AssetRef) -> Result<(), SessionError> {
        self.state.select_asset(asset)?;
        self.publish();
        Ok(())
    }

    /// Validate, upload, create the job and start polling.
    ///
    /// # Errors
    ///
    /// Validation errors are returned before any request is made.  Upload
    /// and job-creation failures leave the session in `Intake` with asset
    /// and metadata intact, so the user can simply retry.
    pub async fn submit(&mut self) -> Result<TaskId, SessionError> {
        if self.state.stage() != Stage::Intake {
            return Err(TransitionError {
                action: "submit",
                stage: self.state.stage(),
            }
            .into());
        }

        let (task_id, uploaded, kind) =
            match start_job(&self.state, self.api.as_ref()).await {
                Ok(started) => started,
                Err(e) => {
                    log::warn!("session: submit rejected: {e}");
                    self.state.set_notice(e.to_string());
                    self.publish();
                    return Err(e);
                }
            };

        let generation = self.state.begin_processing(task_id.clone(), &uploaded, kind)?;
        log::info!("session: job {task_id} created for {uploaded} (generation {generation})");

        self.poller = Some(
            StatusPoller::new(
                Arc::clone(&self.api),
                task_id.clone(),
                kind,
                generation,
                self.poll_interval,
            )
            .start(self.events_tx.clone()),
        );
        self.publish();
        Ok(task_id)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Apply one background event and publish the new view.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Poll(report) => self.on_poll(report),
            SessionEvent::Resolved(report) => self.on_resolved(report),
        }
        self.publish();
    }

    /// Process events until the job reaches `Result` or fails.
    ///
    /// # Errors
    ///
    /// [`SessionError::JobFailure`] when the service reports `failed`;
    /// [`SessionError::InvalidTransition`] when no job is active.
    pub async fn wait_for_outcome(&mut self) -> Result<ArtifactSet, SessionError> {
        loop {
            match self.state.stage() {
                Stage::Result => {
                    return Ok(self.state.artifacts().cloned().unwrap_or_default());
                }
                Stage::Intake => {
                    return Err(TransitionError {
                        action: "wait for results",
                        stage: Stage::Intake,
                    }
                    .into());
                }
                Stage::Processing => {}
            }
            if let Some(message) = self.state.job().and_then(ActiveJob::failure) {
                return Err(SessionError::JobFailure(message.to_string()));
            }

            let event = self.next_event().await.ok_or(SessionError::Closed)?;
            self.handle_event(event);
        }
    }

    fn on_poll(&mut self, report: PollReport) {
        let generation = report.ticket.generation;

        match self.state.apply_poll(report.ticket, report.outcome) {
            PollOutcome::Stale => {
                log::debug!("session: dropped stale poll {:?}", report.ticket);
            }
            PollOutcome::Tolerated(e) => {
                log::warn!("session: status request failed, keeping last status: {e}");
            }
            PollOutcome::Regressed => {
                log::debug!("session: ignored status regression {:?}", report.ticket);
            }
            PollOutcome::Updated => {}
            PollOutcome::Completed { filename } => {
                log::info!("session: job completed, resolving artifacts for {filename}");
                self.poller = None;
                self.resolution = Some(
                    ArtifactResolver::new(Arc::clone(&self.api)).spawn(
                        filename,
                        generation,
                        self.events_tx.clone(),
                    ),
                );
            }
            PollOutcome::Failed { message } => {
                log::error!("session: job failed: {message}");
                self.poller = None;
            }
        }
    }

    fn on_resolved(&mut self, report: ResolutionReport) {
        self.resolution = None;
        let generation = report.generation;
        if !self.state.is_current(generation) {
            log::debug!("session: dropped artifacts of generation {generation}");
            return;
        }

        match report.result {
            Ok(artifacts) => {
                let count = artifacts.len();
                match self.state.enter_result(generation, artifacts) {
                    Ok(()) => log::info!("session: {count} artifact(s) ready"),
                    Err(e) => log::warn!("session: artifacts discarded: {e}"),
                }
            }
            Err(e) => {
                log::warn!("session: could not resolve artifacts, polling again: {e}");
                if self
                    .state
                    .resolution_failed(generation, format!("could not load results: {e}"))
                {
                    self.resume_polling();
                }
            }
        }
    }

    fn resume_polling(&mut self) {
        let Some(job) = self.state.job() else {
            return;
        };
        let poller = StatusPoller::new(
            Arc::clone(&self.api),
            job.task_id().clone(),
            job.asset_kind(),
            job.generation(),
            self.poll_interval,
        )
        .continuing_after(job.last_seq());
        self.poller = Some(poller.start(self.events_tx.clone()));
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Stop background work and return to `Intake`.
    pub fn reset(&mut self, mode: ResetMode) {
        self.poller = None;
        self.resolution = None;
        self.state.reset(mode);
        log::debug!("session: reset ({mode:?})");
        self.publish();
    }

    // -----------------------------------------------------------------------
    // Command loop
    // -----------------------------------------------------------------------

    /// Serve `commands` and background events until the command channel
    /// closes, then stop all background work.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        self.poller = None;
        self.resolution = None;
        log::info!("session: command channel closed, controller shutting down");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::SetMetadata(metadata) => self.set_metadata(metadata),
            SessionCommand::SelectAsset(asset) => self.select_asset(asset),
            SessionCommand::Submit => self.submit().await.map(|_| ()),
            SessionCommand::Reset(mode) => {
                self.reset(mode);
                Ok(())
            }
        };

        if let Err(e) = result {
            log::warn!("session: command failed: {e}");
            self.state.set_notice(e.to_string());
            self.publish();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }
}

/// Upload the asset and create the job, without changing the state.
async fn start_job(
    state: &SessionState,
    api: &dyn ServiceApi,
) -> Result<(TaskId, String, AssetKind), SessionError> {
    let submission = state.prepare_submission()?;

    let uploaded = api
        .upload(submission.asset)
        .await
        .map_err(|source| SessionError::Transport {
            operation: "upload",
            source,
        })?;

    let request = submission.process_request(&uploaded);
    let task_id = api
        .create_job(&request)
        .await
        .map_err(|source| SessionError::Transport {
            operation: "create job",
            source,
        })?;

    Ok((task_id, uploaded, submission.kind))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{http_error, status};
    use crate::api::{JobState, MockServiceApi};
    use crate::artifacts::Preview;

    const TICK: Duration = Duration::from_millis(5);

    const TRANSCRIPTION: &str = "Transcription Status (Audio to Text)";
    const ANALYSIS: &str = "Analysis Status (Summary & Assessment Generation)";

    fn metadata() -> SessionMetadata {
        SessionMetadata::new("PRJ-2024-001", "Customer Support Q3", "Yassine B.")
    }

    fn controller(api: Arc<MockServiceApi>) -> SessionController {
        SessionController::new(api, &PollingConfig { interval_ms: 5 })
    }

    fn ready(api: Arc<MockServiceApi>, asset: &str) -> SessionController {
        let mut session = controller(api);
        session.set_metadata(metadata()).unwrap();
        session
            .select_asset(AssetRef::new(asset, vec![0u8; 16]))
            .unwrap();
        session
    }

    async fn step(session: &mut SessionController) {
        let event = session.next_event().await.expect("event");
        session.handle_event(event);
    }

    fn happy_api() -> MockServiceApi {
        MockServiceApi::new()
            .with_statuses(vec![
                Ok(status(JobState::Pending, "call_42.mp3", "Starting")),
                Ok(status(JobState::Processing, "call_42.mp3", TRANSCRIPTION)),
                Ok(status(JobState::Completed, "call_42.mp3", "Finished")),
            ])
            .with_outputs(&["call_42_falcon.docx", "call_42_falcon.csv", "other_13.csv"])
            .with_preview("call_42_falcon.docx", Preview::Narrative("Summary".into()))
    }

    #[tokio::test]
    async fn invalid_submit_makes_no_requests() {
        let api = Arc::new(MockServiceApi::new());
        let mut session = controller(api.clone());
        session
            .select_asset(AssetRef::new("call.mp3", Vec::new()))
            .unwrap();

        let err = session.submit().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::MissingMetadata(_))
        ));
        assert_eq!(api.network_calls(), 0);
        assert_eq!(session.state().stage(), Stage::Intake);
        assert!(session.state().notice().is_some());
    }

    #[tokio::test]
    async fn unsupported_asset_makes_no_requests() {
        let api = Arc::new(MockServiceApi::new());
        let mut session = ready(api.clone(), "notes.pdf");

        assert!(matches!(
            session.submit().await,
            Err(SessionError::Validation(ValidationError::UnsupportedAsset(_)))
        ));
        assert_eq!(api.network_calls(), 0);
    }

    #[tokio::test]
    async fn full_cycle_reaches_result() {
        let api = Arc::new(happy_api());
        let mut session = ready(api.clone(), "call_42.mp3");
        let view = session.subscribe();

        let task_id = session.submit().await.expect("submit");
        assert_eq!(task_id.as_str(), "task-1");
        assert_eq!(view.borrow().stage, Stage::Processing);
        assert_eq!(view.borrow().progress.label, "Starting");

        let artifacts = session.wait_for_outcome().await.expect("outcome");

        assert_eq!(session.state().stage(), Stage::Result);
        assert_eq!(
            artifacts.names(),
            vec!["call_42_falcon.docx", "call_42_falcon.csv"]
        );
        assert_eq!(artifacts.narrative_preview(), Some("Summary"));
        assert_eq!(api.outputs_calls(), 1);
        assert!(!session.is_polling());

        let latest = view.borrow();
        assert_eq!(latest.stage, Stage::Result);
        assert_eq!(latest.progress.label, "Analysis Complete");
        assert_eq!(latest.progress.percent(), 100);
    }

    #[tokio::test]
    async fn first_status_request_waits_one_interval() {
        let api = Arc::new(happy_api());
        let mut session = ready(api.clone(), "call_42.mp3");

        session.submit().await.expect("submit");

        assert_eq!(api.status_calls(), 0);
        step(&mut session).await;
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test]
    async fn poll_error_keeps_status_and_polling() {
        let api = Arc::new(MockServiceApi::new().with_statuses(vec![
            Ok(status(JobState::Processing, "call_42.mp3", TRANSCRIPTION)),
            Err(http_error(500)),
            Ok(status(JobState::Processing, "call_42.mp3", ANALYSIS)),
        ]));
        let mut session = ready(api, "call_42.mp3");
        session.submit().await.expect("submit");

        step(&mut session).await;
        step(&mut session).await;

        let job = session.state().job().expect("job");
        assert_eq!(session.state().stage(), Stage::Processing);
        assert_eq!(job.status().status, JobState::Processing);
        assert_eq!(job.progress().label, "Voice-to-Text Transcription...");
        assert!(session.is_polling());

        step(&mut session).await;
        assert_eq!(
            session.state().job().unwrap().progress().label,
            "Intelligence Analysis & Scoring..."
        );
    }

    #[tokio::test]
    async fn failed_job_stops_polling_and_keeps_error() {
        let mut failed = status(JobState::Failed, "call_42.mp3", ANALYSIS);
        failed.error = Some("model quota exceeded".into());
        let api = Arc::new(MockServiceApi::new().with_statuses(vec![
            Ok(status(JobState::Processing, "call_42.mp3", TRANSCRIPTION)),
            Ok(failed),
        ]));
        let mut session = ready(api.clone(), "call_42.mp3");
        session.submit().await.expect("submit");

        let err = session.wait_for_outcome().await.unwrap_err();

        assert!(matches!(err, SessionError::JobFailure(ref m) if m == "model quota exceeded"));
        assert_eq!(session.state().stage(), Stage::Processing);
        assert!(!session.is_polling());

        let calls = api.status_calls();
        tokio::time::sleep(TICK * 4).await;
        assert_eq!(api.status_calls(), calls);
        assert_eq!(api.outputs_calls(), 0);
    }

    #[tokio::test]
    async fn upload_failure_stays_in_intake() {
        let api = Arc::new(MockServiceApi::new().failing_upload(http_error(503)));
        let mut session = ready(api.clone(), "call_42.mp3");

        let err = session.submit().await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Transport {
                operation: "upload",
                ..
            }
        ));
        assert_eq!(session.state().stage(), Stage::Intake);
        assert_eq!(session.state().metadata(), &metadata());
        assert_eq!(
            session.state().asset().map(AssetRef::name),
            Some("call_42.mp3")
        );
        assert_eq!(api.create_calls(), 0);
        assert!(!session.is_polling());
    }

    #[tokio::test]
    async fn create_failure_stays_in_intake_and_can_retry() {
        let api = Arc::new(MockServiceApi::new().failing_create(ApiError::Timeout));
        let mut session = ready(api.clone(), "call_42.mp3");

        assert!(matches!(
            session.submit().await,
            Err(SessionError::Transport {
                operation: "create job",
                source: ApiError::Timeout
            })
        ));
        assert!(session.submit().await.is_err());

        assert_eq!(session.state().stage(), Stage::Intake);
        assert_eq!(api.upload_calls(), 2);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn document_submission_skips_transcription() {
        let api = Arc::new(MockServiceApi::new().with_statuses(vec![Ok(status(
            JobState::Processing,
            "script.docx",
            "Using existing script",
        ))]));
        let mut session = ready(api.clone(), "script.docx");

        session.submit().await.expect("submit");
        step(&mut session).await;

        let requests = api.process_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].skip_transcription);
        assert_eq!(requests[0].project_name, "Customer Support Q3");
        assert_eq!(
            session.state().job().unwrap().progress().label,
            "Processing Document..."
        );
    }

    #[tokio::test]
    async fn failed_listing_is_retried() {
        let api = Arc::new(
            MockServiceApi::new()
                .with_statuses(vec![Ok(status(JobState::Completed, "call_42.mp3", "Finished"))])
                .failing_outputs(http_error(502)),
        );
        let mut session = ready(api.clone(), "call_42.mp3");
        session.submit().await.expect("submit");

        step(&mut session).await; // completed
        step(&mut session).await; // resolution failed
        assert_eq!(session.state().stage(), Stage::Processing);
        assert!(session
            .state()
            .notice()
            .is_some_and(|n| n.starts_with("could not load results")));
        assert!(session.is_polling());
        assert_eq!(
            session.subscribe().borrow().status.as_ref().map(|s| s.status),
            Some(JobState::Completed)
        );

        step(&mut session).await; // completed again
        step(&mut session).await; // second resolution
        assert_eq!(api.outputs_calls(), 2);
    }

    #[tokio::test]
    async fn submit_outside_intake_is_rejected() {
        let api = Arc::new(happy_api());
        let mut session = ready(api.clone(), "call_42.mp3");
        session.submit().await.expect("submit");

        assert!(matches!(
            session.submit().await,
            Err(SessionError::InvalidTransition(_))
        ));
        assert!(session.set_metadata(SessionMetadata::default()).is_err());
        assert_eq!(api.upload_calls(), 1);
    }

    #[tokio::test]
    async fn reset_stops_polling() {
        let api = Arc::new(MockServiceApi::new().with_statuses(vec![Ok(status(
            JobState::Processing,
            "call_42.mp3",
            TRANSCRIPTION,
        ))]));
        let mut session = ready(api.clone(), "call_42.mp3");
        session.submit().await.expect("submit");
        step(&mut session).await;

        session.reset(ResetMode::NewAsset);

        assert_eq!(session.state().stage(), Stage::Intake);
        assert!(!session.is_polling());
        assert_eq!(session.state().metadata(), &metadata());
        let calls = api.status_calls();
        tokio::time::sleep(TICK * 4).await;
        assert!(api.status_calls() <= calls + 1);
    }

    #[tokio::test]
    async fn reset_from_result_clears_context() {
        let api = Arc::new(happy_api());
        let mut session = ready(api, "call_42.mp3");
        session.submit().await.expect("submit");
        session.wait_for_outcome().await.expect("outcome");

        session.reset(ResetMode::ResetContext);

        let view = session.subscribe();
        let view = view.borrow();
        assert_eq!(view.stage, Stage::Intake);
        assert_eq!(view.metadata, SessionMetadata::default());
        assert!(view.artifacts.is_none());
        assert!(view.asset_name.is_none());
    }

    #[tokio::test]
    async fn wait_without_job_is_rejected() {
        let mut session = controller(Arc::new(MockServiceApi::new()));
        assert!(matches!(
            session.wait_for_outcome().await,
            Err(SessionError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn command_loop_drives_a_session() {
        let api = Arc::new(happy_api());
        let session = controller(api.clone());
        let mut view = session.subscribe();
        let (tx, rx) = mpsc::channel(8);

        let runner = tokio::spawn(session.run(rx));
        tx.send(SessionCommand::SetMetadata(metadata())).await.unwrap();
        tx.send(SessionCommand::SelectAsset(AssetRef::new(
            "call_42.mp3",
            vec![1, 2, 3],
        )))
        .await
        .unwrap();
        tx.send(SessionCommand::Submit).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if view.borrow_and_update().stage == Stage::Result {
                    break;
                }
                view.changed().await.expect("controller alive");
            }
        })
        .await
        .expect("reached result");

        tx.send(SessionCommand::Reset(ResetMode::NewAsset)).await.unwrap();
        drop(tx);
        runner.await.expect("controller task");

        let last = view.borrow();
        assert_eq!(last.stage, Stage::Intake);
        assert_eq!(last.metadata, metadata());
        assert_eq!(api.outputs_calls(), 1);
    }
}
