//! Workflow session: intake, processing and result stages.
//!
//! # Architecture
//!
//! ```text
//! SessionCommand (mpsc)                   StatusPoller task ──┐
//!        │                                ArtifactResolver ───┤ SessionEvent (mpsc)
//!        ▼                                                    ▼
//! SessionController::run()  ── owns ──▶ SessionState (reducer)
//!        │
//!        └─▶ watch::Sender<SessionView> ──▶ renderers (CLI progress, tests)
//! ```
//!
//! Only the controller mutates the state.  Background tasks carry the job
//! generation they were started for, so anything they report after a reset
//! or a newer submit is recognised as stale and ignored.

pub mod controller;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{SessionCommand, SessionController, SessionError, SessionEvent};
pub use state::{
    ActiveJob, PollOutcome, ResetMode, SessionMetadata, SessionState, SessionView, Stage,
    Submission, TransitionError, ValidationError,
};
