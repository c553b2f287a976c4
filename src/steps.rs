//! Translation of the service's free-form step labels into display phases.
//!
//! The service reports progress as a human-readable `step` string.  The
//! client shows a fixed list of three phases instead, chosen by asset kind:
//!
//! ```text
//! audio:     Voice-to-Text Transcription → Intelligence Analysis → Finalizing
//! document:  Processing Document         → Intelligence Analysis → Finalizing
//! ```
//!
//! Known labels map onto those phases through [`BackendStep`]; anything else
//! is shown verbatim.  Translation is pure: the same `(kind, step, state)`
//! always yields the same [`StepProgress`].

use crate::api::{JobState, JobStatus};
use crate::asset::AssetKind;

/// Phases shown for call recordings.
pub const AUDIO_PHASES: [&str; 3] = [
    "Voice-to-Text Transcription...",
    "Intelligence Analysis & Scoring...",
    "Finalizing Report & Data Export...",
];

/// Phases shown for pre-written scripts.
pub const DOCUMENT_PHASES: [&str; 3] = [
    "Processing Document...",
    "Intelligence Analysis & Scoring...",
    "Finalizing Report & Data Export...",
];

/// Label shown once the service reports the terminal step.
pub const COMPLETE_LABEL: &str = "Analysis Complete";

/// Label shown before any status has been observed.
pub const INITIALIZING_LABEL: &str = "Initializing...";

/// Display phases for an asset kind, always exactly three, in pipeline order.
pub fn phases(kind: AssetKind) -> &'static [&'static str; 3] {
    match kind {
        AssetKind::Audio => &AUDIO_PHASES,
        AssetKind::Document => &DOCUMENT_PHASES,
    }
}

// ---------------------------------------------------------------------------
// BackendStep
// ---------------------------------------------------------------------------

/// The closed set of step labels the service is known to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStep {
    Transcription,
    ExistingScript,
    Analysis,
    Formatting,
    Finished,
}

/// Where a [`BackendStep`] lands in the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget {
    /// Index into [`phases`].
    Phase(usize),
    /// Past the last phase.
    Complete,
}

impl BackendStep {
    pub const ALL: [BackendStep; 5] = [
        BackendStep::Transcription,
        BackendStep::ExistingScript,
        BackendStep::Analysis,
        BackendStep::Formatting,
        BackendStep::Finished,
    ];

    /// The exact label the service sends for this step.
    pub fn label(&self) -> &'static str {
        match self {
            BackendStep::Transcription => "Transcription Status (Audio to Text)",
            BackendStep::ExistingScript => "Using existing script",
            BackendStep::Analysis => "Analysis Status (Summary & Assessment Generation)",
            BackendStep::Formatting => "File Formatting (DOCX & Excel Preparation)",
            BackendStep::Finished => "Finished",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.label() == label)
    }

    pub fn target(&self) -> StepTarget {
        match self {
            BackendStep::Transcription | BackendStep::ExistingScript => StepTarget::Phase(0),
            BackendStep::Analysis => StepTarget::Phase(1),
            BackendStep::Formatting => StepTarget::Phase(2),
            BackendStep::Finished => StepTarget::Complete,
        }
    }
}

// ---------------------------------------------------------------------------
// StepProgress
// ---------------------------------------------------------------------------

/// What to show for the current step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProgress {
    pub label: String,
    /// Fraction of the pipeline done, within `[0, 1]`.
    pub fraction: f32,
    /// Matched phase index, `None` for the terminal or unknown labels.
    pub phase: Option<usize>,
}

impl StepProgress {
    /// Progress before any status exists.
    pub fn initializing() -> Self {
        Self {
            label: INITIALIZING_LABEL.into(),
            fraction: 0.0,
            phase: None,
        }
    }

    /// Translate a raw step label.
    ///
    /// ```
    /// use falcon_client::api::JobState;
    /// use falcon_client::asset::AssetKind;
    /// use falcon_client::steps::StepProgress;
    ///
    /// let p = StepProgress::translate(
    ///     AssetKind::Audio,
    ///     "Analysis Status (Summary & Assessment Generation)",
    ///     JobState::Processing,
    /// );
    /// assert_eq!(p.label, "Intelligence Analysis & Scoring...");
    /// assert_eq!(p.phase, Some(1));
    ///
    /// let unknown = StepProgress::translate(AssetKind::Audio, "Custom Vendor Step", JobState::Processing);
    /// assert_eq!(unknown.label, "Custom Vendor Step");
    /// assert_eq!(unknown.fraction, 0.0);
    /// ```
    pub fn translate(kind: AssetKind, step: &str, state: JobState) -> Self {
        let phases = phases(kind);

        match BackendStep::from_label(step).map(|s| s.target()) {
            Some(StepTarget::Phase(index)) => Self {
                label: phases[index].to_string(),
                fraction: (index + 1) as f32 / phases.len() as f32,
                phase: Some(index),
            },
            Some(StepTarget::Complete) => Self {
                label: COMPLETE_LABEL.to_string(),
                fraction: fallback_fraction(state),
                phase: None,
            },
            None => Self {
                label: step.to_string(),
                fraction: fallback_fraction(state),
                phase: None,
            },
        }
    }

    pub fn for_status(kind: AssetKind, status: &JobStatus) -> Self {
        Self::translate(kind, &status.step, status.status)
    }

    /// Whole-number percentage for display.
    pub fn percent(&self) -> u8 {
        (self.fraction.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Progress for labels outside the phase list: all or nothing.
fn fallback_fraction(state: JobState) -> f32 {
    if state == JobState::Completed {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
