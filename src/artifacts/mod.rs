//! Output artifacts of a completed job.
//!
//! The service keeps every generated file in one flat listing.  A job's
//! artifacts are the entries whose name starts with the job's base filename
//! (`call_42.mp3` → `call_42_falcon.docx`, `call_42_falcon_final_assessment.xlsx`, …).
//! "First artifact of a kind" below always means first in the order the
//! service listed them; the client assumes that order is stable.

pub mod preview;
pub mod resolver;

pub use preview::{cell_text, Preview, Row};
pub use resolver::{ArtifactResolver, ResolutionHandle, ResolutionReport};

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `.docx` report, previewed as text.
    Narrative,
    /// `.csv` export, previewed as rows.
    Tabular,
    /// `.xlsx` workbook, download only.
    Spreadsheet,
    /// `.json` raw assessment, download only.
    Data,
    Other,
}

impl ArtifactKind {
    pub fn from_filename(name: &str) -> Self {
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("docx") => ArtifactKind::Narrative,
            Some("csv") => ArtifactKind::Tabular,
            Some("xlsx") => ArtifactKind::Spreadsheet,
            Some("json") => ArtifactKind::Data,
            _ => ArtifactKind::Other,
        }
    }

    /// Whether the client fetches parsed content for this kind.
    pub fn is_previewable(&self) -> bool {
        matches!(self, ArtifactKind::Narrative | ArtifactKind::Tabular)
    }
}

// ---------------------------------------------------------------------------
// Job association
// ---------------------------------------------------------------------------

/// Base name shared by a job's artifacts: everything before the first `.`.
pub fn job_base_name(filename: &str) -> &str {
    filename.split('.').next().unwrap_or(filename)
}

/// Filter `files` down to the ones generated for `job_filename`, keeping the
/// listing order.
///
/// ```
/// use falcon_client::artifacts::select_for_job;
///
/// let files = ["call_42.docx", "call_42.csv", "other_13.csv"].map(String::from);
/// assert_eq!(select_for_job(&files, "call_42.mp3"), vec!["call_42.docx", "call_42.csv"]);
/// ```
pub fn select_for_job<'a>(files: &'a [String], job_filename: &str) -> Vec<&'a str> {
    let base = job_base_name(job_filename);
    if base.is_empty() {
        log::warn!("job filename {job_filename:?} has no base name; no artifacts associated");
        return Vec::new();
    }

    files
        .iter()
        .map(String::as_str)
        .filter(|name| job_base_name(name).starts_with(base))
        .collect()
}

// ---------------------------------------------------------------------------
// Artifact / ArtifactSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub download_url: String,
    /// Parsed content, present only for previewable kinds whose fetch worked.
    pub preview: Option<Preview>,
}

/// Everything a completed job produced, in listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactSet {
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self { artifacts }
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// First artifact of `kind`.
    pub fn first_of(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Text of the first narrative artifact that has a preview.
    pub fn narrative_preview(&self) -> Option<&str> {
        self.artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Narrative)
            .find_map(|a| a.preview.as_ref()?.as_narrative())
    }

    /// Rows of the first tabular artifact that has a preview.
    pub fn tabular_preview(&self) -> Option<&Preview> {
        self.artifacts
            .iter()
            .filter(|a| a.kind == ArtifactKind::Tabular)
            .find_map(|a| a.preview.as_ref().filter(|p| p.as_rows().is_some()))
    }

    /// Download link for the report document.
    pub fn report_download(&self) -> Option<&str> {
        self.first_of(ArtifactKind::Narrative)
            .map(|a| a.download_url.as_str())
    }

    /// Download link for the spreadsheet export.
    pub fn spreadsheet_download(&self) -> Option<&str> {
        self.first_of(ArtifactKind::Spreadsheet)
            .map(|a| a.download_url.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
