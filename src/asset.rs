//! The single input file selected for processing.
//!
//! An [`AssetRef`] is either a call recording (audio, needs transcription)
//! or an already-written script (document, transcription is skipped).  The
//! kind is derived from the file extension only.

use std::path::Path;

use thiserror::Error;

/// Extensions accepted as call recordings.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a"];

/// Extension reserved for pre-written scripts.
pub const DOCUMENT_EXTENSION: &str = "docx";

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// What the remote pipeline has to do with an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// A call recording; the pipeline transcribes it first.
    Audio,
    /// A script document; transcription is skipped.
    Document,
}

impl AssetKind {
    /// Classify a filename by its extension (case-insensitive).
    ///
    /// Returns `None` for extensions the service does not accept.
    ///
    /// ```
    /// use falcon_client::asset::AssetKind;
    ///
    /// assert_eq!(AssetKind::from_filename("call_42.MP3"), Some(AssetKind::Audio));
    /// assert_eq!(AssetKind::from_filename("script.docx"), Some(AssetKind::Document));
    /// assert_eq!(AssetKind::from_filename("notes.txt"), None);
    /// assert_eq!(AssetKind::from_filename("no_extension"), None);
    /// ```
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        if ext == DOCUMENT_EXTENSION {
            Some(AssetKind::Document)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Audio)
        } else {
            None
        }
    }

    /// `true` when the service should skip its transcription phase.
    pub fn skips_transcription(&self) -> bool {
        matches!(self, AssetKind::Document)
    }
}

// ---------------------------------------------------------------------------
// AssetError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("asset path has no usable file name: {0}")]
    NoFileName(String),
}

// ---------------------------------------------------------------------------
// AssetRef
// ---------------------------------------------------------------------------

/// A named blob of bytes waiting to be uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetRef {
    name: String,
    bytes: Vec<u8>,
}

impl AssetRef {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read an asset from disk; the file name becomes the upload name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AssetError::NoFileName(path.display().to_string()))?
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|source| AssetError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Kind derived from the name, `None` if the extension is not accepted.
    pub fn kind(&self) -> Option<AssetKind> {
        AssetKind::from_filename(&self.name)
    }
}

impl std::fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRef")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_extensions_are_recognised() {
        for name in ["a.mp3", "b.wav", "c.m4a", "D.WAV"] {
            assert_eq!(AssetKind::from_filename(name), Some(AssetKind::Audio), "{name}");
        }
    }

    #[test]
    fn only_documents_skip_transcription() {
        assert!(AssetKind::Document.skips_transcription());
        assert!(!AssetKind::Audio.skips_transcription());
    }

    #[test]
    fn debug_does_not_dump_bytes() {
        let asset = AssetRef::new("call.mp3", vec![7; 1024]);
        let rendered = format!("{asset:?}");
        assert!(rendered.contains("call.mp3"));
        assert!(rendered.contains("1024"));
        assert!(!rendered.contains("7, 7"));
    }

    #[tokio::test]
    async fn from_path_reads_name_and_bytes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("call_42.wav");
        std::fs::write(&path, b"RIFF").expect("write");

        let asset = AssetRef::from_path(&path).await.expect("load");
        assert_eq!(asset.name(), "call_42.wav");
        assert_eq!(asset.bytes(), b"RIFF");
        assert_eq!(asset.kind(), Some(AssetKind::Audio));
    }

    #[tokio::test]
    async fn from_path_missing_file_is_read_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = AssetRef::from_path(dir.path().join("missing.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }
}
