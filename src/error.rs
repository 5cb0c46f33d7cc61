//! Error types for the resume-tailor crate.

use std::path::PathBuf;

/// Structural failures that abort a whole extraction or reconciliation call.
///
/// Per-edit problems (no match, empty target) are never errors; they are
/// reported as [`crate::reconcile::EditOutcome`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum TailorError {
    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The package is not a readable zip archive.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A part inside the package is not well-formed XML.
    #[error("malformed XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },

    /// A part referenced by the package is absent.
    #[error("missing package part: {name}")]
    MissingPart { name: String },

    /// The main part has no `w:body`.
    #[error("not a word-processing document: {path}")]
    NotAWordDocument { path: PathBuf },

    /// Refusing to overwrite the source artifact with the tailored output.
    #[error("output path is the source document: {path}")]
    SameArtifact { path: PathBuf },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for resume-tailor operations.
pub type TailorResult<T> = Result<T, TailorError>;
