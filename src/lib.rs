//! `resume-tailor`: applies proposed text edits back into a `.docx` resume.
//!
//! An upstream analysis step reads the resume's extracted text and proposes
//! substitutions. This crate extracts that text in a stable order, locates
//! each target inside the document's formatting runs even when whitespace or
//! run boundaries differ, and rewrites the runs while keeping their
//! formatting. The result is saved as a new document; the source is never
//! modified.
//!
//! # Architecture
//!
//! ```text
//! .docx ──▶ docx::Document ──▶ extract ──▶ (analysis, external) ──▶ edits
//!                │                                                    │
//!                └────────────▶ reconcile ◀───────────────────────────┘
//!                                   │  edit::locate ─▶ edit::mutate
//!                                   ▼
//!                            *_tailored.docx + ReconcileReport
//! ```

pub mod analysis;
pub mod config;
pub mod docx;
pub mod edit;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod util;

pub use analysis::{AnalysisResult, Edit, EditAction, SectionAnalysis, edits_from_json, flatten_edits};
pub use config::TailorConfig;
pub use docx::Document;
pub use error::{TailorError, TailorResult};
pub use extract::{TextBlock, extract, extract_blocks};
pub use reconcile::{EditOutcome, OutcomeStatus, ReconcileReport, reconcile, reconcile_document, reconcile_to};
