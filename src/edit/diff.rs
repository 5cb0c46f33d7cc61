//! Diff of extracted text before and after reconciliation.

use similar::{Algorithm, TextDiff};

/// Unified diff between two extractions, one block per line.
///
/// Uses the Patience algorithm, which keeps unchanged resume lines anchored
/// instead of interleaving similar bullets.
pub fn text_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(before, after);

    diff.unified_diff()
        .header("original", "tailored")
        .to_string()
}
