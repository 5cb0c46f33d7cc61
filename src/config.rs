//! Reconciliation settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TailorError, TailorResult};

/// Settings for one reconciliation run. Every field has a default, so a
/// config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailorConfig {
    /// Inserted before the extension to name the output artifact.
    pub output_suffix: String,
    /// Also apply edits to header and footer paragraphs, including their
    /// text boxes.
    pub edit_headers_footers: bool,
    /// Also apply edits to paragraphs inside floating text boxes.
    pub edit_text_boxes: bool,
    /// Report the nearest paragraph for edits that matched nothing.
    pub closest_match_hint: bool,
}

impl Default for TailorConfig {
    fn default() -> Self {
        Self {
            output_suffix: "_tailored".to_owned(),
            edit_headers_footers: true,
            edit_text_boxes: true,
            closest_match_hint: true,
        }
    }
}

impl TailorConfig {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> TailorResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| TailorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Derive the output path for `source`: `resume.docx` -> `resume_tailored.docx`.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match source.extension() {
            Some(ext) => format!("{stem}{}.{}", self.output_suffix, ext.to_string_lossy()),
            None => format!("{stem}{}", self.output_suffix),
        };
        source.with_file_name(name)
    }
}
