//! Edit batches produced by the upstream analysis step.
//!
//! The analysis itself (gaps, suggestions, scores, and which text should
//! change) is computed elsewhere; this module only models its payload and
//! flattens it into the ordered edit list the reconciler consumes.

use serde::{Deserialize, Serialize};

use crate::error::TailorResult;

/// How an edit's `new_content` is applied to a matching paragraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    /// Substitute the target text.
    #[default]
    #[serde(alias = "Replace", alias = "REPLACE")]
    Replace,
    /// Add the content after the paragraph's existing text.
    #[serde(alias = "Append", alias = "APPEND")]
    Append,
    /// Anything else the producer emitted; reported as skipped.
    #[serde(other)]
    Other,
}

/// Review state attached by the user before generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    Pending,
    Accepted,
    Rejected,
}

/// One proposed text change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    #[serde(default)]
    pub target_text: String,
    #[serde(default)]
    pub new_content: String,
    #[serde(default)]
    pub action: EditAction,
    /// Informational only.
    #[serde(default)]
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EditStatus>,
}

impl Edit {
    pub fn replace(target: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(target, content, EditAction::Replace)
    }

    pub fn append(target: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(target, content, EditAction::Append)
    }

    fn new(target: impl Into<String>, content: impl Into<String>, action: EditAction) -> Self {
        Self {
            target_text: target.into(),
            new_content: content.into(),
            action,
            rationale: String::new(),
            status: None,
        }
    }
}

/// Analysis of one resume section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionAnalysis {
    #[serde(default)]
    pub section_name: String,
    #[serde(default = "default_section_type")]
    pub section_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub edits: Vec<Edit>,
}

fn default_section_type() -> String {
    "Other".to_owned()
}

/// Whole analysis payload for a resume against one job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub sections: Vec<SectionAnalysis>,
    #[serde(default)]
    pub initial_score: i64,
    #[serde(default)]
    pub projected_score: i64,
    #[serde(default = "default_company")]
    pub company_name: String,
    #[serde(default = "default_job_title")]
    pub job_title: String,
    #[serde(default)]
    pub score_reasoning: String,
}

fn default_company() -> String {
    "Unknown Company".to_owned()
}

fn default_job_title() -> String {
    "Unknown Role".to_owned()
}

/// Flatten per-section edits into one ordered list, dropping rejected ones.
pub fn flatten_edits(sections: &[SectionAnalysis]) -> Vec<Edit> {
    sections
        .iter()
        .flat_map(|s| s.edits.iter())
        .filter(|e| e.status != Some(EditStatus::Rejected))
        .cloned()
        .collect()
}

/// Parse an edit batch from JSON.
///
/// Accepts a bare edit list, a list of sections, a single section, or a
/// whole analysis object with a `sections` field.
///
/// # Errors
///
/// Returns an error if the text is not JSON of one of those shapes.
pub fn edits_from_json(text: &str) -> TailorResult<Vec<Edit>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    let is_list = value.is_array();
    let has_sections = value.get("sections").is_some();
    let lists_sections = value
        .as_array()
        .is_some_and(|items| items.iter().any(|i| i.get("edits").is_some()));

    let sections: Vec<SectionAnalysis> = if lists_sections {
        serde_json::from_value(value)?
    } else if is_list {
        let edits: Vec<Edit> = serde_json::from_value(value)?;
        return Ok(edits
            .into_iter()
            .filter(|e| e.status != Some(EditStatus::Rejected))
            .collect());
    } else if has_sections {
        let analysis: AnalysisResult = serde_json::from_value(value)?;
        analysis.sections
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(flatten_edits(&sections))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        let e: Edit = serde_json::from_str(r#"{"target_text":"a","new_content":"b","action":"append"}"#).expect("should parse edit json");
        assert_eq!(e.action, EditAction::Append);
        let e: Edit = serde_json::from_str(r#"{"target_text":"a","new_content":"b","action":"Replace"}"#).expect("should parse edit json");
        assert_eq!(e.action, EditAction::Replace);
        let e: Edit = serde_json::from_str(r#"{"target_text":"a","new_content":"b","action":"delete"}"#).expect("should parse edit json");
        assert_eq!(e.action, EditAction::Other);
        let e: Edit = serde_json::from_str(r#"{"target_text":"a","new_content":"b"}"#).expect("should parse edit json");
        assert_eq!(e.action, EditAction::Replace);
    }

    #[test]
    fn test_flatten_keeps_order_and_drops_rejected() {
        let json = r#"{
            "sections": [
                {"section_name": "Summary", "gaps": [], "edits": [
                    {"target_text": "a", "new_content": "A", "action": "replace", "rationale": "r"},
                    {"target_text": "b", "new_content": "B", "action": "replace", "rationale": "r", "status": "rejected"}
                ]},
                {"section_name": "Skills", "gaps": ["Go"], "edits": [
                    {"target_text": "c", "new_content": "C", "action": "append", "rationale": "r", "status": "accepted"}
                ]}
            ],
            "initial_score": 55,
            "projected_score": 80
        }"#;
        let edits = edits_from_json(json).expect("should parse edit batch");
        let targets: Vec<&str> = edits.iter().map(|e| e.target_text.as_str()).collect();
        assert_eq!(targets, ["a", "c"]);
    }

    #[test]
    fn test_analysis_defaults() {
        let a: AnalysisResult = serde_json::from_str(r#"{"sections": []}"#).expect("should parse edit json");
        assert_eq!(a.company_name, "Unknown Company");
        assert_eq!(a.job_title, "Unknown Role");
        assert_eq!(a.initial_score, 0);
    }

    #[test]
    fn test_bare_list_and_section_list() {
        let bare = r#"[{"target_text": "x", "new_content": "y", "action": "replace", "rationale": ""}]"#;
        assert_eq!(edits_from_json(bare).expect("should parse edit batch").len(), 1);

        let sections = r#"[{"section_name": "Experience", "edits": [
            {"target_text": "x", "new_content": "y", "action": "replace", "rationale": ""},
            {"target_text": "z", "new_content": "w", "action": "replace", "rationale": ""}
        ]}]"#;
        assert_eq!(edits_from_json(sections).expect("should parse edit batch").len(), 2);

        let single = r#"{"section_name": "Skills", "edits": [{"target_text": "x", "new_content": "y"}]}"#;
        assert_eq!(edits_from_json(single).expect("should parse edit batch").len(), 1);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(edits_from_json("not json").is_err());
    }
}
