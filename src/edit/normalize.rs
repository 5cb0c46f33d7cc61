//! Whitespace normalization and replacement cleanup.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Bullet marker at the start of a line, plus the whitespace after it.
static BULLET_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(^|\n)[*\-•]\s+").ok());

const BULLET_MARKERS: &[&str] = &["* ", "- ", "• "];

/// Collapse every run of whitespace to one space and trim the ends.
pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Regex matching `target` with each whitespace gap widened to `\s+`.
///
/// Returns `None` for a target with no words.
pub fn whitespace_pattern(target: &str) -> Option<Regex> {
    let words: Vec<&str> = target.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&pattern).ok()
}

/// Strip plain-text bullet markers from multi-line or bulleted replacement
/// text. Line breaks are kept as literal content.
pub fn clean_replacement(replacement: &str) -> Cow<'_, str> {
    let bulleted = replacement
        .split('\n')
        .any(|line| BULLET_MARKERS.iter().any(|m| line.trim().starts_with(m)));
    if !replacement.contains('\n') && !bulleted {
        return Cow::Borrowed(replacement);
    }
    match BULLET_PREFIX.as_ref() {
        Some(re) => re.replace_all(replacement, "${1}"),
        None => Cow::Borrowed(replacement),
    }
}

/// A prepared edit target: raw text, its normalized form, and the
/// whitespace-tolerant pattern, computed once per edit.
#[derive(Debug, Clone)]
pub struct Target {
    raw: String,
    normalized: String,
    pattern: Regex,
}

impl Target {
    /// Prepare `raw`; `None` if it contains nothing but whitespace.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return None;
        }
        Some(Self {
            raw: raw.to_owned(),
            normalized,
            pattern: whitespace_pattern(raw)?,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// True if the normalized target occurs in the normalized `haystack`.
    pub fn occurs_in(&self, haystack: &str) -> bool {
        normalize(haystack).contains(&self.normalized)
    }
}
