//! Fuzzy locator: where does a target occur inside a paragraph's runs?
//!
//! Three escalating tiers, first success wins:
//!
//! 1. `Exact`: the raw target is a substring of one run's text.
//! 2. `Normalized`: the target matches inside one run once whitespace
//!    differences are ignored.
//! 3. `CrossRun`: the match only exists across run boundaries, so the
//!    paragraph has to be rebuilt.
//!
//! A paragraph whose normalized text does not contain the normalized target
//! is not a match at any tier.

use std::ops::Range;

use serde::Serialize;
use tracing::trace;

use super::normalize::{Target, normalize};

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Exact,
    Normalized,
    CrossRun,
}

/// Locator outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// The target does not occur in the paragraph.
    None,
    /// The first occurrence lies inside run `run` at byte range `span`.
    SingleRun {
        run: usize,
        span: Range<usize>,
        tier: Tier,
    },
    /// The target spans run boundaries; only a paragraph rebuild can apply it.
    CrossRun,
}

impl Match {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Match::None => None,
            Match::SingleRun { tier, .. } => Some(*tier),
            Match::CrossRun => Some(Tier::CrossRun),
        }
    }
}

/// Locate `target` in a paragraph given the text of each of its runs.
pub fn locate<S: AsRef<str>>(runs: &[S], target: &Target) -> Match {
    let paragraph: String = runs.iter().map(AsRef::as_ref).collect();
    if !normalize(&paragraph).contains(target.normalized()) {
        return Match::None;
    }

    for (i, run) in runs.iter().enumerate() {
        if let Some(start) = run.as_ref().find(target.raw()) {
            trace!(run = i, "exact match");
            return Match::SingleRun {
                run: i,
                span: start..start + target.raw().len(),
                tier: Tier::Exact,
            };
        }
    }

    for (i, run) in runs.iter().enumerate() {
        let text = run.as_ref();
        if !normalize(text).contains(target.normalized()) {
            continue;
        }
        if let Some(m) = target.pattern().find(text) {
            trace!(run = i, "whitespace-normalized match");
            return Match::SingleRun {
                run: i,
                span: m.range(),
                tier: Tier::Normalized,
            };
        }
    }

    Match::CrossRun
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(s: &str) -> Target {
        Target::new(s).expect("should build target")
    }

    #[test]
    fn test_exact_single_run() {
        let runs = ["Hello ", "World"];
        assert_eq!(
            locate(&runs, &target("World")),
            Match::SingleRun {
                run: 1,
                span: 0..5,
                tier: Tier::Exact
            }
        );
    }

    #[test]
    fn test_first_containing_run_wins() {
        let runs = ["Go, ", "Go", " Go"];
        let m = locate(&runs, &target("Go"));
        assert!(matches!(m, Match::SingleRun { run: 0, .. }));
    }

    #[test]
    fn test_normalized_single_run() {
        let runs = ["Improved process\nefficiency by 20%"];
        let m = locate(&runs, &target("process  efficiency"));
        assert_eq!(
            m,
            Match::SingleRun {
                run: 0,
                span: 9..27,
                tier: Tier::Normalized
            }
        );
    }

    #[test]
    fn test_cross_run() {
        let runs = ["This is ", "bold"];
        assert_eq!(locate(&runs, &target("This is bold")), Match::CrossRun);
    }

    #[test]
    fn test_cross_run_across_line_layout() {
        let runs = ["Led a team of", " five engineers"];
        assert_eq!(locate(&runs, &target("team of five")), Match::CrossRun);
    }

    #[test]
    fn test_no_match() {
        let runs = ["Hello ", "World"];
        assert_eq!(locate(&runs, &target("Planet")), Match::None);
        let empty: [&str; 0] = [];
        assert_eq!(locate(&empty, &target("x")), Match::None);
    }

    #[test]
    fn test_tier_accessor() {
        assert_eq!(Match::None.tier(), None);
        assert_eq!(Match::CrossRun.tier(), Some(Tier::CrossRun));
    }
}
