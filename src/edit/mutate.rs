//! Format-preserving paragraph mutation.
//!
//! Single-run matches rewrite only the text of the run that holds them, so
//! every other run keeps its text and formatting untouched. A cross-run match
//! rebuilds the paragraph's text as one run carrying the first run's
//! style; any intra-paragraph style variation is lost on that path.

use std::ops::Range;

use regex::NoExpand;
use serde::Serialize;
use tracing::debug;

use super::locate::{Match, Tier, locate};
use super::normalize::{Target, clean_replacement};
use crate::analysis::EditAction;
use crate::docx::model::{Paragraph, Run, W_NS};
use crate::docx::xml::XmlTree;

/// What [`apply`] did to a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// The target does not occur here; nothing changed.
    Unchanged,
    /// Text replaced inside one run.
    Replaced { tier: Tier },
    /// Paragraph text rebuilt because the target spanned runs.
    Rebuilt,
    /// New content added as a trailing run.
    Appended,
}

impl Mutation {
    pub fn is_applied(self) -> bool {
        self != Mutation::Unchanged
    }
}

/// Apply one edit to `paragraph`.
pub fn apply(
    tree: &mut XmlTree,
    paragraph: Paragraph,
    target: &Target,
    replacement: &str,
    action: EditAction,
) -> Mutation {
    let runs = paragraph.runs(tree);
    let texts: Vec<String> = runs.iter().map(|r| r.text(tree)).collect();

    let located = locate(&texts, target);
    if located == Match::None {
        return Mutation::Unchanged;
    }
    let replacement = clean_replacement(replacement);

    match (action, located) {
        (EditAction::Append, _) => {
            append(tree, paragraph, &runs, &replacement);
            Mutation::Appended
        }
        (EditAction::Replace, Match::SingleRun { run, tier, .. }) => {
            let old = &texts[run];
            let spans: Vec<Range<usize>> = match tier {
                Tier::Exact => old
                    .match_indices(target.raw())
                    .map(|(start, hit)| start..start + hit.len())
                    .collect(),
                Tier::Normalized | Tier::CrossRun => {
                    target.pattern().find_iter(old).map(|m| m.range()).collect()
                }
            };
            // Back to front so earlier offsets stay valid.
            for span in spans.into_iter().rev() {
                runs[run].replace_span(tree, span, &replacement);
            }
            debug!(run, ?tier, "replaced within run");
            Mutation::Replaced { tier }
        }
        (EditAction::Replace, Match::CrossRun) => rebuild(tree, paragraph, &runs, &texts, target, &replacement),
        (EditAction::Replace, Match::None) | (EditAction::Other, _) => Mutation::Unchanged,
    }
}

/// Replace the paragraph's text runs with one run holding the substituted text.
fn rebuild(
    tree: &mut XmlTree,
    paragraph: Paragraph,
    runs: &[Run],
    texts: &[String],
    target: &Target,
    replacement: &str,
) -> Mutation {
    let old = texts.concat();
    let new = target.pattern().replace_all(&old, NoExpand(replacement));
    if new == old {
        return Mutation::Unchanged;
    }

    let Some(&first) = runs.first() else {
        return Mutation::Unchanged;
    };
    let style = first.style(tree);
    let Some(anchor) = paragraph.top_level_child(tree, first.id()) else {
        return Mutation::Unchanged;
    };

    let rebuilt = Run(tree.create_element(W_NS, "r"));
    tree.insert_before(anchor, rebuilt.id());
    rebuilt.set_text(tree, &new);
    rebuilt.set_style(tree, &style);

    // Runs holding drawings or text boxes stay; only their text goes.
    for &run in runs {
        if run.has_objects(tree) {
            run.set_text(tree, "");
        } else {
            tree.detach(run.id());
        }
    }
    paragraph.prune_empty_wrappers(tree);

    debug!(runs = runs.len(), "paragraph rebuilt from cross-run match");
    Mutation::Rebuilt
}

/// Add `content` as a new space-separated trailing run styled like the last run.
fn append(tree: &mut XmlTree, paragraph: Paragraph, runs: &[Run], content: &str) {
    let style = runs.last().map(|r| r.style(tree)).unwrap_or_default();
    let run = Run(tree.create_element(W_NS, "r"));
    tree.append_child(paragraph.id(), run.id());
    run.set_text(tree, &format!(" {content}"));
    run.set_style(tree, &style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::model::{Block, MC_NS, blocks};

    fn paragraph_tree(runs: &str) -> (XmlTree, Paragraph) {
        let tree = XmlTree::parse(&format!(
            r#"<w:body xmlns:w="{W_NS}" xmlns:mc="{MC_NS}"><w:p><w:pPr><w:jc w:val="left"/></w:pPr>{runs}</w:p></w:body>"#
        ))
        .expect("should parse xml");
        let Block::Paragraph(p) = blocks(&tree, tree.root())[0] else {
            panic!("expected paragraph");
        };
        (tree, p)
    }

    fn run(text: &str, bold: bool) -> String {
        let props = if bold { "<w:rPr><w:b/></w:rPr>" } else { "<w:rPr><w:b w:val=\"0\"/></w:rPr>" };
        format!(r#"<w:r>{props}<w:t xml:space="preserve">{text}</w:t></w:r>"#)
    }

    fn replace(tree: &mut XmlTree, p: Paragraph, target: &str, new: &str) -> Mutation {
        apply(tree, p, &Target::new(target).expect("should build target"), new, EditAction::Replace)
    }

    #[test]
    fn test_single_run_keeps_styles() {
        let (mut tree, p) = paragraph_tree(&(run("Hello ", false) + &run("World", true)));
        let m = replace(&mut tree, p, "World", "Planet");
        assert_eq!(m, Mutation::Replaced { tier: Tier::Exact });

        let runs = p.runs(&tree);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text(&tree), "Hello ");
        assert_eq!(runs[1].text(&tree), "Planet");
        assert_eq!(runs[0].style(&tree).bold, Some(false));
        assert_eq!(runs[1].style(&tree).bold, Some(true));
    }

    #[test]
    fn test_untouched_symbol_run() {
        let bullet = r#"<w:r><w:rPr><w:rFonts w:ascii="Symbol" w:hAnsi="Symbol"/></w:rPr><w:t>•</w:t></w:r>"#;
        let (mut tree, p) = paragraph_tree(&format!("{bullet}{}", run("Managed budget", false)));
        let before = tree.to_xml();
        replace(&mut tree, p, "Managed budget", "Owned a $2M budget");
        let runs = p.runs(&tree);
        assert_eq!(runs[0].style(&tree).font_name.as_deref(), Some("Symbol"));
        assert_eq!(runs[1].text(&tree), "Owned a $2M budget");
        assert!(before.contains(bullet));
        assert!(tree.to_xml().contains(bullet));
    }

    #[test]
    fn test_normalized_single_run_replacement() {
        let (mut tree, p) = paragraph_tree(&run("Improved process\u{a0} efficiency by 20%", false));
        let m = replace(&mut tree, p, "process  efficiency", "throughput");
        assert_eq!(m, Mutation::Replaced { tier: Tier::Normalized });
        assert_eq!(p.text(&tree), "Improved throughput by 20%");
    }

    #[test]
    fn test_cross_run_rebuild_uses_first_style() {
        let (mut tree, p) = paragraph_tree(&(run("This is ", false) + &run("bold", true)));
        let m = replace(&mut tree, p, "This is bold", "New Start");
        assert_eq!(m, Mutation::Rebuilt);

        let runs = p.runs(&tree);
        assert_eq!(p.text(&tree), "New Start");
        assert!(runs.iter().all(|r| r.style(&tree).bold == Some(false)));
        // Paragraph properties survive the rebuild.
        assert!(tree.to_xml().contains(r#"<w:pPr><w:jc w:val="left"/></w:pPr>"#));
    }

    #[test]
    fn test_cross_run_keeps_surrounding_text() {
        let (mut tree, p) = paragraph_tree(&(run("Led a team of", false) + &run(" five engineers", true)));
        replace(&mut tree, p, "team of five", "group of seven");
        assert_eq!(p.text(&tree), "Led a group of seven engineers");
    }

    #[test]
    fn test_cross_run_inside_hyperlink_prunes_wrapper() {
        let runs = format!(
            "{}<w:hyperlink>{}</w:hyperlink>",
            run("Portfolio: ", false),
            run("site.dev", true)
        );
        let (mut tree, p) = paragraph_tree(&runs);
        replace(&mut tree, p, "Portfolio: site.dev", "Portfolio: new.dev");
        assert_eq!(p.text(&tree), "Portfolio: new.dev");
        assert!(!tree.to_xml().contains("hyperlink"));
    }

    #[test]
    fn test_cross_run_keeps_drawing_runs() {
        let drawing = r#"<w:r><mc:AlternateContent><mc:Choice><w:txbxContent><w:p><w:r><w:t>box</w:t></w:r></w:p></w:txbxContent></mc:Choice></mc:AlternateContent></w:r>"#;
        let (mut tree, p) = paragraph_tree(&format!("{}{drawing}{}", run("Jane ", false), run("Doe", true)));
        replace(&mut tree, p, "Jane Doe", "Jane Q. Doe");
        assert!(tree.to_xml().contains("<w:t>box</w:t>"));
        assert!(p.text(&tree).starts_with("Jane Q. Doe"));
    }

    #[test]
    fn test_replacement_bullets_stripped_breaks_kept() {
        let (mut tree, p) = paragraph_tree(&run("Old duties", false));
        replace(&mut tree, p, "Old duties", "* Built APIs\n* Cut costs");
        assert_eq!(p.text(&tree), "Built APIs\nCut costs");
        assert!(tree.to_xml().contains("<w:br/>"));
    }

    #[test]
    fn test_replacement_is_literal() {
        let (mut tree, p) = paragraph_tree(&(run("Cost ", false) + &run("cut", false)));
        replace(&mut tree, p, "Cost cut", "Saved $1 and $2");
        assert_eq!(p.text(&tree), "Saved $1 and $2");
    }

    #[test]
    fn test_no_match_leaves_paragraph() {
        let (mut tree, p) = paragraph_tree(&run("Hello", false));
        let before = tree.to_xml();
        assert_eq!(replace(&mut tree, p, "Absent", "x"), Mutation::Unchanged);
        assert_eq!(tree.to_xml(), before);
    }

    #[test]
    fn test_single_run_keeps_special_elements_outside_match() {
        let (mut tree, p) = paragraph_tree(
            r#"<w:r><w:t xml:space="preserve">Call 555</w:t><w:noBreakHyphen/><w:t xml:space="preserve">1234 now</w:t><w:ptab w:alignment="right"/><w:t>ok</w:t></w:r>"#,
        );
        let m = replace(&mut tree, p, "now", "today");
        assert_eq!(m, Mutation::Replaced { tier: Tier::Exact });

        let xml = tree.to_xml();
        assert!(xml.contains("<w:noBreakHyphen/>"));
        assert!(xml.contains(r#"<w:ptab w:alignment="right"/>"#));
        assert_eq!(p.runs(&tree)[0].text(&tree), "Call 555-1234 today\tok");
    }

    #[test]
    fn test_single_run_replaces_every_occurrence_in_run() {
        let (mut tree, p) = paragraph_tree(&run("SQL and more SQL", false));
        replace(&mut tree, p, "SQL", "Postgres");
        assert_eq!(p.runs(&tree)[0].text(&tree), "Postgres and more Postgres");
    }

    #[test]
    fn test_append_adds_trailing_run() {
        let (mut tree, p) = paragraph_tree(&run("Python, Rust", true));
        let m = apply(&mut tree, p, &Target::new("Rust").expect("should build target"), "Go", EditAction::Append);
        assert_eq!(m, Mutation::Appended);
        let runs = p.runs(&tree);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text(&tree), "Python, Rust");
        assert_eq!(runs[1].text(&tree), " Go");
        assert_eq!(runs[1].style(&tree).bold, Some(true));
    }

    #[test]
    fn test_append_requires_target() {
        let (mut tree, p) = paragraph_tree(&run("Python", false));
        let m = apply(&mut tree, p, &Target::new("Rust").expect("should build target"), "Go", EditAction::Append);
        assert_eq!(m, Mutation::Unchanged);
    }
}
