//! Edit reconciliation driver.
//!
//! Applies an ordered batch of edits to a freshly loaded copy of a resume and
//! saves the result as a new artifact. The source file is only ever read.
//!
//! # Flow
//!
//! ```text
//! source.docx ──open──▶ Document (owned copy)
//!                           │  for each edit, in order:
//!                           │    for each paragraph in visit order:
//!                           │      locate ─▶ mutate ─▶ mark part dirty
//!                           ▼
//!                       save ──▶ source_tailored.docx + ReconcileReport
//! ```
//!
//! Every matching paragraph is mutated, not just the first: a candidate's
//! name in the header and in the body both change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{Edit, EditAction};
use crate::config::TailorConfig;
use crate::docx::model::{Paragraph, Table, blocks, split_blocks, text_boxes};
use crate::docx::xml::NodeId;
use crate::docx::{Document, NodeKey, PartId};
use crate::edit::levenshtein::similarity;
use crate::edit::mutate::{self, Mutation};
use crate::edit::normalize::{Target, normalize};
use crate::error::{TailorError, TailorResult};

/// Closest-paragraph hints below this similarity are not reported.
const CLOSEST_MATCH_THRESHOLD: f64 = 0.5;

/// Why an edit was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyTarget,
    EmptyContent,
    UnknownAction,
}

/// The paragraph most similar to a target that matched nowhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosestMatch {
    pub text: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Mutated `paragraphs` paragraphs, `cross_run_rebuilds` of them by
    /// rebuilding the whole paragraph.
    ///
    /// Text boxes are stored twice, a modern copy and an `mc:Fallback` copy
    /// for older readers. Both are edited, but fallback copies are counted
    /// only when no other paragraph matched.
    Applied {
        paragraphs: usize,
        cross_run_rebuilds: usize,
    },
    /// The target occurs nowhere in the visited paragraphs.
    NoMatch { closest: Option<ClosestMatch> },
    Skipped { reason: SkipReason },
}

/// Result of one edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    /// Position in the input batch.
    pub index: usize,
    pub target_text: String,
    pub action: EditAction,
    pub status: OutcomeStatus,
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied { .. })
    }
}

/// Result of a whole reconciliation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub outcomes: Vec<EditOutcome>,
}

impl ReconcileReport {
    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn unmatched(&self) -> impl Iterator<Item = &EditOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::NoMatch { .. }))
    }
}

/// Reconcile `edits` into a copy of `source` saved next to it under the
/// configured suffix (`resume.docx` -> `resume_tailored.docx`).
///
/// # Errors
///
/// See [`reconcile_to`].
pub fn reconcile(source: &Path, edits: &[Edit], config: &TailorConfig) -> TailorResult<ReconcileReport> {
    let output = config.output_path(source);
    reconcile_to(source, &output, edits, config)
}

/// Reconcile `edits` into a copy of `source` saved at `output`.
///
/// Per-edit problems (no match, empty fields) are reported in the outcomes;
/// only document-level failures are errors, and then nothing is written.
///
/// # Errors
///
/// Returns an error if `output` is `source`, if the source cannot be read
/// or parsed, or if the output cannot be written.
pub fn reconcile_to(
    source: &Path,
    output: &Path,
    edits: &[Edit],
    config: &TailorConfig,
) -> TailorResult<ReconcileReport> {
    if same_artifact(source, output) {
        return Err(TailorError::SameArtifact {
            path: output.to_path_buf(),
        });
    }

    let mut doc = Document::open(source)?;
    let outcomes = apply_edits(&mut doc, edits, config);
    doc.save(output)?;

    let report = ReconcileReport {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        outcomes,
    };
    info!(
        output = %output.display(),
        edits = edits.len(),
        applied = report.applied(),
        "reconciliation complete"
    );
    Ok(report)
}

/// Apply `edits` to a duplicate of `doc`, leaving `doc` untouched.
pub fn reconcile_document(
    doc: &Document,
    edits: &[Edit],
    config: &TailorConfig,
) -> (Document, Vec<EditOutcome>) {
    let mut working = doc.clone();
    let outcomes = apply_edits(&mut working, edits, config);
    (working, outcomes)
}

/// Apply `edits` in order to `doc` in place, one outcome per edit.
pub fn apply_edits(doc: &mut Document, edits: &[Edit], config: &TailorConfig) -> Vec<EditOutcome> {
    let visits = visit_order(doc, config);
    debug!(paragraphs = visits.len(), edits = edits.len(), "applying edit batch");

    edits
        .iter()
        .enumerate()
        .map(|(index, edit)| EditOutcome {
            index,
            target_text: edit.target_text.clone(),
            action: edit.action,
            status: apply_one(doc, &visits, edit, config),
        })
        .collect()
}

fn apply_one(doc: &mut Document, visits: &[Visit], edit: &Edit, config: &TailorConfig) -> OutcomeStatus {
    let Some(target) = Target::new(&edit.target_text) else {
        return OutcomeStatus::Skipped {
            reason: SkipReason::EmptyTarget,
        };
    };
    if edit.new_content.trim().is_empty() {
        return OutcomeStatus::Skipped {
            reason: SkipReason::EmptyContent,
        };
    }
    if edit.action == EditAction::Other {
        return OutcomeStatus::Skipped {
            reason: SkipReason::UnknownAction,
        };
    }

    // (paragraphs, cross-run rebuilds), indexed by `Visit::fallback`.
    let mut counts = [(0, 0); 2];
    for visit in visits {
        let mutation = mutate::apply(
            doc.tree_mut(visit.part),
            visit.paragraph,
            &target,
            &edit.new_content,
            edit.action,
        );
        if !mutation.is_applied() {
            continue;
        }
        doc.mark_dirty(visit.part);
        let count = &mut counts[usize::from(visit.fallback)];
        count.0 += 1;
        if mutation == Mutation::Rebuilt {
            count.1 += 1;
        }
        debug!(part = ?visit.part, fallback = visit.fallback, ?mutation, target = %target.normalized(), "paragraph mutated");
    }

    let [primary, fallback] = counts;
    let (paragraphs, cross_run_rebuilds) = if primary.0 > 0 { primary } else { fallback };
    if paragraphs > 0 {
        return OutcomeStatus::Applied {
            paragraphs,
            cross_run_rebuilds,
        };
    }

    let closest = if config.closest_match_hint {
        closest_paragraph(doc, visits, &target)
    } else {
        None
    };
    warn!(
        target = %target.normalized(),
        closest = closest.as_ref().map(|c| c.text.as_str()),
        "edit matched no paragraph"
    );
    OutcomeStatus::NoMatch { closest }
}

fn closest_paragraph(doc: &Document, visits: &[Visit], target: &Target) -> Option<ClosestMatch> {
    visits
        .iter()
        .map(|v| normalize(&v.paragraph.text(doc.tree(v.part))))
        .filter(|text| !text.is_empty())
        .map(|text| {
            let score = similarity(target.normalized(), &text);
            (text, score)
        })
        .filter(|&(_, score)| score > CLOSEST_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(text, similarity)| ClosestMatch { text, similarity })
}

/// A paragraph an edit may touch.
#[derive(Debug, Clone, Copy)]
struct Visit {
    part: PartId,
    paragraph: Paragraph,
    /// Inside an `mc:Fallback` text box copy.
    fallback: bool,
}

/// Every paragraph an edit may touch, each once, in the order edits visit them:
/// body paragraphs, body tables, then headers and footers, then text boxes.
/// Text boxes follow their part: a header's boxes are visited only when
/// headers are.
fn visit_order(doc: &Document, config: &TailorConfig) -> Vec<Visit> {
    let mut order = VisitOrder {
        doc,
        seen: HashSet::new(),
        out: Vec::new(),
        fallback: false,
    };

    let mut parts = vec![doc.main()];
    if config.edit_headers_footers {
        parts.extend(doc.header_parts());
        parts.extend(doc.footer_parts());
    }
    for &part in &parts {
        order.container(part);
    }
    if config.edit_text_boxes {
        for &part in &parts {
            let tree = doc.tree(part);
            let root = doc.container(part);
            let primary = text_boxes(tree, root, true);
            for txbx in text_boxes(tree, root, false) {
                order.fallback = !primary.contains(&txbx);
                order.region(part, txbx);
            }
        }
    }
    order.out
}

struct VisitOrder<'a> {
    doc: &'a Document,
    seen: HashSet<NodeKey>,
    out: Vec<Visit>,
    fallback: bool,
}

impl VisitOrder<'_> {
    fn first_visit(&mut self, part: PartId, node: NodeId) -> bool {
        self.seen.insert(NodeKey { part, node })
    }

    fn container(&mut self, part: PartId) {
        self.region(part, self.doc.container(part));
    }

    /// Paragraphs under `container`, then its tables.
    fn region(&mut self, part: PartId, container: NodeId) {
        let (paragraphs, tables) = split_blocks(&blocks(self.doc.tree(part), container));
        for p in paragraphs {
            if self.first_visit(part, p.id()) {
                self.out.push(Visit {
                    part,
                    paragraph: p,
                    fallback: self.fallback,
                });
            }
        }
        for t in tables {
            self.table(part, t);
        }
    }

    fn table(&mut self, part: PartId, table: Table) {
        if !self.first_visit(part, table.id()) {
            return;
        }
        for row in table.grid(self.doc.tree(part)) {
            for cell in row {
                if self.first_visit(part, cell.id()) {
                    self.region(part, cell.id());
                }
            }
        }
    }
}

/// True if `output` names the same file as `source`.
fn same_artifact(source: &Path, output: &Path) -> bool {
    match (source.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == output,
    }
}
