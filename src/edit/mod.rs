//! Fuzzy edit engine for paragraph runs.
//!
//! An edit's target was computed against extracted, whitespace-normalized
//! text, so it rarely lines up with the document's run boundaries. The
//! engine locates it in escalating tiers and mutates the paragraph in the
//! least destructive way the tier allows.
//!
//! # Layers
//!
//! 1. [`normalize`]: whitespace collapsing, the tolerant target pattern and
//!    replacement bullet cleanup
//! 2. [`locate`]: exact run, normalized run, or cross-run match
//! 3. [`mutate`]: single-run rewrite, paragraph rebuild, or append
//! 4. [`levenshtein`] and [`diff`]: diagnostics for edits that missed and
//!    for reviewing what changed

pub mod diff;
pub mod levenshtein;
pub mod locate;
pub mod mutate;
pub mod normalize;

pub use locate::{Match, Tier, locate};
pub use mutate::{Mutation, apply};
pub use normalize::{Target, normalize};
