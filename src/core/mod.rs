//! Core reconciliation logic.
//!
//! This module contains:
//! - Codec: primitive facts to typed datavalues
//! - Synthesizer: desired claims for a photo
//! - Extractor: which photo a file came from
//! - Comparator / Planner: diffing desired against existing claims
//! - Backfill: per-file reconciliation and the batch runner
//! - RunLog: append-only run logging

pub mod backfill;
pub mod codec;
pub mod comparator;
pub mod extractor;
pub mod planner;
pub mod retry;
pub mod run_log;
pub mod synthesizer;

// Re-export commonly used types
pub use backfill::{Backfiller, FileUpdate, ReplacePolicy, RunOptions, RunSummary};
pub use codec::{CodecError, DatePrecision};
pub use comparator::{equivalent, equivalent_snaks};
pub use extractor::{extract, ExtractError, IdentifierMatch, Provenance};
pub use planner::plan;
pub use retry::RetryPolicy;
pub use run_log::{generate_idempotency_key, hash_input, plan_hash, RunLog};
pub use synthesizer::{ClaimSynthesizer, PartialFacts, PhotoEvidence, Synthesis};

use crate::domain::{DesiredClaims, Vocabulary};

/// Desired claims for a photo, using the given vocabulary
pub fn synthesize(vocabulary: &Vocabulary, request: &Synthesis) -> DesiredClaims {
    ClaimSynthesizer::new(vocabulary.clone()).synthesize(request)
}
