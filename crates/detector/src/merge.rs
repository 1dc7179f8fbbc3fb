//! Deterministic merging of per-batch detection results.
//!
//! Deduplication is a single greedy pass against already-accepted regions,
//! not a full pairwise reconciliation: stable sort by start, then each
//! region either replaces an overlapping accepted region of strictly lower
//! confidence or is discarded (tie keeps the accepted one). Downstream
//! consumers rely on exactly this first-wins behavior.

use crate::schemas::{DetectionRegion, DetectionResult, Summary};
use tracing::debug;

const FALLBACK_RECOMMENDATION: &str =
    "Set breakpoints at the reported dispatcher loop entries and opcode-fetch lines.";

/// Combines per-batch results into one whole-file result. A fresh value is
/// built; inputs are never edited in place.
pub fn merge_results(results: &[DetectionResult]) -> DetectionResult {
    if results.is_empty() {
        return DetectionResult::default();
    }

    let overall_description = results
        .iter()
        .enumerate()
        .map(|(idx, r)| format!("Batch {}: {}", idx + 1, r.summary.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let debugging_recommendation = results
        .last()
        .and_then(|r| r.summary.debugging_recommendation())
        .unwrap_or(FALLBACK_RECOMMENDATION)
        .to_string();

    // first non-null named descriptor wins, in input order
    let global_bytecode = results
        .iter()
        .filter_map(|r| r.global_bytecode.as_ref())
        .find(|g| g.variable_name.is_some())
        .cloned();

    let mut regions: Vec<DetectionRegion> = results
        .iter()
        .flat_map(|r| r.regions.iter().cloned())
        .collect();
    regions.sort_by_key(|r| r.start);

    let deduped = dedup_regions(regions);

    debug!(
        inputs = results.len(),
        regions = deduped.len(),
        "merged batch results"
    );

    DetectionResult {
        summary: Summary::Structured {
            overall_description,
            debugging_recommendation,
        },
        global_bytecode,
        regions: deduped,
    }
}

fn dedup_regions(sorted: Vec<DetectionRegion>) -> Vec<DetectionRegion> {
    let mut accepted: Vec<DetectionRegion> = Vec::with_capacity(sorted.len());

    'next: for region in sorted {
        for existing in accepted.iter_mut() {
            if existing.overlaps(&region) {
                if region.confidence > existing.confidence {
                    *existing = region;
                }
                continue 'next;
            }
        }
        accepted.push(region);
    }

    accepted
}
