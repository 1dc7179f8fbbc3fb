//! Token-bounded batching of formatted lines.
//!
//! Token limits bound batches, never lines: a line that alone exceeds the
//! budget is emitted as its own singleton batch rather than split mid-line.

use crate::error::DetectError;
use crate::format::FormattedLine;
use tracing::debug;

/// Deterministic token counting for batch sizing. Must return the same count
/// for identical input.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Character-based token estimate, roughly four characters per token for
/// typical model tokenizers. Good enough for batch sizing.
#[derive(Debug, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

/// A contiguous token-bounded slice of the formatted file.
///
/// Across the full ordered set for one file, batch ranges are contiguous and
/// non-overlapping, covering exactly `[1, total_lines]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub token_count: usize,
}

impl Batch {
    fn from_lines(lines: &[FormattedLine], token_count: usize) -> Self {
        debug_assert!(!lines.is_empty());
        Self {
            start_line: lines[0].line_number,
            end_line: lines[lines.len() - 1].line_number,
            content: lines
                .iter()
                .map(FormattedLine::render)
                .collect::<Vec<_>>()
                .join("\n"),
            token_count,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

/// Greedily partitions `lines` into batches of at most `max_tokens` tokens.
///
/// A line's cost includes its terminator. Oversized lines flush the pending
/// batch and go out alone; otherwise the current batch is flushed just
/// before it would overflow. Flattening the result reproduces the input line
/// sequence exactly.
pub fn split_into_batches(
    lines: &[FormattedLine],
    max_tokens: usize,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Batch>, DetectError> {
    if max_tokens == 0 {
        return Err(DetectError::Config(
            "max tokens per batch must be positive".to_string(),
        ));
    }

    let mut batches = Vec::new();
    let mut pending: Vec<FormattedLine> = Vec::new();
    let mut pending_tokens = 0usize;

    for line in lines {
        // Terminator included in the cost so joined content stays in budget.
        let cost = tokenizer.count(&format!("{}\n", line.render()));

        if cost > max_tokens {
            if !pending.is_empty() {
                batches.push(Batch::from_lines(&pending, pending_tokens));
                pending.clear();
                pending_tokens = 0;
            }
            batches.push(Batch::from_lines(std::slice::from_ref(line), cost));
            continue;
        }

        if pending_tokens + cost > max_tokens && !pending.is_empty() {
            batches.push(Batch::from_lines(&pending, pending_tokens));
            pending.clear();
            pending_tokens = 0;
        }

        pending.push(line.clone());
        pending_tokens += cost;
    }

    if !pending.is_empty() {
        batches.push(Batch::from_lines(&pending, pending_tokens));
    }

    debug!(
        batches = batches.len(),
        lines = lines.len(),
        max_tokens,
        "split source into batches"
    );

    Ok(batches)
}
