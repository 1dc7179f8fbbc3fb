//! Sequential per-batch model dispatch with partial-failure accounting.

use crate::batch::Batch;
use crate::llm::{build_batch_prompt, ModelProvider, ModelRequest};
use crate::parser::parse_detection_response;
use crate::schemas::DetectionResult;
use tracing::{debug, info, warn};

/// Outcome of a full batch run. A failed batch contributes an error string
/// and no result; the caller decides whether total failure is fatal.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<DetectionResult>,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn all_failed(&self) -> bool {
        self.results.is_empty() && !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorOptions {
    pub temperature: f32,
    pub max_response_tokens: u32,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_response_tokens: 8000,
        }
    }
}

/// Runs one model call per batch, strictly in order, one outstanding call at
/// a time. Any failure (model call or response parse) is recorded with the
/// batch's 1-based ordinal and line range, and processing continues.
pub async fn process_batches(
    provider: &dyn ModelProvider,
    batches: &[Batch],
    options: ProcessorOptions,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (idx, batch) in batches.iter().enumerate() {
        let ordinal = idx + 1;
        debug!(
            ordinal,
            start = batch.start_line,
            end = batch.end_line,
            tokens = batch.token_count,
            "processing batch"
        );

        let (system_prompt, user_prompt) = build_batch_prompt(batch);
        let request = ModelRequest {
            system_prompt,
            user_prompt,
            temperature: options.temperature,
            max_tokens: options.max_response_tokens,
        };

        let parsed = match provider.analyze(request).await {
            Ok(response) => parse_detection_response(&response.content)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match parsed {
            Ok(result) => outcome.results.push(result),
            Err(msg) => {
                let entry = format!(
                    "Batch {} (lines {}-{}): {}",
                    ordinal, batch.start_line, batch.end_line, msg
                );
                warn!("{}", entry);
                outcome.errors.push(entry);
            }
        }
    }

    info!(
        ok = outcome.results.len(),
        failed = outcome.errors.len(),
        "batch processing complete"
    );

    outcome
}
