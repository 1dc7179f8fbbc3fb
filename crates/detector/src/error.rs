use thiserror::Error;

/// Top-level error taxonomy for a detection run.
///
/// Per-batch failures are deliberately not represented here: they are
/// collected as strings inside [`crate::processor::BatchOutcome`] and only
/// escalate to [`DetectError::AllBatchesFailed`] when no batch succeeded.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("All {} batches failed:\n{}", errors.len(), errors.join("\n"))]
    AllBatchesFailed { errors: Vec<String> },
}

impl DetectError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_batches_failed_concatenates_messages() {
        let err = DetectError::AllBatchesFailed {
            errors: vec![
                "Batch 1 (lines 1-10): timeout".to_string(),
                "Batch 2 (lines 11-20): bad json".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("All 2 batches failed"));
        assert!(msg.contains("Batch 1 (lines 1-10): timeout"));
        assert!(msg.contains("Batch 2 (lines 11-20): bad json"));
    }
}
