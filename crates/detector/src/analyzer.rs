//! End-to-end pipeline: beautify, format, batch, dispatch, merge, render.

use crate::batch::{split_into_batches, Tokenizer};
use crate::config::{DetectorConfig, ProviderConfig};
use crate::error::DetectError;
use crate::format::{format_line_range, format_lines, Beautifier, FormattedLine, PlainBeautifier};
use crate::llm::{MockProvider, ModelProvider, OpenAiProvider};
use crate::merge::merge_results;
use crate::processor::{process_batches, ProcessorOptions};
use crate::report::render_report;
use crate::schemas::DetectionResult;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a successful run. Partial failure is still success: callers
/// must inspect `partial_errors` to know the run was incomplete.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub report: String,
    pub merged: DetectionResult,
    pub partial_errors: Vec<String>,
}

impl AnalysisOutcome {
    pub fn is_complete(&self) -> bool {
        self.partial_errors.is_empty()
    }
}

pub struct Analyzer {
    provider: Arc<dyn ModelProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    beautifier: Arc<dyn Beautifier>,
    config: DetectorConfig,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Builds an analyzer from a resolved config. Fails fast on
    /// configuration errors, before any batch work.
    pub fn from_config(config: DetectorConfig) -> Result<Self, DetectError> {
        let provider: Arc<dyn ModelProvider> = match &config.provider {
            ProviderConfig::OpenAi {
                model,
                api_key,
                base_url,
            } => {
                let key = api_key.clone().ok_or_else(|| {
                    DetectError::Config(
                        "OpenAI API key not configured (set OPENAI_API_KEY or pass --openai-api-key)"
                            .to_string(),
                    )
                })?;
                let provider = match base_url {
                    Some(url) => OpenAiProvider::with_base_url(key, model.clone(), url.clone()),
                    None => OpenAiProvider::new(key, model.clone()),
                };
                Arc::new(provider.with_limits(config.timeout_seconds, config.retry_attempts))
            }
            ProviderConfig::Mock => Arc::new(MockProvider::new()),
        };

        Ok(Self::new(provider, config))
    }

    pub fn new(provider: Arc<dyn ModelProvider>, config: DetectorConfig) -> Self {
        let beautifier = Arc::new(PlainBeautifier::new(config.literal_char_limit));
        Self {
            provider,
            tokenizer: Arc::new(crate::batch::HeuristicTokenizer),
            beautifier,
            config,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_beautifier(mut self, beautifier: Arc<dyn Beautifier>) -> Self {
        self.beautifier = beautifier;
        self
    }

    /// Analyzes a whole file.
    pub async fn analyze_file(&self, path: &Path) -> Result<AnalysisOutcome, DetectError> {
        self.analyze_file_range(path, None).await
    }

    /// Analyzes a restricted line range of a file; the range is clamped into
    /// the file the same way [`format_line_range`] does.
    pub async fn analyze_file_range(
        &self,
        path: &Path,
        range: Option<(u32, u32)>,
    ) -> Result<AnalysisOutcome, DetectError> {
        if !path.exists() {
            return Err(DetectError::Input(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let source = self
            .beautifier
            .beautify(path)
            .map_err(|e| DetectError::Input(e.to_string()))?;

        let lines = match range {
            Some((start, end)) => {
                format_line_range(&source.code, source.resolver.as_ref(), start, end)
            }
            None => format_lines(&source.code, source.resolver.as_ref()),
        };

        info!(
            file = %path.display(),
            lines = lines.len(),
            model = self.provider.model_name(),
            "starting JSVMP analysis"
        );

        self.analyze_lines(&path.display().to_string(), &lines)
            .await
    }

    /// Core orchestration over already-formatted lines.
    pub async fn analyze_lines(
        &self,
        file_label: &str,
        lines: &[FormattedLine],
    ) -> Result<AnalysisOutcome, DetectError> {
        let batches = split_into_batches(
            lines,
            self.config.max_tokens_per_batch,
            self.tokenizer.as_ref(),
        )?;

        let options = ProcessorOptions {
            temperature: self.config.temperature,
            max_response_tokens: self.config.max_response_tokens,
        };
        let outcome = process_batches(self.provider.as_ref(), &batches, options).await;

        if outcome.all_failed() {
            return Err(DetectError::AllBatchesFailed {
                errors: outcome.errors,
            });
        }

        if !outcome.errors.is_empty() {
            warn!(
                failed = outcome.errors.len(),
                "run completed with partial batch failures"
            );
        }

        let merged = merge_results(&outcome.results);
        let report = render_report(file_label, &merged);

        Ok(AnalysisOutcome {
            report,
            merged,
            partial_errors: outcome.errors,
        })
    }
}
