//! vmprobe-detector: JSVMP detection pipeline.
//!
//! Splits a beautified JavaScript file into token-bounded batches, dispatches
//! each batch to a pluggable model backend, validates the heterogeneous JSON
//! responses, and deterministically merges overlapping detections into one
//! report. Pattern recognition itself is delegated to the model; this crate
//! is orchestration, validation and aggregation around that opaque call.

pub mod analyzer;
pub mod batch;
pub mod config;
pub mod error;
pub mod format;
pub mod llm;
pub mod merge;
pub mod parser;
pub mod processor;
pub mod report;
pub mod schemas;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use batch::{split_into_batches, Batch, HeuristicTokenizer, Tokenizer};
pub use config::{DetectorConfig, ProviderConfig};
pub use error::DetectError;
pub use format::{
    format_line_range, format_lines, truncate_string_literals, Beautifier, FormattedLine,
    SourceMapResolver,
};
pub use llm::{MockProvider, ModelError, ModelProvider, OpenAiProvider};
pub use merge::merge_results;
pub use parser::parse_detection_response;
pub use processor::{process_batches, BatchOutcome, ProcessorOptions};
pub use report::render_report;
pub use schemas::{
    Confidence, DetectionRegion, DetectionResult, GlobalBytecodeInfo, RegionType, Summary,
    VmComponentVariable, VmComponents,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
