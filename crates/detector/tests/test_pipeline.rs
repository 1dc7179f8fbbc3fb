//! End-to-end pipeline tests driven by the mock provider: formatting,
//! batching, sequential dispatch, merge and report rendering together.

use std::sync::Arc;

use vmprobe_detector::{
    format_lines, Analyzer, Confidence, DetectError, DetectorConfig, FormattedLine, MockProvider,
    ProviderConfig, Tokenizer,
};
use vmprobe_detector::format::NoSourceMap;

/// Small per-line cost so a handful of lines spans several batches.
struct LineCostTokenizer;

impl Tokenizer for LineCostTokenizer {
    fn count(&self, _text: &str) -> usize {
        10
    }
}

fn mock_config() -> DetectorConfig {
    DetectorConfig {
        provider: ProviderConfig::Mock,
        max_tokens_per_batch: 20, // two lines per batch with LineCostTokenizer
        ..Default::default()
    }
}

fn analyzer_with(provider: MockProvider) -> Analyzer {
    Analyzer::new(Arc::new(provider), mock_config())
        .with_tokenizer(Arc::new(LineCostTokenizer))
}

fn six_lines() -> Vec<FormattedLine> {
    format_lines("a;\nb;\nc;\nd;\ne;\nf;", &NoSourceMap)
}

fn region_json(start: u32, end: u32, confidence: &str, desc: &str) -> String {
    format!(
        r#"{{"start_line":{},"end_line":{},"type":"Switch Dispatcher","confidence":"{}","description":"{}"}}"#,
        start, end, confidence, desc
    )
}

#[tokio::test]
async fn test_full_run_merges_batches_in_position_order() {
    // three batches report regions out of positional order: 100, 50, 10
    let provider = MockProvider::new().with_sequence(vec![
        Ok(format!(
            r#"{{"summary":"batch one","regions":[{}]}}"#,
            region_json(100, 110, "high", "first reported")
        )),
        Ok(format!(
            r#"{{"summary":"batch two","regions":[{}]}}"#,
            region_json(50, 60, "high", "second reported")
        )),
        Ok(format!(
            r#"{{"summary":{{"overall_description":"batch three","debugging_recommendation":"break at 10"}},"regions":[{}]}}"#,
            region_json(10, 20, "high", "third reported")
        )),
    ]);

    let analyzer = analyzer_with(provider);
    let outcome = analyzer.analyze_lines("target.js", &six_lines()).await.unwrap();

    assert!(outcome.is_complete());
    let starts: Vec<u32> = outcome.merged.regions.iter().map(|r| r.start).collect();
    assert_eq!(starts, vec![10, 50, 100]);

    assert_eq!(
        outcome.merged.summary.description(),
        "Batch 1: batch one\nBatch 2: batch two\nBatch 3: batch three"
    );
    assert_eq!(
        outcome.merged.summary.debugging_recommendation(),
        Some("break at 10")
    );

    assert!(outcome.report.contains("File: target.js"));
    assert!(outcome.report.contains("Detected Regions (3)"));
}

#[tokio::test]
async fn test_overlapping_detections_deduplicate_by_confidence() {
    let provider = MockProvider::new().with_sequence(vec![
        Ok(format!(
            r#"{{"summary":"one","regions":[{}]}}"#,
            region_json(10, 20, "low", "weak claim")
        )),
        Ok(format!(
            r#"{{"summary":"two","regions":[{}]}}"#,
            region_json(20, 40, "high", "strong claim")
        )),
        Ok(r#"{"summary":"three","regions":[]}"#.to_string()),
    ]);

    let analyzer = analyzer_with(provider);
    let outcome = analyzer.analyze_lines("target.js", &six_lines()).await.unwrap();

    assert_eq!(outcome.merged.regions.len(), 1);
    assert_eq!(outcome.merged.regions[0].confidence, Confidence::High);
    assert_eq!(outcome.merged.regions[0].description, "strong claim");
}

#[tokio::test]
async fn test_partial_failure_is_success_with_attached_errors() {
    let provider = MockProvider::new().with_sequence(vec![
        Ok(format!(
            r#"{{"summary":"one","regions":[{}]}}"#,
            region_json(1, 2, "medium", "kept")
        )),
        Err("rate limited".to_string()),
        Ok(r#"{"summary":"three","regions":[]}"#.to_string()),
    ]);

    let analyzer = analyzer_with(provider);
    let outcome = analyzer.analyze_lines("target.js", &six_lines()).await.unwrap();

    assert!(!outcome.is_complete());
    assert_eq!(outcome.partial_errors.len(), 1);
    assert!(outcome.partial_errors[0].contains("Batch 2 (lines 3-4)"));
    assert!(outcome.partial_errors[0].contains("rate limited"));
    assert_eq!(outcome.merged.regions.len(), 1);
}

#[tokio::test]
async fn test_total_failure_propagates_as_error() {
    let analyzer = analyzer_with(MockProvider::failing());

    let err = analyzer
        .analyze_lines("target.js", &six_lines())
        .await
        .unwrap_err();

    match err {
        DetectError::AllBatchesFailed { errors } => {
            assert_eq!(errors.len(), 3);
            assert!(errors[0].starts_with("Batch 1 (lines 1-2):"));
            assert!(errors[2].starts_with("Batch 3 (lines 5-6):"));
        }
        other => panic!("expected AllBatchesFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_batch_response_recorded_not_fatal() {
    let provider = MockProvider::new().with_sequence(vec![
        Ok(r#"{"regions":[]}"#.to_string()), // summary missing
        Ok(r#"{"summary":"fine","regions":[]}"#.to_string()),
        Ok(r#"{"summary":"fine","regions":[]}"#.to_string()),
    ]);

    let analyzer = analyzer_with(provider);
    let outcome = analyzer.analyze_lines("target.js", &six_lines()).await.unwrap();

    assert_eq!(outcome.partial_errors.len(), 1);
    assert!(outcome.partial_errors[0].contains("summary"));
}
