// Analysis Module
// Remote analysis capabilities organized into specialized submodules:
// - detector_api: HTTP client for the ensemble detection service
// - classifier: per-unit classification (ensemble + generative with fallback)
// - research: whole-text source research with graceful degradation
// - statistics: verdict aggregation into word-count summaries

pub mod classifier;
pub mod detector_api;
pub mod research;
pub mod statistics;

/// Stage-relative progress callback: percentage (already offset into the
/// stage's allotted span) plus an optional detail line.
pub type ProgressFn<'a> = &'a (dyn Fn(f64, Option<&str>) + Send + Sync);

// Re-export commonly used items
pub use classifier::{
    fallback_verdict,
    ClassifyError,
    EnsembleClassifier,
    GenerativeClassifier,
    TextClassifier,
    FALLBACK_MATCH_CONFIDENCE,
    FALLBACK_MISS_CONFIDENCE,
    FALLBACK_POSITIVE_THRESHOLD,
};
pub use detector_api::{
    DetectionServiceClient,
    DetectorError,
    SentenceAnalysisResponse,
    SentenceResult,
    HEALTH_POLL_INTERVAL_SECS,
};
pub use research::{
    degraded_report,
    extract_embedded_json,
    GenerativeResearcher,
    ResearchError,
    SourceResearcher,
};
pub use statistics::summarize;
