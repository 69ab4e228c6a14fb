// Veritext Core Services

pub mod analysis;
pub mod config_store;
pub mod document_extractor;
pub mod orchestrator;
pub mod progress;
pub mod providers;
pub mod sentence_segmenter;
pub mod text_processor;

pub use config_store::*;
pub use document_extractor::{extract_text, DocumentFormat, ExtractError};
pub use orchestrator::{
    AnalysisOrchestrator, OrchestratorError, FAILURE_HIDE_DELAY_MS, SUCCESS_HIDE_DELAY_MS,
};
pub use progress::{ProgressCoordinator, ProgressListener};
pub use providers::*;
pub use sentence_segmenter::{
    segment, sentence_count, REMOTE_SEGMENT_MIN_CHARS, SEGMENT_MIN_CHARS,
};
pub use text_processor::{count_words, normalize_punctuation};

// Re-export analysis module items
pub use analysis::{
    degraded_report,
    extract_embedded_json,
    fallback_verdict,
    summarize,
    ClassifyError,
    DetectionServiceClient,
    DetectorError,
    EnsembleClassifier,
    GenerativeClassifier,
    GenerativeResearcher,
    ProgressFn,
    ResearchError,
    SourceResearcher,
    TextClassifier,
    HEALTH_POLL_INTERVAL_SECS,
};
