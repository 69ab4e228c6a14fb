// Analysis Orchestrator
// Top-level driver for one analysis run: extraction, segmentation, remote
// classification, optional source research, statistics, and progress updates.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    AnalysisInput, AnalysisOutcome, AnalysisTask, StageDefinition,
};
use crate::services::analysis::{
    summarize, ClassifyError, ResearchError, SourceResearcher, TextClassifier,
};
use crate::services::document_extractor::{extract_text, DocumentFormat, ExtractError};
use crate::services::progress::ProgressCoordinator;
use crate::services::sentence_segmenter::{segment, REMOTE_SEGMENT_MIN_CHARS, SEGMENT_MIN_CHARS};
use crate::services::text_processor::normalize_punctuation;

/// How long the finished stage list stays visible after success.
pub const SUCCESS_HIDE_DELAY_MS: u64 = 1200;
/// Longer after failure, so the error detail can be read.
pub const FAILURE_HIDE_DELAY_MS: u64 = 4000;

// Span allotted to the classification stage's callbacks; the small base leaves
// room for the handoff tick that precedes the first unit.
const ANALYSIS_BASE: f64 = 2.0;
const ANALYSIS_SPAN: f64 = 98.0;
const RESEARCH_BASE: f64 = 2.0;
const RESEARCH_SPAN: f64 = 98.0;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("analysis failed: {0}")]
    Classification(String),
    #[error("research provider is not configured")]
    NotConfigured,
}

impl From<ClassifyError> for OrchestratorError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::NotConfigured => Self::NotConfigured,
            ClassifyError::Service(inner) => Self::Classification(inner.to_string()),
        }
    }
}

impl From<ResearchError> for OrchestratorError {
    fn from(e: ResearchError) -> Self {
        match e {
            ResearchError::NotConfigured => Self::NotConfigured,
        }
    }
}

fn stage_definitions(task: AnalysisTask) -> Vec<StageDefinition> {
    let mut stages = vec![
        StageDefinition::new("parsing", "Parsing document"),
        StageDefinition::new("analysis", "Analyzing content"),
    ];
    if task == AnalysisTask::PlagiarismDetect {
        stages.push(StageDefinition::new("research", "Researching sources"));
    }
    stages.push(StageDefinition::new("finalizing", "Finalizing results"));
    stages
}

pub struct AnalysisOrchestrator<C, R> {
    progress: ProgressCoordinator,
    classifier: C,
    researcher: R,
}

impl<C: TextClassifier + Sync, R: SourceResearcher + Sync> AnalysisOrchestrator<C, R> {
    pub fn new(progress: ProgressCoordinator, classifier: C, researcher: R) -> Self {
        Self {
            progress,
            classifier,
            researcher,
        }
    }

    pub fn progress(&self) -> &ProgressCoordinator {
        &self.progress
    }

    /// Run one analysis task to completion or hard failure.
    ///
    /// On failure nothing computed so far is returned; the failed stage keeps
    /// its error detail on screen until the delayed hide clears it.
    pub async fn run(
        &self,
        task: AnalysisTask,
        input: AnalysisInput,
    ) -> Result<AnalysisOutcome, OrchestratorError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let hint = match &input {
            AnalysisInput::Text(text) => Some(text.clone()),
            AnalysisInput::File { .. } => None,
        };
        self.progress.start(&stage_definitions(task), hint.as_deref());
        info!("[ORCHESTRATOR] Run {} started, task={:?}", run_id, task);

        match self.execute(task, input, &run_id, started).await {
            Ok(outcome) => {
                self.progress.complete("finalizing");
                self.progress
                    .schedule_hide(Duration::from_millis(SUCCESS_HIDE_DELAY_MS));
                info!(
                    "[ORCHESTRATOR] Run {} finished: {} verdicts, {:.1}% positive, elapsed_ms={}",
                    run_id,
                    outcome.verdicts.len(),
                    outcome.statistics.positive_percentage,
                    outcome.elapsed_ms
                );
                Ok(outcome)
            }
            Err(err) => {
                let stage = self
                    .progress
                    .current_stage_id()
                    .unwrap_or_else(|| "parsing".to_string());
                warn!("[ORCHESTRATOR] Run {} failed at {}: {}", run_id, stage, err);
                self.progress.fail(&stage, &err.to_string());
                self.progress
                    .schedule_hide(Duration::from_millis(FAILURE_HIDE_DELAY_MS));
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        task: AnalysisTask,
        input: AnalysisInput,
        run_id: &str,
        started: Instant,
    ) -> Result<AnalysisOutcome, OrchestratorError> {
        self.progress.advance("parsing", 10.0, Some("Reading input"));
        let raw_text = match input {
            AnalysisInput::Text(text) => text,
            AnalysisInput::File { name, bytes } => {
                let format = DocumentFormat::from_name(&name)
                    .ok_or_else(|| ExtractError::UnsupportedFormat(name.clone()))?;
                extract_text(&bytes, format)?
            }
        };
        let text = normalize_punctuation(&raw_text);

        self.progress
            .advance("parsing", 60.0, Some("Segmenting sentences"));
        let min_chars = match task {
            AnalysisTask::AiDetect => SEGMENT_MIN_CHARS,
            AnalysisTask::PlagiarismDetect => REMOTE_SEGMENT_MIN_CHARS,
        };
        let units = segment(&text, min_chars);
        info!("[ORCHESTRATOR] Run {}: {} units", run_id, units.len());
        self.progress.complete("parsing");

        let verdicts = self
            .classifier
            .classify_units(&text, &units, ANALYSIS_BASE, ANALYSIS_SPAN, &|pct, detail| {
                self.progress.advance("analysis", pct, detail)
            })
            .await?;
        self.progress.complete("analysis");

        let overall = match task {
            AnalysisTask::AiDetect => self.classifier.overall_assessment(&text).await,
            AnalysisTask::PlagiarismDetect => None,
        };

        let research_report = if task == AnalysisTask::PlagiarismDetect {
            let report = self
                .researcher
                .research_sources(&text, RESEARCH_BASE, RESEARCH_SPAN, &|pct, detail| {
                    self.progress.advance("research", pct, detail)
                })
                .await?;
            self.progress.complete("research");
            Some(report)
        } else {
            None
        };

        self.progress
            .advance("finalizing", 40.0, Some("Computing statistics"));
        // The research report contributes no word counts; statistics come from
        // classification verdicts only.
        let statistics = summarize(&text, &verdicts);

        Ok(AnalysisOutcome {
            run_id: run_id.to_string(),
            task,
            verdicts,
            statistics,
            overall,
            research_report,
            elapsed_ms: started.elapsed().as_millis() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnalysisUnit, AnalysisVerdict, OverallDetection, ProgressSnapshot, ResearchReport,
        RiskLevel, StageStatus,
    };
    use crate::services::analysis::{fallback_verdict, ProgressFn};
    use crate::services::progress::ProgressListener;
    use std::sync::{Arc, Mutex};

    // Deterministic fakes for the capability seams.

    struct FakeClassifier {
        fail_index: Option<usize>,
        hard_fail: bool,
    }

    impl TextClassifier for FakeClassifier {
        async fn classify_units(
            &self,
            _text: &str,
            units: &[AnalysisUnit],
            base: f64,
            span: f64,
            on_progress: ProgressFn<'_>,
        ) -> Result<Vec<AnalysisVerdict>, ClassifyError> {
            if self.hard_fail {
                return Err(ClassifyError::NotConfigured);
            }
            let total = units.len().max(1);
            let verdicts = units
                .iter()
                .enumerate()
                .map(|(i, unit)| {
                    on_progress(base + ((i + 1) as f64 / total as f64) * span, None);
                    if self.fail_index == Some(i) {
                        fallback_verdict(unit)
                    } else {
                        AnalysisVerdict {
                            unit: unit.clone(),
                            is_positive: i % 2 == 0,
                            confidence: 0.9,
                            evidence: Vec::new(),
                        }
                    }
                })
                .collect();
            Ok(verdicts)
        }

        async fn overall_assessment(&self, _text: &str) -> Option<OverallDetection> {
            Some(OverallDetection {
                is_ai: true,
                confidence: 88.0,
                ai_probability: 88.0,
                human_probability: 12.0,
                most_likely_model: "test-model".to_string(),
                detection_method: "Fake".to_string(),
                analysis: String::new(),
            })
        }
    }

    struct FakeResearcher {
        configured: bool,
    }

    impl SourceResearcher for FakeResearcher {
        async fn research_sources(
            &self,
            _text: &str,
            base: f64,
            span: f64,
            on_progress: ProgressFn<'_>,
        ) -> Result<ResearchReport, ResearchError> {
            if !self.configured {
                return Err(ResearchError::NotConfigured);
            }
            on_progress(base + span, Some("Research complete"));
            Ok(ResearchReport {
                overall_assessment: "Looks mostly original.".to_string(),
                risk_level: RiskLevel::Low,
                recommendations: vec!["No action needed.".to_string()],
                potential_sources: Vec::new(),
            })
        }
    }

    struct RecordingListener(Mutex<Vec<ProgressSnapshot>>);
    impl ProgressListener for RecordingListener {
        fn on_update(&self, snapshot: &ProgressSnapshot) {
            self.0.lock().unwrap().push(snapshot.clone());
        }
    }

    const SAMPLE: &str = "The first sentence carries enough words to analyze. \
        A second sentence also carries enough words to analyze. \
        And the third one rounds out this very small document.";

    #[tokio::test]
    async fn test_ai_detect_run_produces_outcome() {
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::new(),
            FakeClassifier { fail_index: None, hard_fail: false },
            FakeResearcher { configured: true },
        );
        let outcome = orchestrator
            .run(AnalysisTask::AiDetect, AnalysisInput::Text(SAMPLE.to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.task, AnalysisTask::AiDetect);
        assert_eq!(outcome.verdicts.len(), 3);
        assert!(outcome.overall.is_some());
        assert!(outcome.research_report.is_none());
        assert_eq!(
            outcome.statistics.positive_word_count + outcome.statistics.negative_word_count,
            outcome.statistics.total_word_count
        );
    }

    #[tokio::test]
    async fn test_plagiarism_run_includes_research_report() {
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::new(),
            FakeClassifier { fail_index: Some(1), hard_fail: false },
            FakeResearcher { configured: true },
        );
        let outcome = orchestrator
            .run(
                AnalysisTask::PlagiarismDetect,
                AnalysisInput::Text(SAMPLE.to_string()),
            )
            .await
            .unwrap();

        assert!(outcome.overall.is_none());
        let report = outcome.research_report.unwrap();
        assert_eq!(report.risk_level, RiskLevel::Low);
        // One unit fell back to the heuristic; the batch still completed.
        assert_eq!(outcome.verdicts.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_run_reports_stage_error_and_returns_nothing() {
        let listener = Arc::new(RecordingListener(Mutex::new(Vec::new())));
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::with_listener(listener.clone()),
            FakeClassifier { fail_index: None, hard_fail: true },
            FakeResearcher { configured: true },
        );
        let result = orchestrator
            .run(AnalysisTask::AiDetect, AnalysisInput::Text(SAMPLE.to_string()))
            .await;
        assert!(matches!(result, Err(OrchestratorError::NotConfigured)));

        // The stage list is still visible with the error recorded; the parsing
        // stage it completed beforehand is untouched.
        let snap = orchestrator.progress().snapshot().unwrap();
        let analysis = snap.stages.iter().find(|s| s.id == "analysis").unwrap();
        assert_eq!(analysis.status, StageStatus::Error);
        assert!(analysis.detail.is_some());
        let parsing = snap.stages.iter().find(|s| s.id == "parsing").unwrap();
        assert_eq!(parsing.status, StageStatus::Completed);
    }

    #[tokio::test]
    async fn test_unsupported_file_format_rejects_run() {
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::new(),
            FakeClassifier { fail_index: None, hard_fail: false },
            FakeResearcher { configured: true },
        );
        let result = orchestrator
            .run(
                AnalysisTask::AiDetect,
                AnalysisInput::File {
                    name: "essay.odt".to_string(),
                    bytes: vec![0u8; 16],
                },
            )
            .await;
        assert!(matches!(result, Err(OrchestratorError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_text_file_input_is_extracted_and_analyzed() {
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::new(),
            FakeClassifier { fail_index: None, hard_fail: false },
            FakeResearcher { configured: true },
        );
        let outcome = orchestrator
            .run(
                AnalysisTask::AiDetect,
                AnalysisInput::File {
                    name: "essay.txt".to_string(),
                    bytes: SAMPLE.as_bytes().to_vec(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.verdicts.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_yields_zero_units_not_error() {
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::new(),
            FakeClassifier { fail_index: None, hard_fail: false },
            FakeResearcher { configured: true },
        );
        let outcome = orchestrator
            .run(AnalysisTask::AiDetect, AnalysisInput::Text("Hi. No.".to_string()))
            .await
            .unwrap();
        assert!(outcome.verdicts.is_empty());
        assert_eq!(outcome.statistics.positive_word_count, 0);
    }

    #[tokio::test]
    async fn test_progress_reaches_completion_in_order() {
        let listener = Arc::new(RecordingListener(Mutex::new(Vec::new())));
        let orchestrator = AnalysisOrchestrator::new(
            ProgressCoordinator::with_listener(listener.clone()),
            FakeClassifier { fail_index: None, hard_fail: false },
            FakeResearcher { configured: true },
        );
        orchestrator
            .run(
                AnalysisTask::PlagiarismDetect,
                AnalysisInput::Text(SAMPLE.to_string()),
            )
            .await
            .unwrap();

        let snapshots = listener.0.lock().unwrap();
        assert!(!snapshots.is_empty());
        // Overall progress never decreases across updates within the run.
        let overalls: Vec<f64> = snapshots
            .iter()
            .filter(|s| !s.stages.is_empty())
            .map(|s| s.overall_progress)
            .collect();
        for pair in overalls.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-9);
        }
        // The final state before hiding has every stage completed.
        let last = snapshots.iter().rev().find(|s| !s.stages.is_empty()).unwrap();
        assert!(last
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Completed));
    }
}
