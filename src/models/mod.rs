// Veritext Data Models
// Shared types exchanged between the orchestrator, remote clients and the UI layer

use serde::{Deserialize, Serialize};

// ============ Task & Input ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisTask {
    /// Classify each sentence as AI-generated or human-written.
    AiDetect,
    /// Classify each sentence as plagiarized or original, then research likely sources.
    PlagiarismDetect,
}

#[derive(Debug, Clone)]
pub enum AnalysisInput {
    Text(String),
    File { name: String, bytes: Vec<u8> },
}

// ============ Analysis Units & Verdicts ============

/// A contiguous sentence-level span of the analyzed text.
///
/// Invariant: `text == original[start_offset..end_offset]` (byte offsets,
/// computed after trim). Units are immutable once produced and live only for
/// the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisUnit {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictEvidence {
    #[serde(default = "default_evidence_label")]
    pub label: String,
    #[serde(default = "default_source_domain")]
    pub source_domain: String,
    /// Similarity in [0,1]; clamped on ingest regardless of what the remote returned.
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub matched_span: String,
    #[serde(default = "default_source_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub unit: AnalysisUnit,
    /// is-AI for the detection task, is-plagiarized for the plagiarism task.
    pub is_positive: bool,
    /// Confidence in [0,1]; clamped on ingest.
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<VerdictEvidence>,
}

// ============ Summary Statistics ============

/// Aggregate over a completed run. Derived, never persisted.
///
/// Invariant: `positive_word_count + negative_word_count == total_word_count`,
/// and `positive_percentage == 100 * positive / total` (0 when total is 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatistics {
    pub total_word_count: usize,
    pub positive_word_count: usize,
    pub negative_word_count: usize,
    pub positive_percentage: f64,
}

// ============ Research Report ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub overall_assessment: String,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub potential_sources: Vec<VerdictEvidence>,
}

// ============ Whole-Text Detection ============

/// Aggregate verdict from the detection service's whole-text endpoint.
/// Probability fields are percentages in [0,100], as delivered by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallDetection {
    pub is_ai: bool,
    pub confidence: f64,
    pub ai_probability: f64,
    pub human_probability: f64,
    pub most_likely_model: String,
    pub detection_method: String,
    #[serde(default)]
    pub analysis: String,
}

// ============ Progress Stages ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    pub id: String,
    pub label: String,
}

impl StageDefinition {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub label: String,
    pub status: StageStatus,
    /// Completion percentage in [0,100]; monotone while Processing, pinned at 100 once Completed.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Point-in-time view of a run handed to progress listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage_id: Option<String>,
    pub overall_progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_seconds_remaining: Option<f64>,
}

// ============ Run Outcome ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub run_id: String,
    pub task: AnalysisTask,
    pub verdicts: Vec<AnalysisVerdict>,
    pub statistics: SummaryStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_report: Option<ResearchReport>,
    pub elapsed_ms: i64,
}

// ============ Default Value Functions ============

fn default_evidence_label() -> String { "Unknown Source".to_string() }
fn default_source_domain() -> String { "unknown.com".to_string() }
fn default_source_url() -> String { "#".to_string() }

/// Clamp a remote-supplied score into [0,1]. Downstream statistics assume the
/// range holds, so this is applied on every ingest path.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
