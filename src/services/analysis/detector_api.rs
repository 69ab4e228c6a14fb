// Detection Service Client
// HTTP client for the hosted ensemble-model detection service: per-sentence
// analysis, whole-text analysis, and the health poll that gates the task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::OverallDetection;

/// Recommended health poll interval.
pub const HEALTH_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("service reported failure: {0}")]
    BadStatus(String),
    #[error("JSON parse error: {0}")]
    JsonError(String),
}

// ============ Wire Types ============

#[derive(Debug, Clone, Serialize)]
struct DetectRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceResult {
    pub text: String,
    #[serde(rename = "isAI", default)]
    pub is_ai: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub start_index: i64,
    #[serde(default)]
    pub end_index: i64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceStats {
    #[serde(default)]
    pub total_sentences: i64,
    #[serde(default)]
    pub ai_sentences: i64,
    #[serde(default)]
    pub human_sentences: i64,
    #[serde(default)]
    pub ai_percentage: f64,
    #[serde(default)]
    pub human_percentage: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceMetadata {
    #[serde(default)]
    pub text_length: i64,
    #[serde(default)]
    pub word_count: i64,
    #[serde(default)]
    pub detection_method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentenceAnalysisResponse {
    #[serde(default)]
    pub results: Vec<SentenceResult>,
    #[serde(default)]
    pub stats: SentenceStats,
    #[serde(default)]
    pub metadata: SentenceMetadata,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverallResponse {
    #[serde(rename = "isAI", default)]
    is_ai: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(rename = "aiProb", default)]
    ai_prob: f64,
    #[serde(rename = "humanProb", default)]
    human_prob: f64,
    #[serde(default)]
    most_likely_model: String,
    #[serde(default)]
    detection_method: String,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    status: String,
}

// ============ Client ============

pub struct DetectionServiceClient {
    client: Client,
    base_url: String,
}

impl Default for DetectionServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionServiceClient {
    pub fn new() -> Self {
        let base_url = std::env::var("VERITEXT_DETECTOR_URL")
            .unwrap_or_else(|_| crate::services::config_store::AppConfig::default().detector.base_url);
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Per-sentence analysis of the whole text in one call.
    /// Non-2xx or a non-"success" status field is a hard failure of the call.
    pub async fn analyze_sentences(
        &self,
        text: &str,
    ) -> Result<SentenceAnalysisResponse, DetectorError> {
        let url = format!("{}/api/ai-detect/sentences", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DetectRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: SentenceAnalysisResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::JsonError(e.to_string()))?;

        if data.status != "success" {
            return Err(DetectorError::BadStatus(data.status.clone()));
        }

        info!(
            "[DETECTOR] Sentence analysis: {}/{} AI sentences ({:.1}%), method={}",
            data.stats.ai_sentences,
            data.stats.total_sentences,
            data.stats.ai_percentage,
            data.metadata.detection_method
        );
        Ok(data)
    }

    /// Whole-text aggregate verdict. Probability fields stay as percentages.
    pub async fn detect_overall(&self, text: &str) -> Result<OverallDetection, DetectorError> {
        let url = format!("{}/api/ai-detect", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DetectRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: OverallResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::JsonError(e.to_string()))?;

        if data.status != "success" {
            return Err(DetectorError::BadStatus(data.status));
        }

        Ok(OverallDetection {
            is_ai: data.is_ai,
            confidence: data.confidence.clamp(0.0, 100.0),
            ai_probability: data.ai_prob.clamp(0.0, 100.0),
            human_probability: data.human_prob.clamp(0.0, 100.0),
            most_likely_model: data.most_likely_model,
            detection_method: data.detection_method,
            analysis: data.analysis,
        })
    }

    /// One liveness probe against the status endpoint.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/status", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("[DETECTOR] Health check failed: {}", e);
                false
            }
        }
    }

    /// Spawn a background poll that keeps a shared availability flag current.
    /// The flag starts pessimistic (false) and flips on the first successful
    /// probe; the surrounding UI uses it to gate the AI-detection task.
    pub fn spawn_health_monitor(
        self: Arc<Self>,
        interval: Duration,
    ) -> (Arc<AtomicBool>, JoinHandle<()>) {
        let available = Arc::new(AtomicBool::new(false));
        let flag = available.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let healthy = self.check_health().await;
                let previous = flag.swap(healthy, Ordering::Relaxed);
                if previous != healthy {
                    info!("[DETECTOR] Service availability changed: {}", healthy);
                }
            }
        });
        (available, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_response_parsing() {
        let json = r#"{
            "results": [{"text": "A sentence.", "isAI": true, "confidence": 0.91,
                         "startIndex": 0, "endIndex": 11, "reasons": ["Transformer analysis"]}],
            "stats": {"totalSentences": 1, "aiSentences": 1, "humanSentences": 0,
                      "aiPercentage": 100.0, "humanPercentage": 0.0},
            "metadata": {"textLength": 11, "wordCount": 2, "detectionMethod": "Ensemble"},
            "status": "success"
        }"#;
        let parsed: SentenceAnalysisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.results[0].is_ai);
        assert_eq!(parsed.stats.total_sentences, 1);
        assert_eq!(parsed.status, "success");
    }

    #[test]
    fn test_overall_response_parsing_with_missing_fields() {
        let json = r#"{"isAI": false, "confidence": 62.5, "status": "success"}"#;
        let parsed: OverallResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.is_ai);
        assert_eq!(parsed.confidence, 62.5);
        assert_eq!(parsed.most_likely_model, "");
    }

    #[tokio::test]
    async fn test_health_monitor_stays_false_when_unreachable() {
        // Nothing listens on this port; the first probe must leave the flag false.
        let client = Arc::new(DetectionServiceClient::with_base_url(
            "http://127.0.0.1:9".to_string(),
        ));
        let (available, handle) = client.spawn_health_monitor(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!available.load(Ordering::Relaxed));
        handle.abort();
    }
}
