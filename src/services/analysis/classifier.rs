// Unit Classifiers
// Capability seam for per-unit classification. Two backends:
// - EnsembleClassifier: one whole-text call to the detection service; a call
//   failure is a hard failure (no per-unit fallback at this layer)
// - GenerativeClassifier: sequential per-unit prompts to the generative
//   provider; per-unit failures recover through a local pattern heuristic

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{clamp_score, AnalysisUnit, AnalysisVerdict, OverallDetection, VerdictEvidence};
use crate::services::providers::{GenerativeClient, ProviderError};

use super::detector_api::{DetectionServiceClient, DetectorError};
use super::research::{extract_embedded_json, RawSourceEntry};
use super::ProgressFn;

/// Fallback confidence when an attribution phrase matches.
pub const FALLBACK_MATCH_CONFIDENCE: f64 = 0.4;
/// Fallback confidence when nothing matches.
pub const FALLBACK_MISS_CONFIDENCE: f64 = 0.1;
/// Positive cutoff for the fallback path only. Independent of whatever
/// threshold the remote service applies; the two are never reconciled.
pub const FALLBACK_POSITIVE_THRESHOLD: f64 = 0.3;

/// Attribution phrasing that often marks sourced (and possibly lifted) prose.
const ATTRIBUTION_PATTERNS: &[&str] = &[
    r"(?i)according to (research|researchers|a study|studies|experts)",
    r"(?i)studies have shown",
    r"(?i)research (shows|suggests|indicates)",
    r"(?i)it is widely (known|accepted|believed)",
    r"(?i)as (cited|reported) (in|by)",
];

const PLAGIARISM_SYSTEM_PROMPT: &str = r#"You are a plagiarism analyst. Judge whether the given sentence is likely copied or closely paraphrased from published material.
Reply with JSON only, no other text:
{"isPlagiarized": true/false, "confidence": 0.0-1.0, "sources": [{"label": "...", "domain": "...", "similarity": 0.0-1.0, "matchedText": "...", "url": "..."}]}"#;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("research provider is not configured")]
    NotConfigured,
    #[error("detection service call failed: {0}")]
    Service(#[from] DetectorError),
}

/// Per-unit classification capability. Implementations must return exactly one
/// verdict per input unit, in input order.
#[allow(async_fn_in_trait)]
pub trait TextClassifier {
    async fn classify_units(
        &self,
        text: &str,
        units: &[AnalysisUnit],
        base: f64,
        span: f64,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<AnalysisVerdict>, ClassifyError>;

    /// Optional whole-text aggregate; advisory, never fails the run.
    async fn overall_assessment(&self, text: &str) -> Option<OverallDetection>;
}

// ============ Fallback Heuristic ============

/// Local pattern-based verdict used when a per-unit remote call fails.
pub fn fallback_verdict(unit: &AnalysisUnit) -> AnalysisVerdict {
    let mut matched: Option<String> = None;
    for pattern in ATTRIBUTION_PATTERNS {
        let re = Regex::new(pattern).unwrap();
        if let Some(m) = re.find(&unit.text) {
            matched = Some(m.as_str().to_string());
            break;
        }
    }

    let confidence = if matched.is_some() {
        FALLBACK_MATCH_CONFIDENCE
    } else {
        FALLBACK_MISS_CONFIDENCE
    };

    let evidence = matched
        .map(|span| {
            vec![VerdictEvidence {
                label: "Attribution phrasing".to_string(),
                source_domain: "unknown.com".to_string(),
                similarity: confidence,
                matched_span: span,
                url: "#".to_string(),
            }]
        })
        .unwrap_or_default();

    AnalysisVerdict {
        unit: unit.clone(),
        is_positive: confidence > FALLBACK_POSITIVE_THRESHOLD,
        confidence,
        evidence,
    }
}

// ============ Ensemble Classifier (AI detection) ============

pub struct EnsembleClassifier {
    api: DetectionServiceClient,
}

impl EnsembleClassifier {
    pub fn new(api: DetectionServiceClient) -> Self {
        Self { api }
    }
}

impl TextClassifier for EnsembleClassifier {
    async fn classify_units(
        &self,
        text: &str,
        units: &[AnalysisUnit],
        base: f64,
        span: f64,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<AnalysisVerdict>, ClassifyError> {
        if units.is_empty() {
            on_progress(base + span, Some("No analyzable sentences"));
            return Ok(Vec::new());
        }

        let response = self.api.analyze_sentences(text).await?;
        if response.results.len() != units.len() {
            warn!(
                "[CLASSIFIER] Service returned {} results for {} units",
                response.results.len(),
                units.len()
            );
        }

        let total = units.len();
        let mut verdicts = Vec::with_capacity(total);
        for (idx, unit) in units.iter().enumerate() {
            let verdict = match response.results.get(idx) {
                Some(result) => {
                    let confidence = clamp_score(result.confidence);
                    let evidence = result
                        .reasons
                        .iter()
                        .map(|reason| VerdictEvidence {
                            label: reason.clone(),
                            source_domain: "unknown.com".to_string(),
                            similarity: confidence,
                            matched_span: String::new(),
                            url: "#".to_string(),
                        })
                        .collect();
                    AnalysisVerdict {
                        unit: unit.clone(),
                        is_positive: result.is_ai,
                        confidence,
                        evidence,
                    }
                }
                // The service dropped a unit the local segmenter kept; score
                // it neutral-negative rather than failing the batch.
                None => AnalysisVerdict {
                    unit: unit.clone(),
                    is_positive: false,
                    confidence: 0.0,
                    evidence: Vec::new(),
                },
            };
            verdicts.push(verdict);

            let pct = base + ((idx + 1) as f64 / total as f64) * span;
            let detail = format!("Analyzed {}/{} sentences", idx + 1, total);
            on_progress(pct, Some(detail.as_str()));
        }

        Ok(verdicts)
    }

    async fn overall_assessment(&self, text: &str) -> Option<OverallDetection> {
        match self.api.detect_overall(text).await {
            Ok(overall) => Some(overall),
            Err(e) => {
                warn!("[CLASSIFIER] Whole-text assessment unavailable: {}", e);
                None
            }
        }
    }
}

// ============ Generative Classifier (plagiarism) ============

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawJudgment {
    is_plagiarized: bool,
    confidence: f64,
    sources: Vec<RawSourceEntry>,
}

pub struct GenerativeClassifier {
    client: GenerativeClient,
    model: String,
    api_key: Option<String>,
}

impl GenerativeClassifier {
    pub fn new(client: GenerativeClient, model: String, api_key: Option<String>) -> Self {
        Self { client, model, api_key }
    }
}

/// Map one per-unit reply (or its failure) to a verdict. A failed call or an
/// uninterpretable reply falls back to the local heuristic; the batch never
/// aborts here.
fn verdict_from_reply(unit: &AnalysisUnit, reply: Result<String, String>) -> AnalysisVerdict {
    let judgment = reply.and_then(|content| {
        let json = extract_embedded_json(&content).ok_or_else(|| "no JSON in reply".to_string())?;
        serde_json::from_str::<RawJudgment>(&json).map_err(|e| e.to_string())
    });

    match judgment {
        Ok(j) => AnalysisVerdict {
            unit: unit.clone(),
            is_positive: j.is_plagiarized,
            confidence: clamp_score(j.confidence),
            evidence: j.sources.into_iter().map(RawSourceEntry::into_evidence).collect(),
        },
        Err(e) => {
            warn!(
                "[CLASSIFIER] Unit call failed ({}..{}), using fallback: {}",
                unit.start_offset, unit.end_offset, e
            );
            fallback_verdict(unit)
        }
    }
}

impl TextClassifier for GenerativeClassifier {
    async fn classify_units(
        &self,
        _text: &str,
        units: &[AnalysisUnit],
        base: f64,
        span: f64,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<AnalysisVerdict>, ClassifyError> {
        let api_key = self.api_key.as_deref().ok_or(ClassifyError::NotConfigured)?;

        if units.is_empty() {
            on_progress(base + span, Some("No analyzable sentences"));
            return Ok(Vec::new());
        }

        info!("[CLASSIFIER] Classifying {} units via {}", units.len(), self.model);

        let total = units.len();
        let mut verdicts = Vec::with_capacity(total);
        // Strictly sequential: progress callbacks must arrive in unit order.
        for (idx, unit) in units.iter().enumerate() {
            let user_prompt = format!("Sentence to assess:\n{}", unit.text);
            let reply = self
                .client
                .call(&self.model, api_key, PLAGIARISM_SYSTEM_PROMPT, &user_prompt, 512)
                .await
                .map(|r| r.content)
                .map_err(|e: ProviderError| e.to_string());
            verdicts.push(verdict_from_reply(unit, reply));

            let pct = base + ((idx + 1) as f64 / total as f64) * span;
            let detail = format!("Checked {}/{} sentences", idx + 1, total);
            on_progress(pct, Some(detail.as_str()));
        }

        Ok(verdicts)
    }

    // The generative provider has no aggregate endpoint; the research report
    // covers the document-level view for this task.
    async fn overall_assessment(&self, _text: &str) -> Option<OverallDetection> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(text: &str, start: usize) -> AnalysisUnit {
        AnalysisUnit {
            text: text.to_string(),
            start_offset: start,
            end_offset: start + text.len(),
        }
    }

    #[test]
    fn test_fallback_matches_attribution_phrase() {
        let v = fallback_verdict(&unit("According to research, water is wet", 0));
        assert!(v.is_positive);
        assert_eq!(v.confidence, FALLBACK_MATCH_CONFIDENCE);
        assert_eq!(v.evidence.len(), 1);
        assert!(v.evidence[0].matched_span.to_lowercase().contains("according to research"));
    }

    #[test]
    fn test_fallback_miss_is_negative() {
        let v = fallback_verdict(&unit("I wrote this thought myself", 0));
        assert!(!v.is_positive);
        assert_eq!(v.confidence, FALLBACK_MISS_CONFIDENCE);
        assert!(v.evidence.is_empty());
    }

    #[test]
    fn test_fallback_threshold_sits_between_the_two_confidences() {
        assert!(FALLBACK_MATCH_CONFIDENCE > FALLBACK_POSITIVE_THRESHOLD);
        assert!(FALLBACK_MISS_CONFIDENCE < FALLBACK_POSITIVE_THRESHOLD);
    }

    #[test]
    fn test_one_failed_reply_out_of_five_keeps_order_and_falls_back() {
        let units: Vec<AnalysisUnit> = (0..5)
            .map(|i| unit(&format!("Sentence number {} in the document", i), i * 40))
            .collect();
        let good = r#"{"isPlagiarized": true, "confidence": 0.8, "sources": []}"#;

        let verdicts: Vec<AnalysisVerdict> = units
            .iter()
            .enumerate()
            .map(|(i, u)| {
                let reply = if i == 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok(good.to_string())
                };
                verdict_from_reply(u, reply)
            })
            .collect();

        assert_eq!(verdicts.len(), 5);
        for (i, v) in verdicts.iter().enumerate() {
            assert_eq!(v.unit, units[i]);
        }
        // The failed unit carries the fallback's miss confidence.
        assert_eq!(verdicts[2].confidence, FALLBACK_MISS_CONFIDENCE);
        assert!(!verdicts[2].is_positive);
        assert!(verdicts[0].is_positive);
        assert_eq!(verdicts[0].confidence, 0.8);
    }

    #[test]
    fn test_verdict_from_reply_clamps_out_of_range_confidence() {
        let reply = r#"{"isPlagiarized": true, "confidence": 1.5,
                        "sources": [{"similarity": -0.2}]}"#;
        let v = verdict_from_reply(&unit("Some borrowed sentence here", 0), Ok(reply.to_string()));
        assert_eq!(v.confidence, 1.0);
        assert_eq!(v.evidence[0].similarity, 0.0);
        assert_eq!(v.evidence[0].label, "Unknown Source");
        assert_eq!(v.evidence[0].source_domain, "unknown.com");
        assert_eq!(v.evidence[0].url, "#");
    }

    #[test]
    fn test_unparseable_reply_falls_back() {
        let v = verdict_from_reply(
            &unit("According to experts, this claim is settled", 0),
            Ok("The model apologizes and returns prose.".to_string()),
        );
        assert_eq!(v.confidence, FALLBACK_MATCH_CONFIDENCE);
        assert!(v.is_positive);
    }

    #[tokio::test]
    async fn test_generative_without_credential_is_not_configured() {
        let classifier = GenerativeClassifier::new(
            GenerativeClient::with_base_url("http://127.0.0.1:9".to_string()),
            "test-model".to_string(),
            None,
        );
        let units = vec![unit("A sentence long enough to classify", 0)];
        let result = classifier
            .classify_units("", &units, 0.0, 100.0, &|_, _| {})
            .await;
        assert!(matches!(result, Err(ClassifyError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_ensemble_hard_failure_propagates() {
        let classifier = EnsembleClassifier::new(DetectionServiceClient::with_base_url(
            "http://127.0.0.1:9".to_string(),
        ));
        let units = vec![unit("A sentence long enough to classify", 0)];
        let result = classifier
            .classify_units("A sentence long enough to classify.", &units, 0.0, 100.0, &|_, _| {})
            .await;
        assert!(matches!(result, Err(ClassifyError::Service(_))));
    }
}
