// Source Research
// Whole-text plagiarism research through the generative provider. The reply is
// free-form text expected to carry embedded JSON; extraction is a best-effort
// parser with graceful degradation, not a strict decoder.

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{clamp_score, ResearchReport, RiskLevel, VerdictEvidence};
use crate::services::providers::GenerativeClient;

use super::ProgressFn;

/// Upper bound on text shipped to the research call.
const RESEARCH_MAX_INPUT_CHARS: usize = 12_000;

const RESEARCH_SYSTEM_PROMPT: &str = r#"You are an originality researcher. Given a document, assess how likely it is to contain plagiarized material and identify the most plausible published sources.
Reply with JSON only, no other text:
{"overallAssessment": "...", "riskLevel": "low|medium|high", "recommendations": ["..."], "potentialSources": [{"label": "...", "domain": "...", "similarity": 0.0-1.0, "matchedText": "...", "url": "..."}]}"#;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("research provider is not configured")]
    NotConfigured,
}

/// Whole-text research capability.
#[allow(async_fn_in_trait)]
pub trait SourceResearcher {
    async fn research_sources(
        &self,
        text: &str,
        base: f64,
        span: f64,
        on_progress: ProgressFn<'_>,
    ) -> Result<ResearchReport, ResearchError>;
}

// ============ Reply Parsing ============

/// One source entry as the generative model tends to emit it. Every field is
/// optional; sentinels fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawSourceEntry {
    #[serde(alias = "title")]
    label: Option<String>,
    #[serde(alias = "domain")]
    source_domain: Option<String>,
    similarity: f64,
    #[serde(alias = "matchedText")]
    matched_span: Option<String>,
    url: Option<String>,
}

impl RawSourceEntry {
    pub(crate) fn into_evidence(self) -> VerdictEvidence {
        VerdictEvidence {
            label: non_empty(self.label).unwrap_or_else(|| "Unknown Source".to_string()),
            source_domain: non_empty(self.source_domain).unwrap_or_else(|| "unknown.com".to_string()),
            similarity: clamp_score(self.similarity),
            matched_span: self.matched_span.unwrap_or_default(),
            url: non_empty(self.url).unwrap_or_else(|| "#".to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawReport {
    overall_assessment: Option<String>,
    risk_level: Option<String>,
    recommendations: Vec<String>,
    potential_sources: Vec<RawSourceEntry>,
}

/// Pull a JSON object out of a loosely structured reply. Ordered strategy
/// list: fenced ```json block, backtick span, longest balanced-brace
/// candidate, then the span from the first '{' to the last '}'. The first
/// candidate that parses wins.
pub fn extract_embedded_json(reply: &str) -> Option<String> {
    for candidate in json_candidates(reply) {
        if serde_json::from_str::<serde_json::Value>(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

fn json_candidates(reply: &str) -> Vec<String> {
    let mut out = Vec::new();

    let fence_re = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap();
    if let Some(caps) = fence_re.captures(reply) {
        out.push(caps[1].to_string());
    }

    let tick_re = Regex::new(r"(?s)`(\{.*?\})`").unwrap();
    if let Some(caps) = tick_re.captures(reply) {
        out.push(caps[1].to_string());
    }

    if let Some(span) = longest_brace_span(reply) {
        out.push(span.to_string());
    }

    if let (Some(first), Some(last)) = (reply.find('{'), reply.rfind('}')) {
        if first < last {
            out.push(reply[first..=last].to_string());
        }
    }

    out
}

/// Longest balanced top-level `{...}` substring, if any.
fn longest_brace_span(reply: &str) -> Option<&str> {
    let bytes = reply.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        let len = i + 1 - start;
                        if best.map(|(_, l)| len > l).unwrap_or(true) {
                            best = Some((start, len));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    best.map(|(s, l)| &reply[s..s + l])
}

/// Parse a reply into a report, or None when no usable structure exists.
/// "Usable" requires at least the assessment text and a known risk level.
fn parse_report(reply: &str) -> Option<ResearchReport> {
    let json = extract_embedded_json(reply)?;
    let raw: RawReport = serde_json::from_str(&json).ok()?;

    let overall_assessment = non_empty(raw.overall_assessment)?;
    let risk_level = RiskLevel::parse(raw.risk_level.as_deref()?)?;

    Some(ResearchReport {
        overall_assessment,
        risk_level,
        recommendations: raw.recommendations,
        potential_sources: raw
            .potential_sources
            .into_iter()
            .map(RawSourceEntry::into_evidence)
            .collect(),
    })
}

/// Structurally valid, low-information report used instead of a parse error.
pub fn degraded_report() -> ResearchReport {
    ResearchReport {
        overall_assessment:
            "The research reply could not be interpreted, so no source matches are available for this document."
                .to_string(),
        risk_level: RiskLevel::Medium,
        recommendations: vec![
            "Review flagged passages manually against likely source material.".to_string()
        ],
        potential_sources: Vec::new(),
    }
}

/// Best-effort report from a raw reply; never fails.
pub(crate) fn report_from_reply(reply: &str) -> ResearchReport {
    parse_report(reply).unwrap_or_else(|| {
        warn!("[RESEARCH] Reply not interpretable, returning degraded report");
        degraded_report()
    })
}

// ============ Generative Researcher ============

pub struct GenerativeResearcher {
    client: GenerativeClient,
    model: String,
    api_key: Option<String>,
}

impl GenerativeResearcher {
    pub fn new(client: GenerativeClient, model: String, api_key: Option<String>) -> Self {
        Self { client, model, api_key }
    }
}

impl SourceResearcher for GenerativeResearcher {
    async fn research_sources(
        &self,
        text: &str,
        base: f64,
        span: f64,
        on_progress: ProgressFn<'_>,
    ) -> Result<ResearchReport, ResearchError> {
        let api_key = self.api_key.as_deref().ok_or(ResearchError::NotConfigured)?;

        on_progress(base + 0.1 * span, Some("Contacting research service"));

        let snippet: String = text.chars().take(RESEARCH_MAX_INPUT_CHARS).collect();
        let user_prompt = format!("Document to research:\n\n{}", snippet);

        let report = match self
            .client
            .call(&self.model, api_key, RESEARCH_SYSTEM_PROMPT, &user_prompt, 2048)
            .await
        {
            Ok(result) => {
                info!("[RESEARCH] Reply received, latency_ms={}", result.latency_ms);
                report_from_reply(&result.content)
            }
            Err(e) => {
                warn!("[RESEARCH] Research call failed, returning degraded report: {}", e);
                degraded_report()
            }
        };

        on_progress(base + span, Some("Research complete"));
        Ok(report)
    }
}
