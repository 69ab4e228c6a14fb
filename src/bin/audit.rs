use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use veritext_lib::models::{
    AnalysisInput, AnalysisOutcome, AnalysisTask, ProgressSnapshot, StageStatus,
};
use veritext_lib::services::analysis::{
    DetectionServiceClient, EnsembleClassifier, GenerativeClassifier, GenerativeResearcher,
};
use veritext_lib::services::config_store::ConfigStore;
use veritext_lib::services::orchestrator::AnalysisOrchestrator;
use veritext_lib::services::progress::{ProgressCoordinator, ProgressListener};
use veritext_lib::services::providers::{get_research_api_key, GenerativeClient};

/// Renders progress snapshots as one bar per stage.
struct ConsoleProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }
}

impl ProgressListener for ConsoleProgress {
    fn on_update(&self, snapshot: &ProgressSnapshot) {
        let mut bars = self.bars.lock().unwrap();

        if snapshot.stages.is_empty() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
            return;
        }

        for stage in &snapshot.stages {
            let bar = bars.entry(stage.id.clone()).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(
                    ProgressStyle::with_template("{prefix:>12} [{bar:30}] {pos:>3}% {msg}")
                        .unwrap()
                        .progress_chars("=> "),
                );
                bar.set_prefix(stage.label.clone());
                bar
            });

            bar.set_position(stage.progress.round() as u64);
            let is_current = snapshot.current_stage_id.as_deref() == Some(stage.id.as_str());
            match stage.status {
                StageStatus::Error => {
                    let detail = stage.detail.clone().unwrap_or_else(|| "failed".to_string());
                    bar.abandon_with_message(format!("{}", style(detail).red()));
                }
                StageStatus::Completed => bar.set_message("done"),
                _ => {
                    let mut msg = stage.detail.clone().unwrap_or_default();
                    if is_current {
                        if let Some(eta) = snapshot.estimated_seconds_remaining {
                            msg = format!("{} (~{:.0}s left)", msg, eta);
                        }
                    }
                    bar.set_message(msg);
                }
            }
        }
    }
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn usage() {
    eprintln!(
        "Usage:\n  audit <ai|plagiarism> (--file <path> | --text <string>) [options]\n\n\
         Options:\n  \
         --detector-url <url>   Detection service base URL (default from config / VERITEXT_DETECTOR_URL)\n  \
         --model <name>         Generative model for the plagiarism task\n  \
         --no-progress          Disable the live progress display\n  \
         --out <json_path>      Write the full outcome as JSON\n\n\
         The plagiarism task needs a research credential (VERITEXT_RESEARCH_API_KEY,\n\
         GEMINI_API_KEY, or the config file's \"research\" key)."
    );
}

fn print_outcome(outcome: &AnalysisOutcome, positive_label: &str) {
    let stats = &outcome.statistics;
    println!();
    println!("Run: {}", outcome.run_id);
    println!(
        "Words: {} total, {} {} ({:.1}%)",
        stats.total_word_count, stats.positive_word_count, positive_label, stats.positive_percentage
    );

    if let Some(overall) = &outcome.overall {
        let verdict = if overall.is_ai { "AI-generated" } else { "Human-written" };
        println!(
            "Overall: {} ({:.1}% confidence, likely source: {})",
            style(verdict).bold(),
            overall.confidence,
            overall.most_likely_model
        );
    }

    let flagged: Vec<_> = outcome.verdicts.iter().filter(|v| v.is_positive).collect();
    println!("Flagged sentences: {}/{}", flagged.len(), outcome.verdicts.len());
    for v in flagged.iter().take(10) {
        println!(
            "  [{:>4}..{:<4}] ({:.2}) {}",
            v.unit.start_offset,
            v.unit.end_offset,
            v.confidence,
            preview(&v.unit.text, 100)
        );
    }
    if flagged.len() > 10 {
        println!("  ... ({} more)", flagged.len() - 10);
    }

    if let Some(report) = &outcome.research_report {
        println!();
        println!("Research risk level: {:?}", report.risk_level);
        println!("Assessment: {}", preview(&report.overall_assessment, 200));
        for rec in &report.recommendations {
            println!("  - {}", rec);
        }
        for src in &report.potential_sources {
            println!(
                "  source: {} ({}) similarity={:.2}",
                src.label, src.source_domain, src.similarity
            );
        }
    }

    println!();
    println!("Elapsed: {} ms", outcome.elapsed_ms);
}

#[tokio::main]
async fn main() -> Result<()> {
    veritext_lib::init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        return Ok(());
    }

    let task = match args[1].as_str() {
        "ai" => AnalysisTask::AiDetect,
        "plagiarism" => AnalysisTask::PlagiarismDetect,
        other => {
            usage();
            return Err(anyhow!("unknown task: {}", other));
        }
    };

    let input = if let Some(path) = parse_arg_value(&args, "--file") {
        let bytes = std::fs::read(&path).with_context(|| format!("read file {}", path))?;
        let name = std::path::Path::new(&path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.clone());
        AnalysisInput::File { name, bytes }
    } else if let Some(text) = parse_arg_value(&args, "--text") {
        AnalysisInput::Text(text)
    } else {
        usage();
        return Err(anyhow!("no input: pass --file or --text"));
    };

    let config = ConfigStore::default_config_dir()
        .map(ConfigStore::new)
        .and_then(|store| store.load().ok())
        .unwrap_or_default();

    let detector_url = parse_arg_value(&args, "--detector-url")
        .or_else(|| std::env::var("VERITEXT_DETECTOR_URL").ok())
        .unwrap_or(config.detector.base_url);
    let detector = DetectionServiceClient::with_base_url(detector_url.clone());
    let model = parse_arg_value(&args, "--model").unwrap_or(config.research.model);
    let api_key = get_research_api_key();

    // Gate the AI task on service availability; the monitor keeps polling in
    // the background for the duration of the run.
    if task == AnalysisTask::AiDetect {
        let monitor_client = Arc::new(DetectionServiceClient::with_base_url(detector_url));
        let (available, handle) = monitor_client
            .spawn_health_monitor(Duration::from_secs(config.detector.health_poll_secs));
        tokio::time::sleep(Duration::from_millis(300)).await;
        if !available.load(std::sync::atomic::Ordering::Relaxed) {
            handle.abort();
            return Err(anyhow!(
                "detection service is unavailable; check the service and --detector-url"
            ));
        }
    } else if api_key.is_none() {
        return Err(anyhow!(
            "plagiarism task is disabled: no research credential configured"
        ));
    }

    let progress = if has_flag(&args, "--no-progress") {
        ProgressCoordinator::new()
    } else {
        ProgressCoordinator::with_listener(Arc::new(ConsoleProgress::new()))
    };

    let make_generative = || match &config.research.base_url {
        Some(url) => GenerativeClient::with_base_url(url.clone()),
        None => GenerativeClient::new(),
    };
    let generative = make_generative();
    let classifier = EnsembleClassifier::new(detector);
    let researcher = GenerativeResearcher::new(make_generative(), model.clone(), api_key.clone());

    let outcome = match task {
        AnalysisTask::AiDetect => {
            let orchestrator = AnalysisOrchestrator::new(progress, classifier, researcher);
            orchestrator.run(task, input).await?
        }
        AnalysisTask::PlagiarismDetect => {
            let classifier = GenerativeClassifier::new(generative, model, api_key);
            let orchestrator = AnalysisOrchestrator::new(progress, classifier, researcher);
            orchestrator.run(task, input).await?
        }
    };

    let positive_label = match task {
        AnalysisTask::AiDetect => "AI-generated",
        AnalysisTask::PlagiarismDetect => "plagiarized",
    };
    print_outcome(&outcome, positive_label);

    if let Some(out_path) = parse_arg_value(&args, "--out") {
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(&out_path, json).with_context(|| format!("write {}", out_path))?;
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
