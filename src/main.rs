//! FinChat Skills - Entry Point
//!
//! Answers one question through the skill cascade and prints the result as
//! JSON. Exits with status 2 when no skill could answer, which is the host's
//! cue to fall back to its LLM pipeline.

use anyhow::{bail, Context as _};
use finchat_skills::{detect_intent, logging, AssistantConfig, ChatContext, SkillEngine};
use std::path::PathBuf;
use tracing::info;

struct Args {
    context: Option<PathBuf>,
    config: Option<PathBuf>,
    json_logs: bool,
    stats: bool,
    question: String,
}

fn print_help() {
    println!("FinChat Skills v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: finchat-skills [OPTIONS] QUESTION");
    println!();
    println!("Options:");
    println!("  --context FILE   JSON context snapshot (default: empty)");
    println!("  --config FILE    TOML configuration");
    println!("  --json-logs      Log to stderr as JSON");
    println!("  --stats          Print engine statistics after answering");
    println!("  --help, -h       Show this help");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG                         Log filter (default: info)");
    println!("  FINCHAT_CACHE_ENABLED            Toggle the execution cache");
    println!("  FINCHAT_STAGE_TIMEOUT_MS         Per-stage timeout");
    println!("  FINCHAT_BREAKER_THRESHOLD        Failures before a skill is skipped");
    println!("  FINCHAT_BUILTIN_SKILLS           Register the built-in skills");
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        context: None,
        config: None,
        json_logs: false,
        stats: false,
        question: String::new(),
    };
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--context" => {
                parsed.context = Some(args.next().context("--context needs a file")?.into());
            }
            "--config" => {
                parsed.config = Some(args.next().context("--config needs a file")?.into());
            }
            "--json-logs" => parsed.json_logs = true,
            "--stats" => parsed.stats = true,
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => words.push(arg),
        }
    }

    parsed.question = words.join(" ");
    if parsed.question.trim().is_empty() {
        bail!("No question given (try --help)");
    }
    Ok(Some(parsed))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let Some(args) = parse_args()? else {
        print_help();
        return Ok(());
    };

    logging::init_logging(args.json_logs)?;
    info!("FinChat Skills v{}", env!("CARGO_PKG_VERSION"));

    let config = AssistantConfig::load(args.config.as_deref())?;
    let ctx = match args.context {
        Some(ref path) => ChatContext::load(path)?,
        None => ChatContext::default(),
    };

    let engine = SkillEngine::from_config(&config)?;
    let intent = detect_intent(&args.question);
    info!("Detected intent: {}", intent);

    let answer = engine.try_skills(&args.question, &ctx).await;
    let answered = answer.is_some();
    let output = serde_json::json!({
        "intent": intent.as_str(),
        "answered": answered,
        "response": answer,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if args.stats {
        let stats = engine.stats().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        println!("{}", engine.metrics().export_metrics());
    }

    if !answered {
        std::process::exit(2);
    }
    Ok(())
}
