//! `pentora-plugins evaluate` — run the cached (and optionally embedded)
//! plugin set against a scanner context loaded from a JSON or YAML file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pentora_plugins::plugins::cache::CacheManager;
use pentora_plugins::plugins::embedded::EmbeddedLoader;
use pentora_plugins::plugins::matcher::Context as MatchContext;
use pentora_plugins::plugins::{Evaluator, MatchResult};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a JSON or YAML document mapping dotted field names to values
    context: PathBuf,

    /// Also evaluate the compiled-in embedded catalog alongside the cache
    #[arg(long)]
    include_embedded: bool,

    /// Only print plugins that matched
    #[arg(long)]
    matched_only: bool,
}

#[derive(Serialize, Tabled)]
struct ResultRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Matched")]
    matched: bool,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Time (us)")]
    micros: u128,
}

pub async fn execute(args: EvaluateArgs, cache: &CacheManager, format: OutputFormat) -> Result<()> {
    let raw = std::fs::read_to_string(&args.context)
        .with_context(|| format!("failed to read context at {}", args.context.display()))?;
    let context: MatchContext = parse_context(&raw)
        .with_context(|| format!("failed to parse context at {}", args.context.display()))?;

    let mut plugins = cache.list().await;
    if args.include_embedded {
        plugins.extend(EmbeddedLoader::discover().all());
    }
    plugins.sort_by(|a, b| a.id.cmp(&b.id));

    let evaluator = Evaluator::with_builtins();
    let results = evaluator.evaluate_all(&plugins, &context)?;

    let rows: Vec<ResultRow> = results
        .iter()
        .filter(|r| !args.matched_only || r.matched)
        .map(to_row)
        .collect();

    if matches!(format, OutputFormat::Table) {
        output::print_header("Evaluation Results");
    }
    output::print_list(&rows, format);

    let matched = results.iter().filter(|r| r.matched).count();
    output::print_detail("Plugins evaluated", &results.len().to_string());
    output::print_detail("Matched", &matched.to_string());

    Ok(())
}

fn to_row(result: &MatchResult) -> ResultRow {
    ResultRow {
        id: result.plugin.id.clone(),
        matched: result.matched,
        severity: result
            .output
            .severity
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        message: if result.matched {
            result.output.message.clone()
        } else {
            String::new()
        },
        micros: result.execution_time.as_micros(),
    }
}

/// Accepts either JSON or YAML — both parse the same untagged `Value` shape.
fn parse_context(raw: &str) -> Result<MatchContext> {
    if let Ok(ctx) = serde_json::from_str::<MatchContext>(raw) {
        return Ok(ctx);
    }
    Ok(serde_yaml::from_str::<MatchContext>(raw)?)
}
