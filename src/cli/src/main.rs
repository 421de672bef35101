//! `pentora-plugins` — a thin command-line frontend over the plugin
//! evaluation engine's [`CacheManager`] and [`Evaluator`].
//!
//! This binary demonstrates the core crate; it is not itself part of the
//! specification this crate implements, and intentionally does no argument
//! parsing beyond what a small operator tool needs: managing a cache
//! directory and running an evaluation against a context file.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pentora_plugins::config::{init_tracing, RuntimeConfig};
use pentora_plugins::error;
use pentora_plugins::plugins::cache::CacheManager;

use commands::{cache, embedded, evaluate};
use output::OutputFormat;

/// Manage a declarative vulnerability/compliance plugin cache and evaluate
/// plugins against a scanner context.
#[derive(Parser)]
#[command(name = "pentora-plugins", version, propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Directory backing the plugin cache (defaults to `~/.cache/pentora/plugins`)
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the on-disk plugin cache
    #[command(subcommand)]
    Cache(cache::CacheCommands),

    /// Inspect the compiled-in embedded plugin catalog
    #[command(subcommand)]
    Embedded(embedded::EmbeddedCommands),

    /// Evaluate cached (and optionally embedded) plugins against a context
    Evaluate(evaluate::EvaluateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = RuntimeConfig::load().unwrap_or_default();
    init_tracing(&config.log_level);

    let cache_root = cli.cache_root.clone().unwrap_or(config.cache_root.clone());
    let format = cli.output;

    let result = match cli.command {
        Commands::Cache(cmd) => {
            let manager = CacheManager::new(&cache_root).await?;
            cache::execute(cmd, &manager, format).await
        }
        Commands::Embedded(cmd) => embedded::execute(cmd, format),
        Commands::Evaluate(args) => {
            let manager = CacheManager::new(&cache_root).await?;
            evaluate::execute(args, &manager, format).await
        }
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        let suggestion = error::get_suggestion(e.chain().next());
        if !suggestion.is_empty() {
            output::print_info(suggestion);
        }
        std::process::exit(error::exit_code(e.chain().next()));
    }

    Ok(())
}
