//! `pentora-plugins embedded <subcommand>` — inspect the compiled-in catalog.

use clap::Subcommand;
use pentora_plugins::error::CoreError;
use pentora_plugins::plugins::embedded::EmbeddedLoader;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum EmbeddedCommands {
    /// List every embedded plugin, optionally restricted to one category
    List {
        /// Only show plugins resolved to this category (ssh, http, tls, database, network, misc)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one embedded plugin's full manifest by id
    Show {
        /// Plugin id
        id: String,
    },
}

#[derive(Serialize, Tabled)]
struct EmbeddedRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

pub fn execute(cmd: EmbeddedCommands, format: OutputFormat) -> anyhow::Result<()> {
    let loader = EmbeddedLoader::discover();

    match cmd {
        EmbeddedCommands::List { category } => {
            let rows: Vec<EmbeddedRow> = match category {
                Some(category) => loader
                    .category(&category)
                    .iter()
                    .map(|p| to_row(&category, p))
                    .collect(),
                None => loader
                    .by_category()
                    .iter()
                    .flat_map(|(category, plugins)| plugins.iter().map(move |p| to_row(category, p)))
                    .collect(),
            };
            output::print_list(&rows, format);
        }

        EmbeddedCommands::Show { id } => {
            let plugin = loader
                .all()
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| CoreError::PluginNotFound(id))?;
            output::print_item(&plugin, format);
        }
    }

    Ok(())
}

fn to_row(category: &str, plugin: &pentora_plugins::plugins::Plugin) -> EmbeddedRow {
    EmbeddedRow {
        category: category.to_string(),
        id: plugin.id.clone(),
        name: plugin.name.clone(),
        severity: plugin.metadata.severity.clone(),
    }
}
