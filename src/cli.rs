use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use codecard::core::{AnalysisResult, AnalysisStats};
use codecard::{Config, Engine};

/// Name written by `codecard init`
const CONFIG_FILE_NAME: &str = "codecard.toml";

#[derive(Parser)]
#[command(name = "codecard")]
#[command(about = "Index a Python codebase and resolve its cross-module call graph")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run both passes and write a JSON report
    Analyze {
        /// Root directory to analyze
        root: PathBuf,

        /// Only analyze paths matching this glob
        #[arg(long)]
        include: Option<String>,

        /// Skip paths matching this glob
        #[arg(long)]
        exclude: Option<String>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Print aggregate statistics
    Stats {
        /// Root directory to analyze
        root: PathBuf,

        #[arg(long)]
        include: Option<String>,

        #[arg(long)]
        exclude: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

/// Top-level JSON document written by `analyze`
#[derive(Serialize)]
struct Report<'a> {
    generated_at: DateTime<Utc>,
    project: &'a str,
    stats: AnalysisStats,
    result: &'a AnalysisResult,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Init { path } => init(path.as_deref()),
            Commands::Analyze {
                root,
                include,
                exclude,
                output,
                compact,
            } => {
                let engine = Engine::from_config_path(self.config.as_deref())?;
                let result = engine.run_with_deadline(root, include, exclude).await?;
                let report = Report {
                    generated_at: Utc::now(),
                    project: &engine.config().project.name,
                    stats: result.stats(),
                    result: &result,
                };

                let json = if compact {
                    serde_json::to_string(&report)?
                } else {
                    serde_json::to_string_pretty(&report)?
                };
                match output {
                    Some(path) => {
                        std::fs::write(&path, json)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        info!("Report written to {}", path.display());
                    }
                    None => println!("{}", json),
                }
                Ok(())
            }
            Commands::Stats {
                root,
                include,
                exclude,
            } => {
                let engine = Engine::from_config_path(self.config.as_deref())?;
                let result = engine.run_with_deadline(root, include, exclude).await?;
                let stats = result.stats();

                println!("Modules:       {}", stats.modules);
                println!("Symbols:       {}", stats.symbols);
                println!("Call edges:    {}", stats.calls);
                println!("Imports:       {}", stats.imports);
                println!("Data shapes:   {}", stats.data_shapes);
                println!("Errors:        {}", stats.errors);
                println!("Routes:        {}", stats.routes);
                println!("Pattern flags: {}", stats.pattern_flags);
                println!("Unparsed:      {}", stats.unparsed);
                println!("Languages:     {}", result.languages.join(", "));
                Ok(())
            }
        }
    }
}

fn init(path: Option<&Path>) -> Result<()> {
    let dir = path.unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let target = dir.join(CONFIG_FILE_NAME);
    if target.exists() {
        bail!("{} already exists", target.display());
    }
    Config::default().save(&target)?;
    info!("Wrote default configuration to {}", target.display());
    Ok(())
}
