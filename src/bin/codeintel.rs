//! Command-line front end for the code-intelligence engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeintel::{
    CodeIntel, EngineConfig, EntityKind, SearchMode, SearchOptions,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codeintel", version, about = "Index, search, and duplicate-scan codebases")]
struct Cli {
    /// Path to a JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted index snapshots; memory-only when omitted.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a codebase root under the given id.
    Index {
        codebase_id: String,
        root: PathBuf,
        /// Glob patterns to exclude from discovery.
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Search indexed entities.
    Search {
        query: String,
        /// keyword, fuzzy, or structural.
        #[arg(long, default_value = "keyword")]
        mode: String,
        /// Restrict to one codebase.
        #[arg(long)]
        codebase: Option<String>,
        /// Filter by entity kind (function, class, interface, method, type,
        /// variable, import). Repeatable.
        #[arg(long)]
        kind: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Scan a codebase root for duplicated blocks.
    Dupes {
        root: PathBuf,
        /// Override the similarity threshold.
        #[arg(long)]
        threshold: Option<f64>,
        /// Compare exactly two files instead of scanning the whole root.
        #[arg(long, num_args = 2, value_names = ["FILE_A", "FILE_B"])]
        pair: Option<Vec<PathBuf>>,
    },
    /// Show index statistics for a codebase.
    Stats { codebase_id: String },
    /// Remove a codebase from the index.
    Delete { codebase_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = CodeIntel::new(config, cli.data_dir.as_deref())?;

    match cli.command {
        Command::Index {
            codebase_id,
            root,
            exclude,
        } => {
            let engine = exclude
                .iter()
                .fold(engine, |e, pattern| e.with_exclude(pattern));
            let report = engine.index_codebase(&codebase_id, &root).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "indexed {}: {} entities from {} files",
                    report.codebase_id, report.entity_count, report.file_count
                );
                for warning in &report.warnings {
                    eprintln!("warning: {}: {}", warning.file_path.display(), warning.message);
                }
            }
        }
        Command::Search {
            query,
            mode,
            codebase,
            kind,
            limit,
        } => {
            let mode = parse_mode(&mode)?;
            let kind_filter = if kind.is_empty() {
                None
            } else {
                Some(
                    kind.iter()
                        .map(|k| parse_kind(k))
                        .collect::<Result<Vec<_>>>()?,
                )
            };
            let options = SearchOptions {
                max_results: limit,
                codebase_id: codebase,
                kind_filter,
            };
            let results = engine.search(&query, mode, &options)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    println!(
                        "{:.3}  {:<10} {}  {}:{}",
                        result.score,
                        result.kind.as_str(),
                        result.name,
                        result.file_path.display(),
                        result.start_line
                    );
                }
            }
        }
        Command::Dupes {
            root,
            threshold,
            pair,
        } => {
            let mut config = engine.config().clone();
            if let Some(threshold) = threshold {
                config.duplicates.threshold = threshold;
            }
            let groups = match pair {
                Some(files) => {
                    let a = std::fs::read_to_string(&files[0])
                        .with_context(|| format!("reading {}", files[0].display()))?;
                    let b = std::fs::read_to_string(&files[1])
                        .with_context(|| format!("reading {}", files[1].display()))?;
                    codeintel::DuplicateDetector::new(&config)
                        .detect_in_pair(&a, &files[0], &b, &files[1])
                }
                None => {
                    let engine = CodeIntel::new(config, cli.data_dir.as_deref())?;
                    let report = engine.detect_duplicates(&root).await?;
                    for warning in &report.warnings {
                        eprintln!(
                            "warning: {}: {}",
                            warning.file_path.display(),
                            warning.message
                        );
                    }
                    report.groups
                }
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for (i, group) in groups.iter().enumerate() {
                    println!(
                        "group {} ({}, avg {:.3}, {}):",
                        i + 1,
                        group.match_type.as_str(),
                        group.average_similarity,
                        group.advice.as_str()
                    );
                    for location in &group.locations {
                        println!(
                            "  {}:{}-{}",
                            location.file_path.display(),
                            location.start_line,
                            location.end_line
                        );
                    }
                }
                println!("{} duplicate groups", groups.len());
            }
        }
        Command::Stats { codebase_id } => {
            let stats = engine.stats(&codebase_id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("entities:   {}", stats.total_entities);
                println!("files:      {}", stats.total_files);
                println!("functions:  {}", stats.functions);
                println!("classes:    {}", stats.classes);
                println!("interfaces: {}", stats.interfaces);
                println!("methods:    {}", stats.methods);
                println!("types:      {}", stats.type_aliases);
                println!("variables:  {}", stats.variables);
                println!("imports:    {}", stats.imports);
            }
        }
        Command::Delete { codebase_id } => {
            engine.delete_codebase(&codebase_id)?;
            println!("deleted {codebase_id}");
        }
    }

    Ok(())
}

fn parse_mode(mode: &str) -> Result<SearchMode> {
    match mode {
        "keyword" => Ok(SearchMode::Keyword),
        "fuzzy" => Ok(SearchMode::Fuzzy),
        "structural" => Ok(SearchMode::Structural),
        other => anyhow::bail!("unknown search mode: {other}"),
    }
}

fn parse_kind(kind: &str) -> Result<EntityKind> {
    match kind {
        "function" => Ok(EntityKind::Function),
        "class" => Ok(EntityKind::Class),
        "interface" => Ok(EntityKind::Interface),
        "method" => Ok(EntityKind::Method),
        "type" => Ok(EntityKind::TypeAlias),
        "variable" => Ok(EntityKind::Variable),
        "import" => Ok(EntityKind::Import),
        other => anyhow::bail!("unknown entity kind: {other}"),
    }
}
