use blockwright::{BlockRegistry, DocumentPayload, EditorConfig, PayloadError, RegistryBuilder};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Editor config (JSON) supplying payload limits and allowed protocols
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decodes a payload and reports blocks carrying error markers
    Check {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Re-encodes a payload in canonical form
    Normalize {
        file: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Prints the document as plain text
    Text { file: PathBuf },
    /// Prints the heading outline with anchors
    Outline { file: PathBuf },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Payload { path: PathBuf, source: PayloadError },
    #[error(transparent)]
    Config(#[from] blockwright::ConfigError),
}

#[derive(Serialize)]
struct BlockReport {
    index: usize,
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    error: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let registry = load_registry(cli.config.as_deref())?;
    match &cli.command {
        Commands::Check { file, json } => check_command(&registry, file, *json),
        Commands::Normalize { file, output } => {
            normalize_command(&registry, file, output.as_deref())
        }
        Commands::Text { file } => {
            let doc = registry.deserialize(&read_payload(file)?);
            println!("{}", doc.plain_text());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Outline { file } => {
            let doc = registry.deserialize(&read_payload(file)?);
            for entry in doc.heading_outline() {
                let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
                println!("{indent}{} #{}", entry.text, entry.anchor);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_registry(config: Option<&Path>) -> Result<BlockRegistry, CliError> {
    let config = match config {
        Some(path) => EditorConfig::from_json(&read(path)?)?,
        None => EditorConfig::default(),
    };
    Ok(RegistryBuilder::from_config(&config).build())
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_payload(path: &Path) -> Result<DocumentPayload, CliError> {
    DocumentPayload::from_json(&read(path)?).map_err(|source| CliError::Payload {
        path: path.to_path_buf(),
        source,
    })
}

fn check_command(registry: &BlockRegistry, file: &Path, json: bool) -> Result<ExitCode, CliError> {
    let doc = registry.deserialize(&read_payload(file)?);
    let flagged: Vec<BlockReport> = doc
        .iter()
        .enumerate()
        .filter_map(|(index, block)| {
            let error = block.error.as_ref()?;
            Some(BlockReport {
                index,
                id: block.id.to_string(),
                block_type: block.block_type().tag().to_string(),
                error: serde_json::to_string(error).unwrap_or_default(),
            })
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "blocks": doc.len(),
            "flagged": flagged,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!("{} blocks", doc.len());
        for report in &flagged {
            println!(
                "block {} ({}, {}): {}",
                report.index, report.block_type, report.id, report.error
            );
        }
    }
    Ok(if flagged.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn normalize_command(
    registry: &BlockRegistry,
    file: &Path,
    output: Option<&Path>,
) -> Result<ExitCode, CliError> {
    let doc = registry.deserialize(&read_payload(file)?);
    let encoded = registry
        .serialize(&doc)
        .to_json_pretty()
        .map_err(|source| CliError::Payload {
            path: file.to_path_buf(),
            source,
        })?;
    match output {
        Some(path) => fs::write(path, format!("{encoded}\n")).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })?,
        None => println!("{encoded}"),
    }
    Ok(ExitCode::SUCCESS)
}
