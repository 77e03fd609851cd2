//! Run command - interactive terminal stage view

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::cli::CliError;
use crate::cli::output::format_stage;
use crate::client::ApiClusteringClient;
use crate::models::{DatasetHandle, HandlePosition, StageColumn};
use crate::pipeline::{Advance, ClientConfig, HandleRegistry, PipelineError, StageSequencer};
use crate::stage::ANALYSIS_ROUTE;

const HELP: &str = "\
Commands:
  run | r             re-run clustering with the current threshold
  t <threshold>       set the similarity threshold (0 to 1)
  a <n>               accept suggestion [n] and re-cluster
  p                   proceed to the next stage
  help | h            show this help
  q                   quit (progress of completed stages is kept with --state)";

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Cleaned dataset to start from; optional when resuming from --state
    #[arg(long)]
    pub cleaned: Option<String>,

    /// Initial threshold for every stage (defaults to the config value)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Registry snapshot, loaded on start and saved after every stage
    #[arg(long)]
    pub state: Option<PathBuf>,
}

/// One line typed at the stage prompt
#[derive(Debug, Clone, PartialEq)]
pub enum StageCommand {
    Run,
    Threshold(f64),
    Accept(usize),
    Proceed,
    Help,
    Quit,
}

/// Parse a prompt line
pub fn parse_command(line: &str) -> Result<StageCommand, CliError> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Err(CliError::InvalidArgument("empty command".to_string()));
    };
    let argument = parts.next();
    if parts.next().is_some() {
        return Err(CliError::InvalidArgument(format!("too many arguments: {}", line.trim())));
    }

    let command = match (word.to_ascii_lowercase().as_str(), argument) {
        ("run" | "r", None) => StageCommand::Run,
        ("t" | "threshold", Some(value)) => StageCommand::Threshold(value.parse().map_err(|_| {
            CliError::InvalidArgument(format!("threshold must be a number: {}", value))
        })?),
        ("a" | "accept", Some(value)) => StageCommand::Accept(value.parse().map_err(|_| {
            CliError::InvalidArgument(format!("suggestion index must be a whole number: {}", value))
        })?),
        ("p" | "proceed" | "next", None) => StageCommand::Proceed,
        ("h" | "help" | "?", None) => StageCommand::Help,
        ("q" | "quit" | "exit", None) => StageCommand::Quit,
        (other, _) => {
            return Err(CliError::InvalidArgument(format!(
                "unknown command '{}' (type 'help')",
                other
            )));
        }
    };
    Ok(command)
}

fn open_registry(args: &RunArgs) -> Result<Arc<HandleRegistry>, CliError> {
    let registry = match &args.state {
        Some(path) if path.exists() => {
            info!(state = %path.display(), "Resuming from saved state");
            HandleRegistry::load(path)?
        }
        _ => HandleRegistry::new(),
    };

    if let Some(cleaned) = &args.cleaned {
        registry.set_handle(HandlePosition::Cleaned, DatasetHandle::new(cleaned.clone())?)?;
    }
    Ok(Arc::new(registry))
}

fn save_state(registry: &HandleRegistry, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        registry
            .save(path)
            .with_context(|| format!("Failed to save state to {}", path.display()))?;
    }
    Ok(())
}

/// Print a recoverable error; anything else ends the command
fn report(result: Result<(), PipelineError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            warn!(error = %e, "Stage action failed");
            eprintln!("⚠️  {}", e.user_message());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Execute the run command
pub async fn execute(args: RunArgs, config: ClientConfig) -> Result<()> {
    let registry = open_registry(&args)?;
    let threshold = args.threshold.unwrap_or(config.default_threshold);
    let client = ApiClusteringClient::new(config)?;
    let mut sequencer = StageSequencer::start_with_threshold(registry.clone(), threshold)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let state_path = args.state.as_deref();
    save_state(&registry, state_path)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut activated: Option<StageColumn> = None;

    println!("{}", HELP);

    while let Some(view) = sequencer.active_view_mut() {
        if activated != Some(view.column()) {
            activated = Some(view.column());
            report(view.activate(&client).await)?;
        }

        println!("{}", format_stage(&view.snapshot()));
        stdout
            .write_all(format!("[{}] > ", view.column().label()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(StageCommand::Run) => report(view.run(&client).await)?,
            Ok(StageCommand::Threshold(value)) => report(view.set_threshold(value))?,
            Ok(StageCommand::Accept(index)) => report(view.accept(index, &client).await)?,
            Ok(StageCommand::Proceed) => {
                let label = view.definition().next_label;
                view.proceed()?;
                match sequencer.advance()? {
                    Advance::Stage(next) => {
                        println!("\n{} ({})", label, next.wire_name());
                    }
                    Advance::Done(final_handle) => {
                        println!("\n✅ All stages complete. Final dataset: {}", final_handle);
                    }
                }
                save_state(&registry, state_path)?;
            }
            Ok(StageCommand::Help) => println!("{}", HELP),
            Ok(StageCommand::Quit) => {
                info!("Stopped by operator");
                return Ok(());
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    if sequencer.is_done() {
        let dataset = sequencer.finalize(&client).await?;
        println!("Ready for analysis: {} (continue at {})", dataset, ANALYSIS_ROUTE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("run").unwrap(), StageCommand::Run);
        assert_eq!(parse_command("  R ").unwrap(), StageCommand::Run);
        assert_eq!(parse_command("t 0.65").unwrap(), StageCommand::Threshold(0.65));
        assert_eq!(parse_command("accept 3").unwrap(), StageCommand::Accept(3));
        assert_eq!(parse_command("p").unwrap(), StageCommand::Proceed);
        assert_eq!(parse_command("?").unwrap(), StageCommand::Help);
        assert_eq!(parse_command("quit").unwrap(), StageCommand::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("").is_err());
        assert!(parse_command("t").is_err());
        assert!(parse_command("t high").is_err());
        assert!(parse_command("a -1").is_err());
        assert!(parse_command("p now").is_err());
        assert!(parse_command("a 1 2").is_err());
        assert!(parse_command("merge").is_err());
    }

    #[test]
    fn test_threshold_out_of_range_parses() {
        // Range checking belongs to the review loop
        assert_eq!(parse_command("t 1.5").unwrap(), StageCommand::Threshold(1.5));
    }

    #[test]
    fn test_open_registry_resumes_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let saved = HandleRegistry::new();
        saved
            .set_handle(HandlePosition::Cleaned, DatasetHandle::new("clean_1.csv").unwrap())
            .unwrap();
        saved.save(&path).unwrap();

        let args = RunArgs {
            cleaned: None,
            threshold: None,
            state: Some(path),
        };
        let registry = open_registry(&args).unwrap();
        assert_eq!(
            registry.get_handle(HandlePosition::Cleaned).unwrap().as_str(),
            "clean_1.csv"
        );
    }

    #[test]
    fn test_open_registry_rejects_blank_cleaned() {
        let args = RunArgs {
            cleaned: Some("  ".to_string()),
            threshold: None,
            state: None,
        };
        assert!(open_registry(&args).is_err());
    }
}
