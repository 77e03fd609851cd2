//! Status command - show a saved registry

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::CliError;
use crate::cli::output::format_registry;
use crate::models::{HandlePosition, StageColumn};
use crate::pipeline::HandleRegistry;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Registry snapshot written by `run --state`
    #[arg(long)]
    pub state: PathBuf,

    /// Print the raw JSON snapshot
    #[arg(long)]
    pub json: bool,
}

/// Execute the status command
pub fn execute(args: StatusArgs) -> Result<()> {
    if !args.state.exists() {
        return Err(CliError::StateNotFound(args.state).into());
    }
    let snapshot = HandleRegistry::load(&args.state)?.snapshot();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Pipeline state ({}):", args.state.display());
    print!("{}", format_registry(&snapshot));

    let next = StageColumn::all()
        .into_iter()
        .find(|c| snapshot.get(HandlePosition::Stage(*c)).is_none());
    match (next, snapshot.get(HandlePosition::Final)) {
        (_, Some(final_handle)) => println!("\n✅ Complete: {}", final_handle),
        (Some(column), None) => println!("\nNext stage: {}", column.label()),
        (None, None) => println!("\nAll stages committed; final not yet published"),
    }
    Ok(())
}
