//! Output formatting for CLI

use crate::models::{HandlePosition, StageColumn};
use crate::pipeline::RegistrySnapshot;
use crate::stage::StageSnapshot;

/// Widest cell printed in the preview table
const MAX_CELL_WIDTH: usize = 28;

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_WIDTH {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CELL_WIDTH - 1).collect();
        format!("{}…", head)
    }
}

/// Format one stage for the terminal
pub fn format_stage(snapshot: &StageSnapshot) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n=== {} ===\n", snapshot.title));
    output.push_str(&format!(
        "  Dataset: {}  Threshold: {:.2}  State: {}\n",
        snapshot.working_handle, snapshot.threshold, snapshot.state
    ));

    if let Some(error) = &snapshot.error {
        output.push_str(&format!("\n⚠️  {}\n", error));
    }

    if !snapshot.preview.headers.is_empty() {
        match snapshot.total_rows {
            Some(total) => output.push_str(&format!(
                "\nPreview ({} of {} rows):\n",
                snapshot.preview.rows.len(),
                total
            )),
            None => output.push_str("\nPreview:\n"),
        }
        let headers: Vec<String> = snapshot.preview.headers.iter().map(|h| truncate(h)).collect();
        output.push_str(&format!("  {}\n", headers.join(" | ")));
        for row in &snapshot.preview.rows {
            let cells: Vec<String> = row.iter().map(|c| truncate(c)).collect();
            output.push_str(&format!("  {}\n", cells.join(" | ")));
        }
    }

    if snapshot.suggestions.is_empty() {
        if snapshot.preview.headers.is_empty() {
            output.push_str("\nNo clustering run yet.\n");
        } else {
            output.push_str("\n✅ No replacement suggestions at this threshold.\n");
        }
    } else {
        output.push_str(&format!(
            "\nReplacement suggestions ({}):\n",
            snapshot.suggestions.len()
        ));
        for s in &snapshot.suggestions {
            output.push_str(&format!(
                "  [{}] row {}: \"{}\" → \"{}\" (like row {}, {})\n",
                s.index, s.row, s.current_value, s.suggested_value, s.reference_row, s.similarity
            ));
        }
    }

    if !snapshot.downloads.is_empty() {
        output.push_str("\nDownloads:\n");
        for artifact in &snapshot.downloads {
            output.push_str(&format!("  - {}: {}\n", artifact.label, artifact.url));
        }
    }

    output
}

/// Format a registry snapshot as a handle listing
pub fn format_registry(snapshot: &RegistrySnapshot) -> String {
    let mut output = String::new();
    let show = |position: HandlePosition| -> String {
        snapshot
            .get(position)
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string())
    };

    output.push_str(&format!("  raw:     {}\n", show(HandlePosition::Raw)));
    output.push_str(&format!("  cleaned: {}\n", show(HandlePosition::Cleaned)));
    for column in StageColumn::all() {
        output.push_str(&format!(
            "  stage {} ({}): {}\n",
            column.index(),
            column.label(),
            show(HandlePosition::Stage(column))
        ));
    }
    output.push_str(&format!("  final:   {}\n", show(HandlePosition::Final)));
    if let Some(updated) = snapshot.updated_at {
        output.push_str(&format!("  updated: {}\n", updated.to_rfc3339()));
    }

    output
}
