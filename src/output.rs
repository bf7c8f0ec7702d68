use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};
use console::style;

use crate::gitlab::types::PipelineStatus;
use crate::monitor::{MonitorSnapshot, TrackedPipeline};

/// Prints the `ciwatch` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        style("👁 ciwatch").magenta().bold(),
        style(env!("CARGO_PKG_VERSION")).dim(),
        style("GitLab Pipeline Watcher").dim()
    );
}

/// Renders a snapshot as a table, one row per canonical pipeline.
pub fn print_snapshot(snapshot: &MonitorSnapshot) {
    if !snapshot.configured {
        eprintln!("{}", style("Not configured -- set a GitLab URL and token").yellow());
        return;
    }
    if !snapshot.connected {
        let reason = snapshot.last_error.as_deref().unwrap_or("unknown error");
        eprintln!("{} {}", style("Disconnected:").red().bold(), reason);
        if snapshot.tracked.is_empty() {
            return;
        }
        eprintln!("{}", style("Showing last known state").dim());
    }

    if snapshot.tracked.is_empty() {
        println!("No pipelines in the last 24 hours.");
        return;
    }

    if let Some(status) = snapshot.summary_status() {
        println!(
            "Overall: {}",
            status_styled(status.display_name(), status)
        );
    }

    let mut table = create_table();
    table.set_header(vec![
        "Project", "Pipeline", "Ref", "Status", "Step", "Duration",
    ]);

    for entry in snapshot.canonical() {
        table.add_row(vec![
            Cell::new(&entry.project_name),
            Cell::new(format!("#{} ({})", entry.id(), entry.pipeline.short_sha())),
            Cell::new(&entry.pipeline.ref_),
            status_cell(entry.effective_status()),
            Cell::new(step_label(entry)),
            Cell::new(entry.pipeline.duration_text()),
        ]);
    }

    println!("{table}");

    if let Some(refresh) = snapshot.last_refresh {
        println!("{}", style(format!("Refreshed {refresh}")).dim());
    }
}

/// Table and cell creation helpers
fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn status_cell(status: PipelineStatus) -> Cell {
    Cell::new(status.display_name()).fg(table_color(status))
}

fn table_color(status: PipelineStatus) -> TableColor {
    match status {
        PipelineStatus::Success => TableColor::Green,
        PipelineStatus::Failed => TableColor::Red,
        PipelineStatus::Running => TableColor::Blue,
        PipelineStatus::Pending
        | PipelineStatus::Created
        | PipelineStatus::WaitingForResource
        | PipelineStatus::Preparing => TableColor::Yellow,
        PipelineStatus::Manual => TableColor::Magenta,
        PipelineStatus::Scheduled => TableColor::Cyan,
        PipelineStatus::Canceled | PipelineStatus::Skipped => TableColor::Grey,
    }
}

fn status_styled(text: &str, status: PipelineStatus) -> console::StyledObject<String> {
    let styled = style(text.to_string()).bold();
    match status {
        PipelineStatus::Success => styled.green(),
        PipelineStatus::Failed => styled.red(),
        PipelineStatus::Running => styled.blue(),
        PipelineStatus::Pending
        | PipelineStatus::Created
        | PipelineStatus::WaitingForResource
        | PipelineStatus::Preparing => styled.yellow(),
        PipelineStatus::Manual => styled.magenta(),
        PipelineStatus::Scheduled => styled.cyan(),
        PipelineStatus::Canceled | PipelineStatus::Skipped => styled.dim(),
    }
}

/// The most informative step detail for a row: the failure, the pending
/// manual gates, or whatever is running right now.
fn step_label(entry: &TrackedPipeline) -> String {
    entry
        .failed_step_label()
        .or_else(|| entry.manual_step_label())
        .or_else(|| entry.current_step_label())
        .unwrap_or_default()
}
