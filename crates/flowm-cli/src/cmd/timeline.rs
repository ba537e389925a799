use crate::output::{print_json, print_table};
use clap::Subcommand;
use flowm_core::timeline::{self, LOG_COMMAND};
use flowm_core::{change, project::resolve_project};
use std::path::Path;

#[derive(Subcommand)]
pub enum TimelineSubcommand {
    /// Show a change's timeline
    Show {
        /// Change id (default: the active change)
        change_id: Option<String>,
        /// Show only the most recent N events (0 = all)
        #[arg(long, short = 'n', default_value_t = 0)]
        limit: usize,
    },
    /// Append an event to a change's timeline
    Log {
        /// What happened
        summary: String,
        /// Change id (default: the active change)
        #[arg(long = "change", short = 'c')]
        change_id: Option<String>,
        /// Command label to record
        #[arg(long, short = 'm', default_value = LOG_COMMAND)]
        command: String,
    },
}

pub fn run(
    root: &Path,
    project: Option<&str>,
    subcmd: TimelineSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let project = resolve_project(root, project)?;
    match subcmd {
        TimelineSubcommand::Show { change_id, limit } => {
            show(root, &project, change_id.as_deref(), limit, json)
        }
        TimelineSubcommand::Log {
            summary,
            change_id,
            command,
        } => log(root, &project, change_id.as_deref(), &command, &summary, json),
    }
}

fn show(
    root: &Path,
    project: &str,
    requested: Option<&str>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let events = timeline::recent(root, project, &change_id, limit)?;

    if json {
        return print_json(&serde_json::json!({ "change_id": change_id, "events": events }));
    }
    if events.is_empty() {
        println!("Timeline for '{change_id}' is empty.");
        return Ok(());
    }
    let rows = events
        .iter()
        .map(|e| {
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.command.clone(),
                e.summary.clone(),
            ]
        })
        .collect();
    print_table(&["TIMESTAMP", "COMMAND", "SUMMARY"], rows);
    Ok(())
}

fn log(
    root: &Path,
    project: &str,
    requested: Option<&str>,
    command: &str,
    summary: &str,
    json: bool,
) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let event = timeline::log(root, project, &change_id, command, summary)?;
    if json {
        print_json(&event)?;
    } else {
        println!("Timeline updated for '{change_id}': {}", event.summary);
    }
    Ok(())
}
