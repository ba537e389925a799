use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowm_core::{change, paths, project::resolve_project, timeline};
use std::path::Path;

#[derive(Subcommand)]
pub enum ChangesSubcommand {
    /// Scaffold a change and make it active
    Init {
        /// Change id (lowercase, hyphens)
        change_id: String,
        /// Capability to seed a placeholder delta for (repeatable)
        #[arg(long = "capability", short = 'c')]
        capabilities: Vec<String>,
    },
    /// List active changes
    List,
    /// Show a change's delta specs and timeline
    Show {
        /// Change id (default: the active change)
        change_id: Option<String>,
    },
    /// Move a change into changes/archive/
    Archive {
        /// Change id (default: the active change)
        change_id: Option<String>,
    },
}

pub fn run(
    root: &Path,
    project: Option<&str>,
    subcmd: ChangesSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let project = resolve_project(root, project)?;
    match subcmd {
        ChangesSubcommand::Init {
            change_id,
            capabilities,
        } => init(root, &project, &change_id, &capabilities, json),
        ChangesSubcommand::List => list(root, &project, json),
        ChangesSubcommand::Show { change_id } => show(root, &project, change_id.as_deref(), json),
        ChangesSubcommand::Archive { change_id } => {
            archive(root, &project, change_id.as_deref(), json)
        }
    }
}

fn init(
    root: &Path,
    project: &str,
    change_id: &str,
    capabilities: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let init = change::init_change(root, project, change_id, capabilities)
        .with_context(|| format!("failed to initialize change '{change_id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "project": project,
            "change_id": change_id,
            "path": paths::display_relative(root, &init.dir),
            "created": init.created,
            "deltas": init.deltas,
        }))?;
        return Ok(());
    }

    println!("Change '{change_id}' ready in project '{project}'.");
    if init.created.is_empty() {
        println!("  Existing files preserved");
    }
    for name in &init.created {
        println!("  created: {name}");
    }
    for cap in &init.deltas {
        println!("  delta:   specs/{cap}/spec.md");
    }
    Ok(())
}

fn list(root: &Path, project: &str, json: bool) -> anyhow::Result<()> {
    let ids = change::list_changes(root, project).context("failed to list changes")?;
    if json {
        print_json(&serde_json::json!({ "project": project, "changes": ids }))?;
    } else if ids.is_empty() {
        println!("No active changes in project '{project}'.");
    } else {
        for id in ids {
            println!("{id}");
        }
    }
    Ok(())
}

fn show(root: &Path, project: &str, requested: Option<&str>, json: bool) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let deltas = change::change_delta_specs(root, project, &change_id)
        .context("failed to scan delta specs")?;
    let events = timeline::read(root, project, &change_id).context("failed to read timeline")?;
    let dir = paths::change_dir(root, project, &change_id);

    if json {
        let delta_json: Vec<_> = deltas
            .iter()
            .map(|d| {
                serde_json::json!({
                    "capability": d.capability,
                    "path": paths::display_relative(root, &d.path),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "project": project,
            "change_id": change_id,
            "path": paths::display_relative(root, &dir),
            "deltas": delta_json,
            "timeline": events,
        }))?;
        return Ok(());
    }

    println!("Change: {change_id}");
    println!("Path:   {}", paths::display_relative(root, &dir));
    println!();
    if deltas.is_empty() {
        println!("No delta specs.");
    } else {
        let rows = deltas
            .iter()
            .map(|d| vec![d.capability.clone(), paths::display_relative(root, &d.path)])
            .collect();
        print_table(&["CAPABILITY", "DELTA"], rows);
    }
    if let Some(last) = events.last() {
        println!(
            "\nLast event: {} {} ({})",
            last.timestamp.format("%Y-%m-%d %H:%M"),
            last.command,
            last.summary
        );
    }
    Ok(())
}

fn archive(root: &Path, project: &str, requested: Option<&str>, json: bool) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let dest = change::archive_change(root, project, &change_id)
        .with_context(|| format!("failed to archive change '{change_id}'"))?;
    let dest = paths::display_relative(root, &dest);

    if json {
        print_json(&serde_json::json!({ "change_id": change_id, "archived_to": dest }))?;
    } else {
        println!("Archived '{change_id}' to {dest}");
    }
    Ok(())
}
