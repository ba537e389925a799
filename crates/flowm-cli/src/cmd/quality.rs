use crate::output::print_json;
use clap::Subcommand;
use flowm_core::quality;
use flowm_core::{change, project::resolve_project};
use std::path::Path;

#[derive(Subcommand)]
pub enum QualitySubcommand {
    /// Flag unfilled template markers, TODO and TBD in change documents
    Check {
        /// Change id (default: the active change)
        change_id: Option<String>,
        /// Document to lint: spec, plan, tasks (alias: blueprint). Repeatable
        #[arg(long, short = 'i')]
        include: Vec<String>,
    },
}

pub fn run(
    root: &Path,
    project: Option<&str>,
    subcmd: QualitySubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let project = resolve_project(root, project)?;
    match subcmd {
        QualitySubcommand::Check { change_id, include } => {
            check(root, &project, change_id.as_deref(), &include, json)
        }
    }
}

fn check(
    root: &Path,
    project: &str,
    requested: Option<&str>,
    include: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let targets = quality::parse_targets(include)?;
    let change_id = change::resolve_change(root, project, requested)?;
    let report = quality::check_change(root, project, &change_id, &targets)?;

    if json {
        print_json(&report)?;
    } else if report.is_clear() {
        let names: Vec<_> = targets.iter().map(|t| t.as_str()).collect();
        println!("No placeholder markers detected for {}", names.join(", "));
    } else {
        println!("Quality warnings for '{change_id}':");
        for issue in &report.issues {
            println!("  {}: {}", issue.target, issue.message);
        }
    }

    if !report.is_clear() {
        anyhow::bail!("quality check found {} issue(s)", report.issues.len());
    }
    Ok(())
}
