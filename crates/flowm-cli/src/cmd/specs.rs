use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowm_core::config::Config;
use flowm_core::identity::RequirementIndex;
use flowm_core::specs::{self, Manifest, MergeOptions, PreviewOptions};
use flowm_core::{change, project::resolve_project};
use std::path::Path;

#[derive(Subcommand)]
pub enum SpecsSubcommand {
    /// Parse and validate every delta spec of a change
    Validate {
        /// Change id (default: the active change)
        change_id: Option<String>,
    },
    /// Preview a merge: write the manifest and diff previews
    Prepare {
        /// Change id (default: the active change)
        change_id: Option<String>,
        /// Skip writing merge.diff previews
        #[arg(long)]
        no_diff: bool,
    },
    /// Merge delta specs into the canonical specs
    Merge {
        /// Change id (default: the active change)
        change_id: Option<String>,
        /// Compute everything, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Keep the change in place after merging
        #[arg(long)]
        no_archive: bool,
    },
}

pub fn run(
    root: &Path,
    project: Option<&str>,
    subcmd: SpecsSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let project = resolve_project(root, project)?;
    match subcmd {
        SpecsSubcommand::Validate { change_id } => {
            validate(root, &project, change_id.as_deref(), json)
        }
        SpecsSubcommand::Prepare { change_id, no_diff } => {
            let mut opts = PreviewOptions::from(&config.specs);
            opts.write_diffs &= !no_diff;
            prepare(root, &project, change_id.as_deref(), opts, json)
        }
        SpecsSubcommand::Merge {
            change_id,
            dry_run,
            no_archive,
        } => {
            let mut opts = MergeOptions::from(&config.specs);
            opts.dry_run = dry_run;
            opts.archive &= !no_archive;
            merge(root, &project, change_id.as_deref(), opts, json)
        }
    }
}

fn validate(root: &Path, project: &str, requested: Option<&str>, json: bool) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let count = specs::validate_change(root, project, &change_id)?;
    if json {
        print_json(&serde_json::json!({
            "change_id": change_id,
            "capabilities": count,
            "valid": true,
        }))?;
    } else {
        println!("Delta specs valid for change '{change_id}' ({count} capability(ies))");
    }
    Ok(())
}

fn print_manifest_summary(manifest: &Manifest) {
    let rows = manifest
        .capabilities
        .iter()
        .flat_map(|cap| {
            cap.requirements.iter().map(move |req| {
                vec![
                    cap.capability.clone(),
                    req.operation.to_string(),
                    req.requirement_id.clone(),
                    req.title.clone(),
                ]
            })
        })
        .collect();
    print_table(&["CAPABILITY", "OP", "ID", "TITLE"], rows);
    for cap in &manifest.capabilities {
        for rename in &cap.renames {
            println!("{}: rename '{}' -> '{}'", cap.capability, rename.old, rename.new);
        }
    }
}

fn prepare(
    root: &Path,
    project: &str,
    requested: Option<&str>,
    opts: PreviewOptions,
    json: bool,
) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let index = RequirementIndex::load(root, project).context("failed to load spec index")?;
    let manifest = specs::prepare_change(root, project, &change_id, &index, opts)?;

    if json {
        return print_json(&manifest);
    }

    print_manifest_summary(&manifest);
    println!(
        "\nPrepared {} capability(ies), {} requirement(s), {} diff(s)",
        manifest.stats.capabilities, manifest.stats.requirements, manifest.stats.diffs
    );
    for cap in &manifest.capabilities {
        if let Some(diff) = &cap.diff_path {
            println!("  diff: {diff}");
        }
    }
    Ok(())
}

fn merge(
    root: &Path,
    project: &str,
    requested: Option<&str>,
    opts: MergeOptions,
    json: bool,
) -> anyhow::Result<()> {
    let change_id = change::resolve_change(root, project, requested)?;
    let index = RequirementIndex::load(root, project).context("failed to load spec index")?;
    let outcome = specs::merge_change(root, project, &change_id, index, opts)?;

    if json {
        return print_json(&serde_json::json!({
            "manifest": outcome.manifest,
            "report": outcome.report,
        }));
    }

    print_manifest_summary(&outcome.manifest);
    println!();
    for result in &outcome.report.results {
        let status = match (result.would_create, result.changed) {
            (true, _) => "create",
            (false, true) => "update",
            (false, false) => "unchanged",
        };
        println!("  {status:<9} {}", result.canonical_path);
    }
    if opts.dry_run {
        println!(
            "\nDry run: would update {} spec(s) for change '{change_id}'",
            outcome.report.results.len()
        );
    } else if let Some(dest) = &outcome.archived_to {
        println!(
            "\nMerged {} spec(s) and archived change '{change_id}' to {}",
            outcome.report.results.len(),
            flowm_core::paths::display_relative(root, dest)
        );
    } else {
        println!(
            "\nMerged {} spec(s) for change '{change_id}'",
            outcome.report.results.len()
        );
    }
    Ok(())
}
