use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use flowm_core::constitution::{self, ConstitutionEntry, ConstitutionSection};
use flowm_core::paths;
use flowm_core::project::{resolve_project, ProjectRegistry};
use flowm_core::session::Session;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ProjectsSubcommand {
    /// Register a project and make it active
    Add {
        /// Project slug (lowercase, hyphens)
        slug: String,
        /// Source tree the project describes
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Friendly name (default: derived from the slug)
        #[arg(long)]
        name: Option<String>,
    },
    /// List registered projects
    List,
    /// Make a project active
    Use { slug: String },
    /// Record findings in the project constitution
    Constitution {
        #[command(subcommand)]
        subcommand: ConstitutionSubcommand,
    },
}

#[derive(Subcommand)]
pub enum ConstitutionSubcommand {
    /// Add an entry, or replace the entry with the same title
    Record {
        /// Entry title
        title: String,
        /// One or two sentence description
        #[arg(long, short = 's')]
        summary: String,
        /// Reference such as change-id/path:line
        #[arg(long, short = 'S')]
        source: String,
        /// Target section: core, data, operations, risks, watchlist
        #[arg(long, short = 'c', default_value = "core")]
        section: String,
        /// Verification date, YYYY-MM-DD (default: today)
        #[arg(long, short = 'v')]
        verified: Option<String>,
        /// Owner, required for the watchlist section
        #[arg(long, short = 'o')]
        owner: Option<String>,
    },
}

pub fn run(
    root: &Path,
    project: Option<&str>,
    subcmd: ProjectsSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ProjectsSubcommand::Add { slug, path, name } => {
            add(root, &slug, &path, name.as_deref(), json)
        }
        ProjectsSubcommand::List => list(root, json),
        ProjectsSubcommand::Use { slug } => use_project(root, &slug, json),
        ProjectsSubcommand::Constitution {
            subcommand:
                ConstitutionSubcommand::Record {
                    title,
                    summary,
                    source,
                    section,
                    verified,
                    owner,
                },
        } => {
            let project = resolve_project(root, project)?;
            let entry = ConstitutionEntry::new(
                section.parse::<ConstitutionSection>()?,
                &title,
                &summary,
                &source,
                verified.as_deref(),
                owner.as_deref(),
            )?;
            record(root, &project, &entry, json)
        }
    }
}

fn add(root: &Path, slug: &str, path: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let meta = ProjectRegistry::add(root, slug, path, name)
        .with_context(|| format!("failed to add project '{slug}'"))?;

    if json {
        print_json(&serde_json::json!({
            "slug": slug,
            "name": meta.name,
            "path": meta.path,
            "created_at": meta.created_at,
        }))?;
    } else {
        println!("Registered project '{slug}' ({})", meta.path);
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = ProjectRegistry::load(root).context("failed to load projects")?;
    let active = Session::load(root)
        .context("failed to load session")?
        .project;

    if json {
        let items: Vec<_> = registry
            .list()
            .map(|(slug, meta)| {
                serde_json::json!({
                    "slug": slug,
                    "name": meta.name,
                    "path": meta.path,
                    "created_at": meta.created_at,
                    "active": active.as_deref() == Some(slug.as_str()),
                })
            })
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    if registry.is_empty() {
        println!("No projects registered.");
        return Ok(());
    }
    let rows = registry
        .list()
        .map(|(slug, meta)| {
            let marker = if active.as_deref() == Some(slug.as_str()) { "*" } else { "" };
            vec![
                marker.to_string(),
                slug.clone(),
                meta.name.clone(),
                meta.path.clone(),
            ]
        })
        .collect();
    print_table(&["", "SLUG", "NAME", "PATH"], rows);
    Ok(())
}

fn use_project(root: &Path, slug: &str, json: bool) -> anyhow::Result<()> {
    let active = resolve_project(root, Some(slug))?;
    if json {
        print_json(&serde_json::json!({ "project": active }))?;
    } else {
        println!("Active project: {active}");
    }
    Ok(())
}

fn record(root: &Path, project: &str, entry: &ConstitutionEntry, json: bool) -> anyhow::Result<()> {
    let (path, replaced) = constitution::record(root, project, entry)
        .with_context(|| format!("failed to update constitution for '{project}'"))?;
    let path = paths::display_relative(root, &path);

    if json {
        print_json(&serde_json::json!({
            "project": project,
            "path": path,
            "replaced": replaced,
            "entry": entry,
        }))?;
    } else {
        let action = if replaced { "Updated" } else { "Appended" };
        println!("{action} '{}' in {path}", entry.title);
    }
    Ok(())
}
