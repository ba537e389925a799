use crate::error::{FlowError, Result};
use crate::io;
use crate::paths;
use crate::session::Session;
use crate::timeline::{self, TimelineEvent};
use chrono::Utc;
use std::path::{Component, Path, PathBuf};

pub const STAGE_IDEATE: &str = "ideate";

const SPEC_TEMPLATE: &str = "# Change: {change_id}

## Overview
- Problem summary: <describe the gap or opportunity>
- Impacted users or teams: <list primary audiences>

## Success Criteria
- Success signal: <how we'll measure success>
";

const PLAN_TEMPLATE: &str = "# Implementation Plan

## Summary
- Problem: <one sentence recap>
- Desired outcome: <target state>

## Implementation Phases
- Phase 1: <focus and owner>

## Tests & Validation
- Automated: <commands to run>
- Manual: <scenarios or sign-off steps>
";

const TASKS_TEMPLATE: &str = "## Phase 1 - Implementation
- [ ] 1.1 Primary change track

## Phase 2 - Verification
- [ ] 2.1 Automated validation
";

/// Placeholder delta written for each capability named at `changes init`.
pub const DELTA_TEMPLATE: &str = "## ADDED Requirements
### Requirement: Placeholder
Describe the requirement.

#### Scenario: Primary success
- **WHEN** ...
- **THEN** ...
";

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// Create the change directory with its `specs/`, `assets/` and `notes/`
/// subdirectories. Idempotent.
pub fn ensure_change_structure(root: &Path, project: &str, change_id: &str) -> Result<PathBuf> {
    let dir = paths::change_dir(root, project, change_id);
    for sub in [paths::SPECS_DIR, "assets", "notes"] {
        io::ensure_dir(&dir.join(sub))?;
    }
    Ok(dir)
}

/// Change ids are slugs. `archive` is reserved for the archive directory.
pub fn validate_change_id(change_id: &str) -> Result<()> {
    paths::validate_slug(change_id)?;
    if change_id == paths::ARCHIVE_DIR {
        return Err(FlowError::InvalidSlug(change_id.to_string()));
    }
    Ok(())
}

/// Capability names may nest (`billing/invoices`) but must stay inside the
/// change's `specs/` directory.
fn validate_capability(capability: &str) -> Result<()> {
    let path = Path::new(capability);
    let contained = !capability.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if contained {
        Ok(())
    } else {
        Err(FlowError::InvalidSlug(capability.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInit {
    pub dir: PathBuf,
    /// Scaffold files written by this call. Existing files are preserved.
    pub created: Vec<String>,
    /// Capabilities that received a placeholder delta.
    pub deltas: Vec<String>,
}

/// Scaffold a change, seed placeholder deltas and make it the active change.
pub fn init_change(
    root: &Path,
    project: &str,
    change_id: &str,
    capabilities: &[String],
) -> Result<ChangeInit> {
    validate_change_id(change_id)?;
    for cap in capabilities {
        validate_capability(cap)?;
    }

    let dir = ensure_change_structure(root, project, change_id)?;
    let spec = SPEC_TEMPLATE.replace("{change_id}", change_id);
    let scaffolds: [(&str, &str); 5] = [
        (paths::SPEC_FILE, spec.as_str()),
        (paths::PLAN_FILE, PLAN_TEMPLATE),
        (paths::TASKS_FILE, TASKS_TEMPLATE),
        ("qa.md", ""),
        (paths::TIMELINE_FILE, ""),
    ];
    let mut created = Vec::new();
    for (name, body) in scaffolds {
        if io::write_if_missing(&dir.join(name), body.as_bytes())? {
            created.push(name.to_string());
        }
    }

    let mut deltas = Vec::new();
    for cap in capabilities {
        let path = paths::delta_spec_path(root, project, change_id, cap);
        if io::write_if_missing(&path, DELTA_TEMPLATE.as_bytes())? {
            deltas.push(cap.clone());
        }
    }

    Session::set_change(root, project, change_id, STAGE_IDEATE)?;
    timeline::append(
        root,
        project,
        change_id,
        &TimelineEvent::now("changes.init", "Initialized change workspace"),
    )?;
    tracing::info!(project, change_id, created = created.len(), "initialized change");

    Ok(ChangeInit {
        dir,
        created,
        deltas,
    })
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Active change ids for `project`, sorted. The archive is not a change.
pub fn list_changes(root: &Path, project: &str) -> Result<Vec<String>> {
    let dir = paths::changes_dir(root, project);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != paths::ARCHIVE_DIR {
            ids.push(name);
        }
    }
    ids.sort();
    Ok(ids)
}

/// Use `requested`, or fall back to the session's active change. The change
/// directory must exist.
pub fn resolve_change(root: &Path, project: &str, requested: Option<&str>) -> Result<String> {
    let change_id = match requested {
        Some(id) => id.to_string(),
        None => Session::load(root)?
            .change
            .ok_or(FlowError::NoActiveChange)?,
    };
    validate_change_id(&change_id)?;
    if !paths::change_dir(root, project, &change_id).is_dir() {
        return Err(FlowError::ChangeNotFound {
            project: project.to_string(),
            change: change_id,
        });
    }
    Ok(change_id)
}

/// One capability's delta document inside a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSpecFile {
    /// Path of the delta's directory relative to `specs/`, `/`-separated.
    pub capability: String,
    pub path: PathBuf,
}

/// Every `spec.md` below the change's `specs/` directory, sorted by path.
pub fn change_delta_specs(root: &Path, project: &str, change_id: &str) -> Result<Vec<DeltaSpecFile>> {
    let base = paths::change_specs_dir(root, project, change_id);
    if !base.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    collect_spec_files(&base, &mut found)?;
    found.sort();

    Ok(found
        .into_iter()
        .filter_map(|path| {
            let rel = path.strip_prefix(&base).ok()?.parent()?;
            let capability = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            Some(DeltaSpecFile { capability, path })
        })
        .collect())
}

fn collect_spec_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_spec_files(&path, found)?;
        } else if entry.file_name() == paths::SPEC_FILE {
            found.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Where `archive_change` would move the change today. Fails when the change
/// is missing or the destination is already taken. Creates nothing.
pub fn archive_destination(root: &Path, project: &str, change_id: &str) -> Result<PathBuf> {
    validate_change_id(change_id)?;
    if !paths::change_dir(root, project, change_id).is_dir() {
        return Err(FlowError::ChangeNotFound {
            project: project.to_string(),
            change: change_id.to_string(),
        });
    }
    let dest = paths::archive_dir(root, project)
        .join(format!("{}-{change_id}", Utc::now().format("%Y-%m-%d")));
    if dest.exists() {
        return Err(FlowError::ArchiveExists(dest.display().to_string()));
    }
    Ok(dest)
}

/// Move a change to `changes/archive/<YYYY-MM-DD>-<change_id>`.
pub fn archive_change(root: &Path, project: &str, change_id: &str) -> Result<PathBuf> {
    let src = paths::change_dir(root, project, change_id);
    let dest = archive_destination(root, project, change_id)?;
    io::ensure_dir(&paths::archive_dir(root, project))?;
    std::fs::rename(&src, &dest)?;
    tracing::info!(change_id, dest = %dest.display(), "archived change");
    Ok(dest)
}
