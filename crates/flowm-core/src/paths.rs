use crate::error::{FlowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FLOW_DIR: &str = ".flow-maestro";
pub const STATE_DIR: &str = ".flow-maestro/state";
pub const PROJECTS_DIR: &str = ".flow-maestro/projects";

pub const CONFIG_FILE: &str = ".flow-maestro/config.yaml";
pub const PROJECTS_FILE: &str = ".flow-maestro/state/projects.json";
pub const SESSION_FILE: &str = ".flow-maestro/state/session.json";

pub const CHANGES_DIR: &str = "changes";
pub const ARCHIVE_DIR: &str = "archive";
pub const SPECS_DIR: &str = "specs";
pub const SPEC_FILE: &str = "spec.md";
pub const PLAN_FILE: &str = "plan.md";
/// Older changes carry their plan as `blueprint.md`.
pub const LEGACY_PLAN_FILE: &str = "blueprint.md";
pub const TASKS_FILE: &str = "tasks.md";
pub const CONSTITUTION_FILE: &str = "constitution.md";
pub const TIMELINE_FILE: &str = "timeline.jsonl";
pub const DIFF_FILE: &str = "merge.diff";
pub const SPEC_MANIFEST_FILE: &str = "specs_manifest.json";
pub const SPEC_MERGE_REPORT_FILE: &str = "specs_merge_report.json";
pub const SPEC_INDEX_FILE: &str = "spec_index.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn flow_dir(root: &Path) -> PathBuf {
    root.join(FLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn projects_path(root: &Path) -> PathBuf {
    root.join(PROJECTS_FILE)
}

pub fn session_path(root: &Path) -> PathBuf {
    root.join(SESSION_FILE)
}

pub fn project_dir(root: &Path, project: &str) -> PathBuf {
    root.join(PROJECTS_DIR).join(project)
}

pub fn constitution_path(root: &Path, project: &str) -> PathBuf {
    project_dir(root, project).join(CONSTITUTION_FILE)
}

/// `plan.md`, or `blueprint.md` when only the legacy name exists.
pub fn plan_path(root: &Path, project: &str, change_id: &str) -> PathBuf {
    let dir = change_dir(root, project, change_id);
    let plan = dir.join(PLAN_FILE);
    let legacy = dir.join(LEGACY_PLAN_FILE);
    if !plan.exists() && legacy.exists() {
        legacy
    } else {
        plan
    }
}

pub fn changes_dir(root: &Path, project: &str) -> PathBuf {
    project_dir(root, project).join(CHANGES_DIR)
}

pub fn change_dir(root: &Path, project: &str, change_id: &str) -> PathBuf {
    changes_dir(root, project).join(change_id)
}

pub fn archive_dir(root: &Path, project: &str) -> PathBuf {
    changes_dir(root, project).join(ARCHIVE_DIR)
}

pub fn change_specs_dir(root: &Path, project: &str, change_id: &str) -> PathBuf {
    change_dir(root, project, change_id).join(SPECS_DIR)
}

pub fn delta_spec_path(root: &Path, project: &str, change_id: &str, capability: &str) -> PathBuf {
    change_specs_dir(root, project, change_id)
        .join(capability)
        .join(SPEC_FILE)
}

pub fn diff_path(root: &Path, project: &str, change_id: &str, capability: &str) -> PathBuf {
    change_specs_dir(root, project, change_id)
        .join(capability)
        .join(DIFF_FILE)
}

pub fn canonical_spec_path(root: &Path, project: &str, capability: &str) -> PathBuf {
    project_dir(root, project)
        .join(SPECS_DIR)
        .join(capability)
        .join(SPEC_FILE)
}

pub fn spec_manifest_path(root: &Path, project: &str, change_id: &str) -> PathBuf {
    change_dir(root, project, change_id).join(SPEC_MANIFEST_FILE)
}

pub fn spec_merge_report_path(root: &Path, project: &str, change_id: &str) -> PathBuf {
    change_dir(root, project, change_id).join(SPEC_MERGE_REPORT_FILE)
}

pub fn spec_index_path(root: &Path, project: &str) -> PathBuf {
    project_dir(root, project).join("state").join(SPEC_INDEX_FILE)
}

pub fn timeline_path(root: &Path, project: &str, change_id: &str) -> PathBuf {
    change_dir(root, project, change_id).join(TIMELINE_FILE)
}

/// Render `path` relative to the workspace root for manifests and reports.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Slugs
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();
static IDENT_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

fn ident_re() -> &'static Regex {
    IDENT_RE.get_or_init(|| Regex::new(r"[^a-z0-9._-]+").unwrap())
}

/// Project and change slugs: lowercase alphanumerics and hyphens.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(FlowError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Normalize free text into a requirement identifier token.
///
/// Lower-cases, collapses every run of characters outside `[a-z0-9._-]` into a
/// single hyphen and trims hyphens from both ends. Never returns an empty
/// string: blank input becomes `item`.
pub fn slugify_identifier(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let replaced = ident_re().replace_all(&lowered, "-");
    let token = replaced.trim_matches('-');
    if token.is_empty() {
        "item".to_string()
    } else {
        token.to_string()
    }
}

/// Title-case `value` word by word, treating `-` and `_` as spaces.
pub fn title_case(value: &str) -> String {
    let spaced = value.replace(['-', '_'], " ");
    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for ch in spaced.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = !ch.is_numeric();
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
