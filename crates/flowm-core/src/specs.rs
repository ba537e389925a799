//! Prepare and merge the delta specs of one change.
//!
//! `prepare_change` previews: it parses every capability delta, resolves
//! requirement ids and records the outcome in `specs_manifest.json` (plus
//! optional `merge.diff` previews). `merge_change` does the same computation
//! and then writes the canonical specs, the identity index and a merge
//! report. Nothing is written until every capability has parsed, validated
//! and applied cleanly.

use crate::change::{self, DeltaSpecFile};
use crate::config::SpecsConfig;
use crate::delta::{self, DeltaOperation, DeltaParseResult, RenameDelta, RequirementDelta};
use crate::diff;
use crate::error::{FlowError, Result};
use crate::identity::{resolve_requirement_id, RequirementIndex};
use crate::io;
use crate::merge::{self, heading_title};
use crate::paths;
use crate::timeline::{self, TimelineEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewOptions {
    pub write_diffs: bool,
    pub diff_context: usize,
}

impl From<&SpecsConfig> for PreviewOptions {
    fn from(cfg: &SpecsConfig) -> Self {
        Self {
            write_diffs: cfg.write_diffs,
            diff_context: cfg.diff_context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub preview: PreviewOptions,
    pub dry_run: bool,
    /// Archive the change after a successful merge.
    pub archive: bool,
}

impl From<&SpecsConfig> for MergeOptions {
    fn from(cfg: &SpecsConfig) -> Self {
        Self {
            preview: cfg.into(),
            dry_run: false,
            archive: cfg.archive_on_merge,
        }
    }
}

// ---------------------------------------------------------------------------
// CapabilityDelta
// ---------------------------------------------------------------------------

/// A parsed, validated delta with its canonical text before and after.
#[derive(Debug, Clone)]
pub struct CapabilityDelta {
    pub capability: String,
    pub delta_path: PathBuf,
    pub canonical_path: PathBuf,
    pub parsed: DeltaParseResult,
    /// Canonical text on disk, or the default body when none exists yet.
    pub current: String,
    pub proposed: String,
    pub exists: bool,
    pub diff: Option<String>,
}

impl CapabilityDelta {
    pub fn would_create(&self) -> bool {
        !self.exists
    }

    pub fn preview_changed(&self) -> bool {
        self.proposed != self.current
    }

    /// Whether merging writes the canonical file.
    pub fn changed(&self) -> bool {
        self.would_create() || self.preview_changed()
    }
}

// ---------------------------------------------------------------------------
// Manifest / report documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementEntry {
    pub operation: DeltaOperation,
    pub title: String,
    pub requirement_id: String,
    pub has_scenario: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    pub capability: String,
    pub delta_path: String,
    pub canonical_path: String,
    pub diff_path: Option<String>,
    pub would_create: bool,
    pub preview_changed: bool,
    pub requirements: Vec<RequirementEntry>,
    pub renames: Vec<RenameDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub capabilities: usize,
    pub requirements: usize,
    pub diffs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub project: String,
    pub change_id: String,
    pub generated_at: DateTime<Utc>,
    pub capabilities: Vec<CapabilityManifest>,
    pub stats: ManifestStats,
}

impl Manifest {
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = paths::spec_manifest_path(root, &self.project, &self.change_id);
        io::write_json(&path, self)?;
        tracing::info!(path = %path.display(), "wrote spec manifest");
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub capability: String,
    pub delta_path: String,
    pub canonical_path: String,
    pub changed: bool,
    pub would_create: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub project: String,
    pub change_id: String,
    pub generated_at: DateTime<Utc>,
    pub dry_run: bool,
    pub finalized: bool,
    pub results: Vec<MergeResult>,
}

impl MergeReport {
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let path = paths::spec_merge_report_path(root, &self.project, &self.change_id);
        io::write_json(&path, self)?;
        tracing::info!(path = %path.display(), "wrote merge report");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Gather / validate / prepare
// ---------------------------------------------------------------------------

/// Every delta spec of the change; an empty change is an error.
pub fn gather(root: &Path, project: &str, change_id: &str) -> Result<Vec<DeltaSpecFile>> {
    let files = change::change_delta_specs(root, project, change_id)?;
    if files.is_empty() {
        return Err(FlowError::NoDeltaSpecs(change_id.to_string()));
    }
    Ok(files)
}

/// Parse and validate every delta of a change without touching canonical
/// specs. Returns the number of capabilities checked.
pub fn validate_change(root: &Path, project: &str, change_id: &str) -> Result<usize> {
    let files = gather(root, project, change_id)?;
    let mut errors = Vec::new();
    for file in &files {
        let text = std::fs::read_to_string(&file.path)?;
        match delta::parse_and_validate(&text) {
            Ok(_) => {}
            Err(FlowError::DeltaValidation(problems)) => errors.extend(
                problems
                    .into_iter()
                    .map(|e| format!("{}: {e}", file.capability)),
            ),
            Err(e) => errors.push(format!("{}: {e}", file.capability)),
        }
    }
    if !errors.is_empty() {
        return Err(FlowError::DeltaValidation(errors));
    }
    Ok(files.len())
}

/// Compute the proposed canonical text for every capability.
///
/// Parse, validation and apply failures are collected across all
/// capabilities as `<capability>: <error>` lines and returned together.
pub fn prepare(
    root: &Path,
    project: &str,
    files: &[DeltaSpecFile],
    diff_context: usize,
) -> Result<Vec<CapabilityDelta>> {
    let mut errors = Vec::new();
    let mut prepared = Vec::with_capacity(files.len());

    for file in files {
        let cap = &file.capability;
        let text = std::fs::read_to_string(&file.path)?;
        let parsed = match delta::parse_delta_markdown(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                errors.push(format!("{cap}: {e}"));
                continue;
            }
        };
        let problems = delta::validate_delta_result(&parsed);
        if !problems.is_empty() {
            errors.extend(problems.into_iter().map(|e| format!("{cap}: {e}")));
            continue;
        }

        let canonical_path = paths::canonical_spec_path(root, project, cap);
        let exists = canonical_path.exists();
        let current = if exists {
            std::fs::read_to_string(&canonical_path)?
        } else {
            merge::default_spec_content(cap)
        };
        let proposed = match merge::apply_deltas_to_spec(&current, &parsed) {
            Ok(text) => text,
            Err(e) => {
                errors.push(format!("{cap}: {e}"));
                continue;
            }
        };

        let label = paths::display_relative(root, &canonical_path);
        let diff = diff::unified_diff(
            &current,
            &proposed,
            &format!("a/{label}"),
            &format!("b/{label}"),
            diff_context,
        );
        tracing::debug!(
            capability = %cap,
            requirements = parsed.requirement_count(),
            renames = parsed.renames.len(),
            changed = diff.is_some(),
            "prepared capability"
        );
        prepared.push(CapabilityDelta {
            capability: cap.clone(),
            delta_path: file.path.clone(),
            canonical_path,
            parsed,
            current,
            proposed,
            exists,
            diff,
        });
    }

    if !errors.is_empty() {
        return Err(FlowError::DeltaValidation(errors));
    }
    Ok(prepared)
}

// ---------------------------------------------------------------------------
// Identity resolution
// ---------------------------------------------------------------------------

fn resolve_bucket(
    deltas: &[RequirementDelta],
    capability: &str,
    index: &mut RequirementIndex,
    claimed: &mut HashSet<String>,
    change_id: &str,
    now: DateTime<Utc>,
) -> Vec<String> {
    deltas
        .iter()
        .map(|delta| {
            let id = resolve_requirement_id(delta, capability, index, claimed);
            index.record(&id, capability, delta, change_id, now);
            id
        })
        .collect()
}

/// Resolve ids for one capability and fold them into `index`, following the
/// merge order: removals, renames, modifications, additions. Entries come
/// back ADDED, MODIFIED, REMOVED, each in source order.
fn resolve_capability(
    ctx: &CapabilityDelta,
    index: &mut RequirementIndex,
    claimed: &mut HashSet<String>,
    change_id: &str,
    now: DateTime<Utc>,
) -> Vec<RequirementEntry> {
    let cap = ctx.capability.as_str();
    let parsed = &ctx.parsed;

    let removed = resolve_bucket(&parsed.removed, cap, index, claimed, change_id, now);
    for rename in &parsed.renames {
        let (old, new) = (heading_title(&rename.old), heading_title(&rename.new));
        match index.rename_title(cap, old, new, change_id, now) {
            Some(id) => tracing::debug!(%id, old, new, "retitled indexed requirement"),
            None => tracing::debug!(capability = cap, old, "rename has no indexed requirement"),
        }
    }
    let modified = resolve_bucket(&parsed.modified, cap, index, claimed, change_id, now);
    let added = resolve_bucket(&parsed.added, cap, index, claimed, change_id, now);

    parsed
        .added
        .iter()
        .zip(added)
        .chain(parsed.modified.iter().zip(modified))
        .chain(parsed.removed.iter().zip(removed))
        .map(|(delta, requirement_id)| RequirementEntry {
            operation: delta.operation,
            title: delta.title.clone(),
            requirement_id,
            has_scenario: delta.has_scenario(),
        })
        .collect()
}

/// Build the manifest for prepared capabilities.
///
/// Returns the manifest and `index` with every resolved change folded in.
/// `index` is taken by value; callers that only preview drop the result.
pub fn build_manifest(
    root: &Path,
    project: &str,
    change_id: &str,
    prepared: &[CapabilityDelta],
    mut index: RequirementIndex,
    write_diffs: bool,
) -> (Manifest, RequirementIndex) {
    let now = Utc::now();
    let mut claimed = HashSet::new();
    let mut stats = ManifestStats {
        capabilities: prepared.len(),
        ..Default::default()
    };

    let capabilities = prepared
        .iter()
        .map(|ctx| {
            let requirements = resolve_capability(ctx, &mut index, &mut claimed, change_id, now);
            stats.requirements += requirements.len();
            if ctx.diff.is_some() {
                stats.diffs += 1;
            }
            let diff_path = (write_diffs && ctx.diff.is_some()).then(|| {
                paths::display_relative(
                    root,
                    &paths::diff_path(root, project, change_id, &ctx.capability),
                )
            });
            CapabilityManifest {
                capability: ctx.capability.clone(),
                delta_path: paths::display_relative(root, &ctx.delta_path),
                canonical_path: paths::display_relative(root, &ctx.canonical_path),
                diff_path,
                would_create: ctx.would_create(),
                preview_changed: ctx.preview_changed(),
                requirements,
                renames: ctx.parsed.renames.clone(),
            }
        })
        .collect();

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        project: project.to_string(),
        change_id: change_id.to_string(),
        generated_at: now,
        capabilities,
        stats,
    };
    (manifest, index)
}

/// Write each capability's `merge.diff`, removing stale previews for
/// capabilities that no longer differ.
pub fn write_diff_previews(
    root: &Path,
    project: &str,
    change_id: &str,
    prepared: &[CapabilityDelta],
) -> Result<()> {
    for ctx in prepared {
        let path = paths::diff_path(root, project, change_id, &ctx.capability);
        match &ctx.diff {
            Some(text) => io::atomic_write(&path, text.as_bytes())?,
            None if path.exists() => std::fs::remove_file(&path)?,
            None => {}
        }
    }
    Ok(())
}

/// `specs prepare`: preview a change and persist its manifest.
pub fn prepare_change(
    root: &Path,
    project: &str,
    change_id: &str,
    index: &RequirementIndex,
    opts: PreviewOptions,
) -> Result<Manifest> {
    let files = gather(root, project, change_id)?;
    let prepared = prepare(root, project, &files, opts.diff_context)?;
    let (manifest, _) = build_manifest(
        root,
        project,
        change_id,
        &prepared,
        index.clone(),
        opts.write_diffs,
    );

    if opts.write_diffs {
        write_diff_previews(root, project, change_id, &prepared)?;
    }
    manifest.save(root)?;
    timeline::append(
        root,
        project,
        change_id,
        &TimelineEvent::now(
            "specs.prepare",
            format!("Prepared {} spec delta(s)", prepared.len()),
        ),
    )?;
    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The updated index. Unchanged on a dry run.
    pub index: RequirementIndex,
    pub manifest: Manifest,
    pub report: MergeReport,
    pub archived_to: Option<PathBuf>,
}

/// `specs merge`: fold every delta of a change into the canonical specs.
///
/// With `dry_run` the full computation runs and the manifest and report are
/// returned, but nothing is written.
pub fn merge_change(
    root: &Path,
    project: &str,
    change_id: &str,
    index: RequirementIndex,
    opts: MergeOptions,
) -> Result<MergeOutcome> {
    let files = gather(root, project, change_id)?;
    let prepared = prepare(root, project, &files, opts.preview.diff_context)?;
    let write_diffs = opts.preview.write_diffs && !opts.dry_run;
    let (manifest, updated) = build_manifest(
        root,
        project,
        change_id,
        &prepared,
        index.clone(),
        write_diffs,
    );

    let results: Vec<MergeResult> = prepared
        .iter()
        .map(|ctx| MergeResult {
            capability: ctx.capability.clone(),
            delta_path: paths::display_relative(root, &ctx.delta_path),
            canonical_path: paths::display_relative(root, &ctx.canonical_path),
            changed: ctx.changed(),
            would_create: ctx.would_create(),
        })
        .collect();

    let mut report = MergeReport {
        project: project.to_string(),
        change_id: change_id.to_string(),
        generated_at: manifest.generated_at,
        dry_run: opts.dry_run,
        finalized: false,
        results,
    };

    if opts.dry_run {
        tracing::debug!(change_id, capabilities = prepared.len(), "dry run: nothing written");
        return Ok(MergeOutcome {
            index,
            manifest,
            report,
            archived_to: None,
        });
    }

    // Fail on a taken archive slot before any canonical spec is written.
    if opts.archive {
        change::archive_destination(root, project, change_id)?;
    }

    for ctx in prepared.iter().filter(|c| c.changed()) {
        io::atomic_write(&ctx.canonical_path, ctx.proposed.as_bytes())?;
        tracing::info!(capability = %ctx.capability, path = %ctx.canonical_path.display(), "wrote canonical spec");
    }
    updated.save(root, project)?;

    if write_diffs {
        write_diff_previews(root, project, change_id, &prepared)?;
    }
    manifest.save(root)?;
    report.save(root)?;
    timeline::append(
        root,
        project,
        change_id,
        &TimelineEvent::now(
            "specs.merge",
            format!("Merged {} spec delta(s) into canonical specs", prepared.len()),
        ),
    )?;

    let archived_to = if opts.archive {
        let dest = change::archive_change(root, project, change_id)?;
        report.finalized = true;
        io::write_json(&dest.join(paths::SPEC_MERGE_REPORT_FILE), &report)?;
        Some(dest)
    } else {
        None
    };

    Ok(MergeOutcome {
        index: updated,
        manifest,
        report,
        archived_to,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
