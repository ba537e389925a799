//! Text surgery that folds a parsed delta into canonical spec text.
//!
//! Each step takes the whole document and returns a new one. Steps always run
//! in the order REMOVED → RENAMED → MODIFIED → ADDED, whatever order the
//! sections appear in the delta file, and each step sees the output of the
//! previous one.

use crate::delta::{DeltaParseResult, RenameDelta, RequirementDelta, REQUIREMENT_HEADING};
use crate::error::{FlowError, Result};
use crate::paths;

pub const REQUIREMENTS_SECTION: &str = "## Requirements";

/// Body for a canonical spec that does not exist yet.
pub fn default_spec_content(capability: &str) -> String {
    format!(
        "# {} Specification\n\n{REQUIREMENTS_SECTION}\n\n",
        paths::title_case(capability)
    )
}

/// Title carried by a rename token: `### Requirement: Foo` and `Foo` both
/// yield `Foo`.
pub fn heading_title(token: &str) -> &str {
    token
        .trim()
        .strip_prefix(REQUIREMENT_HEADING)
        .unwrap_or(token)
        .trim()
}

/// Apply every step of the merge pipeline.
pub fn apply_deltas_to_spec(content: &str, deltas: &DeltaParseResult) -> Result<String> {
    let content = ensure_requirements_container(content);
    let content = remove_requirements(&content, &deltas.removed)?;
    let content = apply_renames(&content, &deltas.renames)?;
    let content = apply_modifications(&content, &deltas.modified)?;
    let content = append_additions(&content, &deltas.added);
    Ok(format!("{}\n", content.trim_end()))
}

/// Documents without any requirement yet get a `## Requirements` header so
/// appended requirements land in a section.
pub fn ensure_requirements_container(content: &str) -> String {
    if content.contains(REQUIREMENT_HEADING) {
        return content.to_string();
    }
    let mut out = content.trim_end().to_string();
    if !content.contains(REQUIREMENTS_SECTION) {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(REQUIREMENTS_SECTION);
    }
    out.push('\n');
    out
}

/// Line span `[start, end)` of the requirement titled `title`: from its
/// heading up to the next requirement heading or end of document.
fn find_requirement_block<S: AsRef<str>>(lines: &[S], title: &str) -> Result<(usize, usize)> {
    let needle = format!("{REQUIREMENT_HEADING} {title}");
    let start = lines
        .iter()
        .position(|l| l.as_ref().trim() == needle)
        .ok_or_else(|| FlowError::RequirementNotFound(title.to_string()))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.as_ref().starts_with(REQUIREMENT_HEADING))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len());
    Ok((start, end))
}

pub fn remove_requirements(content: &str, removed: &[RequirementDelta]) -> Result<String> {
    let mut content = content.to_string();
    for delta in removed {
        let lines: Vec<&str> = content.lines().collect();
        let (start, end) = find_requirement_block(&lines, &delta.title)?;
        tracing::debug!(title = %delta.title, start, end, "removing requirement block");
        let kept: Vec<&str> = lines[..start]
            .iter()
            .chain(lines[end..].iter())
            .copied()
            .collect();
        content = format!("{}\n", kept.join("\n").trim_matches('\n'));
    }
    Ok(content)
}

/// Rewrite one line per rename.
///
/// A requirement heading whose title equals the old token's title wins. After
/// that, a heading containing the old token, and last any line containing it.
/// A heading renamed to a bare title keeps its `### Requirement:` prefix.
pub fn apply_renames(content: &str, renames: &[RenameDelta]) -> Result<String> {
    let mut content = content.to_string();
    for rename in renames {
        let old = rename.old.replace('`', "");
        let old = old.trim();
        let new = rename.new.replace('`', "");
        let new = new.trim();
        if old.is_empty() {
            return Err(FlowError::RenameTargetMissing(rename.old.clone()));
        }

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        let old_title = heading_title(old);
        let target = lines
            .iter()
            .position(|l| l.starts_with(REQUIREMENT_HEADING) && heading_title(l) == old_title)
            .or_else(|| {
                lines
                    .iter()
                    .position(|l| l.starts_with(REQUIREMENT_HEADING) && l.contains(old))
            })
            .or_else(|| lines.iter().position(|l| l.contains(old)))
            .ok_or_else(|| FlowError::RenameTargetMissing(old.to_string()))?;

        let replacement =
            if lines[target].starts_with(REQUIREMENT_HEADING) && !new.starts_with(REQUIREMENT_HEADING) {
                format!("{REQUIREMENT_HEADING} {new}")
            } else {
                new.to_string()
            };
        tracing::debug!(line = target, from = %lines[target], to = %replacement, "renaming");
        lines[target] = replacement;
        content = lines.join("\n");
    }
    Ok(content)
}

pub fn apply_modifications(content: &str, modified: &[RequirementDelta]) -> Result<String> {
    let mut content = content.to_string();
    for delta in modified {
        let lines: Vec<&str> = content.lines().collect();
        let (start, end) = find_requirement_block(&lines, &delta.title)?;
        let mut updated: Vec<&str> = Vec::with_capacity(lines.len());
        updated.extend_from_slice(&lines[..start]);
        updated.extend(delta.body.lines());
        if end < lines.len() {
            // Keep a blank line before the next requirement heading.
            updated.push("");
        }
        updated.extend_from_slice(&lines[end..]);
        content = updated.join("\n");
    }
    Ok(content)
}

pub fn append_additions(content: &str, added: &[RequirementDelta]) -> String {
    let mut content = content.to_string();
    for delta in added {
        content = format!(
            "{}\n\n{}\n",
            content.trim_end(),
            delta.body.trim_matches('\n')
        );
    }
    content
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
