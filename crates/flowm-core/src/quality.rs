//! Placeholder lint for the prose artifacts of a change.
//!
//! `quality check` looks for template markers left unfilled in `spec.md`,
//! `plan.md` and `tasks.md`, plus any `TODO` or `TBD` marker.

use crate::error::{FlowError, Result};
use crate::paths;
use crate::timeline::{self, TimelineEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Template markers and what they stand for.
pub const PLACEHOLDERS: &[(&str, &str)] = &[
    ("<describe the gap or opportunity>", "spec overview placeholder"),
    ("<list primary audiences>", "spec overview placeholder"),
    ("<how we'll measure success>", "success criteria placeholder"),
    ("<one sentence recap>", "plan summary placeholder"),
    ("<target state>", "plan summary placeholder"),
    ("<focus and owner>", "phase placeholder"),
    ("<commands to run>", "validation placeholder"),
    ("<scenarios or sign-off steps>", "validation placeholder"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTarget {
    Spec,
    Plan,
    Tasks,
}

impl QualityTarget {
    pub const ALL: [QualityTarget; 3] = [QualityTarget::Spec, QualityTarget::Plan, QualityTarget::Tasks];

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTarget::Spec => "spec",
            QualityTarget::Plan => "plan",
            QualityTarget::Tasks => "tasks",
        }
    }

    fn path(self, root: &Path, project: &str, change_id: &str) -> std::path::PathBuf {
        let dir = paths::change_dir(root, project, change_id);
        match self {
            QualityTarget::Spec => dir.join(paths::SPEC_FILE),
            QualityTarget::Plan => paths::plan_path(root, project, change_id),
            QualityTarget::Tasks => dir.join(paths::TASKS_FILE),
        }
    }
}

impl fmt::Display for QualityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QualityTarget {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "spec" => Ok(QualityTarget::Spec),
            "plan" | "blueprint" => Ok(QualityTarget::Plan),
            "tasks" => Ok(QualityTarget::Tasks),
            _ => Err(FlowError::UnknownQualityTarget(vec![s.to_string()])),
        }
    }
}

/// Resolve `--include` values, deduplicated in request order. No values
/// means every target. All unknown names are reported together.
pub fn parse_targets(requested: &[String]) -> Result<Vec<QualityTarget>> {
    let mut targets = Vec::new();
    let mut unknown = Vec::new();
    for name in requested.iter().filter(|n| !n.is_empty()) {
        match name.parse::<QualityTarget>() {
            Ok(t) if !targets.contains(&t) => targets.push(t),
            Ok(_) => {}
            Err(_) => unknown.push(name.to_lowercase()),
        }
    }
    if !unknown.is_empty() {
        unknown.sort();
        unknown.dedup();
        return Err(FlowError::UnknownQualityTarget(unknown));
    }
    if targets.is_empty() {
        targets.extend(QualityTarget::ALL);
    }
    Ok(targets)
}

/// Problems found in one document's text.
pub fn lint_text(text: &str) -> Vec<String> {
    let mut problems: Vec<String> = PLACEHOLDERS
        .iter()
        .filter(|(marker, _)| text.contains(marker))
        .map(|(marker, what)| format!("{what} -> '{marker}'"))
        .collect();
    if text.contains("TODO") {
        problems.push("contains TODO marker".to_string());
    }
    if text.contains("TBD") {
        problems.push("contains TBD marker".to_string());
    }
    problems
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub target: QualityTarget,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub change_id: String,
    pub targets: Vec<QualityTarget>,
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn is_clear(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Lint `targets` of a change and record a `quality.check` timeline event.
pub fn check_change(
    root: &Path,
    project: &str,
    change_id: &str,
    targets: &[QualityTarget],
) -> Result<QualityReport> {
    let mut issues = Vec::new();
    for &target in targets {
        let path = target.path(root, project, change_id);
        if !path.exists() {
            issues.push(QualityIssue {
                target,
                message: format!("missing file ({})", paths::display_relative(root, &path)),
            });
            continue;
        }
        let problems = lint_text(&std::fs::read_to_string(&path)?);
        if !problems.is_empty() {
            issues.push(QualityIssue {
                target,
                message: problems.join("; "),
            });
        }
    }

    let status = if issues.is_empty() { "clear" } else { "warnings" };
    timeline::append(
        root,
        project,
        change_id,
        &TimelineEvent::now("quality.check", format!("Quality check {status}")),
    )?;
    tracing::debug!(change_id, issues = issues.len(), "quality check");

    Ok(QualityReport {
        change_id: change_id.to_string(),
        targets: targets.to_vec(),
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn targets_default_dedupe_and_alias() {
        assert_eq!(parse_targets(&[]).unwrap(), QualityTarget::ALL);
        assert_eq!(
            parse_targets(&strings(&["Blueprint", "plan", "spec"])).unwrap(),
            [QualityTarget::Plan, QualityTarget::Spec]
        );
    }

    #[test]
    fn unknown_targets_are_reported_together() {
        let err = parse_targets(&strings(&["spec", "readme", "Notes", "readme"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown quality target(s): notes, readme");
    }

    #[test]
    fn lint_finds_markers() {
        let problems = lint_text("- Problem: <one sentence recap>\nTODO: fill\nowner TBD\n");
        assert_eq!(
            problems,
            [
                "plan summary placeholder -> '<one sentence recap>'",
                "contains TODO marker",
                "contains TBD marker",
            ]
        );
        assert!(lint_text("All filled in.\n").is_empty());
    }

    #[test]
    fn fresh_change_has_warnings_until_filled() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        change::init_change(root, "demo", "chg", &[]).unwrap();

        let report = check_change(root, "demo", "chg", &QualityTarget::ALL).unwrap();
        let flagged: Vec<_> = report.issues.iter().map(|i| i.target).collect();
        assert_eq!(flagged, [QualityTarget::Spec, QualityTarget::Plan]);

        let change_dir = paths::change_dir(root, "demo", "chg");
        std::fs::write(change_dir.join(paths::SPEC_FILE), "# Change\n\nDone.\n").unwrap();
        std::fs::remove_file(change_dir.join(paths::PLAN_FILE)).unwrap();
        std::fs::write(change_dir.join(paths::LEGACY_PLAN_FILE), "# Plan\n\nShip it.\n").unwrap();

        let report = check_change(root, "demo", "chg", &QualityTarget::ALL).unwrap();
        assert!(report.is_clear());

        let events = timeline::read(root, "demo", "chg").unwrap();
        let summaries: Vec<_> = events.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(
            summaries,
            ["Initialized change workspace", "Quality check warnings", "Quality check clear"]
        );
    }

    #[test]
    fn missing_file_is_an_issue() {
        let dir = TempDir::new().unwrap();
        change::ensure_change_structure(dir.path(), "demo", "chg").unwrap();
        let report = check_change(dir.path(), "demo", "chg", &[QualityTarget::Tasks]).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.starts_with("missing file ("));
    }
}
