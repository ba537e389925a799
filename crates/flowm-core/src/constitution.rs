//! Findings recorded in a project's `constitution.md`.
//!
//! Each section holds `- Title:` entries. Recording an entry whose title
//! already exists in that section (case-insensitively) replaces it in place
//! of appending a duplicate.

use crate::error::{FlowError, Result};
use crate::io;
use crate::paths;
use crate::project::CONSTITUTION_TEMPLATE;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const TITLE_PREFIX: &str = "- Title: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstitutionSection {
    Core,
    Data,
    Operations,
    Risks,
    Watchlist,
}

impl ConstitutionSection {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstitutionSection::Core => "core",
            ConstitutionSection::Data => "data",
            ConstitutionSection::Operations => "operations",
            ConstitutionSection::Risks => "risks",
            ConstitutionSection::Watchlist => "watchlist",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            ConstitutionSection::Core => "## Core Architecture",
            ConstitutionSection::Data => "## Data & Integrations",
            ConstitutionSection::Operations => "## Operational Guardrails",
            ConstitutionSection::Risks => "## Risks & Mitigations",
            ConstitutionSection::Watchlist => "## Watchlist",
        }
    }

    fn date_label(self) -> &'static str {
        match self {
            ConstitutionSection::Watchlist => "Last reviewed",
            _ => "Last verified",
        }
    }

    pub fn needs_owner(self) -> bool {
        self == ConstitutionSection::Watchlist
    }
}

impl fmt::Display for ConstitutionSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConstitutionSection {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "core" => Ok(ConstitutionSection::Core),
            "data" => Ok(ConstitutionSection::Data),
            "operations" => Ok(ConstitutionSection::Operations),
            "risks" => Ok(ConstitutionSection::Risks),
            "watchlist" => Ok(ConstitutionSection::Watchlist),
            _ => Err(FlowError::UnknownConstitutionSection(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstitutionEntry {
    pub section: ConstitutionSection,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub verified: NaiveDate,
    pub owner: Option<String>,
}

impl ConstitutionEntry {
    /// Normalize raw command input: titles and sources are trimmed, the
    /// summary collapses to single spaces and the date defaults to today.
    pub fn new(
        section: ConstitutionSection,
        title: &str,
        summary: &str,
        source: &str,
        verified: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(FlowError::MissingEntryField("title"));
        }
        let summary = summary.split_whitespace().collect::<Vec<_>>().join(" ");
        if summary.is_empty() {
            return Err(FlowError::MissingEntryField("summary"));
        }
        let source = source.trim();
        if source.is_empty() {
            return Err(FlowError::MissingEntryField("source"));
        }
        let owner = owner.map(str::trim).filter(|o| !o.is_empty());
        if section.needs_owner() && owner.is_none() {
            return Err(FlowError::MissingEntryField("owner"));
        }
        let verified = match verified {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| FlowError::InvalidDate(raw.to_string()))?,
            None => Utc::now().date_naive(),
        };

        Ok(Self {
            section,
            title: title.to_string(),
            summary,
            source: source.to_string(),
            verified,
            owner: owner.map(str::to_string),
        })
    }

    fn lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("{TITLE_PREFIX}{}", self.title),
            format!("  - Summary: {}", self.summary),
        ];
        if self.section.needs_owner() {
            out.push(format!("  - Owner: {}", self.owner.as_deref().unwrap_or_default()));
        }
        out.push(format!("  - Source: {}", self.source));
        out.push(format!(
            "  - {}: {}",
            self.section.date_label(),
            self.verified.format("%Y-%m-%d")
        ));
        out
    }
}

// ---------------------------------------------------------------------------
// Upsert
// ---------------------------------------------------------------------------

/// End of the section starting at `start`: the next `## ` line or EOF.
fn section_end(lines: &[String], start: usize) -> usize {
    lines[start + 1..]
        .iter()
        .position(|l| l.starts_with("## "))
        .map_or(lines.len(), |offset| start + 1 + offset)
}

/// Drop the entry titled `title` from `lines[start..end]`. Returns whether
/// one was removed.
fn remove_entry(lines: &mut Vec<String>, start: usize, end: usize, title: &str) -> bool {
    let wanted = title.to_lowercase();
    let mut idx = start + 1;
    while idx < end {
        let Some(current) = lines[idx].strip_prefix(TITLE_PREFIX) else {
            idx += 1;
            continue;
        };
        let matches = current.trim().to_lowercase() == wanted;
        let block_start = idx;
        idx += 1;
        while idx < end && !lines[idx].starts_with(TITLE_PREFIX) && !lines[idx].starts_with("## ") {
            idx += 1;
        }
        if matches {
            lines.drain(block_start..idx);
            return true;
        }
    }
    false
}

/// Insert or replace `entry` in constitution text. Returns the new text and
/// whether an existing entry was replaced. A missing section is appended.
pub fn upsert_entry(content: &str, entry: &ConstitutionEntry) -> (String, bool) {
    let header = entry.section.header();
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let start = match lines.iter().position(|l| l.trim() == header) {
        Some(idx) => idx,
        None => {
            if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(header.to_string());
            lines.push(String::new());
            lines.len() - 2
        }
    };
    let old_end = section_end(&lines, start);
    let replaced = remove_entry(&mut lines, start, old_end, &entry.title);
    let end = section_end(&lines, start);

    let mut insertion = entry.lines();
    insertion.push(String::new());
    if !lines[end - 1].trim().is_empty() {
        insertion.insert(0, String::new());
    }
    lines.splice(end..end, insertion);

    (format!("{}\n", lines.join("\n").trim_end()), replaced)
}

/// Record `entry` in the project's constitution, creating the file from the
/// scaffold when missing. Returns the path and whether an entry was replaced.
pub fn record(root: &Path, project: &str, entry: &ConstitutionEntry) -> Result<(PathBuf, bool)> {
    let path = paths::constitution_path(root, project);
    io::write_if_missing(&path, CONSTITUTION_TEMPLATE.replace("{project}", project).as_bytes())?;
    let content = std::fs::read_to_string(&path)?;
    let (updated, replaced) = upsert_entry(&content, entry);
    io::atomic_write(&path, updated.as_bytes())?;
    tracing::info!(project, section = %entry.section, title = %entry.title, replaced, "recorded constitution entry");
    Ok((path, replaced))
}
