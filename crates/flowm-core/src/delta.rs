//! Parser and validator for delta documents.
//!
//! A delta document describes changes to one capability's canonical spec:
//!
//! ```text
//! ## ADDED Requirements
//! ### Requirement: Payment Authorization
//! Transactions SHALL require authorization.
//!
//! #### Scenario: Basic purchase
//! - **WHEN** a customer submits a purchase
//! - **THEN** authorization occurs
//!
//! ## RENAMED Requirements
//! - FROM: `### Requirement: Old Name`
//! - TO: `### Requirement: New Name`
//! ```

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REQUIREMENT_HEADING: &str = "### Requirement:";
pub const SCENARIO_MARKER: &str = "#### Scenario:";

const BOM: char = '\u{feff}';

// ---------------------------------------------------------------------------
// DeltaOperation / DeltaSection
// ---------------------------------------------------------------------------

/// Operation applied to a single requirement block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeltaOperation {
    Added,
    Modified,
    Removed,
}

impl DeltaOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            DeltaOperation::Added => "ADDED",
            DeltaOperation::Modified => "MODIFIED",
            DeltaOperation::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for DeltaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `## ` section of a delta document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaSection {
    Requirements(DeltaOperation),
    Renamed,
}

impl DeltaSection {
    /// Parse a section header (the text after `## `). Only the first
    /// whitespace-delimited token is significant, case-insensitively.
    pub fn from_header(header: &str) -> Result<Self> {
        let kind = header.split_whitespace().next().unwrap_or_default().to_uppercase();
        match kind.as_str() {
            "ADDED" => Ok(DeltaSection::Requirements(DeltaOperation::Added)),
            "MODIFIED" => Ok(DeltaSection::Requirements(DeltaOperation::Modified)),
            "REMOVED" => Ok(DeltaSection::Requirements(DeltaOperation::Removed)),
            "RENAMED" => Ok(DeltaSection::Renamed),
            _ => Err(FlowError::UnsupportedDeltaSection(header.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsed shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDelta {
    pub operation: DeltaOperation,
    pub title: String,
    /// Full block text, heading line included.
    pub body: String,
}

impl RequirementDelta {
    pub fn has_scenario(&self) -> bool {
        self.body.contains(SCENARIO_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameDelta {
    pub old: String,
    pub new: String,
}

/// Structured form of one delta document. Every operation bucket is always
/// present; each keeps source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaParseResult {
    pub added: Vec<RequirementDelta>,
    pub modified: Vec<RequirementDelta>,
    pub removed: Vec<RequirementDelta>,
    pub renames: Vec<RenameDelta>,
}

impl DeltaParseResult {
    pub fn requirements(&self, op: DeltaOperation) -> &[RequirementDelta] {
        match op {
            DeltaOperation::Added => &self.added,
            DeltaOperation::Modified => &self.modified,
            DeltaOperation::Removed => &self.removed,
        }
    }

    fn bucket_mut(&mut self, op: DeltaOperation) -> &mut Vec<RequirementDelta> {
        match op {
            DeltaOperation::Added => &mut self.added,
            DeltaOperation::Modified => &mut self.modified,
            DeltaOperation::Removed => &mut self.removed,
        }
    }

    pub fn requirement_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirement_count() == 0 && self.renames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct PendingRequirement {
    operation: DeltaOperation,
    title: String,
    lines: Vec<String>,
}

impl PendingRequirement {
    fn finish(self) -> RequirementDelta {
        RequirementDelta {
            operation: self.operation,
            title: self.title,
            body: self.lines.join("\n").trim().to_string(),
        }
    }
}

fn list_value(line: &str) -> String {
    line.split_once(':')
        .map(|(_, v)| v)
        .unwrap_or_default()
        .trim()
        .trim_matches('`')
        .to_string()
}

fn flush(pending: &mut Option<PendingRequirement>, result: &mut DeltaParseResult) {
    if let Some(req) = pending.take() {
        let delta = req.finish();
        result.bucket_mut(delta.operation).push(delta);
    }
}

/// Parse a delta document in a single streaming pass.
///
/// Fails on the first structural problem; no partial result is returned.
pub fn parse_delta_markdown(text: &str) -> Result<DeltaParseResult> {
    let mut result = DeltaParseResult::default();
    let mut section: Option<DeltaSection> = None;
    let mut pending: Option<PendingRequirement> = None;
    let mut pending_from: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_matches(BOM);

        if let Some(header) = line.strip_prefix("## ") {
            flush(&mut pending, &mut result);
            pending_from = None;
            section = Some(DeltaSection::from_header(header.trim())?);
            continue;
        }

        match section {
            Some(DeltaSection::Requirements(operation)) => {
                if let Some(title) = line.strip_prefix(REQUIREMENT_HEADING) {
                    flush(&mut pending, &mut result);
                    pending = Some(PendingRequirement {
                        operation,
                        title: title.trim().to_string(),
                        lines: vec![line.to_string()],
                    });
                } else if let Some(req) = pending.as_mut() {
                    req.lines.push(line.to_string());
                }
            }
            Some(DeltaSection::Renamed) => {
                if line.starts_with("- FROM:") {
                    pending_from = Some(list_value(line));
                } else if line.starts_with("- TO:") {
                    let old = pending_from.take().ok_or(FlowError::RenameMissingFrom)?;
                    result.renames.push(RenameDelta {
                        old,
                        new: list_value(line),
                    });
                }
            }
            None => {}
        }
    }

    flush(&mut pending, &mut result);
    Ok(result)
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Structural checks on a parsed delta. Returns one message per problem; an
/// empty list means the delta may be merged.
pub fn validate_delta_result(result: &DeltaParseResult) -> Vec<String> {
    let mut errors = Vec::new();
    for op in [DeltaOperation::Added, DeltaOperation::Modified] {
        for delta in result.requirements(op) {
            if !delta.has_scenario() {
                errors.push(format!(
                    "Requirement '{}' missing scenario in {op}",
                    delta.title
                ));
            }
        }
    }
    for delta in &result.removed {
        if delta.title.is_empty() {
            errors.push("REMOVED requirement missing title".to_string());
        }
    }
    errors
}

/// Parse then validate, folding validation problems into
/// [`FlowError::DeltaValidation`].
pub fn parse_and_validate(text: &str) -> Result<DeltaParseResult> {
    let parsed = parse_delta_markdown(text)?;
    let errors = validate_delta_result(&parsed);
    if !errors.is_empty() {
        return Err(FlowError::DeltaValidation(errors));
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
