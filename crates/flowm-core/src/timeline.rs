use crate::error::{FlowError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Command label for events recorded by hand.
pub const LOG_COMMAND: &str = "timeline.log";

/// One line of a change's `timeline.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub summary: String,
}

impl TimelineEvent {
    pub fn now(command: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.into(),
            summary: summary.into(),
        }
    }
}

pub fn append(root: &Path, project: &str, change_id: &str, event: &TimelineEvent) -> Result<()> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    crate::io::append_text(&paths::timeline_path(root, project, change_id), &line)
}

/// Every event recorded for a change, oldest first. Blank lines are skipped.
pub fn read(root: &Path, project: &str, change_id: &str) -> Result<Vec<TimelineEvent>> {
    let path = paths::timeline_path(root, project, change_id);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(&path)?;
    data.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l).map_err(|e| FlowError::MalformedState {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// The last `limit` events, oldest first. A limit of zero keeps them all.
pub fn recent(root: &Path, project: &str, change_id: &str, limit: usize) -> Result<Vec<TimelineEvent>> {
    let mut events = read(root, project, change_id)?;
    if limit > 0 && events.len() > limit {
        events.drain(..events.len() - limit);
    }
    Ok(events)
}

/// Record a free-form event, as `timeline log` does.
pub fn log(root: &Path, project: &str, change_id: &str, command: &str, summary: &str) -> Result<TimelineEvent> {
    let command = command.trim();
    let event = TimelineEvent::now(
        if command.is_empty() { LOG_COMMAND } else { command },
        summary.trim(),
    );
    append(root, project, change_id, &event)?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_read() {
        let dir = TempDir::new().unwrap();
        append(dir.path(), "demo", "chg", &TimelineEvent::now("changes.init", "Created")).unwrap();
        append(dir.path(), "demo", "chg", &TimelineEvent::now("specs.merge", "Merged")).unwrap();

        let events = read(dir.path(), "demo", "chg").unwrap();
        let commands: Vec<_> = events.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, ["changes.init", "specs.merge"]);
    }

    #[test]
    fn recent_keeps_the_tail() {
        let dir = TempDir::new().unwrap();
        for n in 1..=4 {
            log(dir.path(), "demo", "chg", "", &format!("note {n}")).unwrap();
        }
        let last: Vec<_> = recent(dir.path(), "demo", "chg", 2)
            .unwrap()
            .into_iter()
            .map(|e| e.summary)
            .collect();
        assert_eq!(last, ["note 3", "note 4"]);
        assert_eq!(recent(dir.path(), "demo", "chg", 0).unwrap().len(), 4);
        assert_eq!(recent(dir.path(), "demo", "chg", 10).unwrap().len(), 4);
    }

    #[test]
    fn log_defaults_command_label() {
        let dir = TempDir::new().unwrap();
        let event = log(dir.path(), "demo", "chg", " ", "  Reviewed plan ").unwrap();
        assert_eq!(event.command, LOG_COMMAND);
        assert_eq!(event.summary, "Reviewed plan");
        let custom = log(dir.path(), "demo", "chg", "review.signoff", "ok").unwrap();
        assert_eq!(read(dir.path(), "demo", "chg").unwrap()[1], custom);
    }

    #[test]
    fn missing_timeline_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read(dir.path(), "demo", "nope").unwrap().is_empty());
    }

    #[test]
    fn garbage_line_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = paths::timeline_path(dir.path(), "demo", "chg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            read(dir.path(), "demo", "chg"),
            Err(FlowError::MalformedState { .. })
        ));
    }
}
