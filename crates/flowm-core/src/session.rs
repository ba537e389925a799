use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Active project, change and stage. Persisted in `state/session.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn load(root: &Path) -> Result<Self> {
        crate::io::read_json_object(&paths::session_path(root))
    }

    pub fn save(&mut self, root: &Path) -> Result<()> {
        self.updated_at = Some(Utc::now());
        crate::io::write_json(&paths::session_path(root), self)
    }

    /// Activate `project`. Switching projects forgets the active change.
    pub fn set_project(root: &Path, project: &str) -> Result<()> {
        let mut session = Self::load(root)?;
        if session.project.as_deref() != Some(project) {
            session.change = None;
            session.stage = None;
        }
        session.project = Some(project.to_string());
        session.save(root)
    }

    pub fn set_change(root: &Path, project: &str, change: &str, stage: &str) -> Result<()> {
        let mut session = Self::load(root)?;
        session.project = Some(project.to_string());
        session.change = Some(change.to_string());
        session.stage = Some(stage.to_string());
        session.save(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_session_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Session::load(dir.path()).unwrap(), Session::default());
    }

    #[test]
    fn set_change_then_switch_project() {
        let dir = TempDir::new().unwrap();
        Session::set_change(dir.path(), "demo", "chg-one", "ideate").unwrap();
        let session = Session::load(dir.path()).unwrap();
        assert_eq!(session.project.as_deref(), Some("demo"));
        assert_eq!(session.change.as_deref(), Some("chg-one"));
        assert!(session.updated_at.is_some());

        Session::set_project(dir.path(), "demo").unwrap();
        assert_eq!(Session::load(dir.path()).unwrap().change.as_deref(), Some("chg-one"));

        Session::set_project(dir.path(), "other").unwrap();
        let session = Session::load(dir.path()).unwrap();
        assert_eq!(session.project.as_deref(), Some("other"));
        assert!(session.change.is_none());
        assert!(session.stage.is_none());
    }
}
