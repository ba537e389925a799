use crate::error::{FlowError, Result};
use crate::io;
use crate::paths;
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub(crate) const CONSTITUTION_TEMPLATE: &str = "# Project Constitution: {project}

## Core Architecture

## Data & Integrations

## Operational Guardrails

## Risks & Mitigations

## Watchlist
";

// ---------------------------------------------------------------------------
// ProjectMeta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    /// Absolute path of the source tree the project describes.
    pub path: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ProjectRegistry
// ---------------------------------------------------------------------------

/// `state/projects.json`: project slug → metadata, sorted by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, ProjectMeta>,
}

impl ProjectRegistry {
    pub fn load(root: &Path) -> Result<Self> {
        io::read_json_object(&paths::projects_path(root))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_json(&paths::projects_path(root), self)
    }

    pub fn get(&self, slug: &str) -> Option<&ProjectMeta> {
        self.projects.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.projects.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn list(&self) -> impl Iterator<Item = (&String, &ProjectMeta)> {
        self.projects.iter()
    }

    /// Register a project, scaffold its directory and make it active.
    ///
    /// `source` is resolved against `root` when relative. `name` defaults to
    /// the slug with hyphens turned into spaces, title-cased.
    pub fn add(
        root: &Path,
        slug: &str,
        source: &Path,
        name: Option<&str>,
    ) -> Result<ProjectMeta> {
        if !paths::flow_dir(root).is_dir() {
            return Err(FlowError::NotInitialized);
        }
        paths::validate_slug(slug)?;

        let mut registry = Self::load(root)?;
        if registry.contains(slug) {
            return Err(FlowError::ProjectExists(slug.to_string()));
        }

        let joined = if source.is_absolute() {
            source.to_path_buf()
        } else {
            root.join(source)
        };
        let resolved = joined.canonicalize().unwrap_or(joined);
        let meta = ProjectMeta {
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| paths::title_case(slug)),
            path: resolved.to_string_lossy().into_owned(),
            created_at: Utc::now(),
        };
        registry.projects.insert(slug.to_string(), meta.clone());
        registry.save(root)?;

        let dir = paths::project_dir(root, slug);
        io::ensure_dir(&paths::archive_dir(root, slug))?;
        io::ensure_dir(&dir.join(paths::SPECS_DIR))?;
        io::write_if_missing(
            &paths::constitution_path(root, slug),
            CONSTITUTION_TEMPLATE.replace("{project}", slug).as_bytes(),
        )?;
        Session::set_project(root, slug)?;

        tracing::info!(slug, path = %meta.path, "registered project");
        Ok(meta)
    }
}

/// Pick the project a command operates on.
///
/// An explicit slug must be registered and becomes active. Otherwise the
/// session's project wins when still registered, then a sole registered
/// project.
pub fn resolve_project(root: &Path, requested: Option<&str>) -> Result<String> {
    let registry = ProjectRegistry::load(root)?;
    if registry.is_empty() {
        return Err(FlowError::NoProjects);
    }

    if let Some(slug) = requested {
        if !registry.contains(slug) {
            return Err(FlowError::ProjectNotFound(slug.to_string()));
        }
        Session::set_project(root, slug)?;
        return Ok(slug.to_string());
    }

    let session = Session::load(root)?;
    if let Some(current) = session.project.filter(|p| registry.contains(p)) {
        return Ok(current);
    }

    if registry.len() == 1 {
        if let Some((slug, _)) = registry.list().next() {
            Session::set_project(root, slug)?;
            return Ok(slug.clone());
        }
    }

    Err(FlowError::NoActiveProject)
}
