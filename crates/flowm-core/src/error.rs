use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("not initialized: run 'flowm init'")]
    NotInitialized,

    #[error("unknown project '{0}'")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("no projects registered: use 'flowm projects add <slug>' first")]
    NoProjects,

    #[error("no active project: pass --project or run 'flowm projects use <slug>'")]
    NoActiveProject,

    #[error("change '{change}' not found for project '{project}'")]
    ChangeNotFound { project: String, change: String },

    #[error("no change specified or active")]
    NoActiveChange,

    #[error("no delta specs found for change '{0}'")]
    NoDeltaSpecs(String),

    #[error("archive destination already exists: {0}")]
    ArchiveExists(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("unsupported delta section '{0}'")]
    UnsupportedDeltaSection(String),

    #[error("RENAMED section missing FROM entry")]
    RenameMissingFrom,

    #[error("{}", .0.join("\n"))]
    DeltaValidation(Vec<String>),

    #[error("Requirement '{0}' not found")]
    RequirementNotFound(String),

    #[error("cannot rename missing requirement: {0}")]
    RenameTargetMissing(String),

    #[error("unknown quality target(s): {}", .0.join(", "))]
    UnknownQualityTarget(Vec<String>),

    #[error("unknown constitution section '{0}': choose from core, data, operations, risks, watchlist")]
    UnknownConstitutionSection(String),

    #[error("constitution entry needs a non-empty {0}")]
    MissingEntryField(&'static str),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("malformed state file {path}: {reason}")]
    MalformedState { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
