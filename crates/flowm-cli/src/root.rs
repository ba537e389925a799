use flowm_core::paths::FLOW_DIR;
use std::path::{Path, PathBuf};

/// Resolve the workspace root.
///
/// Priority:
/// 1. `--root` flag / `FLOWM_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.flow-maestro/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_flow_root(&cwd).unwrap_or(cwd)
}

fn find_flow_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(FLOW_DIR).is_dir())
        .map(Path::to_path_buf)
}
