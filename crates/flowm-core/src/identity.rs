use crate::delta::{DeltaOperation, RequirementDelta};
use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub capability: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_id: Option<String>,
}

// ---------------------------------------------------------------------------
// RequirementIndex
// ---------------------------------------------------------------------------

/// Project-wide map from stable requirement id to its latest metadata.
///
/// Loaded once per merge, threaded by value through every capability of a
/// change and saved once at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl RequirementIndex {
    pub fn load(root: &Path, project: &str) -> Result<Self> {
        crate::io::read_json_object(&paths::spec_index_path(root, project))
    }

    pub fn save(&self, root: &Path, project: &str) -> Result<()> {
        let path = paths::spec_index_path(root, project);
        crate::io::write_json(&path, self)?;
        tracing::info!(path = %path.display(), entries = self.entries.len(), "saved requirement index");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Id of the entry recorded for `title` within `capability`, if any.
    pub fn find_by_title(&self, capability: &str, title: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| e.capability == capability && e.title == title)
            .map(|(id, _)| id.as_str())
    }

    pub fn insert(&mut self, id: impl Into<String>, entry: IndexEntry) {
        self.entries.insert(id.into(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<IndexEntry> {
        self.entries.remove(id)
    }

    /// Fold one resolved requirement change into the index.
    pub fn record(
        &mut self,
        id: &str,
        capability: &str,
        delta: &RequirementDelta,
        change_id: &str,
        now: DateTime<Utc>,
    ) {
        match delta.operation {
            DeltaOperation::Added | DeltaOperation::Modified => {
                self.insert(
                    id,
                    IndexEntry {
                        capability: capability.to_string(),
                        title: delta.title.clone(),
                        updated_at: Some(now),
                        change_id: Some(change_id.to_string()),
                    },
                );
            }
            DeltaOperation::Removed => {
                if self.remove(id).is_none() {
                    tracing::warn!(id, capability, "removed requirement had no index entry");
                }
            }
        }
    }

    /// Retitle the entry for `old_title` in `capability` so its id survives a
    /// rename. Returns the id that was retitled.
    pub fn rename_title(
        &mut self,
        capability: &str,
        old_title: &str,
        new_title: &str,
        change_id: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let id = self.find_by_title(capability, old_title)?.to_string();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.title = new_title.to_string();
            entry.updated_at = Some(now);
            entry.change_id = Some(change_id.to_string());
        }
        Some(id)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

static HINT_RE: OnceLock<Regex> = OnceLock::new();

fn hint_re() -> &'static Regex {
    HINT_RE.get_or_init(|| Regex::new(r"(?im)^[ \t]*requirement-id[ \t]*:[ \t]*(.*?)[ \t]*$").unwrap())
}

/// Value of a `Requirement-ID:` line in `body`, if the author pinned one.
pub fn requirement_id_hint(body: &str) -> Option<&str> {
    hint_re()
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|v| !v.is_empty())
}

/// Resolve the stable id for one requirement change.
///
/// Explicit `Requirement-ID:` hints win. MODIFIED and REMOVED deltas reuse the
/// id already indexed for their capability and title. Everything else gets
/// `<capability>.<title>`. New ids that collide with one already claimed in
/// this pass get `-2`, `-3`, … appended.
pub fn resolve_requirement_id(
    delta: &RequirementDelta,
    capability: &str,
    index: &RequirementIndex,
    claimed: &mut HashSet<String>,
) -> String {
    let updates_existing = matches!(
        delta.operation,
        DeltaOperation::Modified | DeltaOperation::Removed
    );

    let candidate = match requirement_id_hint(&delta.body) {
        Some(hint) => paths::slugify_identifier(hint),
        None => updates_existing
            .then(|| index.find_by_title(capability, &delta.title))
            .flatten()
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!(
                    "{}.{}",
                    paths::slugify_identifier(capability),
                    paths::slugify_identifier(&delta.title)
                )
            }),
    };

    if updates_existing && index.contains(&candidate) {
        claimed.insert(candidate.clone());
        return candidate;
    }

    let mut resolved = candidate.clone();
    let mut suffix = 2;
    while claimed.contains(&resolved) {
        resolved = format!("{candidate}-{suffix}");
        suffix += 1;
    }
    if resolved != candidate {
        tracing::debug!(%candidate, %resolved, "disambiguated requirement id");
    }
    claimed.insert(resolved.clone());
    resolved
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn delta(operation: DeltaOperation, title: &str, body: &str) -> RequirementDelta {
        RequirementDelta {
            operation,
            title: title.to_string(),
            body: format!("### Requirement: {title}\n{body}"),
        }
    }

    fn entry(capability: &str, title: &str) -> IndexEntry {
        IndexEntry {
            capability: capability.to_string(),
            title: title.to_string(),
            updated_at: None,
            change_id: None,
        }
    }

    #[test]
    fn hint_is_slugified() {
        let d = delta(DeltaOperation::Added, "Totals", "Requirement-ID: Expenses.Capture Totals!\n");
        let id = resolve_requirement_id(&d, "expenses", &RequirementIndex::default(), &mut HashSet::new());
        assert_eq!(id, "expenses.capture-totals");
    }

    #[test]
    fn hint_key_is_case_insensitive() {
        assert_eq!(requirement_id_hint("x\n  requirement-id:  foo.bar  \ny"), Some("foo.bar"));
        assert_eq!(requirement_id_hint("REQUIREMENT-ID: A"), Some("A"));
        assert_eq!(requirement_id_hint("no hint here"), None);
        assert_eq!(requirement_id_hint("Requirement-ID:\nnext line"), None);
    }

    #[test]
    fn hint_resolution_is_idempotent_across_merges() {
        let d = delta(DeltaOperation::Added, "Bar", "Requirement-ID: foo.bar\n");
        let mut index = RequirementIndex::default();

        let first = resolve_requirement_id(&d, "foo", &index, &mut HashSet::new());
        index.record(&first, "foo", &d, "chg-1", Utc::now());
        let second = resolve_requirement_id(&d, "foo", &index, &mut HashSet::new());

        assert_eq!(first, "foo.bar");
        assert_eq!(second, "foo.bar");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn synthesized_id_uses_capability_and_title() {
        let d = delta(DeltaOperation::Added, "Cart Totals", "");
        let id = resolve_requirement_id(&d, "Checkout", &RequirementIndex::default(), &mut HashSet::new());
        assert_eq!(id, "checkout.cart-totals");
    }

    #[test]
    fn colliding_additions_are_disambiguated() {
        let index = RequirementIndex::default();
        let mut claimed = HashSet::new();
        let d = delta(DeltaOperation::Added, "Cart Totals", "");
        let a = resolve_requirement_id(&d, "checkout", &index, &mut claimed);
        let b = resolve_requirement_id(&d, "checkout", &index, &mut claimed);
        let c = resolve_requirement_id(&d, "checkout", &index, &mut claimed);
        assert_eq!(a, "checkout.cart-totals");
        assert_eq!(b, "checkout.cart-totals-2");
        assert_eq!(c, "checkout.cart-totals-3");
    }

    #[test]
    fn modify_reuses_indexed_id_by_title() {
        let mut index = RequirementIndex::default();
        index.insert("custom-id", entry("checkout", "Cart Totals"));
        let d = delta(DeltaOperation::Modified, "Cart Totals", "");
        let mut claimed = HashSet::new();
        assert_eq!(resolve_requirement_id(&d, "checkout", &index, &mut claimed), "custom-id");
        // Claimed twice in one pass: still an update of the same entry.
        assert_eq!(resolve_requirement_id(&d, "checkout", &index, &mut claimed), "custom-id");
    }

    #[test]
    fn title_lookup_is_scoped_to_capability() {
        let mut index = RequirementIndex::default();
        index.insert("other-id", entry("billing", "Cart Totals"));
        let d = delta(DeltaOperation::Removed, "Cart Totals", "");
        let id = resolve_requirement_id(&d, "checkout", &index, &mut HashSet::new());
        assert_eq!(id, "checkout.cart-totals");
    }

    #[test]
    fn added_after_modified_in_same_pass_is_suffixed() {
        let mut index = RequirementIndex::default();
        index.insert("checkout.cart-totals", entry("checkout", "Cart Totals"));
        let mut claimed = HashSet::new();
        let m = delta(DeltaOperation::Modified, "Cart Totals", "");
        let a = delta(DeltaOperation::Added, "Cart Totals", "");
        assert_eq!(resolve_requirement_id(&m, "checkout", &index, &mut claimed), "checkout.cart-totals");
        assert_eq!(resolve_requirement_id(&a, "checkout", &index, &mut claimed), "checkout.cart-totals-2");
    }

    #[test]
    fn record_upserts_and_removes() {
        let mut index = RequirementIndex::default();
        let now = Utc::now();
        let added = delta(DeltaOperation::Added, "Totals", "");
        index.record("x.totals", "x", &added, "chg-1", now);
        assert_eq!(index.get("x.totals").unwrap().change_id.as_deref(), Some("chg-1"));

        let modified = delta(DeltaOperation::Modified, "Totals", "");
        index.record("x.totals", "x", &modified, "chg-2", now);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("x.totals").unwrap().change_id.as_deref(), Some("chg-2"));

        let removed = delta(DeltaOperation::Removed, "Totals", "");
        index.record("x.totals", "x", &removed, "chg-3", now);
        assert!(index.is_empty());
    }

    #[test]
    fn rename_keeps_id() {
        let mut index = RequirementIndex::default();
        index.insert("checkout.coupons", entry("checkout", "Coupons"));
        let id = index.rename_title("checkout", "Coupons", "Promotions", "chg", Utc::now());
        assert_eq!(id.as_deref(), Some("checkout.coupons"));
        assert_eq!(index.find_by_title("checkout", "Promotions"), Some("checkout.coupons"));
        assert!(index.rename_title("checkout", "Missing", "X", "chg", Utc::now()).is_none());
    }

    #[test]
    fn index_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut index = RequirementIndex::default();
        index.insert("req-1", entry("expenses", "Totals"));
        index.save(dir.path(), "demo").unwrap();

        let path = paths::spec_index_path(dir.path(), "demo");
        assert!(path.exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"req-1\""));
        assert!(raw.ends_with("}\n"));

        let loaded = RequirementIndex::load(dir.path(), "demo").unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn index_accepts_minimal_entries() {
        let dir = TempDir::new().unwrap();
        let path = paths::spec_index_path(dir.path(), "demo");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"req-1": {"capability": "expenses", "title": "Totals"}}"#).unwrap();
        let loaded = RequirementIndex::load(dir.path(), "demo").unwrap();
        assert_eq!(loaded.get("req-1"), Some(&entry("expenses", "Totals")));
    }
}
