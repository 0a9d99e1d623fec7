//! Session index (`sessions-index.json`)
//!
//! Claude Code maintains one index per project summarizing known sessions.
//! The index can be stale in both directions: entries may point at deleted
//! transcripts and new transcripts may not be indexed yet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::store::{atomic_write, index_path, StoreError};

/// Index format version written into newly created indexes
pub const INDEX_VERSION: u64 = 1;

/// One session record in the index. Fields not modelled here are kept in
/// `extra` so a rewrite never drops data written by the chat client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexEntry {
    /// Summary if set, otherwise the first prompt
    pub fn title(&self) -> Option<&str> {
        [self.summary.as_deref(), self.first_prompt.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }
}

/// Top-level index document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionsIndex {
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub entries: Vec<IndexEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionsIndex {
    pub fn new(original_path: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("version".to_string(), Value::from(INDEX_VERSION));
        Self {
            original_path: original_path.into(),
            entries: Vec::new(),
            extra,
        }
    }

    pub fn find(&self, session_id: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.session_id == session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.find(session_id).is_some()
    }

    /// Remove every entry for `session_id`, returning the first one removed.
    pub fn take_entry(&mut self, session_id: &str) -> Option<IndexEntry> {
        let first = self.find(session_id).cloned();
        if first.is_some() {
            self.entries.retain(|e| e.session_id != session_id);
        }
        first
    }
}

/// Load a project's index for display. A missing or unparseable index is
/// treated as absent.
pub fn load_index_lenient(project_dir: &Path) -> Option<SessionsIndex> {
    let path = index_path(project_dir);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No readable session index");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(index) => Some(index),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring malformed session index");
            None
        }
    }
}

/// Load a project's index for rewriting. A missing index is `None`; an
/// unparseable one is an error since it cannot be safely rewritten.
pub fn load_index_strict(project_dir: &Path) -> Result<Option<SessionsIndex>, StoreError> {
    let path = index_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::MalformedIndex { path, source })
}

/// Write a project's index (pretty-printed, atomically)
pub fn save_index(project_dir: &Path, index: &SessionsIndex) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(index)?;
    atomic_write(&index_path(project_dir), &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_entry_title_prefers_summary() {
        let entry: IndexEntry = serde_json::from_value(json!({
            "sessionId": "a",
            "summary": "Fix login",
            "firstPrompt": "hello"
        }))
        .unwrap();
        assert_eq!(entry.title(), Some("Fix login"));

        let entry: IndexEntry = serde_json::from_value(json!({
            "sessionId": "b",
            "summary": "",
            "firstPrompt": "hello"
        }))
        .unwrap();
        assert_eq!(entry.title(), Some("hello"));
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let tmp = TempDir::new().unwrap();
        let raw = json!({
            "version": 1,
            "originalPath": "/work/demo",
            "entries": [{
                "sessionId": "abc",
                "summary": "S",
                "modified": "2025-01-02T03:04:05.000Z",
                "messageCount": 7,
                "gitBranch": "main"
            }]
        });
        fs::write(index_path(tmp.path()), raw.to_string()).unwrap();

        let index = load_index_strict(tmp.path()).unwrap().unwrap();
        save_index(tmp.path(), &index).unwrap();

        let reread: Value =
            serde_json::from_str(&fs::read_to_string(index_path(tmp.path())).unwrap()).unwrap();
        assert_eq!(reread, raw);
    }

    #[test]
    fn test_take_entry_removes_duplicates() {
        let mut index = SessionsIndex::new("/p");
        for summary in ["first", "second"] {
            index.entries.push(IndexEntry {
                session_id: "dup".to_string(),
                summary: Some(summary.to_string()),
                ..Default::default()
            });
        }

        let taken = index.take_entry("dup").unwrap();
        assert_eq!(taken.summary.as_deref(), Some("first"));
        assert!(index.entries.is_empty());
        assert!(index.take_entry("dup").is_none());
    }

    #[test]
    fn test_malformed_index_lenient_vs_strict() {
        let tmp = TempDir::new().unwrap();
        fs::write(index_path(tmp.path()), "{ not json").unwrap();

        assert!(load_index_lenient(tmp.path()).is_none());
        assert!(matches!(
            load_index_strict(tmp.path()),
            Err(StoreError::MalformedIndex { .. })
        ));
    }

    #[test]
    fn test_missing_index_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_index_lenient(tmp.path()).is_none());
        assert!(load_index_strict(tmp.path()).unwrap().is_none());
    }
}
