//! Session Locator
//!
//! Lists the sessions of one project directory. Indexed sessions come from
//! `sessions-index.json`; transcripts the index has not caught up with are
//! picked up from disk and titled from their first user message.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

use crate::index::load_index_lenient;
use crate::store::{aux_dir_path, transcript_path, StoreError, TRANSCRIPT_EXTENSION};
use crate::transcript::first_user_prompt;

/// Maximum title length shown in listings
pub const TITLE_MAX_CHARS: usize = 50;

/// Title for index entries with neither summary nor first prompt
pub const UNTITLED: &str = "No title";

/// Shown when an index entry has no `modified` field
const UNKNOWN_DATE: &str = "unknown";

/// One row of a project listing
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListedSession {
    pub session_id: String,
    pub title: String,
    /// Calendar day (`YYYY-MM-DD`)
    pub modified: String,
    pub indexed: bool,
    pub transcript_present: bool,
    pub has_aux_dir: bool,
}

/// Normalize a title for single-line, pipe-delimited display.
pub fn display_title(raw: &str) -> String {
    raw.chars()
        .take(TITLE_MAX_CHARS)
        .map(|c| if c == '|' || c.is_control() { ' ' } else { c })
        .collect()
}

/// Title derived from a transcript's first user message
pub fn scan_title(transcript: &Path) -> Option<String> {
    first_user_prompt(transcript, TITLE_MAX_CHARS).map(|t| display_title(&t))
}

/// List every session in a project directory: indexed entries first, in
/// index order, then unindexed transcripts, most recently modified first.
pub fn list_sessions(project_dir: &Path) -> Result<Vec<ListedSession>, StoreError> {
    if !project_dir.is_dir() {
        return Err(StoreError::NotFound(format!(
            "project directory {}",
            project_dir.display()
        )));
    }

    let mut sessions = Vec::new();
    let mut covered: HashSet<String> = HashSet::new();

    if let Some(index) = load_index_lenient(project_dir) {
        for entry in &index.entries {
            if entry.session_id.is_empty() || !covered.insert(entry.session_id.clone()) {
                continue;
            }

            sessions.push(ListedSession {
                session_id: entry.session_id.clone(),
                title: display_title(entry.title().unwrap_or(UNTITLED)),
                modified: entry
                    .modified
                    .as_deref()
                    .map(|m| m.chars().take(10).collect())
                    .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
                indexed: true,
                transcript_present: transcript_path(project_dir, &entry.session_id).is_file(),
                has_aux_dir: aux_dir_path(project_dir, &entry.session_id).is_dir(),
            });
        }
    }

    let mut unindexed: Vec<(SystemTime, ListedSession)> = Vec::new();

    for entry in fs::read_dir(project_dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();

        if path.extension().map(|e| e != TRANSCRIPT_EXTENSION).unwrap_or(true) {
            continue;
        }
        let session_id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(id) if !covered.contains(id) => id.to_string(),
            _ => continue,
        };

        let mtime = match entry.metadata().and_then(|m| {
            if m.is_file() {
                m.modified()
            } else {
                Err(std::io::Error::other("not a regular file"))
            }
        }) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping transcript");
                continue;
            }
        };

        let title = scan_title(&path).unwrap_or_else(|| display_title(&session_id));
        let modified = DateTime::<Local>::from(mtime).format("%Y-%m-%d").to_string();
        let has_aux_dir = aux_dir_path(project_dir, &session_id).is_dir();

        unindexed.push((
            mtime,
            ListedSession {
                session_id,
                title,
                modified,
                indexed: false,
                transcript_present: true,
                has_aux_dir,
            },
        ));
    }

    unindexed.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.session_id.cmp(&b.1.session_id))
    });
    sessions.extend(unindexed.into_iter().map(|(_, s)| s));

    Ok(sessions)
}
