//! Move Executor
//!
//! Relocates one session (transcript plus optional auxiliary directory) from
//! one project directory to another and reconciles both session indexes.
//!
//! Ordering: copy and verify, write the destination index, write the source
//! index, and only then delete the source. Any failure before deletion rolls
//! back what this run created at the destination and leaves the source as it
//! was, so the move can simply be retried.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::index::{load_index_strict, save_index, IndexEntry, SessionsIndex};
use crate::locator::scan_title;
use crate::store::{
    aux_dir_path, copy_dir_verified, copy_file_verified, index_path, transcript_path,
    validate_session_id, StoreError,
};

/// Summary given to synthesized entries when the transcript has no user text
pub const MIGRATED_SUMMARY: &str = "Migrated session";

/// Input for a move
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub session_id: String,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// `originalPath` for a destination index that has to be created.
    /// Defaults to the destination directory's real path.
    pub dest_original_path: Option<String>,
    pub dry_run: bool,
}

/// One filesystem action of a move
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum MoveStep {
    CreateProjectDir { path: PathBuf },
    CopyTranscript { from: PathBuf, to: PathBuf },
    CopyAuxDir { from: PathBuf, to: PathBuf },
    #[serde(rename_all = "camelCase")]
    WriteDestinationIndex { path: PathBuf, synthesized_entry: bool },
    WriteSourceIndex { path: PathBuf },
    DeleteTranscript { path: PathBuf },
    DeleteAuxDir { path: PathBuf },
}

impl fmt::Display for MoveStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveStep::CreateProjectDir { path } => {
                write!(f, "create project directory {}", path.display())
            }
            MoveStep::CopyTranscript { from, to } => {
                write!(f, "copy {} -> {}", from.display(), to.display())
            }
            MoveStep::CopyAuxDir { from, to } => {
                write!(f, "copy {}/ -> {}/", from.display(), to.display())
            }
            MoveStep::WriteDestinationIndex { path, synthesized_entry } => {
                let kind = if *synthesized_entry { "new" } else { "existing" };
                write!(f, "add session ({} entry) to {}", kind, path.display())
            }
            MoveStep::WriteSourceIndex { path } => {
                write!(f, "remove session from {}", path.display())
            }
            MoveStep::DeleteTranscript { path } => write!(f, "delete {}", path.display()),
            MoveStep::DeleteAuxDir { path } => write!(f, "delete {}/", path.display()),
        }
    }
}

/// What a move did (or, for a dry run, would do)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReport {
    pub session_id: String,
    pub title: String,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub dry_run: bool,
    /// Whether the source index held an entry for the session
    pub was_indexed: bool,
    pub steps: Vec<MoveStep>,
}

/// Destination artifacts created by this run, undone if a later step fails
#[derive(Default)]
struct Rollback {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    /// Index path and its bytes before this run (`None` if it did not exist)
    index: Option<(PathBuf, Option<Vec<u8>>)>,
    /// Project directory created by this run
    project_dir: Option<PathBuf>,
}

impl Rollback {
    fn run(self) {
        if let Some((path, previous)) = self.index {
            let restored = match previous {
                Some(bytes) => fs::write(&path, bytes),
                None => fs::remove_file(&path),
            };
            if let Err(e) = restored {
                warn!(path = %path.display(), error = %e, "Failed to restore destination index");
            }
        }
        for file in self.files {
            if let Err(e) = fs::remove_file(&file) {
                warn!(path = %file.display(), error = %e, "Failed to remove copied transcript");
            }
        }
        for dir in self.dirs {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!(path = %dir.display(), error = %e, "Failed to remove copied directory");
            }
        }
        // Only removed when empty; anything else written there since is kept.
        if let Some(dir) = self.project_dir {
            if let Err(e) = fs::remove_dir(&dir) {
                warn!(path = %dir.display(), error = %e, "Left created project directory in place");
            }
        }
    }
}

/// Canonical path. A directory that does not exist yet is resolved through
/// its parent.
fn real_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent().map(Path::canonicalize), path.file_name()) {
        (Some(Ok(parent)), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Minimal index entry for a session the source index never recorded
fn synthesize_entry(
    session_id: &str,
    source_transcript: &Path,
    dest_transcript: &Path,
    project_path: &str,
) -> IndexEntry {
    let now = now_timestamp();
    let first_prompt = scan_title(source_transcript);
    let summary = match first_prompt {
        Some(_) => None,
        None => Some(MIGRATED_SUMMARY.to_string()),
    };

    let mut extra = Map::new();
    extra.insert(
        "fullPath".to_string(),
        Value::from(dest_transcript.to_string_lossy().to_string()),
    );
    extra.insert("projectPath".to_string(), Value::from(project_path));
    extra.insert("created".to_string(), Value::from(now.clone()));

    IndexEntry {
        session_id: session_id.to_string(),
        summary,
        first_prompt,
        modified: Some(now),
        extra,
    }
}

/// Point a captured entry at its new home, keeping title and timestamps
fn retarget_entry(mut entry: IndexEntry, dest_transcript: &Path, project_path: &str) -> IndexEntry {
    entry.extra.insert(
        "fullPath".to_string(),
        Value::from(dest_transcript.to_string_lossy().to_string()),
    );
    entry
        .extra
        .insert("projectPath".to_string(), Value::from(project_path));
    entry
}

/// Move a session between project directories.
pub fn move_session(request: &MoveRequest) -> Result<MoveReport, StoreError> {
    let session_id = request.session_id.as_str();
    validate_session_id(session_id)?;

    let source_dir = request.source_dir.as_path();
    let dest_dir = request.dest_dir.as_path();

    if !source_dir.is_dir() {
        return Err(StoreError::NotFound(format!(
            "source project directory {}",
            source_dir.display()
        )));
    }

    let source_transcript = transcript_path(source_dir, session_id);
    if !source_transcript.is_file() {
        return Err(StoreError::NotFound(format!(
            "session {} in {}",
            session_id,
            source_dir.display()
        )));
    }
    let source_aux = aux_dir_path(source_dir, session_id);
    let has_aux = source_aux.is_dir();

    let dest_exists = dest_dir.is_dir();
    if dest_exists && real_path(source_dir) == real_path(dest_dir) {
        return Err(StoreError::Conflict(
            "source and destination are the same project".to_string(),
        ));
    }

    let dest_transcript = transcript_path(dest_dir, session_id);
    let dest_aux = aux_dir_path(dest_dir, session_id);
    for target in [&dest_transcript, &dest_aux] {
        if fs::symlink_metadata(target).is_ok() {
            return Err(StoreError::Conflict(format!(
                "{} already exists",
                target.display()
            )));
        }
    }

    let mut source_index = load_index_strict(source_dir)?;
    let existing_dest_index = if dest_exists {
        load_index_strict(dest_dir)?
    } else {
        None
    };

    if let Some(index) = &existing_dest_index {
        if index.contains(session_id) {
            return Err(StoreError::Conflict(format!(
                "session {} is already indexed in {}",
                session_id,
                index_path(dest_dir).display()
            )));
        }
    }

    let default_original_path = request
        .dest_original_path
        .clone()
        .unwrap_or_else(|| real_path(dest_dir).to_string_lossy().to_string());
    let mut dest_index = existing_dest_index
        .unwrap_or_else(|| SessionsIndex::new(default_original_path.clone()));
    if dest_index.original_path.is_empty() {
        dest_index.original_path = default_original_path;
    }

    let captured = source_index.as_mut().and_then(|i| i.take_entry(session_id));
    let was_indexed = captured.is_some();
    let entry = match captured {
        Some(template) => retarget_entry(template, &dest_transcript, &dest_index.original_path),
        None => synthesize_entry(
            session_id,
            &source_transcript,
            &dest_transcript,
            &dest_index.original_path,
        ),
    };
    let title = entry.title().unwrap_or(MIGRATED_SUMMARY).to_string();
    dest_index.entries.push(entry);

    let mut steps = Vec::new();
    if !dest_exists {
        steps.push(MoveStep::CreateProjectDir { path: dest_dir.to_path_buf() });
    }
    steps.push(MoveStep::CopyTranscript {
        from: source_transcript.clone(),
        to: dest_transcript.clone(),
    });
    if has_aux {
        steps.push(MoveStep::CopyAuxDir {
            from: source_aux.clone(),
            to: dest_aux.clone(),
        });
    }
    steps.push(MoveStep::WriteDestinationIndex {
        path: index_path(dest_dir),
        synthesized_entry: !was_indexed,
    });
    if was_indexed {
        steps.push(MoveStep::WriteSourceIndex { path: index_path(source_dir) });
    }
    steps.push(MoveStep::DeleteTranscript { path: source_transcript.clone() });
    if has_aux {
        steps.push(MoveStep::DeleteAuxDir { path: source_aux.clone() });
    }

    let report = MoveReport {
        session_id: session_id.to_string(),
        title,
        source_dir: source_dir.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
        dry_run: request.dry_run,
        was_indexed,
        steps,
    };

    if request.dry_run {
        info!(session_id = %session_id, steps = report.steps.len(), "Dry run, nothing changed");
        return Ok(report);
    }

    let mut rollback = Rollback::default();
    if let Err(e) = commit(&report, source_index.as_ref(), &dest_index, &mut rollback) {
        warn!(session_id = %session_id, error = %e, "Move failed, rolling back destination");
        rollback.run();
        return Err(e);
    }

    // Both indexes are persisted: from here on the destination is authoritative.
    for step in &report.steps {
        match step {
            MoveStep::DeleteTranscript { path } => fs::remove_file(path)?,
            MoveStep::DeleteAuxDir { path } => fs::remove_dir_all(path)?,
            _ => continue,
        }
        info!(session_id = %session_id, "{}", step);
    }

    Ok(report)
}

/// Copy artifacts and persist both indexes, recording undo information.
fn commit(
    report: &MoveReport,
    source_index: Option<&SessionsIndex>,
    dest_index: &SessionsIndex,
    rollback: &mut Rollback,
) -> Result<(), StoreError> {
    for step in &report.steps {
        match step {
            MoveStep::CreateProjectDir { path } => {
                fs::create_dir_all(path)?;
                rollback.project_dir = Some(path.clone());
            }
            MoveStep::CopyTranscript { from, to } => {
                rollback.files.push(to.clone());
                copy_file_verified(from, to)?;
            }
            MoveStep::CopyAuxDir { from, to } => {
                rollback.dirs.push(to.clone());
                copy_dir_verified(from, to)?;
            }
            MoveStep::WriteDestinationIndex { path, .. } => {
                rollback.index = Some((path.clone(), fs::read(path).ok()));
                save_index(&report.dest_dir, dest_index)?;
            }
            MoveStep::WriteSourceIndex { .. } => {
                if let Some(index) = source_index {
                    save_index(&report.source_dir, index)?;
                }
            }
            MoveStep::DeleteTranscript { .. } | MoveStep::DeleteAuxDir { .. } => continue,
        }
        info!(session_id = %report.session_id, "{}", step);
    }
    Ok(())
}
