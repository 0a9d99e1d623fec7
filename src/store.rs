//! Project store layout
//!
//! Claude Code keeps one directory per project under `~/.claude/projects`,
//! named after the project's working directory. This module resolves those
//! directories and provides the file primitives the locator and mover share.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-project index file
pub const INDEX_FILE_NAME: &str = "sessions-index.json";

/// Extension of session transcript files
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Environment variable overriding the projects root
pub const PROJECTS_DIR_ENV: &str = "CLAUDE_PROJECTS_DIR";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Malformed index {path}: {source}")]
    MalformedIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),
    #[error("Home directory not found")]
    NoHomeDir,
}

impl Serialize for StoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// A resolved project: its store directory and, when known, the working
/// directory path it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLocation {
    pub dir: PathBuf,
    pub original_path: Option<String>,
}

/// Default projects root (`~/.claude/projects`)
pub fn default_projects_root() -> Result<PathBuf, StoreError> {
    let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
    Ok(home.join(".claude").join("projects"))
}

/// Encode a project working directory into Claude's directory naming scheme.
pub fn encode_project_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            '/' | '\\' | '@' | '.' | ':' => '-',
            other => other,
        })
        .collect()
}

/// Resolve a project argument against the projects root.
///
/// Paths already inside the root name a store directory directly; anything
/// else is a working directory that gets encoded.
pub fn resolve_project(root: &Path, arg: &str) -> ProjectLocation {
    let candidate = PathBuf::from(arg);
    let inside_root = candidate.starts_with(root)
        || match (candidate.canonicalize(), root.canonicalize()) {
            (Ok(c), Ok(r)) => c.starts_with(r),
            _ => false,
        };

    if inside_root {
        ProjectLocation {
            dir: candidate,
            original_path: None,
        }
    } else {
        ProjectLocation {
            dir: root.join(encode_project_path(arg)),
            original_path: Some(arg.to_string()),
        }
    }
}

/// Validate that a session ID contains only safe characters (alphanumeric, dash, underscore).
/// Rejects any path traversal attempts (/, \, ..).
pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    if !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(StoreError::InvalidSessionId(session_id.to_string()))
    }
}

/// Path of a session's transcript within a project directory
pub fn transcript_path(project_dir: &Path, session_id: &str) -> PathBuf {
    project_dir.join(format!("{}.{}", session_id, TRANSCRIPT_EXTENSION))
}

/// Path of a session's auxiliary data directory within a project directory
pub fn aux_dir_path(project_dir: &Path, session_id: &str) -> PathBuf {
    project_dir.join(session_id)
}

/// Path of a project's index file
pub fn index_path(project_dir: &Path) -> PathBuf {
    project_dir.join(INDEX_FILE_NAME)
}

/// Atomic write: write to a .tmp sibling then rename into place.
/// Prevents corruption if the process crashes mid-write.
pub fn atomic_write(path: &Path, contents: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Copy a file, keep its modification time, and confirm the copy landed
/// with the same length as the source.
pub fn copy_file_verified(src: &Path, dst: &Path) -> Result<u64, StoreError> {
    let source_meta = fs::metadata(src)?;
    fs::copy(src, dst)?;

    // The copy may be read-only; explicit times need ownership, not write access.
    if let Ok(modified) = source_meta.modified() {
        fs::File::open(dst)?.set_modified(modified)?;
    }

    let copied = fs::metadata(dst)?;
    if copied.len() != source_meta.len() {
        return Err(StoreError::Io(std::io::Error::other(format!(
            "copy of {} is {} bytes, expected {}",
            src.display(),
            copied.len(),
            source_meta.len()
        ))));
    }

    Ok(copied.len())
}

/// Recursively copy a directory tree, verifying every file.
/// Returns the number of files copied.
pub fn copy_dir_verified(src: &Path, dst: &Path) -> Result<usize, StoreError> {
    fs::create_dir_all(dst)?;
    let mut files = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            files += copy_dir_verified(&from, &to)?;
        } else {
            copy_file_verified(&from, &to)?;
            files += 1;
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_project_path() {
        assert_eq!(
            encode_project_path("/Users/me/src/app.rs"),
            "-Users-me-src-app-rs"
        );
        assert_eq!(encode_project_path("/home/a@b/x"), "-home-a-b-x");
    }

    #[test]
    fn test_resolve_project_encodes_working_dir() {
        let root = PathBuf::from("/tmp/store-root");
        let loc = resolve_project(&root, "/work/demo");
        assert_eq!(loc.dir, root.join("-work-demo"));
        assert_eq!(loc.original_path.as_deref(), Some("/work/demo"));
    }

    #[test]
    fn test_resolve_project_inside_root_is_direct() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("-work-demo");
        fs::create_dir(&dir).unwrap();

        let loc = resolve_project(tmp.path(), dir.to_str().unwrap());
        assert_eq!(loc.dir, dir);
        assert!(loc.original_path.is_none());
    }

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("6e45a55c-3124-4cc8-ad85-040a5c316009").is_ok());
        assert!(validate_session_id("abc_123").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../escape").is_err());
        assert!(validate_session_id("a/b").is_err());
    }

    #[test]
    fn test_copy_dir_verified() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        fs::write(src.join("nested/b.txt"), "beta").unwrap();

        let dst = tmp.path().join("dst");
        let copied = copy_dir_verified(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "beta");
    }

    #[test]
    fn test_copy_file_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("s.jsonl");
        let dst = tmp.path().join("d.jsonl");
        fs::write(&src, "{}\n").unwrap();

        copy_file_verified(&src, &dst).unwrap();

        let a = fs::metadata(&src).unwrap().modified().unwrap();
        let b = fs::metadata(&dst).unwrap().modified().unwrap();
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_read_only_file() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("ro.jsonl");
        let dst = tmp.path().join("copy.jsonl");
        fs::write(&src, "{\"type\":\"user\"}\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).unwrap();

        let copied = copy_file_verified(&src, &dst).unwrap();

        assert_eq!(copied, fs::metadata(&src).unwrap().len());
        assert_eq!(fs::metadata(&dst).unwrap().permissions().mode() & 0o777, 0o444);
        assert_eq!(
            fs::metadata(&src).unwrap().modified().unwrap(),
            fs::metadata(&dst).unwrap().modified().unwrap()
        );
    }
}
