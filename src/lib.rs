// move-chat library
// Exports core modules for use by the CLI binary and by wrappers that pick
// projects and sessions interactively

pub mod index;
pub mod locator;
pub mod mover;
pub mod store;
pub mod transcript;

// Re-export commonly used types for CLI
pub use index::{
    load_index_lenient, load_index_strict, save_index, IndexEntry, SessionsIndex, INDEX_VERSION,
};
pub use locator::{display_title, list_sessions, scan_title, ListedSession, TITLE_MAX_CHARS, UNTITLED};
pub use mover::{move_session, MoveReport, MoveRequest, MoveStep, MIGRATED_SUMMARY};
pub use store::{
    default_projects_root, encode_project_path, resolve_project, validate_session_id,
    ProjectLocation, StoreError, INDEX_FILE_NAME, PROJECTS_DIR_ENV,
};
pub use transcript::first_user_prompt;
