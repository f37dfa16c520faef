//! Error types for the simplemerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Delegate(#[from] DelegateError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from scanning, resolving and writing back a conflicted file.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Conflict markers are unbalanced, nested, or missing a section.
    #[error("malformed conflict at line {line}: {detail}")]
    MalformedConflict {
        line: usize,
        detail: String,
    },

    /// No hunk exists at the requested index.
    #[error("hunk {0} not found")]
    HunkNotFound(usize),

    /// Attempted to resolve a hunk that already left the unresolved state.
    #[error("hunk {0} is already resolved")]
    AlreadyResolved(usize),

    /// The requested resolution cannot be applied.
    #[error("invalid resolution for hunk {index}: {detail}")]
    InvalidResolution {
        index: usize,
        detail: String,
    },

    /// The conflicted file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The serialized content could not be written back to disk.
    #[error("failed to write '{}': {source}", path.display())]
    WriteBackFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Delegate errors
// ---------------------------------------------------------------------------

/// Errors from external collaborators: editor, diff tool, decision input.
#[derive(Debug, Error)]
pub enum DelegateError {
    /// The configured editor could not be started or exited abnormally.
    #[error("editor '{command}' failed: {detail}")]
    EditorLaunchFailed {
        command: String,
        detail: String,
    },

    /// The external diff tool could not be started or exited abnormally.
    #[error("diff tool '{command}' failed: {detail}")]
    DiffToolFailed {
        command: String,
        detail: String,
    },

    /// A command string was empty after configuration was resolved.
    #[error("no {0} command configured")]
    EmptyCommand(&'static str),

    /// Reading the operator's decision failed.
    #[error("failed to read decision: {0}")]
    InputFailed(String),

    /// Scratch-file I/O around a delegate invocation.
    #[error("delegate I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path does not exist or is not inside a git repository.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Bare repositories have no working tree to resolve conflicts in.
    #[error("repository at '{0}' has no working directory")]
    BareRepository(String),

    /// A path to stage lies outside the repository's working directory.
    #[error("path '{0}' is outside the repository working directory")]
    OutsideWorkdir(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// CoreError implements `std::error::Error` via `thiserror`, so
// `anyhow::Error: From<CoreError>` comes from the blanket impl in `anyhow`.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConflictError::MalformedConflict {
            line: 7,
            detail: "nested conflict start marker".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed conflict at line 7: nested conflict start marker"
        );

        let err = GitError::RepositoryNotFound("/tmp/repo".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/repo'");

        let err = DelegateError::EditorLaunchFailed {
            command: "nano".into(),
            detail: "not found".into(),
        };
        assert!(err.to_string().contains("nano"));

        let err = ConflictError::WriteBackFailed {
            path: PathBuf::from("src/lib.rs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("failed to write 'src/lib.rs'"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err: CoreError = ConflictError::HunkNotFound(3).into();
        assert!(matches!(err, CoreError::Conflict(_)));

        let err: CoreError = DelegateError::EmptyCommand("editor").into();
        assert!(matches!(err, CoreError::Delegate(_)));

        let err: CoreError = ConfigError::ParseError("bad".into()).into();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
