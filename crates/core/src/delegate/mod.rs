//! External collaborators invoked while resolving a hunk.
//!
//! The resolution engine only sees the [`Editor`] and [`DiffTool`] traits;
//! the command-backed implementations here spawn the configured program,
//! block until it exits, and read the result back from scratch files that
//! are removed when their `tempfile` guard drops.

pub mod diff_tool;
pub mod editor;

use std::path::Path;

pub use diff_tool::{CommandDiffTool, MergeSides};
pub use editor::CommandEditor;

use crate::errors::DelegateError;

/// Opens seed text in an operator-chosen editor.
pub trait Editor {
    /// Block until the editor exits and return the saved content.
    /// `target` is the file being resolved, used only to name scratch files.
    fn edit(&self, seed: &str, target: &Path) -> Result<String, DelegateError>;
}

/// Runs an external three-way comparison tool.
pub trait DiffTool {
    /// Block until the tool exits. Success yields the merged text.
    fn merge(&self, sides: &MergeSides<'_>, target: &Path) -> Result<String, DelegateError>;
}

/// Split a configured command line into program and leading arguments.
pub(crate) fn split_command<'a>(
    command: &'a str,
    what: &'static str,
) -> Result<(&'a str, Vec<&'a str>), DelegateError> {
    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or(DelegateError::EmptyCommand(what))?;
    Ok((program, parts.collect()))
}

/// Scratch-file name that keeps the target's extension so editors pick the
/// right syntax highlighting: `main.rs` + `LOCAL` -> `main.LOCAL.rs`.
pub(crate) fn scratch_name(target: &Path, tag: &str) -> String {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "conflict".to_string());
    match target.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    }
}
