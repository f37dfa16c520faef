//! External three-way diff tool delegate.
//!
//! The sides are written to `NAME.LOCAL`, `NAME.BASE`, `NAME.REMOTE` and a
//! seeded `NAME.MERGED` in a private temporary directory. The configured
//! command may reference them as `$LOCAL`, `$BASE`, `$REMOTE` and `$MERGED`;
//! a command with no placeholders gets `LOCAL BASE REMOTE MERGED` appended.
//! Whatever the tool leaves in `MERGED` is the result; a `MERGED` still equal
//! to its seed counts as a failed merge.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, instrument, warn};

use super::{scratch_name, split_command, DiffTool};
use crate::errors::DelegateError;

/// The three texts of a conflict plus the initial merged content.
#[derive(Debug, Clone, Copy)]
pub struct MergeSides<'a> {
    pub ours: &'a str,
    pub base: &'a str,
    pub theirs: &'a str,
    /// Initial content of the merged file, usually the marker block.
    pub seed: &'a str,
}

struct ScratchPaths {
    local: PathBuf,
    base: PathBuf,
    remote: PathBuf,
    merged: PathBuf,
}

impl ScratchPaths {
    fn substitute(&self, arg: &str) -> Option<PathBuf> {
        match arg {
            "$LOCAL" => Some(self.local.clone()),
            "$BASE" => Some(self.base.clone()),
            "$REMOTE" => Some(self.remote.clone()),
            "$MERGED" => Some(self.merged.clone()),
            _ => None,
        }
    }
}

/// Spawns a command such as `vimdiff $LOCAL $BASE $REMOTE $MERGED`.
#[derive(Debug, Clone)]
pub struct CommandDiffTool {
    command: String,
}

impl CommandDiffTool {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn failed(&self, detail: impl Into<String>) -> DelegateError {
        DelegateError::DiffToolFailed {
            command: self.command.clone(),
            detail: detail.into(),
        }
    }
}

impl DiffTool for CommandDiffTool {
    #[instrument(skip(self, sides), fields(command = %self.command, target = %target.display()))]
    fn merge(&self, sides: &MergeSides<'_>, target: &Path) -> Result<String, DelegateError> {
        let (program, args) = split_command(&self.command, "diff tool")?;

        // Removed with all four files on drop, on every return path.
        let dir = tempfile::Builder::new().prefix("simplemerge-").tempdir()?;
        let paths = ScratchPaths {
            local: dir.path().join(scratch_name(target, "LOCAL")),
            base: dir.path().join(scratch_name(target, "BASE")),
            remote: dir.path().join(scratch_name(target, "REMOTE")),
            merged: dir.path().join(scratch_name(target, "MERGED")),
        };
        std::fs::write(&paths.local, sides.ours)?;
        std::fs::write(&paths.base, sides.base)?;
        std::fs::write(&paths.remote, sides.theirs)?;
        std::fs::write(&paths.merged, sides.seed)?;

        let mut cmd = Command::new(program);
        let mut substituted = false;
        for arg in args {
            match paths.substitute(arg) {
                Some(path) => {
                    cmd.arg(path);
                    substituted = true;
                }
                None => {
                    cmd.arg(arg);
                }
            }
        }
        if !substituted {
            cmd.args([&paths.local, &paths.base, &paths.remote, &paths.merged]);
        }

        info!(dir = %dir.path().display(), "launching diff tool");
        let status = cmd.status().map_err(|e| self.failed(e.to_string()))?;
        if !status.success() {
            warn!(%status, "diff tool exited abnormally");
            return Err(self.failed(format!("exited with {status}")));
        }

        let merged = std::fs::read_to_string(&paths.merged)?;
        if merged == sides.seed {
            warn!("diff tool left the merged file unchanged");
            return Err(self.failed("merged result was not saved"));
        }
        debug!(bytes = merged.len(), "diff tool finished");
        Ok(merged)
    }
}
