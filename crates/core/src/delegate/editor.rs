//! Editor delegate backed by a configured command such as `nano` or
//! `code --wait`.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, instrument, warn};

use super::{scratch_name, split_command, Editor};
use crate::errors::DelegateError;

/// Spawns `command <scratch file>` and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    command: String,
}

impl CommandEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn launch_failed(&self, detail: impl Into<String>) -> DelegateError {
        DelegateError::EditorLaunchFailed {
            command: self.command.clone(),
            detail: detail.into(),
        }
    }
}

impl Editor for CommandEditor {
    #[instrument(skip(self, seed), fields(command = %self.command, target = %target.display()))]
    fn edit(&self, seed: &str, target: &Path) -> Result<String, DelegateError> {
        let (program, args) = split_command(&self.command, "editor")?;

        // Removed on drop, on every return path.
        let scratch = tempfile::Builder::new()
            .prefix("simplemerge-")
            .suffix(&format!("-{}", scratch_name(target, "EDIT")))
            .tempfile()?;
        std::fs::write(scratch.path(), seed)?;

        info!(scratch = %scratch.path().display(), "launching editor");
        let status = Command::new(program)
            .args(&args)
            .arg(scratch.path())
            .status()
            .map_err(|e| self.launch_failed(e.to_string()))?;

        if !status.success() {
            warn!(%status, "editor exited abnormally");
            return Err(self.launch_failed(format!("exited with {status}")));
        }

        let edited = std::fs::read_to_string(scratch.path())?;
        debug!(bytes = edited.len(), unchanged = edited == seed, "editor finished");
        Ok(edited)
    }
}
