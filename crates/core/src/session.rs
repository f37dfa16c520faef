//! Sequential processing of conflicted files.
//!
//! Each file is read once, scanned, driven through a [`ResolutionEngine`],
//! written back once via an atomic replace, and staged only when no marker
//! block remains. A malformed or unreadable file is reported and the session
//! moves on; an operator quit ends the session after the current file is
//! written.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::conflict::engine::{Completion, DecisionSource, ResolutionEngine};
use crate::conflict::file_set::FileConflictSet;
use crate::conflict::scanner::{self, ScannerOptions};
use crate::delegate::{DiffTool, Editor};
use crate::errors::{ConflictError, CoreError, GitError};

/// Marks a resolved file as resolved in version control.
pub trait Stager {
    fn stage(&self, path: &Path) -> Result<(), GitError>;
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// The file contained no conflict markers; nothing was written.
    NoConflicts,
    /// Every hunk was resolved and the file written.
    Resolved { staged: bool },
    /// The file was written with marker blocks left in place.
    Incomplete { unresolved: usize, skipped: usize },
    /// The markers could not be parsed; the file was left untouched.
    Malformed(String),
    /// Reading, writing or staging failed.
    Failed(String),
}

/// Per-file result reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub hunks: usize,
    pub status: FileStatus,
    /// The operator quit while this file was open.
    pub quit: bool,
}

impl FileReport {
    fn new(path: &Path, hunks: usize, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            hunks,
            status,
            quit: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(
            self.status,
            FileStatus::NoConflicts | FileStatus::Resolved { .. }
        )
    }
}

/// Reports for every file the session touched.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub reports: Vec<FileReport>,
    pub quit: bool,
}

impl SessionSummary {
    pub fn all_clean(&self) -> bool {
        self.reports.iter().all(FileReport::is_clean)
    }
}

/// Read and scan one file without modifying it.
#[instrument(skip(options), fields(path = %path.display()))]
pub fn load_file(path: &Path, options: &ScannerOptions) -> Result<FileConflictSet, ConflictError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConflictError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    scanner::scan(path, &content, options)
}

/// Replace `path` with `content` through a temporary file in the same
/// directory, keeping the original permissions.
#[instrument(skip(content), fields(path = %path.display(), bytes = content.len()))]
pub fn write_back(path: &Path, content: &str) -> Result<(), ConflictError> {
    let wrap = |source: std::io::Error| ConflictError::WriteBackFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(content.as_bytes()).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(wrap)?;
    }
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    debug!("file written");
    Ok(())
}

/// Drives files through the resolution engine one after another.
pub struct Session<'a> {
    config: &'a ResolverConfig,
    editor: &'a dyn Editor,
    diff_tool: &'a dyn DiffTool,
    stager: Option<&'a dyn Stager>,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a ResolverConfig,
        editor: &'a dyn Editor,
        diff_tool: &'a dyn DiffTool,
    ) -> Self {
        Self {
            config,
            editor,
            diff_tool,
            stager: None,
        }
    }

    /// Stage clean files with `stager` after they are written.
    pub fn with_stager(mut self, stager: &'a dyn Stager) -> Self {
        self.stager = Some(stager);
        self
    }

    /// Process one file. File-level failures become a report; only a
    /// failing decision source is returned as `Err`.
    #[instrument(skip(self, input), fields(path = %path.display()))]
    pub fn process_file(
        &self,
        path: &Path,
        input: &mut dyn DecisionSource,
    ) -> Result<FileReport, CoreError> {
        let set = match load_file(path, &self.config.scanner) {
            Ok(set) => set,
            Err(err @ ConflictError::MalformedConflict { .. }) => {
                warn!(error = %err, "skipping malformed file");
                return Ok(FileReport::new(path, 0, FileStatus::Malformed(err.to_string())));
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable file");
                return Ok(FileReport::new(path, 0, FileStatus::Failed(err.to_string())));
            }
        };

        let hunks = set.hunk_count();
        if hunks == 0 {
            info!("no conflicts");
            return Ok(FileReport::new(path, 0, FileStatus::NoConflicts));
        }
        info!(hunks, "resolving file");

        let original = set.serialize();
        let outcome =
            ResolutionEngine::new(set, self.config, self.editor, self.diff_tool).run(input)?;
        let set = outcome.set;
        let quit = outcome.completion == Completion::Quit;

        let content = set.serialize();
        if content != original {
            if let Err(err) = write_back(path, &content) {
                warn!(error = %err, "write-back failed, nothing staged");
                let mut report = FileReport::new(path, hunks, FileStatus::Failed(err.to_string()));
                report.quit = quit;
                return Ok(report);
            }
        } else {
            debug!("content unchanged, not writing");
        }

        let status = if set.is_clean() {
            let staged = match self.stager {
                Some(stager) => match stager.stage(path) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(error = %err, "staging failed");
                        let mut report =
                            FileReport::new(path, hunks, FileStatus::Failed(err.to_string()));
                        report.quit = quit;
                        return Ok(report);
                    }
                },
                None => false,
            };
            FileStatus::Resolved { staged }
        } else {
            FileStatus::Incomplete {
                unresolved: set.unresolved_indices().len(),
                skipped: set.skipped_count(),
            }
        };

        info!(?status, quit, "file processed");
        let mut report = FileReport::new(path, hunks, status);
        report.quit = quit;
        Ok(report)
    }

    /// Process `paths` in order, calling `on_report` after each file. Stops
    /// early when the operator quits.
    pub fn run<P: AsRef<Path>>(
        &self,
        paths: &[P],
        input: &mut dyn DecisionSource,
        mut on_report: impl FnMut(&FileReport),
    ) -> Result<SessionSummary, CoreError> {
        let mut summary = SessionSummary::default();
        for path in paths {
            let report = self.process_file(path.as_ref(), input)?;
            on_report(&report);
            let quit = report.quit;
            summary.reports.push(report);
            if quit {
                info!("session ended by operator");
                summary.quit = true;
                break;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::conflict::engine::tests::{FakeDiffTool, FakeEditor, Scripted};
    use crate::conflict::engine::Decision;
    use crate::conflict::view::ViewMode;

    const ONE_HUNK: &str = "a\n<<<<<<< HEAD\n1\n=======\n2\n>>>>>>> b\nz\n";
    const TWO_HUNKS: &str = "\
a
<<<<<<< HEAD
1
=======
2
>>>>>>> b
m
<<<<<<< HEAD
3
=======
4
>>>>>>> b
z
";

    #[derive(Default)]
    struct FakeStager {
        staged: RefCell<Vec<PathBuf>>,
        fail: bool,
    }

    impl Stager for FakeStager {
        fn stage(&self, path: &Path) -> Result<(), GitError> {
            if self.fail {
                return Err(GitError::OutsideWorkdir(path.display().to_string()));
            }
            self.staged.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn hunk_config() -> ResolverConfig {
        ResolverConfig {
            default_view: ViewMode::Hunk,
            ..ResolverConfig::default()
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_resolved_file_is_written_and_staged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", TWO_HUNKS);
        let config = hunk_config();
        let (editor, diff, stager) = (
            FakeEditor::returning(""),
            FakeDiffTool { succeed: true },
            FakeStager::default(),
        );
        let session = Session::new(&config, &editor, &diff).with_stager(&stager);
        let mut script = Scripted::new(&[Decision::KeepOurs, Decision::KeepTheirs]);

        let report = session.process_file(&path, &mut script).unwrap();
        assert_eq!(report.status, FileStatus::Resolved { staged: true });
        assert_eq!(report.hunks, 2);
        assert!(!report.quit);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n1\nm\n4\nz\n");
        assert_eq!(stager.staged.borrow().as_slice(), &[path]);
    }

    #[test]
    fn test_quit_persists_partial_and_stops_session() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(dir.path(), "first.txt", TWO_HUNKS);
        let second = write(dir.path(), "second.txt", ONE_HUNK);
        let config = hunk_config();
        let (editor, diff, stager) = (
            FakeEditor::returning(""),
            FakeDiffTool { succeed: true },
            FakeStager::default(),
        );
        let session = Session::new(&config, &editor, &diff).with_stager(&stager);
        let mut script = Scripted::new(&[Decision::KeepTheirs, Decision::Quit]);

        let mut seen = 0;
        let summary = session
            .run(&[&first, &second], &mut script, |_| seen += 1)
            .unwrap();

        assert!(summary.quit);
        assert_eq!(seen, 1);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(
            summary.reports[0].status,
            FileStatus::Incomplete {
                unresolved: 1,
                skipped: 0
            }
        );
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            "a\n2\nm\n<<<<<<< HEAD\n3\n=======\n4\n>>>>>>> b\nz\n"
        );
        assert_eq!(std::fs::read_to_string(&second).unwrap(), ONE_HUNK);
        assert!(stager.staged.borrow().is_empty());
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad_content = "<<<<<<< a\nx\n>>>>>>> b\n";
        let bad = write(dir.path(), "bad.txt", bad_content);
        let good = write(dir.path(), "good.txt", ONE_HUNK);
        let config = ResolverConfig::default();
        let (editor, diff) = (FakeEditor::returning(""), FakeDiffTool { succeed: true });
        let session = Session::new(&config, &editor, &diff);
        let mut script = Scripted::new(&[Decision::KeepOurs]);

        let summary = session.run(&[&bad, &good], &mut script, |_| {}).unwrap();

        assert!(matches!(summary.reports[0].status, FileStatus::Malformed(_)));
        assert_eq!(std::fs::read_to_string(&bad).unwrap(), bad_content);
        assert_eq!(
            summary.reports[1].status,
            FileStatus::Resolved { staged: false }
        );
        assert_eq!(std::fs::read_to_string(&good).unwrap(), "a\n1\nz\n");
        assert!(!summary.all_clean());
    }

    #[test]
    fn test_no_conflicts_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let plain = write(dir.path(), "plain.txt", "nothing here\n");
        let missing = dir.path().join("missing.txt");
        let config = ResolverConfig::default();
        let (editor, diff) = (FakeEditor::returning(""), FakeDiffTool { succeed: true });
        let session = Session::new(&config, &editor, &diff);
        let mut script = Scripted::new(&[]);

        let summary = session.run(&[&plain, &missing], &mut script, |_| {}).unwrap();
        assert_eq!(summary.reports[0].status, FileStatus::NoConflicts);
        assert!(matches!(summary.reports[1].status, FileStatus::Failed(_)));
        assert!(script.targets.is_empty());
    }

    #[test]
    fn test_skipped_hunk_is_not_staged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", ONE_HUNK);
        let config = ResolverConfig::default();
        let (editor, diff, stager) = (
            FakeEditor::returning(""),
            FakeDiffTool { succeed: true },
            FakeStager::default(),
        );
        let session = Session::new(&config, &editor, &diff).with_stager(&stager);
        let mut script = Scripted::new(&[Decision::Skip]);

        let report = session.process_file(&path, &mut script).unwrap();
        assert_eq!(
            report.status,
            FileStatus::Incomplete {
                unresolved: 0,
                skipped: 1
            }
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ONE_HUNK);
        assert!(stager.staged.borrow().is_empty());
    }

    #[test]
    fn test_stage_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", ONE_HUNK);
        let config = ResolverConfig::default();
        let (editor, diff) = (FakeEditor::returning(""), FakeDiffTool { succeed: true });
        let stager = FakeStager {
            fail: true,
            ..FakeStager::default()
        };
        let session = Session::new(&config, &editor, &diff).with_stager(&stager);
        let mut script = Scripted::new(&[Decision::KeepTheirs]);

        let report = session.process_file(&path, &mut script).unwrap();
        assert!(matches!(report.status, FileStatus::Failed(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\n2\nz\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_diff_tool_that_saves_nothing_is_not_staged() {
        use crate::delegate::CommandDiffTool;

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", ONE_HUNK);
        let config = hunk_config();
        let (editor, diff, stager) = (
            FakeEditor::returning(""),
            CommandDiffTool::new("true"),
            FakeStager::default(),
        );
        let session = Session::new(&config, &editor, &diff).with_stager(&stager);
        let mut script = Scripted::new(&[Decision::ExternalDiff, Decision::Quit]);

        let report = session.process_file(&path, &mut script).unwrap();
        assert_eq!(
            report.status,
            FileStatus::Incomplete {
                unresolved: 1,
                skipped: 0
            }
        );
        assert!(report.quit);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ONE_HUNK);
        assert!(stager.staged.borrow().is_empty());
    }

    #[test]
    fn test_exhausted_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", ONE_HUNK);
        let config = ResolverConfig::default();
        let (editor, diff) = (FakeEditor::returning(""), FakeDiffTool { succeed: true });
        let session = Session::new(&config, &editor, &diff);
        let mut script = Scripted::new(&[]);

        let err = session.process_file(&path, &mut script).unwrap_err();
        assert!(matches!(err, CoreError::Delegate(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ONE_HUNK);
    }

    #[test]
    fn test_write_back_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("f.txt");
        let err = write_back(&path, "x").unwrap_err();
        assert!(matches!(err, ConflictError::WriteBackFailed { .. }));
    }

    #[test]
    fn test_write_back_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "f.txt", "old\n");
        write_back(&path, "new\r\nlast").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\r\nlast");
    }
}
