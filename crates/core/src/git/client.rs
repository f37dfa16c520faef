//! Local Git repository operations via `git2`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::{debug, info, instrument};

use crate::errors::GitError;
use crate::session::Stager;

/// High-level Git client wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    workdir: PathBuf,
}

impl GitClient {
    /// Open the repository containing `path`, searching parent directories.
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        info!(path = %path.display(), "discovering git repository");
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Self::from_repo(repo, path)
    }

    /// Open an existing Git repository at exactly `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Self::from_repo(repo, path)
    }

    fn from_repo(repo: Repository, path: &Path) -> Result<Self, GitError> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository(path.display().to_string()))?
            .canonicalize()?;
        debug!(workdir = %workdir.display(), "repository opened");
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Absolute paths of all files with conflict entries in the index,
    /// sorted and de-duplicated.
    #[instrument(skip(self))]
    pub fn conflicted_files(&self) -> Result<Vec<PathBuf>, GitError> {
        let index = self.repo.index()?;
        if !index.has_conflicts() {
            debug!("index has no conflicts");
            return Ok(Vec::new());
        }

        let mut paths = BTreeSet::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            // A side is missing for delete/modify conflicts; any present
            // entry names the path.
            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            if let Some(entry) = entry {
                let rel = String::from_utf8_lossy(&entry.path).into_owned();
                paths.insert(self.workdir.join(rel));
            }
        }
        info!(count = paths.len(), "found conflicted files");
        Ok(paths.into_iter().collect())
    }

    /// `path` relative to the working directory. Relative inputs are taken
    /// relative to the current directory.
    fn relative_path(&self, path: &Path) -> Result<PathBuf, GitError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        if let Ok(rel) = absolute.strip_prefix(&self.workdir) {
            return Ok(rel.to_path_buf());
        }
        let canonical = absolute.canonicalize()?;
        canonical
            .strip_prefix(&self.workdir)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::OutsideWorkdir(path.display().to_string()))
    }

    /// Add the working-tree version of `path` to the index, clearing its
    /// conflict entries.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn stage_path(&self, path: &Path) -> Result<(), GitError> {
        let rel = self.relative_path(path)?;
        let mut index = self.repo.index()?;
        index.add_path(&rel)?;
        index.write()?;
        info!(path = %rel.display(), "staged resolved file");
        Ok(())
    }
}

impl Stager for GitClient {
    fn stage(&self, path: &Path) -> Result<(), GitError> {
        self.stage_path(path)
    }
}
