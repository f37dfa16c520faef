//! simplemerge core library.
//!
//! Parses conflict markers left by a failed three-way merge into structured
//! hunks, drives an operator through resolving them, and writes the result
//! back: configuration, the conflict model and resolution engine, editor and
//! diff-tool delegates, git index access, and the per-file session driver.

pub mod config;
pub mod conflict;
pub mod delegate;
pub mod errors;
pub mod git;
pub mod session;

// Re-exports for convenience.
pub use config::{AppConfig, ResolverConfig};
pub use conflict::{Decision, DecisionSource, FileConflictSet, ResolutionEngine};
pub use git::GitClient;
pub use session::{FileReport, FileStatus, Session, SessionSummary, Stager};
