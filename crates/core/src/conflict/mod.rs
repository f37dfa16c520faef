//! Conflict-marker parsing, the per-file hunk model, and the interactive
//! resolution state machine.
//!
//! 1. **Scanning** -- [`scanner::scan`] turns file text into a [`FileConflictSet`].
//! 2. **Viewing** -- [`view::render`] builds whole-file or per-hunk views.
//! 3. **Resolving** -- [`ResolutionEngine`] applies operator decisions until
//!    every hunk is decided or the operator quits.

pub mod engine;
pub mod file_set;
pub mod hunk;
pub mod scanner;
pub mod view;

pub use engine::{
    Completion, Decision, DecisionSource, EngineEvent, EngineOutcome, EngineState, Prompt,
    ResolutionEngine, Step, Target,
};
pub use file_set::{FileConflictSet, Segment, Side, TextBlock};
pub use hunk::{ConflictMarker, Hunk, MarkerKind, Resolution};
pub use scanner::{scan, ScannerOptions};
pub use view::{LineKind, View, ViewLine, ViewMode, ViewState};
