//! Per-file resolution state machine.
//!
//! ```text
//! SelectingHunk -> AwaitingDecision -> Resolving -> SelectingHunk ... -> Done
//! ```
//!
//! The only suspension point is `AwaitingDecision`, where the engine asks a
//! [`DecisionSource`] for the operator's choice. Delegate failures leave the
//! target unresolved and the same prompt is presented again.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::file_set::{FileConflictSet, Side};
use super::hunk::Resolution;
use super::view::{self, View, ViewMode, ViewState};
use crate::config::ResolverConfig;
use crate::delegate::{DiffTool, Editor, MergeSides};
use crate::errors::{CoreError, DelegateError};

/// Operator choices offered at every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    KeepOurs,
    KeepTheirs,
    Edit,
    ExternalDiff,
    ToggleView,
    MoreContext,
    Skip,
    Quit,
}

impl Decision {
    /// All decisions in menu order.
    pub const ALL: [Decision; 8] = [
        Decision::KeepOurs,
        Decision::KeepTheirs,
        Decision::Edit,
        Decision::ExternalDiff,
        Decision::ToggleView,
        Decision::MoreContext,
        Decision::Skip,
        Decision::Quit,
    ];

    /// Single-key shortcut shown in the menu.
    pub fn key(self) -> char {
        match self {
            Self::KeepOurs => 'o',
            Self::KeepTheirs => 't',
            Self::Edit => 'e',
            Self::ExternalDiff => 'v',
            Self::ToggleView => 'm',
            Self::MoreContext => 'c',
            Self::Skip => 's',
            Self::Quit => 'q',
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::KeepOurs => "Keep 'ours'",
            Self::KeepTheirs => "Keep 'theirs'",
            Self::Edit => "Edit manually",
            Self::ExternalDiff => "Open in external diff tool",
            Self::ToggleView => "Toggle view mode",
            Self::MoreContext => "Show more context",
            Self::Skip => "Skip",
            Self::Quit => "Quit",
        }
    }
}

/// What a decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Hunk(usize),
    WholeFile,
}

/// Engine state. `Resolving` is transient inside [`ResolutionEngine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    SelectingHunk,
    AwaitingDecision(Target),
    Resolving(Target, Decision),
    Done(Completion),
}

/// Why the engine reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// No hunk is left unresolved.
    Finished,
    /// The operator quit with hunks still unresolved.
    Quit,
}

/// Everything the decision source needs to present one prompt.
#[derive(Debug, Clone)]
pub struct Prompt<'a> {
    pub set: &'a FileConflictSet,
    pub target: Target,
    pub view_state: &'a ViewState,
    pub view: View,
    /// 1-based position of the target hunk among all hunks.
    pub position: usize,
    pub total: usize,
    pub remaining: usize,
}

/// Non-fatal events reported back to the decision source.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    /// A delegate failed; the same target is prompted again.
    DelegateFailed(&'a DelegateError),
    ViewChanged(ViewMode),
    ContextChanged(usize),
    /// `count` hunks received `resolution`.
    Resolved {
        count: usize,
        resolution: &'a Resolution,
    },
    Rewritten,
}

/// Supplies operator decisions; the engine blocks on [`decide`](Self::decide).
pub trait DecisionSource {
    fn decide(&mut self, prompt: &Prompt<'_>) -> Result<Decision, DelegateError>;

    /// Receive a notice about what the last decision did.
    fn report(&mut self, _event: &EngineEvent<'_>) {}
}

/// Outcome of applying one decision.
#[derive(Debug)]
pub enum Step {
    /// The decision took effect; the engine moved on.
    Applied,
    /// A delegate failed; nothing changed and the same target is pending.
    Failed(DelegateError),
}

/// Drives one file from parse to serialization.
pub struct ResolutionEngine<'d> {
    set: FileConflictSet,
    view: ViewState,
    state: EngineState,
    editor: &'d dyn Editor,
    diff_tool: &'d dyn DiffTool,
}

impl<'d> ResolutionEngine<'d> {
    pub fn new(
        set: FileConflictSet,
        config: &ResolverConfig,
        editor: &'d dyn Editor,
        diff_tool: &'d dyn DiffTool,
    ) -> Self {
        let mut engine = Self {
            set,
            view: ViewState::new(config.default_view, config.default_context_lines),
            state: EngineState::SelectingHunk,
            editor,
            diff_tool,
        };
        engine.select();
        engine
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn set(&self) -> &FileConflictSet {
        &self.set
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, EngineState::Done(_))
    }

    /// SelectingHunk: pick the next target or finish.
    fn select(&mut self) {
        let next = self.set.next_unresolved();
        self.view.current_hunk_index = next;
        self.state = match (next, self.view.mode) {
            (None, _) => EngineState::Done(Completion::Finished),
            (Some(_), ViewMode::File) => EngineState::AwaitingDecision(Target::WholeFile),
            (Some(index), ViewMode::Hunk) => EngineState::AwaitingDecision(Target::Hunk(index)),
        };
        debug!(state = ?self.state, "selected next target");
    }

    /// The prompt for the pending target, or `None` once done.
    pub fn prompt(&self) -> Result<Option<Prompt<'_>>, CoreError> {
        let EngineState::AwaitingDecision(target) = self.state else {
            return Ok(None);
        };
        let view = view::render(&self.set, &self.view)?;
        let total = self.set.hunk_count();
        let position = match target {
            Target::Hunk(index) => index + 1,
            Target::WholeFile => self.view.current_hunk_index.map_or(0, |i| i + 1),
        };
        Ok(Some(Prompt {
            set: &self.set,
            target,
            view_state: &self.view,
            view,
            position,
            total,
            remaining: self.set.unresolved_indices().len(),
        }))
    }

    /// Resolving: apply one decision to the pending target.
    ///
    /// Delegate failures are returned as [`Step::Failed`] and leave the
    /// engine awaiting a decision for the same target. Model errors are
    /// returned as `Err`.
    pub fn apply(
        &mut self,
        decision: Decision,
        mut events: impl FnMut(&EngineEvent<'_>),
    ) -> Result<Step, CoreError> {
        let EngineState::AwaitingDecision(target) = self.state else {
            return Ok(Step::Applied);
        };
        self.state = EngineState::Resolving(target, decision);
        debug!(?target, ?decision, "applying decision");

        let outcome = match decision {
            Decision::KeepOurs => self.resolve_target(target, Resolution::KeptOurs, &mut events),
            Decision::KeepTheirs => {
                self.resolve_target(target, Resolution::KeptTheirs, &mut events)
            }
            Decision::Skip => self.resolve_target(target, Resolution::Skipped, &mut events),
            Decision::Edit => self.edit(target, &mut events),
            Decision::ExternalDiff => self.external_diff(target, &mut events),
            Decision::ToggleView => {
                events(&EngineEvent::ViewChanged(self.view.toggle_mode()));
                Ok(Step::Applied)
            }
            Decision::MoreContext => {
                events(&EngineEvent::ContextChanged(self.view.more_context()));
                Ok(Step::Applied)
            }
            Decision::Quit => {
                let remaining = self.set.unresolved_indices().len();
                info!(path = %self.set.path().display(), remaining, "operator quit");
                self.state = EngineState::Done(if remaining == 0 {
                    Completion::Finished
                } else {
                    Completion::Quit
                });
                return Ok(Step::Applied);
            }
        };

        match outcome {
            Ok(Step::Failed(err)) => {
                warn!(?target, error = %err, "delegate failed, target left unresolved");
                events(&EngineEvent::DelegateFailed(&err));
                self.state = EngineState::AwaitingDecision(target);
                Ok(Step::Failed(err))
            }
            Ok(Step::Applied) => {
                self.select();
                Ok(Step::Applied)
            }
            Err(err) => {
                self.state = EngineState::AwaitingDecision(target);
                Err(err)
            }
        }
    }

    fn resolve_target(
        &mut self,
        target: Target,
        resolution: Resolution,
        events: &mut impl FnMut(&EngineEvent<'_>),
    ) -> Result<Step, CoreError> {
        let count = match target {
            Target::Hunk(index) => {
                self.set.resolve(index, resolution.clone())?;
                1
            }
            Target::WholeFile => self.set.resolve_remaining(resolution.clone())?,
        };
        events(&EngineEvent::Resolved {
            count,
            resolution: &resolution,
        });
        Ok(Step::Applied)
    }

    fn edit(
        &mut self,
        target: Target,
        events: &mut impl FnMut(&EngineEvent<'_>),
    ) -> Result<Step, CoreError> {
        let seed = match target {
            Target::Hunk(index) => self.set.hunk(index)?.block_text(),
            Target::WholeFile => self.set.serialize(),
        };
        match self.editor.edit(&seed, self.set.path()) {
            Ok(text) => self.accept_text(target, text, events),
            Err(err) => Ok(Step::Failed(err)),
        }
    }

    fn external_diff(
        &mut self,
        target: Target,
        events: &mut impl FnMut(&EngineEvent<'_>),
    ) -> Result<Step, CoreError> {
        let (ours, base, theirs, seed) = match target {
            Target::Hunk(index) => {
                let hunk = self.set.hunk(index)?;
                (
                    hunk.ours.concat(),
                    hunk.base.as_ref().map(|lines| lines.concat()).unwrap_or_default(),
                    hunk.theirs.concat(),
                    hunk.block_text(),
                )
            }
            Target::WholeFile => (
                self.set.side_text(Side::Ours),
                self.set.side_text(Side::Base),
                self.set.side_text(Side::Theirs),
                self.set.serialize(),
            ),
        };
        let sides = MergeSides {
            ours: &ours,
            base: &base,
            theirs: &theirs,
            seed: &seed,
        };
        match self.diff_tool.merge(&sides, self.set.path()) {
            Ok(text) => self.accept_text(target, text, events),
            Err(err) => Ok(Step::Failed(err)),
        }
    }

    /// Accept editor or diff-tool output as-is; leftover markers are not
    /// re-validated.
    fn accept_text(
        &mut self,
        target: Target,
        text: String,
        events: &mut impl FnMut(&EngineEvent<'_>),
    ) -> Result<Step, CoreError> {
        match target {
            Target::Hunk(_) => self.resolve_target(target, Resolution::Edited(text), events),
            Target::WholeFile => {
                self.set.rewrite(&text);
                events(&EngineEvent::Rewritten);
                Ok(Step::Applied)
            }
        }
    }

    /// Drive the engine to `Done`, blocking on `input` at every prompt.
    pub fn run(mut self, input: &mut dyn DecisionSource) -> Result<EngineOutcome, CoreError> {
        while !self.is_done() {
            let decision = {
                let Some(prompt) = self.prompt()? else { break };
                input.decide(&prompt)?
            };
            self.apply(decision, |event| input.report(event))?;
        }
        Ok(self.finish())
    }

    /// Consume the engine, yielding the set for serialization.
    pub fn finish(self) -> EngineOutcome {
        let completion = match self.state {
            EngineState::Done(completion) => completion,
            _ if self.set.is_fully_resolved() => Completion::Finished,
            _ => Completion::Quit,
        };
        EngineOutcome {
            set: self.set,
            completion,
        }
    }
}

/// The processed set and how processing ended.
#[derive(Debug)]
pub struct EngineOutcome {
    pub set: FileConflictSet,
    pub completion: Completion,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;

    use super::*;
    use crate::conflict::scanner::{scan, ScannerOptions};

    /// Editor that returns a fixed text, or fails.
    pub(crate) struct FakeEditor {
        pub result: Option<String>,
        pub seeds: RefCell<Vec<String>>,
    }

    impl FakeEditor {
        pub(crate) fn returning(text: &str) -> Self {
            Self {
                result: Some(text.to_string()),
                seeds: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                result: None,
                seeds: RefCell::new(Vec::new()),
            }
        }
    }

    impl Editor for FakeEditor {
        fn edit(&self, seed: &str, _target: &Path) -> Result<String, DelegateError> {
            self.seeds.borrow_mut().push(seed.to_string());
            self.result
                .clone()
                .ok_or_else(|| DelegateError::EditorLaunchFailed {
                    command: "fake".into(),
                    detail: "cannot start".into(),
                })
        }
    }

    /// Diff tool that either picks theirs or fails.
    pub(crate) struct FakeDiffTool {
        pub succeed: bool,
    }

    impl DiffTool for FakeDiffTool {
        fn merge(&self, sides: &MergeSides<'_>, _target: &Path) -> Result<String, DelegateError> {
            if self.succeed {
                Ok(sides.theirs.to_string())
            } else {
                Err(DelegateError::DiffToolFailed {
                    command: "fake".into(),
                    detail: "exit status 1".into(),
                })
            }
        }
    }

    /// Replays a scripted list of decisions and records what it saw.
    pub(crate) struct Scripted {
        pub decisions: VecDeque<Decision>,
        pub targets: Vec<Target>,
        pub failures: usize,
    }

    impl Scripted {
        pub(crate) fn new(decisions: &[Decision]) -> Self {
            Self {
                decisions: decisions.iter().copied().collect(),
                targets: Vec::new(),
                failures: 0,
            }
        }
    }

    impl DecisionSource for Scripted {
        fn decide(&mut self, prompt: &Prompt<'_>) -> Result<Decision, DelegateError> {
            self.targets.push(prompt.target);
            self.decisions
                .pop_front()
                .ok_or_else(|| DelegateError::InputFailed("script exhausted".into()))
        }

        fn report(&mut self, event: &EngineEvent<'_>) {
            if matches!(event, EngineEvent::DelegateFailed(_)) {
                self.failures += 1;
            }
        }
    }

    const TWO_HUNKS: &str = "\
a
<<<<<<< HEAD
1
=======
2
>>>>>>> branch
b
<<<<<<< HEAD
3
=======
4
>>>>>>> branch
c
";

    fn hunk_config() -> ResolverConfig {
        ResolverConfig {
            default_view: ViewMode::Hunk,
            ..ResolverConfig::default()
        }
    }

    fn set() -> FileConflictSet {
        scan("f.txt", TWO_HUNKS, &ScannerOptions::default()).unwrap()
    }

    fn run(
        config: &ResolverConfig,
        editor: &dyn Editor,
        diff: &dyn DiffTool,
        script: &mut Scripted,
    ) -> EngineOutcome {
        ResolutionEngine::new(set(), config, editor, diff)
            .run(script)
            .unwrap()
    }

    #[test]
    fn test_hunks_presented_in_order() {
        let editor = FakeEditor::returning("");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::KeepOurs, Decision::KeepTheirs]);
        let outcome = run(&hunk_config(), &editor, &diff, &mut script);

        assert_eq!(script.targets, vec![Target::Hunk(0), Target::Hunk(1)]);
        assert_eq!(outcome.completion, Completion::Finished);
        assert_eq!(outcome.set.serialize(), "a\n1\nb\n4\nc\n");
    }

    #[test]
    fn test_quit_after_first_hunk() {
        let editor = FakeEditor::returning("");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::KeepTheirs, Decision::Quit]);
        let outcome = run(&hunk_config(), &editor, &diff, &mut script);

        assert_eq!(outcome.completion, Completion::Quit);
        assert!(!outcome.set.is_fully_resolved());
        assert_eq!(
            outcome.set.serialize(),
            "a\n2\nb\n<<<<<<< HEAD\n3\n=======\n4\n>>>>>>> branch\nc\n"
        );
    }

    #[test]
    fn test_whole_file_decision_applies_to_all() {
        let editor = FakeEditor::returning("");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::KeepOurs]);
        let outcome = run(&ResolverConfig::default(), &editor, &diff, &mut script);

        assert_eq!(script.targets, vec![Target::WholeFile]);
        assert_eq!(outcome.set.serialize(), "a\n1\nb\n3\nc\n");
        assert!(outcome.set.is_clean());
    }

    #[test]
    fn test_view_decisions_do_not_consume_hunks() {
        let editor = FakeEditor::returning("");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[
            Decision::ToggleView,
            Decision::MoreContext,
            Decision::Skip,
            Decision::ToggleView,
            Decision::KeepOurs,
        ]);
        let outcome = run(&ResolverConfig::default(), &editor, &diff, &mut script);

        assert_eq!(
            script.targets,
            vec![
                Target::WholeFile,
                Target::Hunk(0),
                Target::Hunk(0),
                Target::Hunk(1),
                Target::WholeFile,
            ]
        );
        let set = outcome.set;
        assert_eq!(set.hunk(0).unwrap().resolution(), &Resolution::Skipped);
        assert_eq!(set.hunk(1).unwrap().resolution(), &Resolution::KeptOurs);
        assert!(set.is_fully_resolved());
        assert!(!set.is_clean());
    }

    #[test]
    fn test_edit_seeds_block_and_accepts_result() {
        let editor = FakeEditor::returning("edited\n");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::Edit, Decision::KeepOurs]);
        let outcome = run(&hunk_config(), &editor, &diff, &mut script);

        assert_eq!(
            editor.seeds.borrow()[0],
            "<<<<<<< HEAD\n1\n=======\n2\n>>>>>>> branch\n"
        );
        assert_eq!(outcome.set.serialize(), "a\nedited\nb\n3\nc\n");
    }

    #[test]
    fn test_unchanged_edit_is_accepted() {
        let block = "<<<<<<< HEAD\n1\n=======\n2\n>>>>>>> branch\n";
        let editor = FakeEditor::returning(block);
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::Edit, Decision::Quit]);
        let outcome = run(&hunk_config(), &editor, &diff, &mut script);

        assert_eq!(
            outcome.set.hunk(0).unwrap().resolution(),
            &Resolution::Edited(block.to_string())
        );
    }

    #[test]
    fn test_editor_failure_reprompts_same_hunk() {
        let editor = FakeEditor::failing();
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::Edit, Decision::KeepTheirs, Decision::Quit]);
        let outcome = run(&hunk_config(), &editor, &diff, &mut script);

        assert_eq!(script.failures, 1);
        assert_eq!(
            script.targets,
            vec![Target::Hunk(0), Target::Hunk(0), Target::Hunk(1)]
        );
        assert_eq!(
            outcome.set.hunk(0).unwrap().resolution(),
            &Resolution::KeptTheirs
        );
    }

    #[test]
    fn test_diff_tool_success_and_failure() {
        let editor = FakeEditor::returning("");
        let failing = FakeDiffTool { succeed: false };
        let mut script = Scripted::new(&[Decision::ExternalDiff, Decision::Quit]);
        let outcome = run(&hunk_config(), &editor, &failing, &mut script);
        assert_eq!(script.failures, 1);
        assert!(!outcome.set.hunk(0).unwrap().is_resolved());

        let working = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::ExternalDiff, Decision::ExternalDiff]);
        let outcome = run(&hunk_config(), &editor, &working, &mut script);
        assert_eq!(outcome.set.serialize(), "a\n2\nb\n4\nc\n");
    }

    #[test]
    fn test_whole_file_edit_rewrites() {
        let editor = FakeEditor::returning("all new\n");
        let diff = FakeDiffTool { succeed: true };
        let mut script = Scripted::new(&[Decision::Edit]);
        let outcome = run(&ResolverConfig::default(), &editor, &diff, &mut script);

        assert_eq!(editor.seeds.borrow()[0], TWO_HUNKS);
        assert_eq!(outcome.completion, Completion::Finished);
        assert_eq!(outcome.set.serialize(), "all new\n");
        assert_eq!(outcome.set.hunk_count(), 0);
    }

    #[test]
    fn test_no_conflicts_is_done_immediately() {
        let editor = FakeEditor::returning("");
        let diff = FakeDiffTool { succeed: true };
        let set = scan("f", "plain\n", &ScannerOptions::default()).unwrap();
        let engine = ResolutionEngine::new(set, &ResolverConfig::default(), &editor, &diff);
        assert_eq!(engine.state(), &EngineState::Done(Completion::Finished));
        assert!(engine.prompt().unwrap().is_none());
    }

    #[test]
    fn test_decision_keys() {
        assert_eq!(Decision::from_key('O'), Some(Decision::KeepOurs));
        assert_eq!(Decision::from_key('v'), Some(Decision::ExternalDiff));
        assert_eq!(Decision::from_key('x'), None);
        for decision in Decision::ALL {
            assert_eq!(Decision::from_key(decision.key()), Some(decision));
        }
    }
}
