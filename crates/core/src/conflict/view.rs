//! Read-only rendering of a conflicted file for the operator.
//!
//! The formatter produces a structured [`View`] rather than colored text so
//! that the terminal layer decides how each kind of line is styled.

use serde::{Deserialize, Serialize};

use super::file_set::{split_lines, FileConflictSet, Segment};
use super::hunk::{strip_terminator, ConflictMarker, Hunk, MarkerKind};
use crate::errors::ConflictError;

/// Smallest context window shown around a hunk.
pub const MIN_CONTEXT_LINES: usize = 3;
/// Largest context window shown around a hunk.
pub const MAX_CONTEXT_LINES: usize = 10;
/// Step applied by the "more context" decision.
pub const CONTEXT_STEP: usize = 3;

/// Whether the operator looks at the whole file or one hunk at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    #[serde(alias = "whole_file")]
    File,
    #[serde(alias = "per_hunk")]
    Hunk,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::File => Self::Hunk,
            Self::Hunk => Self::File,
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Hunk => write!(f, "hunk"),
        }
    }
}

/// Per-file presentation state owned by the resolution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub mode: ViewMode,
    context_lines: usize,
    pub current_hunk_index: Option<usize>,
}

impl ViewState {
    pub fn new(mode: ViewMode, context_lines: usize) -> Self {
        Self {
            mode,
            context_lines: context_lines.clamp(MIN_CONTEXT_LINES, MAX_CONTEXT_LINES),
            current_hunk_index: None,
        }
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Widen the context window by [`CONTEXT_STEP`], capped at the maximum.
    pub fn more_context(&mut self) -> usize {
        self.context_lines = (self.context_lines + CONTEXT_STEP).min(MAX_CONTEXT_LINES);
        self.context_lines
    }

    pub fn toggle_mode(&mut self) -> ViewMode {
        self.mode = self.mode.toggled();
        self.mode
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ViewMode::default(), MIN_CONTEXT_LINES)
    }
}

/// How a rendered line relates to the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Plain text shown around a hunk.
    Context,
    /// Plain text in a whole-file view.
    Text,
    Marker(MarkerKind),
    Ours,
    Base,
    Theirs,
    /// Replacement text of a resolved hunk.
    Resolved,
}

/// One display line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLine {
    /// 1-based line number in the original file; `None` for replacement text.
    pub number: Option<usize>,
    pub kind: LineKind,
    /// Line content without its terminator.
    pub text: String,
}

/// A rendered hunk or file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub lines: Vec<ViewLine>,
}

impl View {
    fn push(&mut self, number: Option<usize>, kind: LineKind, raw: &str) {
        self.lines.push(ViewLine {
            number,
            kind,
            text: strip_terminator(raw).to_string(),
        });
    }

    fn push_marker(&mut self, marker: &ConflictMarker) {
        self.push(Some(marker.line), LineKind::Marker(marker.kind), &marker.raw);
    }

    fn push_block(&mut self, hunk: &Hunk) {
        self.push_marker(&hunk.start);
        let mut line = hunk.start.line;
        for l in &hunk.ours {
            line += 1;
            self.push(Some(line), LineKind::Ours, l);
        }
        if let (Some(marker), Some(base)) = (&hunk.base_marker, &hunk.base) {
            self.push_marker(marker);
            line = marker.line;
            for l in base {
                line += 1;
                self.push(Some(line), LineKind::Base, l);
            }
        }
        self.push_marker(&hunk.separator);
        line = hunk.separator.line;
        for l in &hunk.theirs {
            line += 1;
            self.push(Some(line), LineKind::Theirs, l);
        }
        self.push_marker(&hunk.end);
    }

    fn push_resolved(&mut self, text: &str) {
        for l in split_lines(text) {
            self.push(None, LineKind::Resolved, &l);
        }
    }
}

/// Render a single hunk with up to `context_lines` of surrounding plain text.
///
/// Context is taken only from the plain-text segments directly adjacent to
/// the hunk, so it is clipped at file boundaries and at neighbouring hunks.
pub fn render_hunk(
    set: &FileConflictSet,
    index: usize,
    state: &ViewState,
) -> Result<View, ConflictError> {
    let position = set
        .segment_position(index)
        .ok_or(ConflictError::HunkNotFound(index))?;
    let segments = set.segments();
    let hunk = set.hunk(index)?;
    let context = state.context_lines();
    let mut view = View::default();

    if let Some(Segment::Text(before)) = position.checked_sub(1).and_then(|p| segments.get(p)) {
        let skip = before.lines.len().saturating_sub(context);
        for (offset, l) in before.lines.iter().enumerate().skip(skip) {
            view.push(Some(before.first_line + offset), LineKind::Context, l);
        }
    }

    match hunk.replacement_text() {
        Some(text) => view.push_resolved(&text),
        None => view.push_block(hunk),
    }

    if let Some(Segment::Text(after)) = segments.get(position + 1) {
        for (offset, l) in after.lines.iter().enumerate().take(context) {
            view.push(Some(after.first_line + offset), LineKind::Context, l);
        }
    }

    Ok(view)
}

/// Render the whole file: unresolved and skipped hunks as marker blocks,
/// resolved hunks as their replacement text.
pub fn render_file(set: &FileConflictSet) -> View {
    let mut view = View::default();
    for segment in set.segments() {
        match segment {
            Segment::Text(block) => {
                for (offset, l) in block.lines.iter().enumerate() {
                    view.push(Some(block.first_line + offset), LineKind::Text, l);
                }
            }
            Segment::Hunk(hunk) => match hunk.replacement_text() {
                Some(text) => view.push_resolved(&text),
                None => view.push_block(hunk),
            },
        }
    }
    view
}

/// Render according to the current mode. In hunk mode with no current hunk
/// (nothing left to resolve) the whole file is shown.
pub fn render(set: &FileConflictSet, state: &ViewState) -> Result<View, ConflictError> {
    match (state.mode, state.current_hunk_index) {
        (ViewMode::Hunk, Some(index)) => render_hunk(set, index, state),
        _ => Ok(render_file(set)),
    }
}
