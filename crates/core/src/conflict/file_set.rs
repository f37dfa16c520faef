//! Ordered plain-text and hunk segments for one conflicted file.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::hunk::{Hunk, Resolution};
use crate::errors::ConflictError;

/// A run of plain lines outside any conflict block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    /// 1-based line number of `lines[0]` in the original file.
    pub first_line: usize,
    pub lines: Vec<String>,
}

impl TextBlock {
    /// 1-based line number of the last line, or `first_line - 1` when empty.
    pub fn last_line(&self) -> usize {
        self.first_line + self.lines.len() - 1
    }
}

/// One piece of a conflicted file.
#[derive(Debug, Clone)]
pub enum Segment {
    Text(TextBlock),
    Hunk(Hunk),
}

/// A parsed conflicted file: the unit the resolution engine works on.
#[derive(Debug, Clone)]
pub struct FileConflictSet {
    path: PathBuf,
    segments: Vec<Segment>,
}

impl FileConflictSet {
    /// Assemble a set from already-scanned segments.
    pub fn new(path: impl Into<PathBuf>, segments: Vec<Segment>) -> Self {
        Self {
            path: path.into(),
            segments,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Hunks in ascending line order.
    pub fn hunks(&self) -> impl Iterator<Item = &Hunk> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Hunk(h) => Some(h),
            Segment::Text(_) => None,
        })
    }

    pub fn hunk_count(&self) -> usize {
        self.hunks().count()
    }

    pub fn hunk(&self, index: usize) -> Result<&Hunk, ConflictError> {
        self.hunks()
            .find(|h| h.index == index)
            .ok_or(ConflictError::HunkNotFound(index))
    }

    fn hunk_mut(&mut self, index: usize) -> Result<&mut Hunk, ConflictError> {
        self.segments
            .iter_mut()
            .find_map(|s| match s {
                Segment::Hunk(h) if h.index == index => Some(h),
                _ => None,
            })
            .ok_or(ConflictError::HunkNotFound(index))
    }

    /// Position of the given hunk within `segments`.
    pub(crate) fn segment_position(&self, index: usize) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| matches!(s, Segment::Hunk(h) if h.index == index))
    }

    /// Indices of hunks still awaiting a decision, in line order.
    pub fn unresolved_indices(&self) -> Vec<usize> {
        self.hunks()
            .filter(|h| !h.is_resolved())
            .map(|h| h.index)
            .collect()
    }

    /// First unresolved hunk by ascending start line.
    pub fn next_unresolved(&self) -> Option<usize> {
        self.hunks().find(|h| !h.is_resolved()).map(|h| h.index)
    }

    /// True iff no hunk is still unresolved. Skipped hunks count as decided.
    pub fn is_fully_resolved(&self) -> bool {
        self.hunks().all(Hunk::is_resolved)
    }

    /// True iff fully resolved and no hunk was skipped, i.e. the serialized
    /// file contains no conflict blocks and may be staged.
    pub fn is_clean(&self) -> bool {
        self.hunks()
            .all(|h| h.is_resolved() && h.resolution() != &Resolution::Skipped)
    }

    pub fn skipped_count(&self) -> usize {
        self.hunks()
            .filter(|h| h.resolution() == &Resolution::Skipped)
            .count()
    }

    /// Apply a decision to one hunk.
    pub fn resolve(&mut self, index: usize, resolution: Resolution) -> Result<(), ConflictError> {
        debug!(path = %self.path.display(), index, %resolution, "resolving hunk");
        self.hunk_mut(index)?.resolve(resolution)
    }

    /// Apply the same decision to every unresolved hunk. Returns how many
    /// hunks changed.
    pub fn resolve_remaining(&mut self, resolution: Resolution) -> Result<usize, ConflictError> {
        let pending = self.unresolved_indices();
        for index in &pending {
            self.resolve(*index, resolution.clone())?;
        }
        Ok(pending.len())
    }

    /// Replace the whole file with operator-supplied text.
    ///
    /// The hunk structure no longer describes the content afterwards, so it
    /// collapses into a single plain-text segment and the set reports itself
    /// as fully resolved.
    pub fn rewrite(&mut self, text: &str) {
        debug!(path = %self.path.display(), bytes = text.len(), "rewriting whole file");
        self.segments = vec![Segment::Text(TextBlock {
            first_line: 1,
            lines: split_lines(text),
        })];
    }

    /// Deterministic inverse of scanning: plain text verbatim, resolved hunks
    /// as their replacement, skipped or unresolved hunks as the original block.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(block) => block.lines.iter().for_each(|l| out.push_str(l)),
                Segment::Hunk(hunk) => out.push_str(&hunk.rendered_text()),
            }
        }
        out
    }

    /// The file as it would look with every unresolved hunk taking one side.
    /// Two-way hunks have no base, so they contribute nothing to `Side::Base`.
    pub fn side_text(&self, side: Side) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(block) => block.lines.iter().for_each(|l| out.push_str(l)),
                Segment::Hunk(hunk) if hunk.is_resolved() => out.push_str(&hunk.rendered_text()),
                Segment::Hunk(hunk) => {
                    let lines: &[String] = match side {
                        Side::Ours => &hunk.ours,
                        Side::Theirs => &hunk.theirs,
                        Side::Base => hunk.base.as_deref().unwrap_or(&[]),
                    };
                    lines.iter().for_each(|l| out.push_str(l));
                }
            }
        }
        out
    }
}

/// One side of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Ours,
    Base,
    Theirs,
}

/// Split text into lines, each keeping its terminator.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}
