//! Conflict marker scanner.
//!
//! Splits raw file content into plain-text runs and marker blocks with a
//! single-pass state machine:
//!
//! ```text
//! Outside --<<<<<<<--> InOurs --|||||||--> InBase --=======--> InTheirs --> >>>>>>> --> Outside
//!                        \_____________=======_______________/
//! ```
//!
//! Nested or unterminated blocks are rejected outright; no partial
//! [`FileConflictSet`] is ever produced.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::file_set::{FileConflictSet, Segment, TextBlock};
use super::hunk::{ConflictMarker, Hunk, MarkerKind};
use crate::errors::ConflictError;

/// Scanner behaviour switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerOptions {
    /// Accept only diff3-style blocks; a block without a `|||||||` base
    /// section is malformed.
    #[serde(default)]
    pub require_base: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InOurs,
    InBase,
    InTheirs,
}

/// Accumulator for the block currently being scanned.
#[derive(Debug, Default)]
struct OpenBlock {
    start: Option<ConflictMarker>,
    base_marker: Option<ConflictMarker>,
    separator: Option<ConflictMarker>,
    ours: Vec<String>,
    base: Vec<String>,
    theirs: Vec<String>,
}

/// Scan `content` into a [`FileConflictSet`] for `path`.
pub fn scan(
    path: impl Into<PathBuf>,
    content: &str,
    options: &ScannerOptions,
) -> Result<FileConflictSet, ConflictError> {
    let path = path.into();
    let mut segments = Vec::new();
    let mut state = ScanState::Outside;
    let mut block = OpenBlock::default();
    let mut text = TextBlock {
        first_line: 1,
        lines: Vec::new(),
    };
    let mut hunk_index = 0usize;
    let mut line_no = 0usize;

    for line in content.split_inclusive('\n') {
        line_no += 1;
        let marker = MarkerKind::classify(line);

        match (state, marker) {
            (ScanState::Outside, Some(MarkerKind::Start)) => {
                if !text.lines.is_empty() {
                    segments.push(Segment::Text(std::mem::replace(
                        &mut text,
                        TextBlock {
                            first_line: line_no,
                            lines: Vec::new(),
                        },
                    )));
                }
                block.start = Some(ConflictMarker::new(MarkerKind::Start, line_no, line));
                state = ScanState::InOurs;
            }
            // Stray separators and end markers outside a block are content.
            (ScanState::Outside, _) => {
                if text.lines.is_empty() {
                    text.first_line = line_no;
                }
                text.lines.push(line.to_string());
            }

            (_, Some(MarkerKind::Start)) => {
                return Err(malformed(line_no, "nested conflict start marker"));
            }

            (ScanState::InOurs, Some(MarkerKind::Base)) => {
                block.base_marker = Some(ConflictMarker::new(MarkerKind::Base, line_no, line));
                state = ScanState::InBase;
            }
            (ScanState::InOurs | ScanState::InBase, Some(MarkerKind::Separator)) => {
                if options.require_base && block.base_marker.is_none() {
                    return Err(malformed(line_no, "missing base section in diff3 conflict"));
                }
                block.separator = Some(ConflictMarker::new(MarkerKind::Separator, line_no, line));
                state = ScanState::InTheirs;
            }
            (ScanState::InOurs | ScanState::InBase, Some(MarkerKind::End)) => {
                return Err(malformed(line_no, "end marker before separator"));
            }
            (ScanState::InBase | ScanState::InTheirs, Some(MarkerKind::Base)) => {
                return Err(malformed(line_no, "unexpected base marker"));
            }
            (ScanState::InTheirs, Some(MarkerKind::Separator)) => {
                return Err(malformed(line_no, "duplicate separator"));
            }

            (ScanState::InTheirs, Some(MarkerKind::End)) => {
                let end = ConflictMarker::new(MarkerKind::End, line_no, line);
                let hunk = close_block(std::mem::take(&mut block), end, hunk_index)
                    .ok_or_else(|| malformed(line_no, "incomplete conflict block"))?;
                debug!(
                    index = hunk_index,
                    start_line = hunk.start_line(),
                    end_line = hunk.end_line(),
                    "scanned conflict hunk"
                );
                segments.push(Segment::Hunk(hunk));
                hunk_index += 1;
                text.first_line = line_no + 1;
                state = ScanState::Outside;
            }

            (ScanState::InOurs, None) => block.ours.push(line.to_string()),
            (ScanState::InBase, None) => block.base.push(line.to_string()),
            (ScanState::InTheirs, None) => block.theirs.push(line.to_string()),
        }
    }

    if state != ScanState::Outside {
        let opened = block.start.as_ref().map(|m| m.line).unwrap_or(line_no);
        warn!(path = %path.display(), opened, "conflict block not closed before end of file");
        return Err(malformed(opened, "conflict start marker without matching end"));
    }

    if !text.lines.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(text));
    }

    debug!(path = %path.display(), hunks = hunk_index, lines = line_no, "scan complete");
    Ok(FileConflictSet::new(path, segments))
}

fn close_block(block: OpenBlock, end: ConflictMarker, index: usize) -> Option<Hunk> {
    let OpenBlock {
        start,
        base_marker,
        separator,
        ours,
        base,
        theirs,
    } = block;
    let base = base_marker.as_ref().map(|_| base);
    Some(Hunk::new(
        index,
        start?,
        base_marker,
        separator?,
        end,
        ours,
        base,
        theirs,
    ))
}

fn malformed(line: usize, detail: &str) -> ConflictError {
    ConflictError::MalformedConflict {
        line,
        detail: detail.to_string(),
    }
}
