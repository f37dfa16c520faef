//! A single conflict block and its resolution state.
//!
//! Lines are stored exactly as they appear in the file, including their
//! line terminators, so that a hunk can always be re-emitted byte-for-byte.

use serde::{Deserialize, Serialize};

use crate::errors::ConflictError;

/// Length of every marker token (`<<<<<<<`, `|||||||`, `=======`, `>>>>>>>`).
pub const MARKER_LEN: usize = 7;

/// The four delimiter kinds recognised inside a conflict block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// `<<<<<<<` opens a block; ours follows.
    Start,
    /// `|||||||` opens the diff3 base section.
    Base,
    /// `=======` opens the theirs section.
    Separator,
    /// `>>>>>>>` closes a block.
    End,
}

impl MarkerKind {
    /// The character repeated [`MARKER_LEN`] times to form this token.
    pub fn token_char(self) -> char {
        match self {
            Self::Start => '<',
            Self::Base => '|',
            Self::Separator => '=',
            Self::End => '>',
        }
    }

    /// Classify a raw line as a marker, if it is one.
    ///
    /// Tokens are column-0 anchored and exactly seven characters long. The
    /// separator must stand alone on its line; the others may carry a label
    /// after a single space.
    pub fn classify(line: &str) -> Option<Self> {
        let body = strip_terminator(line);
        let kind = match body.chars().next()? {
            '<' => Self::Start,
            '|' => Self::Base,
            '=' => Self::Separator,
            '>' => Self::End,
            _ => return None,
        };
        let token = body.get(..MARKER_LEN)?;
        if token.chars().any(|c| c != kind.token_char()) {
            return None;
        }
        let rest = &body[MARKER_LEN..];
        let well_formed = match kind {
            Self::Separator => rest.is_empty(),
            _ => rest.is_empty() || rest.starts_with(' '),
        };
        well_formed.then_some(kind)
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Base => write!(f, "base"),
            Self::Separator => write!(f, "separator"),
            Self::End => write!(f, "end"),
        }
    }
}

/// One delimiter line as scanned from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictMarker {
    pub kind: MarkerKind,
    /// Text after the token, e.g. `HEAD` or `feature/x`. Empty if absent.
    pub label: String,
    /// 1-based line number in the original file.
    pub line: usize,
    /// The full original line including its terminator.
    pub raw: String,
}

impl ConflictMarker {
    /// Build a marker from a line already classified as `kind`.
    pub fn new(kind: MarkerKind, line: usize, raw: &str) -> Self {
        let label = strip_terminator(raw)[MARKER_LEN..].trim().to_string();
        Self {
            kind,
            label,
            line,
            raw: raw.to_string(),
        }
    }

    /// Whether the raw line ends with a line terminator.
    pub fn is_terminated(&self) -> bool {
        self.raw.ends_with('\n')
    }
}

/// Terminal decision applied to a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    KeptOurs,
    KeptTheirs,
    /// Replacement text produced by the editor or the external diff tool.
    Edited(String),
    /// Left conflicted on purpose; the marker block is written back verbatim.
    Skipped,
}

impl Resolution {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved => write!(f, "unresolved"),
            Self::KeptOurs => write!(f, "kept ours"),
            Self::KeptTheirs => write!(f, "kept theirs"),
            Self::Edited(_) => write!(f, "edited"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One conflicted region between a start and an end marker.
#[derive(Debug, Clone)]
pub struct Hunk {
    /// Position of this hunk among the file's hunks (0-based).
    pub index: usize,
    pub start: ConflictMarker,
    pub base_marker: Option<ConflictMarker>,
    pub separator: ConflictMarker,
    pub end: ConflictMarker,
    pub ours: Vec<String>,
    /// Present only for diff3-style blocks.
    pub base: Option<Vec<String>>,
    pub theirs: Vec<String>,
    resolution: Resolution,
}

impl Hunk {
    /// Assemble a freshly scanned, unresolved hunk.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        start: ConflictMarker,
        base_marker: Option<ConflictMarker>,
        separator: ConflictMarker,
        end: ConflictMarker,
        ours: Vec<String>,
        base: Option<Vec<String>>,
        theirs: Vec<String>,
    ) -> Self {
        Self {
            index,
            start,
            base_marker,
            separator,
            end,
            ours,
            base,
            theirs,
            resolution: Resolution::Unresolved,
        }
    }

    /// 1-based line of the start marker.
    pub fn start_line(&self) -> usize {
        self.start.line
    }

    /// 1-based line of the end marker.
    pub fn end_line(&self) -> usize {
        self.end.line
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn is_resolved(&self) -> bool {
        !self.resolution.is_unresolved()
    }

    /// Move this hunk out of the unresolved state.
    ///
    /// Resolution is monotonic: a hunk that already carries a decision
    /// cannot be re-decided, and nothing can set it back to unresolved.
    pub fn resolve(&mut self, resolution: Resolution) -> Result<(), ConflictError> {
        if resolution.is_unresolved() {
            return Err(ConflictError::InvalidResolution {
                index: self.index,
                detail: "cannot return a hunk to the unresolved state".into(),
            });
        }
        if self.is_resolved() {
            return Err(ConflictError::AlreadyResolved(self.index));
        }
        self.resolution = resolution;
        Ok(())
    }

    /// The original marker block, byte-identical to the scanned input.
    pub fn block_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.start.raw);
        self.ours.iter().for_each(|l| out.push_str(l));
        if let (Some(marker), Some(base)) = (&self.base_marker, &self.base) {
            out.push_str(&marker.raw);
            base.iter().for_each(|l| out.push_str(l));
        }
        out.push_str(&self.separator.raw);
        self.theirs.iter().for_each(|l| out.push_str(l));
        out.push_str(&self.end.raw);
        out
    }

    /// Text that replaces the block once resolved, or `None` while the block
    /// must stay on disk (unresolved or skipped).
    pub fn replacement_text(&self) -> Option<String> {
        let text = match &self.resolution {
            Resolution::KeptOurs => self.ours.concat(),
            Resolution::KeptTheirs => self.theirs.concat(),
            Resolution::Edited(text) => text.clone(),
            Resolution::Unresolved | Resolution::Skipped => return None,
        };
        // The block ended the file without a newline; don't invent one.
        if !self.end.is_terminated() {
            return Some(strip_terminator(&text).to_string());
        }
        Some(text)
    }

    /// What this hunk currently contributes to the serialized file.
    pub fn rendered_text(&self) -> String {
        self.replacement_text()
            .unwrap_or_else(|| self.block_text())
    }
}

/// Drop one trailing `\n` or `\r\n`, if present.
pub fn strip_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hunk(end_raw: &str) -> Hunk {
        Hunk::new(
            0,
            ConflictMarker::new(MarkerKind::Start, 2, "<<<<<<< HEAD\n"),
            None,
            ConflictMarker::new(MarkerKind::Separator, 4, "=======\n"),
            ConflictMarker::new(MarkerKind::End, 6, end_raw),
            vec!["ours\n".into()],
            None,
            vec!["theirs\n".into()],
        )
    }

    #[test]
    fn test_classify_markers() {
        assert_eq!(MarkerKind::classify("<<<<<<< HEAD\n"), Some(MarkerKind::Start));
        assert_eq!(MarkerKind::classify("<<<<<<<\n"), Some(MarkerKind::Start));
        assert_eq!(MarkerKind::classify("||||||| base\r\n"), Some(MarkerKind::Base));
        assert_eq!(MarkerKind::classify("=======\n"), Some(MarkerKind::Separator));
        assert_eq!(MarkerKind::classify(">>>>>>> feature/x"), Some(MarkerKind::End));
    }

    #[test]
    fn test_classify_rejects_lookalikes() {
        assert_eq!(MarkerKind::classify("<<<<<<<< eight\n"), None);
        assert_eq!(MarkerKind::classify("======= trailing\n"), None);
        assert_eq!(MarkerKind::classify("========\n"), None);
        assert_eq!(MarkerKind::classify(" <<<<<<< indented\n"), None);
        assert_eq!(MarkerKind::classify("<<<<<<"), None);
        assert_eq!(MarkerKind::classify("plain text\n"), None);
        assert_eq!(MarkerKind::classify(""), None);
    }

    #[test]
    fn test_marker_label() {
        let m = ConflictMarker::new(MarkerKind::End, 9, ">>>>>>> feature/login\r\n");
        assert_eq!(m.label, "feature/login");
        assert!(m.is_terminated());

        let m = ConflictMarker::new(MarkerKind::Separator, 3, "=======");
        assert_eq!(m.label, "");
        assert!(!m.is_terminated());
    }

    #[test]
    fn test_resolution_is_monotonic() {
        let mut hunk = sample_hunk(">>>>>>> branch\n");
        hunk.resolve(Resolution::KeptOurs).unwrap();

        let err = hunk.resolve(Resolution::KeptTheirs).unwrap_err();
        assert!(matches!(err, ConflictError::AlreadyResolved(0)));

        let err = hunk.resolve(Resolution::Unresolved).unwrap_err();
        assert!(matches!(err, ConflictError::InvalidResolution { .. }));
        assert_eq!(hunk.resolution(), &Resolution::KeptOurs);
    }

    #[test]
    fn test_skipped_keeps_block() {
        let mut hunk = sample_hunk(">>>>>>> branch\n");
        hunk.resolve(Resolution::Skipped).unwrap();
        assert_eq!(hunk.replacement_text(), None);
        assert_eq!(
            hunk.rendered_text(),
            "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> branch\n"
        );
    }

    #[test]
    fn test_replacement_without_final_newline() {
        let mut hunk = sample_hunk(">>>>>>> branch");
        hunk.resolve(Resolution::KeptTheirs).unwrap();
        assert_eq!(hunk.replacement_text().as_deref(), Some("theirs"));
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator("a\r\n"), "a");
        assert_eq!(strip_terminator("a\n"), "a");
        assert_eq!(strip_terminator("a"), "a");
    }
}
