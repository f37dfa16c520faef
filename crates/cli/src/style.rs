//! Shared styling utilities for the CLI.

use console::Style;

use simplemerge_core::conflict::{LineKind, MarkerKind};

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Style for one kind of view line: ours red, theirs green, separator
/// yellow, everything outside the conflict plain.
pub fn for_line(kind: LineKind) -> Style {
    match kind {
        LineKind::Context | LineKind::Text => Style::new(),
        LineKind::Ours => Style::new().red(),
        LineKind::Theirs => Style::new().green(),
        LineKind::Base => Style::new().cyan(),
        LineKind::Resolved => Style::new().blue(),
        LineKind::Marker(MarkerKind::Separator) => Style::new().yellow().bold(),
        LineKind::Marker(MarkerKind::Base) => Style::new().cyan().bold(),
        LineKind::Marker(MarkerKind::Start) => Style::new().red().bold(),
        LineKind::Marker(MarkerKind::End) => Style::new().green().bold(),
    }
}
