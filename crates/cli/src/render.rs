//! Terminal rendering of conflict views and session summaries.

use std::path::Path;

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use simplemerge_core::conflict::{Prompt, Target, View};
use simplemerge_core::session::{FileReport, FileStatus};

use crate::style;

/// Print the view for a pending decision with a progress header.
pub fn print_prompt(prompt: &Prompt<'_>) {
    let path = display_path(prompt.set.path());
    let scope = match prompt.target {
        Target::Hunk(_) => format!("hunk {}/{}", prompt.position, prompt.total),
        Target::WholeFile => format!("whole file, {} hunk(s)", prompt.total),
    };
    println!();
    println!(
        "{}",
        style::header(&format!(
            "{path}: {scope} ({} unresolved, {} view, {} context lines)",
            prompt.remaining,
            prompt.view_state.mode,
            prompt.view_state.context_lines()
        ))
    );
    println!();
    print_view(&prompt.view);
    println!();
}

/// Print each line with a dim line-number gutter.
pub fn print_view(view: &View) {
    let width = view
        .lines
        .iter()
        .filter_map(|l| l.number)
        .max()
        .map_or(1, |n| n.to_string().len());
    for line in &view.lines {
        let gutter = match line.number {
            Some(n) => format!("{n:>width$}"),
            None => format!("{:>width$}", "+"),
        };
        println!(
            "{} {}",
            style::dim(&format!("{gutter} │")),
            style::for_line(line.kind).apply_to(&line.text)
        );
    }
}

fn status_cell(status: &FileStatus) -> Cell {
    match status {
        FileStatus::NoConflicts => Cell::new("no conflicts").fg(Color::DarkGrey),
        FileStatus::Resolved { staged: true } => Cell::new("resolved, staged").fg(Color::Green),
        FileStatus::Resolved { staged: false } => Cell::new("resolved").fg(Color::Green),
        FileStatus::Incomplete {
            unresolved,
            skipped,
        } => Cell::new(format!("{unresolved} unresolved, {skipped} skipped")).fg(Color::Yellow),
        FileStatus::Malformed(detail) => Cell::new(format!("malformed: {detail}")).fg(Color::Red),
        FileStatus::Failed(detail) => Cell::new(format!("failed: {detail}")).fg(Color::Red),
    }
}

/// Summary table of processed files.
pub fn summary_table(reports: &[FileReport]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Hunks", "Result"]);
    for report in reports {
        table.add_row(vec![
            Cell::new(display_path(&report.path)),
            Cell::new(report.hunks),
            status_cell(&report.status),
        ]);
    }
    table
}

/// `path` relative to the current directory when it lies beneath it.
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
