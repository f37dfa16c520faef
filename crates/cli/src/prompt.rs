//! Interactive decision source: prints the current view and reads the
//! operator's single-key choice from the terminal.

use std::io::Write;

use console::Term;

use simplemerge_core::conflict::{Decision, DecisionSource, EngineEvent, Prompt, Resolution};
use simplemerge_core::errors::DelegateError;

use crate::{render, style};

/// Reads decisions from the terminal.
pub struct TerminalInput {
    term: Term,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TerminalInput {
    fn default() -> Self {
        Self::new()
    }
}

fn menu_items() -> Vec<String> {
    Decision::ALL
        .iter()
        .map(|d| format!("[{}] {}", d.key(), d.label()))
        .collect()
}

fn menu_keys() -> String {
    Decision::ALL
        .iter()
        .map(|d| d.key().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read keys from `next_key` until one names a decision, calling
/// `on_invalid` for every other key.
fn read_decision(
    mut next_key: impl FnMut() -> std::io::Result<char>,
    mut on_invalid: impl FnMut(char),
) -> Result<Decision, DelegateError> {
    loop {
        let key = next_key().map_err(|e| DelegateError::InputFailed(e.to_string()))?;
        match Decision::from_key(key.to_ascii_lowercase()) {
            Some(decision) => return Ok(decision),
            None => on_invalid(key),
        }
    }
}

fn resolution_verb(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::KeptOurs => "Kept 'ours' for",
        Resolution::KeptTheirs => "Kept 'theirs' for",
        Resolution::Edited(_) => "Applied merged text to",
        Resolution::Skipped => "Skipped",
        Resolution::Unresolved => "Left unresolved",
    }
}

impl DecisionSource for TerminalInput {
    fn decide(&mut self, prompt: &Prompt<'_>) -> Result<Decision, DelegateError> {
        render::print_prompt(prompt);
        for item in menu_items() {
            println!("  {}", item);
        }
        let ask = format!("Choose an action [{}]: ", menu_keys());
        print!("{}", ask);
        // A failed flush only delays the prompt text.
        let _ = std::io::stdout().flush();

        let term = &self.term;
        let decision = read_decision(
            || term.read_char(),
            |key| {
                println!();
                println!("{}", style::error(&format!("Invalid option '{}'", key.escape_default())));
                print!("{}", ask);
                let _ = std::io::stdout().flush();
            },
        )?;
        println!("{}", decision.key());
        Ok(decision)
    }

    fn report(&mut self, event: &EngineEvent<'_>) {
        match event {
            EngineEvent::DelegateFailed(err) => {
                println!("{}", style::error(&format!("{err}; the hunk is still unresolved")));
            }
            EngineEvent::ViewChanged(mode) => {
                println!("{}", style::dim(&format!("Switched to {mode} view")));
            }
            EngineEvent::ContextChanged(lines) => {
                println!("{}", style::dim(&format!("Showing {lines} context lines")));
            }
            EngineEvent::Resolved { count, resolution } => {
                println!(
                    "{}",
                    style::success(&format!("{} {count} hunk(s)", resolution_verb(resolution)))
                );
            }
            EngineEvent::Rewritten => {
                println!("{}", style::success("Replaced file content with the merged result"));
            }
        }
    }
}
