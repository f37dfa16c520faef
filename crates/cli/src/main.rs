//! simplemerge command-line tool.
//!
//! Walks the operator through every conflicted file in a repository (or the
//! files given on the command line), one hunk or one file at a time, writes
//! the result back and stages files that no longer contain conflicts. Also
//! runs as a `git mergetool` backend.

mod prompt;
mod render;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use simplemerge_core::config::AppConfig;
use simplemerge_core::delegate::{CommandDiffTool, CommandEditor};
use simplemerge_core::errors::ConflictError;
use simplemerge_core::git::GitClient;
use simplemerge_core::session::{self, FileReport, FileStatus, Session, SessionSummary};

use prompt::TerminalInput;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Interactive resolver for files left conflicted by a failed merge.
#[derive(Parser, Debug)]
#[command(
    name = "simplemerge",
    version,
    about = "Resolve merge conflicts hunk by hunk or file by file"
)]
struct Cli {
    /// Path to the TOML configuration file
    /// [default: ~/.config/simplemerge/config.toml].
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `simplemerge_core=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory inside the repository to operate on.
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Defaults to `resolve`.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve conflicted files interactively.
    Resolve {
        /// Files to resolve; defaults to every conflicted file in the index.
        files: Vec<PathBuf>,

        /// Run as a git mergetool: resolve $MERGED and leave staging to git.
        #[arg(long, conflicts_with = "files")]
        mergetool: bool,
    },

    /// List conflicted files and their hunk counts without changing them.
    List,

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Resolve {
        files: Vec::new(),
        mergetool: false,
    });

    match command {
        // Init must work even when the existing config does not parse.
        Commands::Init { output } => {
            let _guard = init_logging(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd_init(output)
        }
        Commands::Resolve {
            mergetool: true, ..
        } => {
            let (config, _guard) = setup(cli.config.as_deref(), cli.log_level)?;
            cmd_mergetool(&config)
        }
        Commands::Resolve { files, .. } => {
            let (config, _guard) = setup(cli.config.as_deref(), cli.log_level)?;
            cmd_resolve(&config, &cli.repo, files)
        }
        Commands::List => {
            let (config, _guard) = setup(cli.config.as_deref(), cli.log_level)?;
            cmd_list(&config, &cli.repo)
        }
        Commands::Validate => {
            let (config, _guard) = setup(cli.config.as_deref(), cli.log_level)?;
            cmd_validate(&config)
        }
    }
}

// ---------------------------------------------------------------------------
// Logging & config helpers
// ---------------------------------------------------------------------------

/// Install the tracing subscriber. Logs go to stderr unless `file` is set,
/// in which case a non-blocking file writer is used and its guard returned.
fn init_logging(level: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{}'", level))?;

    let Some(path) = file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir).context("failed to create log directory")?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Load the config, then install logging at `--log-level`, `RUST_LOG` or
/// the configured level, in that order.
fn setup(
    config_path: Option<&Path>,
    log_level: Option<String>,
) -> Result<(AppConfig, Option<WorkerGuard>)> {
    let config = load_config(config_path)?;
    let level = match log_level {
        Some(level) => level,
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
    };
    let guard = init_logging(&level, config.logging.file.as_deref())?;
    debug!(?config, "configuration loaded");
    Ok((config, guard))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_or_default(path).context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("configuration validation failed")?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn print_report(report: &FileReport) {
    let path = render::display_path(&report.path);
    let line = match &report.status {
        FileStatus::NoConflicts => style::dim(&format!("{}: no conflicts", path)),
        FileStatus::Resolved { staged: true } => {
            style::success(&format!("{}: resolved and staged", path))
        }
        FileStatus::Resolved { staged: false } => style::success(&format!("{}: resolved", path)),
        FileStatus::Incomplete {
            unresolved,
            skipped,
        } => style::warn(&format!(
            "{}: {} unresolved and {} skipped hunk(s) remain",
            path, unresolved, skipped
        )),
        FileStatus::Malformed(detail) => {
            style::error(&format!("{}: skipped, {}", path, detail))
        }
        FileStatus::Failed(detail) => style::error(&format!("{}: {}", path, detail)),
    };
    println!("{}", line);
}

fn finish(summary: &SessionSummary) -> ExitCode {
    println!();
    if summary.reports.len() > 1 {
        println!("{}", render::summary_table(&summary.reports));
        println!();
    }
    if summary.quit {
        println!("{}", style::warn("Quit with conflicts remaining."));
    } else {
        println!("{}", style::success("All conflicts processed."));
    }

    if summary.all_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Resolve `files`, or every conflicted file in the repository when empty.
fn cmd_resolve(config: &AppConfig, repo: &Path, files: Vec<PathBuf>) -> Result<ExitCode> {
    let git = if files.is_empty() {
        Some(GitClient::discover(repo).context("failed to open git repository")?)
    } else {
        match GitClient::discover(repo) {
            Ok(git) => Some(git),
            Err(e) => {
                warn!(error = %e, "not in a git repository, resolved files will not be staged");
                None
            }
        }
    };

    let files = match (&git, files.is_empty()) {
        (Some(git), true) => git
            .conflicted_files()
            .context("failed to list conflicted files")?,
        _ => files,
    };
    if files.is_empty() {
        println!("{}", style::success("No conflicted files found. Exiting."));
        return Ok(ExitCode::SUCCESS);
    }

    let resolver = config.resolver_config();
    let editor = CommandEditor::new(resolver.editor_command.as_str());
    let diff_tool = CommandDiffTool::new(resolver.diff_tool_command.as_str());
    let mut session = Session::new(&resolver, &editor, &diff_tool);
    if let Some(git) = &git {
        session = session.with_stager(git);
    }

    println!(
        "{}",
        style::header(&format!("{} conflicted file(s)", files.len()))
    );
    let summary = session
        .run(&files, &mut TerminalInput::new(), print_report)
        .context("resolution session aborted")?;
    Ok(finish(&summary))
}

/// `git mergetool` backend: resolve `$MERGED` in place without staging.
fn cmd_mergetool(config: &AppConfig) -> Result<ExitCode> {
    let merged = std::env::var_os("MERGED")
        .map(PathBuf::from)
        .context("--mergetool requires the MERGED environment variable")?;
    for name in ["LOCAL", "BASE", "REMOTE"] {
        debug!(name, value = ?std::env::var_os(name), "mergetool input");
    }

    let resolver = config.resolver_config();
    let editor = CommandEditor::new(resolver.editor_command.as_str());
    let diff_tool = CommandDiffTool::new(resolver.diff_tool_command.as_str());
    let session = Session::new(&resolver, &editor, &diff_tool);

    let summary = session
        .run(&[merged], &mut TerminalInput::new(), print_report)
        .context("resolution session aborted")?;
    Ok(finish(&summary))
}

fn cmd_list(config: &AppConfig, repo: &Path) -> Result<ExitCode> {
    let git = GitClient::discover(repo).context("failed to open git repository")?;
    let files = git
        .conflicted_files()
        .context("failed to list conflicted files")?;

    if files.is_empty() {
        println!();
        println!("{}", style::success("No conflicted files found"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let options = config.resolver_config().scanner;
    let reports: Vec<FileReport> = files
        .iter()
        .map(|path| {
            let (hunks, status) = match session::load_file(path, &options) {
                Ok(set) if set.hunk_count() == 0 => (0, FileStatus::NoConflicts),
                Ok(set) => (
                    set.hunk_count(),
                    FileStatus::Incomplete {
                        unresolved: set.unresolved_indices().len(),
                        skipped: 0,
                    },
                ),
                Err(e @ ConflictError::MalformedConflict { .. }) => {
                    (0, FileStatus::Malformed(e.to_string()))
                }
                Err(e) => (0, FileStatus::Failed(e.to_string())),
            };
            FileReport {
                path: path.clone(),
                hunks,
                status,
                quit: false,
            }
        })
        .collect();

    println!();
    println!(
        "{}",
        style::header(&format!("Conflicted Files ({})", reports.len()))
    );
    println!();
    println!("{}", render::summary_table(&reports));
    println!();
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: Option<PathBuf>) -> Result<ExitCode> {
    let output = match output {
        Some(path) => path,
        None => AppConfig::default_path().context("could not determine a config directory")?,
    };

    if output.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", output.display()))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;

        if !overwrite {
            println!(
                "{}",
                style::warn("Init cancelled. Existing file was not modified.")
            );
            return Ok(ExitCode::SUCCESS);
        }
    }

    AppConfig::write_default(&output).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set your editor and diff tool in the [resolver] section");
    println!(
        "  2. Validate with: simplemerge validate --config {}",
        output.display()
    );
    println!("  3. Run `simplemerge` inside a repository with merge conflicts");

    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(config: &AppConfig) -> Result<ExitCode> {
    // load_config has already validated; show what will be used.
    let resolver = config.resolver_config();
    println!("{}", style::success("Configuration is valid"));
    println!();
    println!("  editor:        {}", resolver.editor_command);
    println!("  diff tool:     {}", resolver.diff_tool_command);
    println!("  context lines: {}", resolver.default_context_lines);
    println!("  view:          {}", resolver.default_view);
    println!("  require base:  {}", resolver.scanner.require_base);
    println!("  log level:     {}", config.logging.level);
    if let Some(file) = &config.logging.file {
        println!("  log file:      {}", file.display());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_resolve() {
        let cli = Cli::parse_from(["simplemerge"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.repo, PathBuf::from("."));
    }

    #[test]
    fn test_resolve_args() {
        let cli = Cli::parse_from(["simplemerge", "resolve", "a.txt", "b.txt", "--log-level", "debug"]);
        match cli.command {
            Some(Commands::Resolve { files, mergetool }) => {
                assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
                assert!(!mergetool);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_init_output_is_optional() {
        let cli = Cli::parse_from(["simplemerge", "init", "-o", "cfg.toml"]);
        match cli.command {
            Some(Commands::Init { output }) => {
                assert_eq!(output, Some(PathBuf::from("cfg.toml")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        let cli = Cli::parse_from(["simplemerge", "init"]);
        assert!(matches!(cli.command, Some(Commands::Init { output: None })));
    }

    #[test]
    fn test_mergetool_conflicts_with_files() {
        assert!(Cli::try_parse_from(["simplemerge", "resolve", "--mergetool"]).is_ok());
        assert!(Cli::try_parse_from(["simplemerge", "resolve", "--mergetool", "a.txt"]).is_err());
    }
}
