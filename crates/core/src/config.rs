//! TOML-based configuration for simplemerge.
//!
//! The editor command may be overridden by an environment variable named in
//! `resolver.editor_env` (default `EDITOR`). Environment lookup happens only
//! here; the resolution engine receives an explicit [`ResolverConfig`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::scanner::ScannerOptions;
use crate::conflict::view::{ViewMode, MAX_CONTEXT_LINES, MIN_CONTEXT_LINES};
use crate::errors::ConfigError;

/// Commented default written by `simplemerge init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# simplemerge configuration

[resolver]
# Editor used for manual edits; overridden by the variable named in editor_env.
editor = "nano"
editor_env = "EDITOR"

# External three-way tool. $LOCAL, $BASE, $REMOTE and $MERGED are replaced
# with scratch files; the result is read back from $MERGED.
diff_tool = "vimdiff $LOCAL $BASE $REMOTE $MERGED"

# Context lines shown around a hunk (3..=10).
context_lines = 3

# Initial view: "file" or "hunk".
view = "file"

# Reject conflict blocks without a diff3 base section.
require_base = false

[logging]
level = "warn"
# file = "/tmp/simplemerge.log"
"#;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resolver: ResolverSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// The `[resolver]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSection {
    #[serde(default = "default_editor")]
    pub editor: String,

    /// Environment variable whose value replaces `editor` when set.
    #[serde(default = "default_editor_env")]
    pub editor_env: Option<String>,

    #[serde(default = "default_diff_tool")]
    pub diff_tool: String,

    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    #[serde(default)]
    pub view: ViewMode,

    #[serde(default)]
    pub require_base: bool,

    /// Editor command after environment resolution (not serialized).
    #[serde(skip)]
    pub resolved_editor: Option<String>,
}

fn default_editor() -> String {
    "nano".into()
}
fn default_editor_env() -> Option<String> {
    Some("EDITOR".into())
}
fn default_diff_tool() -> String {
    "vimdiff $LOCAL $BASE $REMOTE $MERGED".into()
}
fn default_context_lines() -> usize {
    MIN_CONTEXT_LINES
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            editor: default_editor(),
            editor_env: default_editor_env(),
            diff_tool: default_diff_tool(),
            context_lines: default_context_lines(),
            view: ViewMode::default(),
            require_base: false,
            resolved_editor: None,
        }
    }
}

impl ResolverSection {
    /// The editor command to launch: the resolved env value, else `editor`.
    pub fn editor_command(&self) -> &str {
        self.resolved_editor.as_deref().unwrap_or(&self.editor)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// The `[logging]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine-facing config
// ---------------------------------------------------------------------------

/// Explicit settings handed to the resolution engine and its delegates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub editor_command: String,
    pub diff_tool_command: String,
    /// Initial context lines, within `[3, 10]`.
    pub default_context_lines: usize,
    pub default_view: ViewMode,
    pub scanner: ScannerOptions,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            editor_command: default_editor(),
            diff_tool_command: default_diff_tool(),
            default_context_lines: MIN_CONTEXT_LINES,
            default_view: ViewMode::default(),
            scanner: ScannerOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// `~/.config/simplemerge/config.toml`, when a config dir is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("simplemerge").join("config.toml"))
    }

    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path` if given (it must exist), else from the default path
    /// if present, else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(path),
                _ => {
                    debug!("no configuration file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Resolve the editor override from the environment. An unset or empty
    /// variable keeps the configured `editor`.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        self.resolver.resolved_editor = self
            .resolver
            .editor_env
            .as_deref()
            .and_then(|env_name| resolve_optional_env(env_name, "resolver.editor_env"));
        Ok(())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ctx = self.resolver.context_lines;
        if !(MIN_CONTEXT_LINES..=MAX_CONTEXT_LINES).contains(&ctx) {
            return Err(ConfigError::InvalidValue {
                field: "resolver.context_lines".into(),
                detail: format!(
                    "must be between {MIN_CONTEXT_LINES} and {MAX_CONTEXT_LINES}, got {ctx}"
                ),
            });
        }
        if self.resolver.editor_command().trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "resolver.editor".into(),
                detail: "editor command must not be empty".into(),
            });
        }
        if self.resolver.diff_tool.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "resolver.diff_tool".into(),
                detail: "diff tool command must not be empty".into(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: "log level must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the explicit engine configuration.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            editor_command: self.resolver.editor_command().to_string(),
            diff_tool_command: self.resolver.diff_tool.clone(),
            default_context_lines: self.resolver.context_lines,
            default_view: self.resolver.view,
            scanner: ScannerOptions {
                require_base: self.resolver.require_base,
            },
        }
    }

    /// Write [`DEFAULT_CONFIG_TOML`] to `path`, creating parent directories.
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TOML)?;
        info!(path = %path.display(), "wrote default configuration");
        Ok(())
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; returns `None` if the variable is unset or empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            debug!(field, env_name, "env var not set");
            None
        }
    }
}
