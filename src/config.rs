/// Configuration management for netconverge
///
/// netconverge stores configuration in ~/.netconverge/config.toml

use crate::line::LineClassifier;
use crate::parser::Parser;
use crate::strategy::{Encoding, MatchStrategy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// netconverge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// How configuration text is split into statements
    #[serde(default)]
    pub parser: ParserConfig,

    /// Default planning behaviour
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Running-configuration snapshots
    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parser built from the `[parser]` section
    pub fn parser(&self) -> Parser {
        let mut classifier = LineClassifier::new(self.parser.indent.unwrap_or(1));
        if let Some(markers) = &self.parser.noop_markers {
            classifier = classifier.with_markers(markers.iter().cloned());
        }
        if let Some(prefixes) = &self.parser.comment_prefixes {
            classifier = classifier.with_comment_prefixes(prefixes.iter().cloned());
        }
        Parser::new(classifier)
    }

    pub fn strategy(&self) -> Result<MatchStrategy> {
        let name = self.planner.r#match.as_deref().unwrap_or("line");
        Ok(name.parse()?)
    }

    pub fn encoding(&self) -> Result<Encoding> {
        let name = self.planner.encoding.as_deref().unwrap_or("hierarchical");
        match name.parse::<Encoding>()? {
            Encoding::Set { .. } => Ok(Encoding::Set {
                action: self.planner.set_action.clone().unwrap_or_else(|| "set".to_string()),
            }),
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Whitespace characters per nesting level
    #[serde(default = "default_indent")]
    pub indent: Option<usize>,

    /// Lines ignored entirely, such as `end` or a closing brace
    #[serde(default = "default_noop_markers")]
    pub noop_markers: Option<Vec<String>>,

    /// Prefixes that mark a line as a comment
    #[serde(default = "default_comment_prefixes")]
    pub comment_prefixes: Option<Vec<String>>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            noop_markers: default_noop_markers(),
            comment_prefixes: default_comment_prefixes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Match strategy: "line", "block", "exact", "force" or "strict"
    #[serde(default = "default_match")]
    pub r#match: Option<String>,

    /// Output encoding: "hierarchical" or "set"
    #[serde(default = "default_encoding")]
    pub encoding: Option<String>,

    /// Keyword used by the set encoding
    #[serde(default = "default_set_action")]
    pub set_action: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            r#match: default_match(),
            encoding: default_encoding(),
            set_action: default_set_action(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Snapshot the running configuration before applying commands
    #[serde(default = "default_backup_enabled")]
    pub enabled: Option<bool>,

    /// Snapshots kept before the oldest are removed
    #[serde(default = "default_max_backups")]
    pub max_backups: Option<usize>,

    /// Custom backup directory
    #[serde(default)]
    pub backup_dir: Option<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: default_backup_enabled(),
            max_backups: default_max_backups(),
            backup_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a debug log file
    #[serde(default)]
    pub debug: Option<bool>,
    /// Log file used instead of the default locations
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default functions for serde
fn default_indent() -> Option<usize> { Some(1) }
fn default_noop_markers() -> Option<Vec<String>> { Some(vec!["end".to_string()]) }
fn default_comment_prefixes() -> Option<Vec<String>> { Some(vec!["!".to_string()]) }
fn default_match() -> Option<String> { Some("line".to_string()) }
fn default_encoding() -> Option<String> { Some("hierarchical".to_string()) }
fn default_set_action() -> Option<String> { Some("set".to_string()) }
fn default_backup_enabled() -> Option<bool> { Some(false) }
fn default_max_backups() -> Option<usize> { Some(crate::backup_manager::DEFAULT_MAX_BACKUPS) }

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;

    let config_dir = home_dir.join(".netconverge");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    Ok(config_dir.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# netconverge Configuration File
#
# Values set here can be overridden by command-line flags.
#
# For more information, run: netconverge config --help

[parser]
# Whitespace characters per nesting level (default: 1)
# IOS-style configurations indent by one space; brace-structured ones often by four.
indent = 1

# Lines that carry no configuration and are skipped (default: ["end"])
# Add "}" for brace-structured configurations.
noop_markers = ["end"]

# Lines starting with one of these are comments and are skipped (default: ["!"])
comment_prefixes = ["!"]

[planner]
# Match strategy (default: "line")
# line   - submit only statements missing from the running configuration
# block  - resubmit the whole scope when anything is missing
# exact  - like block, but also when the order or extra statements differ
# strict - compare the top-level sequence position by position
# force  - always submit everything, without reading the running configuration
match = "line"

# Output encoding: "hierarchical" (default) or "set"
# "set" flattens each leaf into one "<action> <path...> <leaf>" line.
encoding = "hierarchical"

# Keyword used by the set encoding (default: "set")
set_action = "set"

[backup]
# Snapshot the running configuration before applying commands (default: false)
enabled = false

# Snapshots kept before the oldest are removed (default: 50)
max_backups = 50

# Custom backup directory (optional)
# Uncomment to use a custom location instead of ~/.netconverge/backups/
#backup_dir = "/srv/netconverge/backups"

[logging]
# Write a debug log to /var/log/netconverge.log or ~/.netconverge/netconverge.log
debug = false

# Custom log file (optional)
#file = "/srv/netconverge/netconverge.log"
"#
}

/// Save the default commented configuration file
pub fn save_default_config() -> Result<()> {
    let config_path = config_file_path()?;

    fs::write(&config_path, get_default_config_content())
        .with_context(|| format!("Failed to write default config file: {}", config_path.display()))?;

    Ok(())
}

/// Load configuration from file, creating default if needed
///
/// If the config file doesn't exist, creates it with defaults and returns them.
/// If the config file is malformed, recreates it with defaults.
pub fn load_config() -> Result<Config> {
    let config_path = config_file_path()?;

    if !config_path.exists() {
        save_default_config()?;
    }

    let config_str = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config: Config = match toml::from_str(&config_str) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %config_path.display(), error = %e, "malformed config file, restoring defaults");
            save_default_config()?;
            return Ok(Config::default());
        }
    };

    Ok(config)
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(indent) = config.parser.indent {
        if indent == 0 {
            anyhow::bail!("Invalid indent: 0 (must be at least 1)");
        }
    }

    config.strategy().context("Invalid [planner] match")?;
    config.encoding().context("Invalid [planner] encoding")?;

    if let Some(action) = &config.planner.set_action {
        if action.trim().is_empty() || action.contains(char::is_whitespace) {
            anyhow::bail!("Invalid set_action: '{}' (must be a single word)", action);
        }
    }

    if let Some(max_backups) = config.backup.max_backups {
        if max_backups == 0 {
            anyhow::bail!("Invalid max_backups: 0 (must be at least 1)");
        }
    }

    Ok(())
}
