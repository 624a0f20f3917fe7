//! Logging for netconverge
//!
//! Two optional sinks share one `tracing` registry: a debug file that records
//! every planning decision (`[logging] debug` or `--debug`), and stderr for
//! `--verbose`. `RUST_LOG` overrides the default filter of both.

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

const VAR_LOG_PATH: &str = "/var/log/netconverge.log";

/// Where and how much to log for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Write the debug file
    pub debug: bool,
    /// Mirror events to stderr at debug level
    pub verbose: bool,
    /// Explicit log file, tried before the default locations
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Settings from the config file, with command-line switches on top
    pub fn resolve(config: &LoggingConfig, debug: bool, verbose: bool) -> Self {
        Self {
            debug: debug || config.debug.unwrap_or(false),
            verbose,
            file: config.file.clone(),
        }
    }

    fn enabled(&self) -> bool {
        self.debug || self.verbose
    }
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose)))
}

fn filter_directive(verbose: bool) -> &'static str {
    if verbose {
        "netconverge=debug"
    } else {
        "netconverge=info"
    }
}

/// Install the subscriber for this run.
///
/// Returns the log file in use, if any. A log file that cannot be opened
/// only prints a warning; reconciliation goes ahead without it.
pub fn init_logging(settings: &LogSettings) -> Result<Option<PathBuf>> {
    if !settings.enabled() {
        return Ok(None);
    }

    let opened = if settings.debug {
        let candidates = log_candidates(settings.file.as_deref(), dirs::home_dir().as_deref());
        let opened = open_first(&candidates);
        if opened.is_none() {
            eprintln!(
                "Warning: Could not open a log file (tried {})",
                candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
            );
        }
        opened
    } else {
        None
    };

    let (log_path, file_layer) = match opened {
        Some((path, file)) => {
            let layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(false)
                .with_filter(filter(settings.verbose));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    let stderr_layer = settings.verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .with_filter(filter(true))
    });

    registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(log_path)
}

/// Log file locations in order of preference
fn log_candidates(explicit: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut candidates = vec![PathBuf::from(VAR_LOG_PATH)];
    if let Some(home) = home {
        candidates.push(home.join(".netconverge").join("netconverge.log"));
    }
    candidates
}

/// First candidate that can be opened for appending
fn open_first(candidates: &[PathBuf]) -> Option<(PathBuf, File)> {
    candidates.iter().find_map(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
            .map(|file| (path.clone(), file))
    })
}

/// The file a debug run would log to, for `netconverge config --log-path`
pub fn get_current_log_path(config: &LoggingConfig) -> PathBuf {
    let candidates = log_candidates(config.file.as_deref(), dirs::home_dir().as_deref());
    open_first(&candidates)
        .map(|(path, _)| path)
        .or_else(|| candidates.last().cloned())
        .unwrap_or_else(|| PathBuf::from("~/.netconverge/netconverge.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_default_order() {
        let candidates = log_candidates(None, Some(Path::new("/home/op")));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from(VAR_LOG_PATH),
                PathBuf::from("/home/op/.netconverge/netconverge.log"),
            ]
        );
        assert_eq!(log_candidates(None, None), vec![PathBuf::from(VAR_LOG_PATH)]);
    }

    #[test]
    fn test_explicit_file_replaces_defaults() {
        let candidates = log_candidates(Some(Path::new("/tmp/nc.log")), Some(Path::new("/home/op")));
        assert_eq!(candidates, vec![PathBuf::from("/tmp/nc.log")]);
    }

    #[test]
    fn test_open_first_skips_unusable_paths() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let unusable = blocker.join("netconverge.log");
        let usable = temp_dir.path().join("logs").join("netconverge.log");
        let (path, _) = open_first(&[unusable, usable.clone()]).unwrap();

        assert_eq!(path, usable);
        assert!(usable.exists());
    }

    #[test]
    fn test_resolve_merges_config_and_flags() {
        let config = LoggingConfig {
            debug: Some(true),
            file: Some(PathBuf::from("/tmp/nc.log")),
        };
        let settings = LogSettings::resolve(&config, false, true);
        assert!(settings.debug);
        assert!(settings.verbose);
        assert_eq!(settings.file, Some(PathBuf::from("/tmp/nc.log")));

        assert!(!LogSettings::resolve(&LoggingConfig::default(), false, false).enabled());
    }

    #[test]
    fn test_disabled_installs_nothing() {
        assert_eq!(init_logging(&LogSettings::default()).unwrap(), None);
    }

    #[test]
    fn test_current_log_path_honours_configured_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("nc.log");
        let config = LoggingConfig {
            debug: None,
            file: Some(file.clone()),
        };
        assert_eq!(get_current_log_path(&config), file);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(false), "netconverge=info");
        assert_eq!(filter_directive(true), "netconverge=debug");
    }
}
