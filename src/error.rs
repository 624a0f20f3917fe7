//! Error types for the reconcile pipeline
//!
//! Parse problems are never fatal and live on the tree as [`crate::tree::ParseError`].
//! Everything in this module aborts a reconciliation pass.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Fatal planning failures, raised before the executor is touched
#[derive(Debug, Clone, PartialEq)]
pub enum PlanningError {
    /// Strategy identifier not in the known set
    UnknownStrategy(String),
    /// Output encoding identifier not in the known set
    UnknownEncoding(String),
    /// Desired state identifier other than present/absent
    UnknownState(String),
    /// A `{name}` field with no matching named group in any collected match
    UnresolvedField { field: String, command: String },
    /// Two inputs that cannot be combined in one invocation
    Conflict { first: String, second: String },
    /// Search expression failed to compile
    InvalidPattern { pattern: String, details: String },
    /// `\N` refers to a group the search expression does not have
    UnknownGroup {
        group: usize,
        pattern: String,
        replacement: String,
    },
}

impl fmt::Display for PlanningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanningError::UnknownStrategy(name) => write!(
                f,
                "Unknown match strategy '{}' (expected one of: line, block, exact, force, strict)",
                name
            ),
            PlanningError::UnknownEncoding(name) => write!(
                f,
                "Unknown encoding '{}' (expected 'hierarchical' or 'set')",
                name
            ),
            PlanningError::UnknownState(name) => write!(
                f,
                "Unknown desired state '{}' (expected 'present' or 'absent')",
                name
            ),
            PlanningError::UnresolvedField { field, command } => write!(
                f,
                "Unresolved field '{{{}}}' in command '{}': no search expression captured a group named '{}'",
                field, command, field
            ),
            PlanningError::Conflict { first, second } => {
                write!(f, "'{}' and '{}' are mutually exclusive", first, second)
            }
            PlanningError::InvalidPattern { details, .. } => write!(f, "{}", details),
            PlanningError::UnknownGroup {
                group,
                pattern,
                replacement,
            } => write!(
                f,
                "Replacement '{}' references group \\{} but pattern '{}' has fewer groups",
                replacement, group, pattern
            ),
        }
    }
}

impl std::error::Error for PlanningError {}

/// A command the executor rejected. The batch stops at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    pub index: usize,
    pub command: String,
    pub message: String,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Command {} failed: '{}'\n  {}\n\nCommands before index {} were already applied; the device may be partially converged.",
            self.index, self.command, self.message, self.index
        )
    }
}

impl std::error::Error for ExecutionError {}

/// Failure to obtain running or candidate configuration
#[derive(Debug)]
pub enum SourceError {
    NotFound { path: PathBuf, context: String },
    PermissionDenied { path: PathBuf },
    Io { path: PathBuf, source: io::Error },
    Command { program: String, message: String },
    Malformed { origin: String, message: String },
}

impl SourceError {
    /// Classify an I/O error raised while reading `path`
    pub fn from_io(path: &Path, err: io::Error, context: &str) -> Self {
        if is_not_found(&err) {
            SourceError::NotFound {
                path: path.to_path_buf(),
                context: context.to_string(),
            }
        } else if is_permission_denied(&err) {
            SourceError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            SourceError::Io {
                path: path.to_path_buf(),
                source: err,
            }
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound { path, context } => {
                write!(f, "{}", not_found_message(path, context))
            }
            SourceError::PermissionDenied { path } => {
                write!(f, "{}", permission_message(path, "reading"))
            }
            SourceError::Io { path, source } => {
                write!(f, "Failed to read '{}': {}", path.display(), source)
            }
            SourceError::Command { program, message } => write!(
                f,
                "Configuration source command '{}' failed: {}\n\n\
                 Possible fixes:\n\
                 1. Run the command by hand and check its output\n\
                 2. Use --running FILE to read a saved configuration instead",
                program, message
            ),
            SourceError::Malformed { origin, message } => {
                write!(f, "Malformed configuration in {}: {}", origin, message)
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Any fatal error of a reconciliation pass
#[derive(Debug)]
pub enum ReconcileError {
    Planning(PlanningError),
    Execution(ExecutionError),
    Source(SourceError),
    /// The running configuration could not be snapshotted, so nothing was applied
    Backup(anyhow::Error),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Planning(e) => write!(f, "Planning error: {}", e),
            ReconcileError::Execution(e) => write!(f, "Execution error: {}", e),
            ReconcileError::Source(e) => write!(f, "Source error: {}", e),
            ReconcileError::Backup(e) => write!(f, "Backup error: {:#}", e),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Planning(e) => Some(e),
            ReconcileError::Execution(e) => Some(e),
            ReconcileError::Source(e) => Some(e),
            ReconcileError::Backup(e) => Some(&**e),
        }
    }
}

impl From<PlanningError> for ReconcileError {
    fn from(err: PlanningError) -> Self {
        ReconcileError::Planning(err)
    }
}

impl From<ExecutionError> for ReconcileError {
    fn from(err: ExecutionError) -> Self {
        ReconcileError::Execution(err)
    }
}

impl From<SourceError> for ReconcileError {
    fn from(err: SourceError) -> Self {
        ReconcileError::Source(err)
    }
}

fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

fn permission_message(path: &Path, operation: &str) -> String {
    let parent_dir = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    format!(
        "Permission denied when {} '{}'\n\n\
         Possible fixes:\n\
         1. Check file permissions: ls -l '{}'\n\
         2. Check read access on the directory: ls -ld '{}'\n\
         3. Copy the configuration somewhere readable and pass that path",
        operation,
        path.display(),
        path.display(),
        parent_dir
    )
}

fn not_found_message(path: &Path, context: &str) -> String {
    format!(
        "File not found: '{}'\n\n\
         Context: {}\n\n\
         Possible fixes:\n\
         1. Check the file path is correct\n\
         2. Use an absolute path if the relative path is ambiguous\n\
         3. Save the device configuration first, e.g. 'show running-config > {}'",
        path.display(),
        context,
        path.display()
    )
}
