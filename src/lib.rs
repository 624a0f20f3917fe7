//! netconverge: converge network device configuration
//!
//! Parses candidate and running configuration into ordered statement trees,
//! plans the statements that are missing under a match strategy, and expands
//! them into the ordered commands a device accepts. The binary is at
//! src/main.rs; the library is what the integration and property tests drive.

pub mod assembler;
pub mod backup_manager;
pub mod cli;
pub mod config;
pub mod diff;
pub mod diff_formatter;
pub mod error;
pub mod executor;
pub mod kv;
pub mod line;
pub mod logger;
pub mod options;
pub mod parser;
pub mod planner;
pub mod reconcile;
pub mod regex_error;
pub mod set_lines;
pub mod source;
pub mod strategy;
pub mod substitution;
pub mod tree;

// Re-export commonly used types for convenience
pub use assembler::{assemble, assemble_with, CommandList};
pub use backup_manager::{BackupManager, BackupMetadata};
pub use error::{ExecutionError, PlanningError, ReconcileError, SourceError};
pub use executor::{Executor, ProcessExecutor, RecordingExecutor, ScriptExecutor};
pub use kv::{diff_kv, merge_updates, KvTree, Update};
pub use line::LineClassifier;
pub use options::{plan_options, SystemOptions};
pub use parser::Parser;
pub use planner::{plan, Change, ChangeSet};
pub use reconcile::{Candidate, Outcome, Reconciler, Request};
pub use set_lines::plan_set_lines;
pub use source::{CommandSource, ConfigSource, FileSource, TextSource};
pub use strategy::{DesiredState, Encoding, MatchStrategy};
pub use substitution::{plan_substitution, resolve_named};
pub use tree::{ConfigTree, ParseError, Statement};
