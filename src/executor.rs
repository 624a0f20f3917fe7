//! Command executors
//!
//! The one write a reconciliation pass performs. Executors apply commands in
//! order and stop at the first rejected command.

use crate::error::ExecutionError;
use crate::source::split_command_line;
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

pub trait Executor {
    fn execute(&self, commands: &[String]) -> Result<(), ExecutionError>;
}

/// Keeps every applied command in memory; can be told to reject one
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    applied: RefCell<Vec<String>>,
    fail_at: Option<usize>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the command at `index` (0-based) of each batch
    pub fn failing_at(index: usize) -> Self {
        Self {
            applied: RefCell::new(Vec::new()),
            fail_at: Some(index),
        }
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.borrow().clone()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, commands: &[String]) -> Result<(), ExecutionError> {
        for (index, command) in commands.iter().enumerate() {
            if self.fail_at == Some(index) {
                return Err(ExecutionError {
                    index,
                    command: command.clone(),
                    message: "rejected".to_string(),
                });
            }
            self.applied.borrow_mut().push(command.clone());
        }
        Ok(())
    }
}

/// Writes the command list to a file, replacing it atomically
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    path: PathBuf,
}

impl ScriptExecutor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Executor for ScriptExecutor {
    fn execute(&self, commands: &[String]) -> Result<(), ExecutionError> {
        let failed = |index: usize, message: String| ExecutionError {
            index,
            command: commands.get(index).cloned().unwrap_or_default(),
            message,
        };
        let last = commands.len().saturating_sub(1);

        let parent_dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| failed(0, format!("Failed to create temp file in {}: {}", parent_dir.display(), e)))?;

        write_lines(&mut temp_file, commands)
            .map_err(|(index, e)| failed(index, format!("Failed to write {}: {}", self.path.display(), e)))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| failed(last, format!("Failed to persist temp file to {}: {}", self.path.display(), e)))?;

        tracing::info!(path = %self.path.display(), commands = commands.len(), "wrote command script");
        Ok(())
    }
}

/// Write one command per line; on failure, the index of the line being written
fn write_lines<W: Write>(writer: &mut W, commands: &[String]) -> Result<(), (usize, io::Error)> {
    for (index, command) in commands.iter().enumerate() {
        writeln!(writer, "{}", command).map_err(|e| (index, e))?;
    }
    writer.flush().map_err(|e| (commands.len().saturating_sub(1), e))
}

/// Runs `program [args...] <command>` once per command, fail-fast
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a shell-like command line (see [`split_command_line`])
    pub fn from_command_line(line: &str) -> Result<Self, String> {
        let mut words = split_command_line(line)?.into_iter();
        let program = words.next().ok_or_else(|| "empty command line".to_string())?;
        Ok(Self::new(program, words.collect()))
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, commands: &[String]) -> Result<(), ExecutionError> {
        for (index, command) in commands.iter().enumerate() {
            tracing::debug!(index, command = command.as_str(), "applying command");

            let output = Command::new(&self.program)
                .args(&self.args)
                .arg(command)
                .output()
                .map_err(|e| ExecutionError {
                    index,
                    command: command.clone(),
                    message: format!("failed to run '{}': {}", self.program, e),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ExecutionError {
                    index,
                    command: command.clone(),
                    message: format!("exited with {}: {}", output.status, stderr.trim()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recording_executor_applies_in_order() {
        let executor = RecordingExecutor::new();
        executor.execute(&strings(&["a", "b"])).unwrap();
        assert_eq!(executor.applied(), strings(&["a", "b"]));
    }

    #[test]
    fn test_recording_executor_stops_at_failure() {
        let executor = RecordingExecutor::failing_at(1);
        let err = executor.execute(&strings(&["a", "b", "c"])).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.command, "b");
        assert_eq!(executor.applied(), strings(&["a"]));
    }

    #[test]
    fn test_script_executor_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.txt");
        fs::write(&path, "stale\n").unwrap();

        ScriptExecutor::new(&path)
            .execute(&strings(&["interface lo0", "description X"]))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "interface lo0\ndescription X\n");
    }

    /// Accepts `lines` complete lines, then rejects every write
    struct FullDisk {
        lines: usize,
        written: Vec<u8>,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.iter().filter(|&&b| b == b'\n').count() >= self.lines {
                return Err(io::Error::other("no space left on device"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_reports_line_being_written() {
        let mut disk = FullDisk {
            lines: 2,
            written: Vec::new(),
        };
        let (index, _) = write_lines(&mut disk, &strings(&["a", "b", "c", "d"])).unwrap_err();
        assert_eq!(index, 2);
        assert_eq!(disk.written, b"a\nb\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_script_executor_persist_failure_reports_last_command() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("taken");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = ScriptExecutor::new(&target)
            .execute(&strings(&["a", "b", "c"]))
            .unwrap_err();
        assert_eq!(err.index, 2);
        assert_eq!(err.command, "c");
    }

    #[test]
    fn test_process_executor_from_quoted_line() {
        let executor = ProcessExecutor::from_command_line(r#"ssh r1 "configure terminal""#).unwrap();
        assert_eq!(executor.program, "ssh");
        assert_eq!(executor.args, strings(&["r1", "configure terminal"]));
        assert!(ProcessExecutor::from_command_line("  ").is_err());
        assert!(ProcessExecutor::from_command_line("ssh 'r1").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_process_executor_fail_fast() {
        let ok = ProcessExecutor::new("true", Vec::new());
        assert!(ok.execute(&strings(&["a", "b"])).is_ok());

        let failing = ProcessExecutor::new("false", Vec::new());
        let err = failing.execute(&strings(&["a", "b"])).unwrap_err();
        assert_eq!(err.index, 0);
    }
}
