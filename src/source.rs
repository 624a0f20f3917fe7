//! Configuration sources
//!
//! Where running (and candidate) configuration text comes from. Fetching is
//! the only read a reconciliation pass performs.

use crate::error::SourceError;
use crate::kv::KvTree;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait ConfigSource {
    /// Return the configuration text, including defaults if requested and supported
    fn fetch(&self, include_defaults: bool) -> Result<String, SourceError>;

    /// Short label for logs and backup metadata
    fn describe(&self) -> String;
}

/// Load a structured document from any source
pub fn fetch_kv(source: &dyn ConfigSource) -> Result<KvTree, SourceError> {
    let text = source.fetch(false)?;
    KvTree::from_json_str(&source.describe(), &text)
}

/// Split a command line into words.
///
/// Single quotes keep their content literally; inside double quotes and
/// outside quotes a backslash escapes the next character. No variable or
/// glob expansion is done.
pub fn split_command_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => word.push(c),
                            None => return Err("unterminated double quote".to_string()),
                        },
                        Some(c) => word.push(c),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(c) => word.push(c),
                    None => return Err("trailing backslash".to_string()),
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }

    if in_word {
        words.push(word);
    }
    Ok(words)
}

/// Configuration held in memory
#[derive(Debug, Clone, Default)]
pub struct TextSource {
    text: String,
}

impl TextSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ConfigSource for TextSource {
    fn fetch(&self, _include_defaults: bool) -> Result<String, SourceError> {
        Ok(self.text.clone())
    }

    fn describe(&self) -> String {
        "text".to_string()
    }
}

/// A saved configuration on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn fetch(&self, _include_defaults: bool) -> Result<String, SourceError> {
        tracing::debug!(path = %self.path.display(), "reading configuration file");
        std::fs::read_to_string(&self.path)
            .map_err(|e| SourceError::from_io(&self.path, e, "reading configuration"))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A program whose standard output is the configuration
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    defaults_arg: Option<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            defaults_arg: None,
        }
    }

    /// Build from a shell-like command line (see [`split_command_line`])
    pub fn from_command_line(line: &str) -> Result<Self, SourceError> {
        let invalid = |message: String| SourceError::Command {
            program: line.to_string(),
            message,
        };
        let mut words = split_command_line(line).map_err(invalid)?.into_iter();
        let program = words.next().ok_or_else(|| invalid("empty command line".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    /// Argument appended when defaults are requested, e.g. `all`
    pub fn with_defaults_arg(mut self, arg: impl Into<String>) -> Self {
        self.defaults_arg = Some(arg.into());
        self
    }
}

impl ConfigSource for CommandSource {
    fn fetch(&self, include_defaults: bool) -> Result<String, SourceError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if include_defaults {
            if let Some(arg) = &self.defaults_arg {
                command.arg(arg);
            }
        }

        tracing::debug!(program = self.program.as_str(), include_defaults, "running source command");

        let output = command.output().map_err(|e| SourceError::Command {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Command {
                program: self.program.clone(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| SourceError::Malformed {
            origin: self.program.clone(),
            message: format!("output is not valid UTF-8: {}", e),
        })
    }

    fn describe(&self) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.args.iter().cloned());
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_text_source_returns_text() {
        let source = TextSource::new("hostname r1\n");
        assert_eq!(source.fetch(true).unwrap(), "hostname r1\n");
    }

    #[test]
    fn test_file_source_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("running.cfg");
        fs::write(&path, "interface lo0\n").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.fetch(false).unwrap(), "interface lo0\n");
        assert_eq!(source.describe(), path.display().to_string());
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path().join("absent.cfg"));
        assert!(matches!(source.fetch(false), Err(SourceError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_captures_stdout() {
        let source = CommandSource::new("echo", vec!["hostname".to_string(), "r1".to_string()])
            .with_defaults_arg("all");
        assert_eq!(source.fetch(false).unwrap(), "hostname r1\n");
        assert_eq!(source.fetch(true).unwrap(), "hostname r1 all\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_failure() {
        let source = CommandSource::new("false", Vec::new());
        assert!(matches!(source.fetch(false), Err(SourceError::Command { .. })));
    }

    #[test]
    fn test_empty_command_line_rejected() {
        assert!(CommandSource::from_command_line("   ").is_err());
        let source = CommandSource::from_command_line("cat running.cfg").unwrap();
        assert_eq!(source.describe(), "cat running.cfg");
    }

    #[test]
    fn test_split_command_line_quoting() {
        assert_eq!(
            split_command_line(r#"ssh r1 "show run" 'a  b' c\ d """#).unwrap(),
            vec!["ssh", "r1", "show run", "a  b", "c d", ""]
        );
        assert_eq!(split_command_line(r#"echo "say \"hi\"""#).unwrap(), vec!["echo", r#"say "hi""#]);
        assert!(split_command_line("ssh r1 'show run").is_err());
        assert!(split_command_line("ssh r1 \"show run").is_err());
    }

    #[test]
    fn test_quoted_argument_stays_whole() {
        let source = CommandSource::from_command_line("ssh r1 'show running-config'").unwrap();
        assert_eq!(source.args, vec!["r1".to_string(), "show running-config".to_string()]);
        assert!(matches!(
            CommandSource::from_command_line("ssh 'r1"),
            Err(SourceError::Command { .. })
        ));
    }

    #[test]
    fn test_fetch_kv_from_text() {
        let tree = fetch_kv(&TextSource::new(r#"{"system": {"hostname": "r1"}}"#)).unwrap();
        assert_eq!(tree.roots().len(), 1);
    }
}
