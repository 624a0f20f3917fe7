//! Hierarchical Parser
//!
//! Turns indentation-structured configuration text into a [`ConfigTree`].
//! Parsing never fails: lines whose indentation cannot be attached to an open
//! ancestor are recorded as [`ParseError`]s and the parser carries on.

use crate::line::{LineClassifier, LineKind};
use crate::tree::{ConfigTree, ParseError, Statement};

/// Texts of the currently open statements, root-most first
#[derive(Debug, Default, Clone)]
pub struct AncestorStack {
    entries: Vec<String>,
}

impl AncestorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything and open a new top-level statement
    pub fn reset(&mut self, text: &str) {
        self.entries.clear();
        self.entries.push(text.to_string());
    }

    /// Close every statement at or below `depth`
    pub fn pop_to(&mut self, depth: usize) {
        self.entries.truncate(depth);
    }

    pub fn push(&mut self, text: &str) {
        self.entries.push(text.to_string());
    }

    /// The first `depth` open statements
    pub fn path(&self, depth: usize) -> &[String] {
        &self.entries[..depth.min(self.entries.len())]
    }
}

/// Line-oriented configuration parser
#[derive(Debug, Clone, Default)]
pub struct Parser {
    classifier: LineClassifier,
}

impl Parser {
    pub fn new(classifier: LineClassifier) -> Self {
        Self { classifier }
    }

    /// Parser with default markers and the given indentation unit
    pub fn with_indent(indent: usize) -> Self {
        Self::new(LineClassifier::new(indent))
    }

    pub fn classifier(&self) -> &LineClassifier {
        &self.classifier
    }

    pub fn parse(&self, text: &str) -> ConfigTree {
        let mut statements: Vec<Statement> = Vec::new();
        let mut errors: Vec<ParseError> = Vec::new();
        let mut stack = AncestorStack::new();

        for (index, line) in text.lines().enumerate() {
            let (level, trimmed) = match self.classifier.classify(line) {
                LineKind::NoOp => continue,
                LineKind::Statement { level, text } => (level, text),
            };

            if level == 0 || stack.is_empty() {
                statements.push(Statement::new(line, Vec::new()));
                stack.reset(trimmed);
                continue;
            }

            let skipped = stack.len() < level;
            stack.pop_to(level);
            let known = stack.path(level).to_vec();
            stack.push(trimmed);

            if skipped {
                record(&mut errors, known, trimmed, index + 1);
                continue;
            }

            match resolve_mut(&mut statements, &known) {
                Some(children) => children.push(Statement::new(line, known)),
                None => record(&mut errors, known, trimmed, index + 1),
            }
        }

        tracing::debug!(
            statements = statements.len(),
            errors = errors.len(),
            "parsed configuration"
        );

        ConfigTree::from_parts(statements, errors)
    }
}

/// Convenience wrapper: parse `text` with default markers and `indent`
pub fn parse(text: &str, indent: usize) -> ConfigTree {
    Parser::with_indent(indent).parse(text)
}

fn record(errors: &mut Vec<ParseError>, path: Vec<String>, text: &str, line_number: usize) {
    tracing::warn!(line = line_number, text, "indentation does not match an open statement");
    errors.push(ParseError {
        path,
        text: text.to_string(),
        line_number,
    });
}

/// Children list of the statement at `path`, walking the most recent match per level
fn resolve_mut<'a>(statements: &'a mut Vec<Statement>, path: &[String]) -> Option<&'a mut Vec<Statement>> {
    let mut level = statements;
    for key in path {
        let current = level;
        let statement = current.iter_mut().rev().find(|s| s.text() == key)?;
        level = statement.children_mut();
    }
    Some(level)
}
