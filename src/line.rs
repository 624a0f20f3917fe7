//! Line Classifier
//!
//! Decides, one line at a time, whether a line of device configuration carries
//! a statement and how deeply it is nested.

/// Result of classifying a single raw line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Blank, comment or terminator line; ignored by the parser
    NoOp,
    /// A statement with its nesting level and trimmed text
    Statement { level: usize, text: &'a str },
}

/// Per-dialect rules for reading configuration lines
#[derive(Debug, Clone, PartialEq)]
pub struct LineClassifier {
    indent: usize,
    markers: Vec<String>,
    comment_prefixes: Vec<String>,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self {
            indent: 1,
            markers: vec!["end".to_string()],
            comment_prefixes: vec!["!".to_string()],
        }
    }
}

impl LineClassifier {
    /// Create a classifier with the given indentation unit.
    ///
    /// An indentation unit of zero is treated as one.
    pub fn new(indent: usize) -> Self {
        Self {
            indent: indent.max(1),
            ..Self::default()
        }
    }

    /// Replace the set of terminator tokens (a line equal to one is skipped)
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the set of comment prefixes (a line starting with one is skipped)
    pub fn with_comment_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.comment_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Whether the line should be ignored entirely
    pub fn is_noop(&self, line: &str) -> bool {
        let text = line.trim();
        if text.is_empty() {
            return true;
        }
        if self.markers.iter().any(|m| m == text) {
            return true;
        }
        self.comment_prefixes
            .iter()
            .any(|p| !p.is_empty() && text.starts_with(p.as_str()))
    }

    /// Number of leading whitespace characters; tabs count as one
    pub fn leading_whitespace(line: &str) -> usize {
        line.chars().take_while(|c| c.is_whitespace()).count()
    }

    /// Nesting level of a line: leading whitespace divided by the indent unit
    pub fn level(&self, line: &str) -> usize {
        Self::leading_whitespace(line) / self.indent
    }

    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        if self.is_noop(line) {
            return LineKind::NoOp;
        }
        LineKind::Statement {
            level: self.level(line),
            text: line.trim(),
        }
    }
}
