//! Search Expression Errors
//!
//! Enhanced messages for search expressions that fail to compile. Device
//! commands are full of characters that are regex metacharacters
//! (`(`, `[`, `+`, `*`, `.`), so the suggestions focus on escaping them.

use crate::error::PlanningError;
use regex::Regex;

/// Diagnostic for a search expression that failed to compile
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedRegexError {
    /// The search expression as given
    pub pattern: String,
    pub error_type: RegexErrorType,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegexErrorType {
    Syntax { message: String },
    /// Unclosed group, class or repetition brace
    UnclosedDelimiter { delimiter: char, position: usize },
    /// Repetition operator with nothing to repeat, or a malformed `{n,m}`
    InvalidQuantifier { message: String, position: Option<usize> },
    /// Lookaround or backreference inside the pattern, which `regex` does not support
    Unsupported { message: String },
}

impl EnhancedRegexError {
    pub fn from_regex_error(err: &regex::Error, pattern: &str) -> Self {
        let error_msg = err.to_string();
        let error_type = Self::classify_error(&error_msg, pattern);
        let suggestion = Self::generate_suggestion(&error_type, pattern);

        EnhancedRegexError {
            pattern: pattern.to_string(),
            error_type,
            suggestion,
        }
    }

    fn classify_error(error_msg: &str, pattern: &str) -> RegexErrorType {
        let lower_msg = error_msg.to_lowercase();

        if lower_msg.contains("unclosed") || lower_msg.contains("unterminated") {
            for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
                if let Some(position) = find_unclosed_delimiter(pattern, open, close) {
                    return RegexErrorType::UnclosedDelimiter {
                        delimiter: open,
                        position,
                    };
                }
            }
        }

        if lower_msg.contains("repetition") || lower_msg.contains("quantifier") || lower_msg.contains("repeat") {
            return RegexErrorType::InvalidQuantifier {
                message: error_msg.to_string(),
                position: find_invalid_quantifier(pattern),
            };
        }

        if lower_msg.contains("look-around")
            || lower_msg.contains("lookaround")
            || lower_msg.contains("backreference")
        {
            return RegexErrorType::Unsupported {
                message: error_msg.to_string(),
            };
        }

        RegexErrorType::Syntax {
            message: error_msg.to_string(),
        }
    }

    fn generate_suggestion(error_type: &RegexErrorType, pattern: &str) -> Option<String> {
        match error_type {
            RegexErrorType::UnclosedDelimiter { delimiter, position } => {
                let closer = match delimiter {
                    '(' => ')',
                    '[' => ']',
                    _ => '}',
                };
                Some(format!(
                    "Search expressions are regular expressions. If the '{}' at position {} is part of \
                     the command text, escape it as '\\{}'; otherwise add the closing '{}'.",
                    delimiter, position, delimiter, closer
                ))
            }
            RegexErrorType::InvalidQuantifier { message, .. } => {
                if message.to_lowercase().contains("nothing to repeat") || pattern.starts_with(['*', '+', '?']) {
                    Some(
                        "A '*', '+' or '?' has nothing to repeat. To match it literally in a command, \
                         escape it, e.g. 'permit tcp any any eq \\*'."
                            .to_string(),
                    )
                } else {
                    Some("Repetition braces must look like '{n}', '{n,}' or '{n,m}' with n <= m.".to_string())
                }
            }
            RegexErrorType::Unsupported { .. } => Some(
                "Lookaround and backreferences are not supported inside search expressions. \
                 Capture with (...) or (?P<name>...) and use \\N or {name} in the replacement instead."
                    .to_string(),
            ),
            RegexErrorType::Syntax { .. } => {
                if pattern.contains('[') && !pattern.contains(']') {
                    Some("Unclosed character class '[...]'. Add a closing ']' or escape the '['.".to_string())
                } else {
                    Some(
                        "Escape regex metacharacters that appear literally in the command: \
                         . + * ? ^ $ | ( ) [ ] { } \\"
                            .to_string(),
                    )
                }
            }
        }
    }

    pub fn display(&self) -> String {
        let mut output = String::from("Invalid search expression\n");
        output.push_str(&format!("  Pattern: \"{}\"\n", self.pattern));

        match &self.error_type {
            RegexErrorType::Syntax { message } => {
                output.push_str("  Type: Syntax error\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::UnclosedDelimiter { delimiter, position } => {
                output.push_str("  Type: Unclosed delimiter\n");
                output.push_str(&format!("  Opening '{}' at position {} is never closed\n", delimiter, position));
            }
            RegexErrorType::InvalidQuantifier { message, position } => {
                output.push_str("  Type: Invalid quantifier\n");
                if let Some(pos) = position {
                    output.push_str(&format!("  Position: {}\n", pos));
                }
                output.push_str(&format!("  Details: {}\n", message));
            }
            RegexErrorType::Unsupported { message } => {
                output.push_str("  Type: Unsupported feature\n");
                output.push_str(&format!("  Details: {}\n", message));
            }
        }

        if let Some(ref suggestion) = self.suggestion {
            output.push_str(&format!("  Suggestion: {}\n", suggestion));
        }

        output
    }
}

/// Position of the last unmatched `open`, skipping character classes for `(`/`{`
fn find_unclosed_delimiter(pattern: &str, open: char, close: char) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut in_class = false;
    let mut escaped = false;
    let mut opened: Vec<usize> = Vec::new();

    for (i, c) in pattern.chars().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if open != '[' {
            if c == '[' {
                in_class = true;
            } else if c == ']' {
                in_class = false;
            }
            if in_class {
                continue;
            }
        }
        if c == open {
            depth += 1;
            opened.push(i);
        } else if c == close && depth > 0 {
            depth -= 1;
            opened.pop();
        }
    }

    if depth > 0 { opened.last().copied() } else { None }
}

/// Position of a repetition operator with nothing before it
fn find_invalid_quantifier(pattern: &str) -> Option<usize> {
    let chars: Vec<char> = pattern.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if matches!(c, '*' | '+' | '?') {
            if i == 0 {
                return Some(i);
            }
            if chars[i - 1] == '(' || chars[i - 1] == '|' {
                return Some(i);
            }
        }
    }
    None
}

/// Compile a search expression, turning failures into a planning error
pub fn compile_search(pattern: &str) -> Result<Regex, PlanningError> {
    Regex::new(pattern).map_err(|err| {
        let enhanced = EnhancedRegexError::from_regex_error(&err, pattern);
        PlanningError::InvalidPattern {
            pattern: pattern.to_string(),
            details: enhanced.display(),
        }
    })
}
