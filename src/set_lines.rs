//! Set-line planning
//!
//! Candidates written as flat `set ...` / `delete ...` lines are compared
//! against the running configuration flattened the same way. The running
//! text may already be flat (one `set` line per leaf) or brace-structured.

use crate::assembler::assemble_with;
use crate::planner::{full_scope, Change, ChangeSet};
use crate::strategy::Encoding;
use crate::tree::{ConfigTree, Statement};

const DELETE: &str = "delete";

/// Plan flat candidate lines against `current`.
///
/// `action` is the keyword that adds configuration (usually `set`). An add
/// line is emitted when the current configuration does not already contain
/// it; a `delete` line is emitted when the current configuration has that
/// path or anything below it. A line starting with neither keyword is read
/// as an add line. Blank lines and `#` comments are ignored.
pub fn plan_set_lines<S: AsRef<str>>(candidate_lines: &[S], current: &ConfigTree, action: &str) -> ChangeSet {
    let mut present = present_lines(current, action);

    let mut changes = ChangeSet::new();
    for line in candidate_lines {
        let line = line.as_ref().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (keyword, path) = match line.split_once(char::is_whitespace) {
            Some((keyword, path)) if keyword == action || keyword == DELETE => (keyword, path.trim()),
            _ => (action, line),
        };

        if keyword == DELETE {
            let target = format!("{} {}", action, path);
            let covers = |p: &String| p == &target || p.starts_with(&format!("{} ", target));
            if present.iter().any(covers) {
                present.retain(|p| !covers(p));
                changes.push(Change::leaf(line));
            }
        } else {
            let command = format!("{} {}", action, path);
            if !present.contains(&command) {
                changes.push(Change::leaf(command.as_str()));
                present.push(command);
            }
        }
    }

    tracing::debug!(changes = changes.len(), "planned set lines");
    changes
}

/// Every `<action> ...` line the current configuration holds.
///
/// Top-level leaves already written as `<action> ...` are taken verbatim;
/// everything else is expanded with the set encoding.
fn present_lines(current: &ConfigTree, action: &str) -> Vec<String> {
    let prefix = format!("{} ", action);
    let delete_prefix = format!("{} ", DELETE);

    let mut present = Vec::new();
    let mut structured: Vec<Statement> = Vec::new();
    for statement in current.statements() {
        if statement.is_leaf() && statement.text().starts_with(&prefix) {
            present.push(statement.text().to_string());
        } else if statement.is_leaf() && statement.text().starts_with(&delete_prefix) {
            // removes nothing that is configured
            continue;
        } else {
            structured.push(statement.clone());
        }
    }

    let encoding = Encoding::Set {
        action: action.to_string(),
    };
    present.extend(assemble_with(&full_scope(&structured), &[], &[], &[], &encoding).into_vec());
    present
}
