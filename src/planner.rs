//! Match Strategy Engine
//!
//! Selects the candidate statements that must be submitted to bring the
//! running configuration in line, according to a [`MatchStrategy`].

use crate::diff::{diverging, Divergence};
use crate::strategy::MatchStrategy;
use crate::tree::Statement;
use serde::Serialize;

/// A statement selected for submission.
///
/// `parents` is relative to the planned scope; the assembler prefixes the
/// scope's own ancestor path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub text: String,
    pub parents: Vec<String>,
}

impl Change {
    pub fn new(text: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            text: text.into(),
            parents,
        }
    }

    /// A change with no parents of its own
    pub fn leaf(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }
}

/// Ordered selection of changes, prior to ancestor expansion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    entries: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Change>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, change: Change) {
        self.entries.push(change);
    }

    pub fn entries(&self) -> &[Change] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.entries.iter()
    }

    /// Texts of the entries, in order
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.text.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Plan the changes needed for `candidate` given `current`.
///
/// Both slices are scopes: a whole tree's top level, or the children reached
/// through an ancestor path. With [`MatchStrategy::Force`] `current` is never
/// inspected.
pub fn plan(candidate: &[Statement], current: &[Statement], strategy: MatchStrategy) -> ChangeSet {
    let changes = match strategy {
        MatchStrategy::Force => full_scope(candidate),
        MatchStrategy::Line => missing(candidate, current),
        MatchStrategy::Block => {
            if missing(candidate, current).is_empty() {
                ChangeSet::new()
            } else {
                full_scope(candidate)
            }
        }
        MatchStrategy::Exact => {
            if !missing(candidate, current).is_empty() || !same_sequence(candidate, current) {
                full_scope(candidate)
            } else {
                ChangeSet::new()
            }
        }
        MatchStrategy::Strict => positional(candidate, current),
    };

    tracing::debug!(
        strategy = strategy.as_str(),
        candidate = candidate.len(),
        current = current.len(),
        changes = changes.len(),
        "planned scope"
    );

    changes
}

/// Every statement of the scope, depth-first in candidate order
pub fn full_scope(candidate: &[Statement]) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for statement in candidate {
        flatten_into(statement, &[], &mut changes);
    }
    changes
}

/// Candidate statements with no equal statement in `current`, plus their subtrees
fn missing(candidate: &[Statement], current: &[Statement]) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for divergence in diverging(candidate, current) {
        if let Divergence::Missing { path, node } = divergence {
            let base: Vec<String> = path.iter().map(|p| p.to_string()).collect();
            flatten_into(node, &base, &mut changes);
        }
    }
    changes
}

/// Ordered top-level text sequences are identical
fn same_sequence(candidate: &[Statement], current: &[Statement]) -> bool {
    candidate.len() == current.len()
        && candidate
            .iter()
            .zip(current)
            .all(|(a, b)| a.text() == b.text())
}

fn positional(candidate: &[Statement], current: &[Statement]) -> ChangeSet {
    if candidate.len() != current.len() {
        return full_scope(candidate);
    }
    let mut changes = ChangeSet::new();
    for (statement, existing) in candidate.iter().zip(current) {
        if statement.text() != existing.text() {
            flatten_into(statement, &[], &mut changes);
        }
    }
    changes
}

fn flatten_into(statement: &Statement, parents: &[String], changes: &mut ChangeSet) {
    changes.push(Change::new(statement.text(), parents.to_vec()));
    let mut path = parents.to_vec();
    path.push(statement.text().to_string());
    for child in statement.children() {
        flatten_into(child, &path, changes);
    }
}
