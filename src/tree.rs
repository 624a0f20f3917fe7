//! Statement Tree
//!
//! The ordered tree produced by the parser for both candidate and running
//! configuration. Nodes compare by text and ancestor path, so statements from
//! two independently parsed trees are equal when they say the same thing in
//! the same place.

use serde::Serialize;

/// One configuration statement
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    raw: String,
    text: String,
    parents: Vec<String>,
    children: Vec<Statement>,
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.parents == other.parents
    }
}

impl Eq for Statement {}

impl Statement {
    pub(crate) fn new(raw: &str, parents: Vec<String>) -> Self {
        Self {
            raw: raw.to_string(),
            text: raw.trim().to_string(),
            parents,
            children: Vec::new(),
        }
    }

    /// Original line, including indentation
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed line text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ancestor texts, root-most first
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn children(&self) -> &[Statement] {
        &self.children
    }

    pub fn depth(&self) -> usize {
        self.parents.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Ancestor path followed by this statement's own text
    pub fn path(&self) -> Vec<String> {
        let mut path = self.parents.clone();
        path.push(self.text.clone());
        path
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.children
    }

    /// This statement and all descendants, depth-first in insertion order
    pub fn walk(&self) -> Vec<&Statement> {
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

fn collect<'a>(statement: &'a Statement, out: &mut Vec<&'a Statement>) {
    out.push(statement);
    for child in &statement.children {
        collect(child, out);
    }
}

/// Indentation that could not be attached to the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    /// Ancestor texts known when the line was read
    pub path: Vec<String>,
    /// Offending line, trimmed
    pub text: String,
    /// 1-based line number in the source text
    pub line_number: usize,
}

/// Ordered top-level statements plus accumulated parse errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigTree {
    statements: Vec<Statement>,
    errors: Vec<ParseError>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(statements: Vec<Statement>, errors: Vec<ParseError>) -> Self {
        Self { statements, errors }
    }

    /// Build a candidate tree from a flat block of lines nested under `parents`.
    ///
    /// Each line becomes a leaf whose ancestor path is `parents`; the returned
    /// tree's scope at `parents` yields exactly those lines, in order.
    pub fn from_block<S: AsRef<str>>(parents: &[String], lines: &[S]) -> Self {
        let leaves: Vec<Statement> = lines
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| !l.trim().is_empty())
            .map(|l| Statement::new(l, parents.to_vec()))
            .collect();

        if parents.is_empty() {
            return Self::from_parts(leaves, Vec::new());
        }

        let mut node = Statement::new(&parents[parents.len() - 1], parents[..parents.len() - 1].to_vec());
        node.children = leaves;
        for depth in (0..parents.len() - 1).rev() {
            let mut parent = Statement::new(&parents[depth], parents[..depth].to_vec());
            parent.children.push(node);
            node = parent;
        }
        Self::from_parts(vec![node], Vec::new())
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements reached by following `path` from the top level.
    ///
    /// An empty path is the whole tree. A path that does not resolve yields an
    /// empty scope. At each step the most recent statement with that text wins.
    pub fn scope(&self, path: &[String]) -> &[Statement] {
        let mut level: &[Statement] = &self.statements;
        for key in path {
            match level.iter().rev().find(|s| &s.text == key) {
                Some(statement) => level = &statement.children,
                None => return &[],
            }
        }
        level
    }

    /// Every statement in the tree, depth-first
    pub fn walk(&self) -> Vec<&Statement> {
        let mut out = Vec::new();
        for statement in &self.statements {
            collect(statement, &mut out);
        }
        out
    }

    /// Re-indent the tree as text, using `indent` spaces per level
    pub fn render(&self, indent: usize) -> String {
        let mut out = String::new();
        for statement in self.walk() {
            out.push_str(&" ".repeat(statement.depth() * indent));
            out.push_str(statement.text());
            out.push('\n');
        }
        out
    }
}
