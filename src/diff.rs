//! Generic ordered-tree differ
//!
//! Both the line-oriented [`Statement`] tree and the structural
//! [`KvNode`](crate::kv::KvNode) tree are compared through [`OrderedTree`].
//! The walk follows candidate order and reports every candidate node that has
//! no counterpart, or whose counterpart carries a different payload.

use crate::tree::Statement;

/// A node in an ordered, keyed tree
pub trait OrderedTree: Sized {
    /// Key that identifies the node among its siblings
    fn key(&self) -> &str;

    fn children(&self) -> &[Self];

    /// Whether two nodes sharing a key carry the same payload.
    ///
    /// Nodes without a payload of their own (plain statements) always agree.
    fn same_payload(&self, _other: &Self) -> bool {
        true
    }
}

impl OrderedTree for Statement {
    fn key(&self) -> &str {
        self.text()
    }

    fn children(&self) -> &[Self] {
        Statement::children(self)
    }
}

/// A candidate node that the current tree does not satisfy
#[derive(Debug, Clone, PartialEq)]
pub enum Divergence<'a, T> {
    /// No current node with this key under the same path
    Missing { path: Vec<&'a str>, node: &'a T },
    /// A current node with this key exists but its payload differs
    Changed {
        path: Vec<&'a str>,
        node: &'a T,
        current: &'a T,
    },
}

impl<'a, T> Divergence<'a, T> {
    /// Keys from the compared root down to the node's parent
    pub fn path(&self) -> &[&'a str] {
        match self {
            Divergence::Missing { path, .. } | Divergence::Changed { path, .. } => path,
        }
    }

    pub fn node(&self) -> &'a T {
        match self {
            Divergence::Missing { node, .. } | Divergence::Changed { node, .. } => node,
        }
    }
}

/// Compare `candidate` against `current`, in candidate order.
///
/// A missing node is reported once; its descendants are not visited. When
/// `current` holds several nodes with the same key, the children of every
/// agreeing duplicate are searched.
pub fn diverging<'a, T: OrderedTree>(candidate: &'a [T], current: &'a [T]) -> Vec<Divergence<'a, T>> {
    let current: Vec<&'a T> = current.iter().collect();
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(candidate, &current, &mut path, &mut out);
    out
}

fn walk<'a, T: OrderedTree>(
    candidate: &'a [T],
    current: &[&'a T],
    path: &mut Vec<&'a str>,
    out: &mut Vec<Divergence<'a, T>>,
) {
    for node in candidate {
        let matches: Vec<&'a T> = current
            .iter()
            .copied()
            .filter(|c| c.key() == node.key())
            .collect();

        let Some(first) = matches.first().copied() else {
            out.push(Divergence::Missing {
                path: path.clone(),
                node,
            });
            continue;
        };

        let agreeing: Vec<&'a T> = matches
            .into_iter()
            .filter(|c| node.same_payload(c))
            .collect();

        if agreeing.is_empty() {
            out.push(Divergence::Changed {
                path: path.clone(),
                node,
                current: first,
            });
            continue;
        }

        let next: Vec<&'a T> = agreeing.iter().flat_map(|c| c.children().iter()).collect();
        path.push(node.key());
        walk(node.children(), &next, path, out);
        path.pop();
    }
}
