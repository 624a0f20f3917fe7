//! Structured (key/value) configuration
//!
//! JSON documents are loaded into an ordered [`KvTree`] and compared with the
//! same differ as statement trees. Objects are branches; every other value is
//! a leaf compared by value, with lists compared as multisets.

use crate::diff::{diverging, Divergence, OrderedTree};
use crate::error::SourceError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// One key of a structured document
#[derive(Debug, Clone, PartialEq)]
pub struct KvNode {
    key: String,
    value: Value,
    children: Vec<KvNode>,
}

impl KvNode {
    fn from_entry(key: &str, value: &Value) -> Self {
        let children = match value {
            Value::Object(map) => nodes_of(map),
            _ => Vec::new(),
        };
        Self {
            key: key.to_string(),
            value: value.clone(),
            children,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_branch(&self) -> bool {
        self.value.is_object()
    }
}

fn nodes_of(map: &Map<String, Value>) -> Vec<KvNode> {
    map.iter().map(|(k, v)| KvNode::from_entry(k, v)).collect()
}

impl OrderedTree for KvNode {
    fn key(&self) -> &str {
        &self.key
    }

    fn children(&self) -> &[Self] {
        &self.children
    }

    fn same_payload(&self, other: &Self) -> bool {
        match (self.is_branch(), other.is_branch()) {
            (true, true) => true,
            (false, false) => values_equal(&self.value, &other.value),
            _ => false,
        }
    }
}

/// Leaf equality; lists ignore element order
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                return false;
            }
            let mut used = vec![false; right.len()];
            left.iter().all(|item| {
                let slot = right
                    .iter()
                    .enumerate()
                    .position(|(i, candidate)| !used[i] && values_equal(item, candidate));
                match slot {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        _ => a == b,
    }
}

/// A structured document, top-level keys in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvTree {
    roots: Vec<KvNode>,
    document: Map<String, Value>,
}

impl KvTree {
    /// Build from a JSON value, which must be an object
    pub fn from_value(origin: &str, value: Value) -> Result<Self, SourceError> {
        match value {
            Value::Object(document) => Ok(Self {
                roots: nodes_of(&document),
                document,
            }),
            other => Err(SourceError::Malformed {
                origin: origin.to_string(),
                message: format!("expected a JSON object at the top level, found {}", kind_of(&other)),
            }),
        }
    }

    pub fn from_json_str(origin: &str, text: &str) -> Result<Self, SourceError> {
        let value: Value = serde_json::from_str(text).map_err(|e| SourceError::Malformed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(origin, value)
    }

    pub fn roots(&self) -> &[KvNode] {
        &self.roots
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// A key that must be written to bring the current document in line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    /// Keys from the document root to the updated key's parent
    pub path: Vec<String>,
    pub key: String,
    pub new: Value,
    pub old: Option<Value>,
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.path {
            write!(f, "{}.", segment)?;
        }
        write!(f, "{}: {}", self.key, display_value(&self.new))?;
        if let Some(old) = &self.old {
            write!(f, " ({})", display_value(old))?;
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keys of `candidate` that `current` lacks or holds with a different value
pub fn diff_kv(candidate: &KvTree, current: &KvTree) -> Vec<Update> {
    let updates: Vec<Update> = diverging(candidate.roots(), current.roots())
        .into_iter()
        .map(|divergence| {
            let path = divergence.path().iter().map(|p| p.to_string()).collect();
            match divergence {
                Divergence::Missing { node, .. } => Update {
                    path,
                    key: node.key.clone(),
                    new: node.value.clone(),
                    old: None,
                },
                Divergence::Changed { node, current, .. } => Update {
                    path,
                    key: node.key.clone(),
                    new: node.value.clone(),
                    old: Some(current.value.clone()),
                },
            }
        })
        .collect();

    tracing::debug!(updates = updates.len(), "structured diff");
    updates
}

/// Apply `updates` to a copy of `current`, creating intermediate objects
pub fn merge_updates(updates: &[Update], current: &KvTree) -> Value {
    let mut document = current.document().clone();

    for update in updates {
        let mut level = &mut document;
        for segment in &update.path {
            let slot = level
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            level = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just made an object"),
            };
        }
        level.insert(update.key.clone(), update.new.clone());
    }

    Value::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: Value) -> KvTree {
        KvTree::from_value("test", value).unwrap()
    }

    #[test]
    fn test_identical_documents_have_no_updates() {
        let doc = json!({"system": {"hostname": "r1", "ntp": ["a", "b"]}});
        assert!(diff_kv(&tree(doc.clone()), &tree(doc)).is_empty());
    }

    #[test]
    fn test_changed_leaf_reports_old_value() {
        let candidate = tree(json!({"system": {"hostname": "r2"}}));
        let current = tree(json!({"system": {"hostname": "r1"}}));
        let updates = diff_kv(&candidate, &current);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].to_string(), "system.hostname: r2 (r1)");
    }

    #[test]
    fn test_missing_key_has_no_old_value() {
        let candidate = tree(json!({"system": {"domain": "example.net"}}));
        let current = tree(json!({"system": {}}));
        let updates = diff_kv(&candidate, &current);

        assert_eq!(updates[0].old, None);
        assert_eq!(updates[0].to_string(), "system.domain: example.net");
    }

    #[test]
    fn test_lists_compare_without_order() {
        let candidate = tree(json!({"dns": ["8.8.8.8", "1.1.1.1"]}));
        let current = tree(json!({"dns": ["1.1.1.1", "8.8.8.8"]}));
        assert!(diff_kv(&candidate, &current).is_empty());

        let current = tree(json!({"dns": ["1.1.1.1", "1.1.1.1"]}));
        assert_eq!(diff_kv(&candidate, &current).len(), 1);
    }

    #[test]
    fn test_updates_follow_candidate_order() {
        let candidate = tree(json!({"b": 2, "a": 1}));
        let current = tree(json!({}));
        let keys: Vec<String> = diff_kv(&candidate, &current).into_iter().map(|u| u.key).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_merge_updates_creates_intermediate_objects() {
        let current = tree(json!({"system": {"hostname": "r1"}, "ntp": "x"}));
        let updates = vec![
            Update {
                path: vec!["system".to_string()],
                key: "hostname".to_string(),
                new: json!("r2"),
                old: Some(json!("r1")),
            },
            Update {
                path: vec!["ntp".to_string(), "servers".to_string()],
                key: "primary".to_string(),
                new: json!("10.0.0.1"),
                old: None,
            },
        ];
        let merged = merge_updates(&updates, &current);
        assert_eq!(
            merged,
            json!({"system": {"hostname": "r2"}, "ntp": {"servers": {"primary": "10.0.0.1"}}})
        );
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        let err = KvTree::from_json_str("running.json", "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("running.json"));
        assert!(KvTree::from_json_str("x", "{not json").is_err());
    }
}
