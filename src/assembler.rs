//! Command Assembler
//!
//! Expands a [`ChangeSet`] into the literal command sequence sent to a
//! device: re-enters ancestor context where needed, merges adjacent entries
//! that share a context, and brackets the result with before/after lists.

use crate::planner::ChangeSet;
use crate::strategy::Encoding;
use serde::Serialize;

/// Final ordered commands for the executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandList {
    commands: Vec<String>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.commands.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.commands
    }
}

impl From<Vec<String>> for CommandList {
    fn from(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Assemble hierarchical commands: `before ++ expanded changes ++ after`.
///
/// `before` and `after` are only emitted when there is at least one change.
pub fn assemble(changes: &ChangeSet, ancestors: &[String], before: &[String], after: &[String]) -> CommandList {
    assemble_with(changes, ancestors, before, after, &Encoding::Hierarchical)
}

pub fn assemble_with(
    changes: &ChangeSet,
    ancestors: &[String],
    before: &[String],
    after: &[String],
    encoding: &Encoding,
) -> CommandList {
    let body = match encoding {
        Encoding::Hierarchical => expand_hierarchical(changes, ancestors),
        Encoding::Set { action } => expand_set(changes, ancestors, action),
    };

    if body.is_empty() {
        return CommandList::new();
    }

    let mut commands = Vec::with_capacity(before.len() + body.len() + after.len());
    commands.extend(before.iter().cloned());
    commands.extend(body);
    commands.extend(after.iter().cloned());
    CommandList::from(commands)
}

fn chain_of(ancestors: &[String], parents: &[String]) -> Vec<String> {
    let mut chain = Vec::with_capacity(ancestors.len() + parents.len());
    chain.extend(ancestors.iter().cloned());
    chain.extend(parents.iter().cloned());
    chain
}

fn expand_hierarchical(changes: &ChangeSet, ancestors: &[String]) -> Vec<String> {
    let mut body = Vec::new();
    // Chain of the last emitted entry, and that chain extended by its text
    let mut previous: Option<(Vec<String>, Vec<String>)> = None;

    for change in changes {
        let chain = chain_of(ancestors, &change.parents);
        let in_context = chain.is_empty()
            || previous
                .as_ref()
                .is_some_and(|(last, entered)| &chain == last || &chain == entered);
        if !in_context {
            body.extend(chain.iter().cloned());
        }
        body.push(change.text.clone());

        let mut entered = chain.clone();
        entered.push(change.text.clone());
        previous = Some((chain, entered));
    }

    body
}

fn expand_set(changes: &ChangeSet, ancestors: &[String], action: &str) -> Vec<String> {
    let entries = changes.entries();
    let mut body = Vec::new();

    for (index, change) in entries.iter().enumerate() {
        let chain = chain_of(ancestors, &change.parents);

        // An entry immediately followed by its own children is a container
        if let Some(next) = entries.get(index + 1) {
            let next_chain = chain_of(ancestors, &next.parents);
            if next_chain.len() == chain.len() + 1
                && next_chain.starts_with(&chain)
                && next_chain[chain.len()] == change.text
            {
                continue;
            }
        }

        let mut words = vec![action.to_string()];
        words.extend(chain.iter().map(|c| strip_container(c).to_string()));
        words.push(strip_terminator(strip_container(&change.text)).to_string());
        body.push(words.join(" "));
    }

    body
}

fn strip_container(text: &str) -> &str {
    text.trim_end().trim_end_matches('{').trim_end()
}

fn strip_terminator(text: &str) -> &str {
    text.trim_end().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineClassifier;
    use crate::parser::{parse, Parser};
    use crate::planner::{plan, Change};
    use crate::strategy::MatchStrategy;
    use crate::tree::ConfigTree;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_interface_block() {
        let candidate = parse("interface loopback0\n description X\n no shutdown\n", 1);
        let changes = plan(candidate.statements(), ConfigTree::new().statements(), MatchStrategy::Line);
        let commands = assemble(&changes, &[], &[], &[]);
        assert_eq!(
            commands.commands(),
            strings(&["interface loopback0", "description X", "no shutdown"]).as_slice()
        );
    }

    #[test]
    fn test_missing_children_reenter_parent_once() {
        let changes = ChangeSet::from_entries(vec![
            Change::new("description X", strings(&["interface lo0"])),
            Change::new("no shutdown", strings(&["interface lo0"])),
        ]);
        let commands = assemble(&changes, &[], &[], &[]);
        assert_eq!(
            commands.into_vec(),
            strings(&["interface lo0", "description X", "no shutdown"])
        );
    }

    #[test]
    fn test_disjoint_branches_each_reenter() {
        let changes = ChangeSet::from_entries(vec![
            Change::new("description a", strings(&["interface lo0"])),
            Change::new("description b", strings(&["interface lo1"])),
            Change::new("remote-as 2", strings(&["router bgp 1", "neighbor x"])),
        ]);
        let commands = assemble(&changes, &[], &[], &[]);
        assert_eq!(
            commands.into_vec(),
            strings(&[
                "interface lo0",
                "description a",
                "interface lo1",
                "description b",
                "router bgp 1",
                "neighbor x",
                "remote-as 2",
            ])
        );
    }

    #[test]
    fn test_sibling_of_open_submode_reenters_parent() {
        let candidate = parse(
            "router bgp 1\n address-family ipv4\n  network a\n neighbor x remote-as 2\n",
            1,
        );
        let current = parse("router bgp 1\n address-family ipv4\n", 1);
        let changes = plan(candidate.statements(), current.statements(), MatchStrategy::Line);
        assert_eq!(
            assemble(&changes, &[], &[], &[]).into_vec(),
            strings(&[
                "router bgp 1",
                "address-family ipv4",
                "network a",
                "router bgp 1",
                "neighbor x remote-as 2",
            ])
        );
    }

    #[test]
    fn test_nested_block_reenters_after_leaving_submode() {
        let candidate = parse("interface lo0\n ip ospf 1\n  cost 10\n description x\nhostname r1\n", 1);
        let commands = assemble(&plan(candidate.statements(), &[], MatchStrategy::Line), &[], &[], &[]);
        assert_eq!(
            commands.into_vec(),
            strings(&[
                "interface lo0",
                "ip ospf 1",
                "cost 10",
                "interface lo0",
                "description x",
                "hostname r1",
            ])
        );
    }

    #[test]
    fn test_ancestors_and_brackets() {
        let changes = ChangeSet::from_entries(vec![
            Change::leaf("10 permit ip any any"),
            Change::leaf("20 deny ip any any"),
        ]);
        let commands = assemble(
            &changes,
            &strings(&["ip access-list example"]),
            &strings(&["no ip access-list example"]),
            &strings(&["exit"]),
        );
        assert_eq!(
            commands.into_vec(),
            strings(&[
                "no ip access-list example",
                "ip access-list example",
                "10 permit ip any any",
                "20 deny ip any any",
                "exit",
            ])
        );
    }

    #[test]
    fn test_no_changes_no_brackets() {
        let commands = assemble(&ChangeSet::new(), &strings(&["a"]), &strings(&["b"]), &strings(&["c"]));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_set_encoding_flattens_leaves() {
        let parser = Parser::new(LineClassifier::new(4).with_markers(["}"]));
        let candidate = parser.parse("system {\n    host-name r1;\n    services {\n        ssh;\n    }\n}\n");
        let changes = plan(candidate.statements(), ConfigTree::new().statements(), MatchStrategy::Line);
        let encoding = Encoding::Set {
            action: "set".to_string(),
        };
        let commands = assemble_with(&changes, &[], &[], &[], &encoding);
        assert_eq!(
            commands.into_vec(),
            strings(&["set system host-name r1", "set system services ssh"])
        );
    }

    #[test]
    fn test_set_encoding_keeps_childless_container() {
        let changes = ChangeSet::from_entries(vec![Change::new("disable {", strings(&["interfaces ge-0/0/0 {"]))]);
        let encoding = Encoding::Set {
            action: "delete".to_string(),
        };
        let commands = assemble_with(&changes, &[], &[], &[], &encoding);
        assert_eq!(commands.into_vec(), strings(&["delete interfaces ge-0/0/0 disable"]));
    }
}
