//! Pattern Substitution Planner
//!
//! Plans commands from search/replacement pairs instead of from a candidate
//! tree. Each search expression is looked up among the leaves of the current
//! scope; the desired state decides whether the replacement is emitted.
//! Replacements may reference the match positionally (`\1`) and, after the
//! command list is assembled, by name (`{asn}`).

use crate::assembler::CommandList;
use crate::error::PlanningError;
use crate::planner::{Change, ChangeSet};
use crate::regex_error::compile_search;
use crate::strategy::DesiredState;
use regex::{Captures, Regex};
use serde::Serialize;

/// Named groups captured by one successful search, in group order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamedCaptures {
    groups: Vec<(String, String)>,
}

impl NamedCaptures {
    fn from_match(regex: &Regex, caps: &Captures<'_>) -> Self {
        let groups = regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Self { groups }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionPlan {
    pub change_set: ChangeSet,
    /// Named groups of every match, earliest search first
    pub captures: Vec<NamedCaptures>,
}

/// Plan commands for `search`/`replace` pairs against the current leaves.
///
/// Pairs are formed by position; a search without a replacement submits its
/// own text. A pair emits when its search finds nothing and the state is
/// present, when it matches and the state is absent, or always when `forced`.
pub fn plan_substitution<S: AsRef<str>>(
    current_leaves: &[S],
    search: &[String],
    replace: &[String],
    state: DesiredState,
    forced: bool,
) -> Result<SubstitutionPlan, PlanningError> {
    let mut plan = SubstitutionPlan::default();

    for (index, pattern) in search.iter().enumerate() {
        let replacement = replace.get(index).unwrap_or(pattern);
        let regex = compile_search(pattern)?;

        let found = current_leaves
            .iter()
            .find_map(|leaf| regex.captures(leaf.as_ref()));

        let emit = match (&found, state) {
            (None, DesiredState::Present) | (Some(_), DesiredState::Absent) => true,
            _ => forced,
        };

        tracing::debug!(
            pattern = pattern.as_str(),
            matched = found.is_some(),
            state = %state,
            forced,
            emit,
            "substitution pair"
        );

        if let Some(caps) = &found {
            let named = NamedCaptures::from_match(&regex, caps);
            if !named.is_empty() {
                plan.captures.push(named);
            }
        }

        if !emit {
            continue;
        }

        let command = match &found {
            Some(caps) => expand_positional(pattern, replacement, caps)?,
            None => replacement.clone(),
        };
        plan.change_set.push(Change::leaf(command));
    }

    Ok(plan)
}

/// Replace `\N` with capture group `N` of the match. `\\` is a literal backslash.
fn expand_positional(pattern: &str, replacement: &str, caps: &Captures<'_>) -> Result<String, PlanningError> {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                let group: usize = digits.parse().map_err(|_| PlanningError::UnknownGroup {
                    group: usize::MAX,
                    pattern: pattern.to_string(),
                    replacement: replacement.to_string(),
                })?;
                if group >= caps.len() {
                    return Err(PlanningError::UnknownGroup {
                        group,
                        pattern: pattern.to_string(),
                        replacement: replacement.to_string(),
                    });
                }
                if let Some(m) = caps.get(group) {
                    out.push_str(m.as_str());
                }
            }
            _ => out.push('\\'),
        }
    }

    Ok(out)
}

/// Resolve `{name}` fields in every command against the collected captures.
///
/// `{{` and `}}` stand for literal braces. Text that is not a well-formed
/// field (an unclosed `{`, or braces around something other than an
/// identifier) passes through unchanged, so brace-structured configuration
/// lines survive the pass.
pub fn resolve_named(commands: &CommandList, captures: &[NamedCaptures]) -> Result<CommandList, PlanningError> {
    commands
        .iter()
        .map(|command| resolve_command(command, captures))
        .collect::<Result<Vec<_>, _>>()
        .map(CommandList::from)
}

fn resolve_command(command: &str, captures: &[NamedCaptures]) -> Result<String, PlanningError> {
    let mut out = String::with_capacity(command.len());
    let mut rest = command;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        let field = tail[1..].find('}').map(|end| &tail[1..1 + end]);
        match field.filter(|name| is_identifier(name)) {
            Some(name) => {
                let value = captures.iter().find_map(|c| c.get(name)).ok_or_else(|| {
                    PlanningError::UnresolvedField {
                        field: name.to_string(),
                        command: command.to_string(),
                    }
                })?;
                out.push_str(value);
                rest = &tail[name.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_present_without_match_emits_literal_replacement() {
        let leaves = strings(&["hostname r1", "feature bgp"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&["router bgp 65000"]),
            &strings(&["no router bgp 65000"]),
            DesiredState::Present,
            false,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["no router bgp 65000"]);
        assert!(plan.captures.is_empty());
    }

    #[test]
    fn test_present_with_match_emits_nothing() {
        let leaves = strings(&["router bgp 65000"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&["router bgp \\d+"]),
            &[],
            DesiredState::Present,
            false,
        )
        .unwrap();
        assert!(plan.change_set.is_empty());
    }

    #[test]
    fn test_absent_with_match_expands_positional_groups() {
        let leaves = strings(&["hostname r1", "router bgp 65000"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&[r"router bgp (\d+)"]),
            &strings(&[r"no router bgp \1"]),
            DesiredState::Absent,
            false,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["no router bgp 65000"]);
    }

    #[test]
    fn test_forced_always_emits() {
        let leaves = strings(&["logging host 10.0.0.1"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&[r"logging host (\S+)"]),
            &strings(&[r"logging host \1"]),
            DesiredState::Present,
            true,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["logging host 10.0.0.1"]);
    }

    #[test]
    fn test_missing_replacement_defaults_to_search() {
        let plan = plan_substitution::<String>(
            &[],
            &strings(&["feature bgp", "feature ospf"]),
            &strings(&["feature bgp"]),
            DesiredState::Present,
            false,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["feature bgp", "feature ospf"]);
    }

    #[test]
    fn test_first_matching_leaf_wins() {
        let leaves = strings(&["vlan 10", "vlan 20"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&[r"vlan (\d+)"]),
            &strings(&[r"no vlan \1"]),
            DesiredState::Absent,
            false,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["no vlan 10"]);
    }

    #[test]
    fn test_unknown_group_is_error() {
        let leaves = strings(&["router bgp 65000"]);
        let err = plan_substitution(
            &leaves,
            &strings(&[r"router bgp (\d+)"]),
            &strings(&[r"no router bgp \2"]),
            DesiredState::Absent,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PlanningError::UnknownGroup { group: 2, .. }));
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let leaves = strings(&["ntp server 1.1.1.1"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&[r"ntp server (\S+)( prefer)?"]),
            &strings(&[r"no ntp server \1\2"]),
            DesiredState::Absent,
            false,
        )
        .unwrap();
        assert_eq!(plan.change_set.texts(), vec!["no ntp server 1.1.1.1"]);
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let err = plan_substitution::<String>(&[], &strings(&["(oops"]), &[], DesiredState::Present, false).unwrap_err();
        assert!(matches!(err, PlanningError::InvalidPattern { .. }));
    }

    #[test]
    fn test_named_fields_resolve_from_captures() {
        let leaves = strings(&["router bgp 65000"]);
        let plan = plan_substitution(
            &leaves,
            &strings(&[r"router bgp (?P<asn>\d+)"]),
            &strings(&["neighbor 10.0.0.1 remote-as {asn}"]),
            DesiredState::Present,
            true,
        )
        .unwrap();

        let commands = CommandList::from(strings(&["router bgp {asn}", "neighbor 10.0.0.1 remote-as {asn}"]));
        let resolved = resolve_named(&commands, &plan.captures).unwrap();
        assert_eq!(
            resolved.into_vec(),
            strings(&["router bgp 65000", "neighbor 10.0.0.1 remote-as 65000"])
        );
    }

    #[test]
    fn test_earliest_capture_wins() {
        let first = NamedCaptures {
            groups: vec![("vrf".to_string(), "blue".to_string())],
        };
        let second = NamedCaptures {
            groups: vec![("vrf".to_string(), "red".to_string())],
        };
        let commands = CommandList::from(strings(&["vrf context {vrf}"]));
        let resolved = resolve_named(&commands, &[first, second]).unwrap();
        assert_eq!(resolved.into_vec(), strings(&["vrf context blue"]));
    }

    #[test]
    fn test_unresolved_field_is_error() {
        let commands = CommandList::from(strings(&["vrf context {vrf}"]));
        let err = resolve_named(&commands, &[]).unwrap_err();
        assert_eq!(
            err,
            PlanningError::UnresolvedField {
                field: "vrf".to_string(),
                command: "vrf context {vrf}".to_string(),
            }
        );
    }

    #[test]
    fn test_escaped_and_structural_braces_pass_through() {
        let commands = CommandList::from(strings(&["banner {{motd}}", "system {", "}", "a { b } c"]));
        let resolved = resolve_named(&commands, &[]).unwrap();
        assert_eq!(
            resolved.into_vec(),
            strings(&["banner {motd}", "system {", "}", "a { b } c"])
        );
    }
}
