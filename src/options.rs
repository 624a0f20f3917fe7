//! System option planner
//!
//! Declarative system options are turned into commands by an ordered table
//! of setters. Each setter sees the options and the running configuration
//! text and returns `None` when its option is not set.

use crate::error::PlanningError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtrlAltDelAction {
    Ignore,
    Reboot,
    Poweroff,
}

impl fmt::Display for CtrlAltDelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtrlAltDelAction::Ignore => f.write_str("ignore"),
            CtrlAltDelAction::Reboot => f.write_str("reboot"),
            CtrlAltDelAction::Poweroff => f.write_str("poweroff"),
        }
    }
}

/// Desired system options; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemOptions {
    pub hostname: Option<String>,
    pub timezone: Option<String>,
    pub domain_name: Option<String>,
    pub domain_search: Option<Vec<String>>,
    pub name_servers: Option<Vec<String>>,
    pub gateway_address: Option<String>,
    pub ipv4_forwarding: Option<bool>,
    pub reboot_on_panic: Option<bool>,
    pub ctrl_alt_del_action: Option<CtrlAltDelAction>,
}

impl SystemOptions {
    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse options file: {}", path.display()))
    }
}

/// Produces the commands for one option, or `None` when the option is unset
pub type OptionSetter = fn(&SystemOptions, &str) -> Option<Vec<String>>;

/// Setters in the order their commands are emitted
pub const SYSTEM_OPTIONS: &[(&str, OptionSetter)] = &[
    ("hostname", set_hostname),
    ("timezone", set_timezone),
    ("domain_name", set_domain_name),
    ("domain_search", set_domain_search),
    ("name_servers", set_name_servers),
    ("gateway_address", set_gateway_address),
    ("ipv4_forwarding", set_ipv4_forwarding),
    ("reboot_on_panic", set_reboot_on_panic),
    ("ctrl_alt_del_action", set_ctrl_alt_del_action),
];

/// Commands that bring `current` in line with `options`, in table order
pub fn plan_options(options: &SystemOptions, current: &str) -> Result<Vec<String>, PlanningError> {
    if options.domain_name.is_some() && options.domain_search.is_some() {
        return Err(PlanningError::Conflict {
            first: "domain_name".to_string(),
            second: "domain_search".to_string(),
        });
    }

    let mut commands = Vec::new();
    for (name, setter) in SYSTEM_OPTIONS {
        if let Some(emitted) = setter(options, current) {
            tracing::debug!(option = *name, commands = emitted.len(), "option setter");
            commands.extend(emitted);
        }
    }
    Ok(commands)
}

fn set_hostname(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let hostname = options.hostname.as_ref()?;
    Some(vec![format!("set system host-name {}", hostname)])
}

fn set_timezone(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let timezone = options.timezone.as_ref()?;
    Some(vec![format!("set system time-zone {}", timezone)])
}

fn set_domain_name(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let domain = options.domain_name.as_ref()?;
    Some(vec![
        "delete system domain-search".to_string(),
        format!("set system domain-name {}", domain),
    ])
}

fn set_domain_search(options: &SystemOptions, current: &str) -> Option<Vec<String>> {
    let wanted = options.domain_search.as_ref()?;
    let have = scrape(current, r"domain-search domain (\S+)");

    let mut commands = vec!["delete system domain-name".to_string()];
    commands.extend(list_diff(&have, wanted, "system domain-search domain"));
    Some(commands)
}

fn set_name_servers(options: &SystemOptions, current: &str) -> Option<Vec<String>> {
    let wanted = options.name_servers.as_ref()?;
    let have = scrape(current, r"name-server (\S+)");
    Some(list_diff(&have, wanted, "system name-server"))
}

fn set_gateway_address(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let gateway = options.gateway_address.as_ref()?;
    Some(vec![format!("set system gateway-address {}", gateway)])
}

fn set_ipv4_forwarding(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let enabled = options.ipv4_forwarding?;
    let action = if enabled { "delete" } else { "set" };
    Some(vec![format!("{} system ip disable-forwarding", action)])
}

fn set_reboot_on_panic(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let reboot = options.reboot_on_panic?;
    Some(vec![format!("set system options reboot-on-panic {}", reboot)])
}

fn set_ctrl_alt_del_action(options: &SystemOptions, _current: &str) -> Option<Vec<String>> {
    let action = options.ctrl_alt_del_action?;
    Some(vec![format!("set system options ctrl-alt-del-action {}", action)])
}

/// First capture group of every match of `pattern` in `text`, deduplicated
fn scrape(text: &str, pattern: &str) -> Vec<String> {
    let Ok(regex) = Regex::new(pattern) else {
        return Vec::new();
    };
    let mut found: Vec<String> = Vec::new();
    for caps in regex.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let value = m.as_str().trim_matches(|c| c == '\'' || c == '"').to_string();
            if !found.contains(&value) {
                found.push(value);
            }
        }
    }
    found
}

/// Remove unwanted values first, then add missing ones, each in stable order
fn list_diff(have: &[String], wanted: &[String], path: &str) -> Vec<String> {
    let mut commands = Vec::new();
    for value in have.iter().filter(|v| !wanted.contains(v)) {
        commands.push(format!("delete {} {}", path, value));
    }
    let mut added: Vec<&String> = Vec::new();
    for value in wanted.iter().filter(|v| !have.contains(v)) {
        if !added.contains(&value) {
            added.push(value);
            commands.push(format!("set {} {}", path, value));
        }
    }
    commands
}
