use crate::backup_manager::BackupMetadata;
use crate::kv::Update;
use crate::reconcile::Outcome;
use crate::tree::{ConfigTree, ParseError};
use colored::*;
use std::io::IsTerminal;

pub struct DiffFormatter;

impl DiffFormatter {
    /// Auto-detect if we should use colors
    fn should_use_color() -> bool {
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }

        std::io::stdout().is_terminal()
    }

    /// Command preview or apply report for one reconciliation pass
    pub fn format_outcome(outcome: &Outcome, label: &str) -> String {
        Self::format_outcome_with(outcome, label, Self::should_use_color())
    }

    fn format_outcome_with(outcome: &Outcome, label: &str, use_color: bool) -> String {
        let mut output = String::new();

        let header = if outcome.dry_run { "Dry run:" } else { "Applied:" };
        if use_color {
            let header = if outcome.dry_run { header.bold().cyan() } else { header.bold().green() };
            output.push_str(&format!("{} {}\n\n", header, label.white().bold()));
        } else {
            output.push_str(&format!("{} {}\n\n", header, label));
        }

        output.push_str(&Self::format_parse_errors_with(&outcome.parse_errors, use_color));

        if !outcome.changed {
            output.push_str("Running configuration already converged; no commands needed.\n");
            return output;
        }

        let width = outcome.commands.len().to_string().len();
        for (index, command) in outcome.commands.iter().enumerate() {
            let number = format!("{:>width$}", index + 1, width = width);
            if use_color {
                output.push_str(&format!("{}  {}\n", number.dimmed(), command.green()));
            } else {
                output.push_str(&format!("{}  {}\n", number, command));
            }
        }

        let total = outcome.commands.len();
        let plural = if total == 1 { "" } else { "s" };
        if use_color {
            output.push_str(&format!(
                "\nTotal: {} command{} from {} planned statement{}\n",
                total.to_string().bold().white(),
                plural,
                outcome.change_set.len(),
                if outcome.change_set.len() == 1 { "" } else { "s" }
            ));
        } else {
            output.push_str(&format!(
                "\nTotal: {} command{} from {} planned statement{}\n",
                total,
                plural,
                outcome.change_set.len(),
                if outcome.change_set.len() == 1 { "" } else { "s" }
            ));
        }

        if let Some(id) = &outcome.backup_id {
            if use_color {
                output.push_str(&format!("{} {}\n", "Snapshot ID:".white(), id.yellow().bold()));
            } else {
                output.push_str(&format!("Snapshot ID: {}\n", id));
            }
        }

        if outcome.dry_run {
            if use_color {
                output.push_str(&"Apply with: ".white());
                output.push_str(&"--exec".bold().yellow());
                output.push('\n');
            } else {
                output.push_str("Apply with: --exec\n");
            }
        }

        output
    }

    /// Warnings for lines the parser could not attach to the tree
    pub fn format_parse_errors(errors: &[ParseError]) -> String {
        Self::format_parse_errors_with(errors, Self::should_use_color())
    }

    fn format_parse_errors_with(errors: &[ParseError], use_color: bool) -> String {
        let mut output = String::new();
        for error in errors {
            let context = if error.path.is_empty() {
                "top level".to_string()
            } else {
                error.path.join(" > ")
            };
            let line = format!(
                "Warning: line {}: '{}' is indented past its parent (under {})\n",
                error.line_number, error.text, context
            );
            if use_color {
                output.push_str(&line.yellow().to_string());
            } else {
                output.push_str(&line);
            }
        }
        if !errors.is_empty() {
            output.push('\n');
        }
        output
    }

    /// Structured updates as `path.key: new (old)`
    pub fn format_updates(updates: &[Update]) -> String {
        let use_color = Self::should_use_color();
        let mut output = String::new();

        if updates.is_empty() {
            output.push_str("No updates needed.\n");
            return output;
        }

        for update in updates {
            let indicator = if update.old.is_some() { "~" } else { "+" };
            if use_color {
                let indicator = if update.old.is_some() { indicator.yellow().bold() } else { indicator.green().bold() };
                output.push_str(&format!("{} {}\n", indicator, update));
            } else {
                output.push_str(&format!("{} {}\n", indicator, update));
            }
        }
        output.push_str(&format!("\nTotal: {} update{}\n", updates.len(), if updates.len() == 1 { "" } else { "s" }));
        output
    }

    /// Parsed tree, re-indented, followed by any parse warnings
    pub fn format_tree(tree: &ConfigTree, indent: usize) -> String {
        let use_color = Self::should_use_color();
        let mut output = String::new();
        for statement in tree.walk() {
            let pad = " ".repeat(statement.depth() * indent);
            if use_color && !statement.is_leaf() {
                output.push_str(&format!("{}{}\n", pad, statement.text().bold().cyan()));
            } else {
                output.push_str(&format!("{}{}\n", pad, statement.text()));
            }
        }
        if !tree.errors().is_empty() {
            output.push('\n');
            output.push_str(&Self::format_parse_errors_with(tree.errors(), use_color));
        }
        output
    }

    /// Format snapshot history
    pub fn format_history(backups: &[BackupMetadata]) -> String {
        let use_color = Self::should_use_color();
        let mut output = String::new();

        if backups.is_empty() {
            output.push_str("No snapshot history found.\n");
            return output;
        }

        if use_color {
            output.push_str(&"Snapshot History:\n\n".bold().white());
        } else {
            output.push_str("Snapshot History:\n\n");
        }

        for backup in backups {
            if use_color {
                output.push_str(&format!("ID: {}\n", backup.id.yellow()));
                output.push_str(&format!("  Time: {}\n", backup.timestamp.format("%Y-%m-%d %H:%M:%S")));
                output.push_str(&format!("  Source: {}\n", backup.source.cyan()));
            } else {
                output.push_str(&format!("ID: {}\n", backup.id));
                output.push_str(&format!("  Time: {}\n", backup.timestamp.format("%Y-%m-%d %H:%M:%S")));
                output.push_str(&format!("  Source: {}\n", backup.source));
            }
            output.push_str(&format!("  Commands: {}\n", backup.commands.len()));
            output.push('\n');
        }

        output
    }
}
