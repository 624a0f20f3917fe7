//! Reconcile pipeline
//!
//! fetch → parse → plan → assemble → (snapshot) → execute. Everything up to
//! the executor is pure; a planning error therefore never leaves the device
//! half-configured.

use crate::assembler::{assemble_with, CommandList};
use crate::backup_manager::BackupManager;
use crate::error::{PlanningError, ReconcileError};
use crate::executor::Executor;
use crate::options::{plan_options, SystemOptions};
use crate::parser::Parser;
use crate::planner::{plan, Change, ChangeSet};
use crate::set_lines::plan_set_lines;
use crate::source::ConfigSource;
use crate::strategy::{DesiredState, Encoding, MatchStrategy};
use crate::substitution::{plan_substitution, resolve_named};
use crate::tree::{ConfigTree, ParseError};
use serde::Serialize;

/// What the device should end up containing
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Rendered configuration text, parsed like the running configuration
    Text(String),
    /// Lines nested under the request's parent path
    Lines(Vec<String>),
    /// Search/replacement pairs checked against the leaves of the current scope
    Substitution {
        search: Vec<String>,
        replace: Vec<String>,
        state: DesiredState,
    },
}

/// One reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub candidate: Candidate,
    /// Ancestor path of the scope being reconciled; empty for the whole tree
    pub parents: Vec<String>,
    pub strategy: MatchStrategy,
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub encoding: Encoding,
    pub dry_run: bool,
    pub include_defaults: bool,
}

impl Request {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            parents: Vec::new(),
            strategy: MatchStrategy::default(),
            before: Vec::new(),
            after: Vec::new(),
            encoding: Encoding::default(),
            dry_run: false,
            include_defaults: false,
        }
    }

    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_before(mut self, before: Vec<String>) -> Self {
        self.before = before;
        self
    }

    pub fn with_after(mut self, after: Vec<String>) -> Self {
        self.after = after;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn include_defaults(mut self, include_defaults: bool) -> Self {
        self.include_defaults = include_defaults;
        self
    }

    /// Reject input combinations that have no meaning together
    pub fn validate(&self) -> Result<(), PlanningError> {
        if let Candidate::Substitution { .. } = self.candidate {
            if !matches!(self.strategy, MatchStrategy::Line | MatchStrategy::Force) {
                return Err(PlanningError::Conflict {
                    first: "replace".to_string(),
                    second: format!("match {}", self.strategy),
                });
            }
        }
        Ok(())
    }

    /// Whether the running configuration must be read to plan this request
    fn reads_current(&self) -> bool {
        matches!(self.candidate, Candidate::Substitution { .. }) || self.strategy.reads_current()
    }
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub dry_run: bool,
    pub commands: CommandList,
    pub change_set: ChangeSet,
    pub parse_errors: Vec<ParseError>,
    pub backup_id: Option<String>,
}

/// Runs requests against one source and one executor
pub struct Reconciler<'a> {
    source: &'a dyn ConfigSource,
    executor: &'a dyn Executor,
    parser: Parser,
    backups: Option<&'a mut BackupManager>,
}

impl<'a> Reconciler<'a> {
    pub fn new(source: &'a dyn ConfigSource, executor: &'a dyn Executor) -> Self {
        Self {
            source,
            executor,
            parser: Parser::default(),
            backups: None,
        }
    }

    pub fn with_parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    /// Snapshot the running configuration before anything is applied
    pub fn with_backups(mut self, backups: &'a mut BackupManager) -> Self {
        self.backups = Some(backups);
        self
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn reconcile(&mut self, request: &Request) -> Result<Outcome, ReconcileError> {
        request.validate()?;

        let running = if request.reads_current() {
            Some(self.source.fetch(request.include_defaults)?)
        } else {
            tracing::debug!("force strategy, running configuration not read");
            None
        };
        let current = running
            .as_deref()
            .map(|text| self.parser.parse(text))
            .unwrap_or_default();
        let mut parse_errors = current.errors().to_vec();
        let current_scope = current.scope(&request.parents);

        let (change_set, captures) = match &request.candidate {
            Candidate::Substitution { search, replace, state } => {
                let leaves: Vec<&str> = current_scope.iter().map(|s| s.text()).collect();
                let forced = request.strategy == MatchStrategy::Force;
                let planned = plan_substitution(&leaves, search, replace, *state, forced)?;
                (planned.change_set, Some(planned.captures))
            }
            Candidate::Text(text) => {
                let candidate = self.parser.parse(text);
                parse_errors.extend(candidate.errors().iter().cloned());
                let changes = plan(candidate.scope(&request.parents), current_scope, request.strategy);
                (changes, None)
            }
            Candidate::Lines(lines) => {
                let candidate = ConfigTree::from_block(&request.parents, lines);
                let changes = plan(candidate.scope(&request.parents), current_scope, request.strategy);
                (changes, None)
            }
        };

        let mut commands = assemble_with(
            &change_set,
            &request.parents,
            &request.before,
            &request.after,
            &request.encoding,
        );
        if let Some(captures) = captures {
            commands = resolve_named(&commands, &captures)?;
        }

        self.finish(change_set, commands, parse_errors, running.as_deref(), request.dry_run)
    }

    /// Plan declarative system options against the running configuration
    pub fn reconcile_options(&mut self, options: &SystemOptions, dry_run: bool) -> Result<Outcome, ReconcileError> {
        let running = self.source.fetch(false)?;
        let planned = plan_options(options, &running)?;
        let change_set = ChangeSet::from_entries(planned.iter().map(Change::leaf).collect());
        let commands = CommandList::from(planned);
        self.finish(change_set, commands, Vec::new(), Some(&running), dry_run)
    }

    /// Plan flat `set`/`delete` lines against the running tree
    pub fn reconcile_set_lines<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        action: &str,
        dry_run: bool,
    ) -> Result<Outcome, ReconcileError> {
        let running = self.source.fetch(false)?;
        let current = self.parser.parse(&running);
        let change_set = plan_set_lines(lines, &current, action);
        let commands = CommandList::from(change_set.texts().into_iter().map(str::to_string).collect::<Vec<_>>());
        self.finish(change_set, commands, current.errors().to_vec(), Some(&running), dry_run)
    }

    fn finish(
        &mut self,
        change_set: ChangeSet,
        commands: CommandList,
        parse_errors: Vec<ParseError>,
        running: Option<&str>,
        dry_run: bool,
    ) -> Result<Outcome, ReconcileError> {
        let mut backup_id = None;

        if !dry_run && !commands.is_empty() {
            if let (Some(backups), Some(running)) = (self.backups.as_deref_mut(), running) {
                let id = backups
                    .snapshot(&self.source.describe(), running, commands.commands())
                    .map_err(ReconcileError::Backup)?;
                backup_id = Some(id);
            }
            self.executor.execute(commands.commands())?;
        }

        let outcome = Outcome {
            changed: !commands.is_empty(),
            dry_run,
            commands,
            change_set,
            parse_errors,
            backup_id,
        };

        tracing::info!(
            changed = outcome.changed,
            dry_run = outcome.dry_run,
            commands = outcome.commands.len(),
            parse_errors = outcome.parse_errors.len(),
            "reconcile finished"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::executor::RecordingExecutor;
    use crate::source::TextSource;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Source that counts how often it was read
    struct CountingSource {
        text: String,
        reads: Cell<usize>,
    }

    impl ConfigSource for CountingSource {
        fn fetch(&self, _include_defaults: bool) -> Result<String, crate::error::SourceError> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.text.clone())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_changes_are_applied() {
        let source = TextSource::new("hostname r1\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r1\nip domain-name lab\n".to_string()));

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.commands.commands(), strings(&["ip domain-name lab"]).as_slice());
        assert_eq!(executor.applied(), strings(&["ip domain-name lab"]));
    }

    #[test]
    fn test_dry_run_skips_executor() {
        let source = TextSource::new("");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r2\n".to_string())).dry_run(true);

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert!(outcome.changed);
        assert!(outcome.dry_run);
        assert!(executor.applied().is_empty());
    }

    #[test]
    fn test_force_does_not_fetch() {
        let source = CountingSource {
            text: "hostname r1\n".to_string(),
            reads: Cell::new(0),
        };
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r1\n".to_string())).with_strategy(MatchStrategy::Force);

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert_eq!(source.reads.get(), 0);
        assert_eq!(outcome.commands.commands(), strings(&["hostname r1"]).as_slice());
    }

    #[test]
    fn test_lines_under_parents_with_brackets() {
        let source = TextSource::new("ip access-list test\n 10 permit ip any any\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Lines(strings(&["10 permit ip any any", "20 deny ip any any"])))
            .with_parents(strings(&["ip access-list test"]))
            .with_strategy(MatchStrategy::Exact)
            .with_before(strings(&["no ip access-list test"]))
            .dry_run(true);

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert_eq!(
            outcome.commands.into_vec(),
            strings(&[
                "no ip access-list test",
                "ip access-list test",
                "10 permit ip any any",
                "20 deny ip any any",
            ])
        );
    }

    #[test]
    fn test_substitution_with_named_fields_in_parents() {
        let source = TextSource::new("router bgp 65000\n neighbor 10.0.0.1 remote-as 1\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Substitution {
            search: strings(&[r"^router bgp (?P<asn>\d+)"]),
            replace: strings(&["router bgp {asn}"]),
            state: DesiredState::Present,
        })
        .with_strategy(MatchStrategy::Force)
        .with_after(strings(&["! asn {asn}"]))
        .dry_run(true);

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert_eq!(
            outcome.commands.into_vec(),
            strings(&["router bgp 65000", "! asn 65000"])
        );
    }

    #[test]
    fn test_substitution_conflicts_with_block_strategy() {
        let source = TextSource::new("");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Substitution {
            search: strings(&["a"]),
            replace: Vec::new(),
            state: DesiredState::Present,
        })
        .with_strategy(MatchStrategy::Block);

        let err = Reconciler::new(&source, &executor).reconcile(&request).unwrap_err();
        assert!(matches!(err, ReconcileError::Planning(PlanningError::Conflict { .. })));
    }

    #[test]
    fn test_execution_error_is_propagated() {
        let source = TextSource::new("");
        let executor = RecordingExecutor::failing_at(1);
        let request = Request::new(Candidate::Text("a\nb\nc\n".to_string()));

        let err = Reconciler::new(&source, &executor).reconcile(&request).unwrap_err();
        match err {
            ReconcileError::Execution(ExecutionError { index, command, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(command, "b");
            }
            other => panic!("Expected execution error, got {:?}", other),
        }
        assert_eq!(executor.applied(), strings(&["a"]));
    }

    #[test]
    fn test_parse_errors_are_reported() {
        let source = TextSource::new("interface lo0\n    shutdown\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r1\n".to_string())).dry_run(true);

        let outcome = Reconciler::new(&source, &executor).reconcile(&request).unwrap();
        assert_eq!(outcome.parse_errors.len(), 1);
    }

    #[test]
    fn test_snapshot_taken_before_apply() {
        let temp_dir = TempDir::new().unwrap();
        let mut backups = BackupManager::with_directory(temp_dir.path().join("backups")).unwrap();
        let source = TextSource::new("hostname r1\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r2\n".to_string()));

        let outcome = Reconciler::new(&source, &executor)
            .with_backups(&mut backups)
            .reconcile(&request)
            .unwrap();

        let id = outcome.backup_id.unwrap();
        assert_eq!(backups.read_snapshot(&id).unwrap(), "hostname r1\n");
    }

    #[test]
    fn test_no_snapshot_without_changes() {
        let temp_dir = TempDir::new().unwrap();
        let mut backups = BackupManager::with_directory(temp_dir.path().join("backups")).unwrap();
        let source = TextSource::new("hostname r1\n");
        let executor = RecordingExecutor::new();
        let request = Request::new(Candidate::Text("hostname r1\n".to_string()));

        let outcome = Reconciler::new(&source, &executor)
            .with_backups(&mut backups)
            .reconcile(&request)
            .unwrap();
        assert!(outcome.backup_id.is_none());
        assert!(backups.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_options_and_set_lines_go_through_executor() {
        let source = TextSource::new("set system host-name 'r1'\n");
        let executor = RecordingExecutor::new();
        let options = SystemOptions {
            hostname: Some("r2".to_string()),
            ..Default::default()
        };
        let mut reconciler = Reconciler::new(&source, &executor);
        let outcome = reconciler.reconcile_options(&options, false).unwrap();
        assert_eq!(outcome.change_set.texts(), vec!["set system host-name r2"]);

        let outcome = reconciler
            .reconcile_set_lines(&["set system ntp server 1.1.1.1"], "set", false)
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(
            executor.applied(),
            strings(&["set system host-name r2", "set system ntp server 1.1.1.1"])
        );
    }

    #[test]
    fn test_set_lines_against_flat_running_text() {
        let source = TextSource::new("set system host-name 'r1'\nset system ntp server 1.1.1.1\n");
        let executor = RecordingExecutor::new();
        let mut reconciler = Reconciler::new(&source, &executor);

        let outcome = reconciler
            .reconcile_set_lines(
                &["set system ntp server 1.1.1.1", "delete system host-name", "system time-zone UTC"],
                "set",
                false,
            )
            .unwrap();
        assert_eq!(
            outcome.commands.into_vec(),
            strings(&["delete system host-name", "set system time-zone UTC"])
        );
    }
}
