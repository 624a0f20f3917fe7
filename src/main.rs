use anyhow::{Context, Result};
use netconverge::cli::{parse_args, Args, CandidateInput, DeviceFlags, LayoutFlags};
use netconverge::config::{self, Config};
use netconverge::diff_formatter::DiffFormatter;
use netconverge::kv::{diff_kv, merge_updates, KvTree};
use netconverge::source::fetch_kv;
use netconverge::logger;
use netconverge::reconcile::{Candidate, Outcome, Reconciler, Request};
use netconverge::{
    BackupManager, CommandSource, ConfigSource, DesiredState, Encoding, Executor, FileSource,
    LineClassifier, MatchStrategy, Parser, ProcessExecutor, RecordingExecutor, ScriptExecutor,
    SystemOptions,
};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::Command;

fn main() -> Result<()> {
    let invocation = parse_args()?;

    let config = config::load_config()?;
    config::validate_config(&config).context("Invalid ~/.netconverge/config.toml")?;

    let settings = logger::LogSettings::resolve(&config.logging, invocation.debug, invocation.verbose);
    if let Some(path) = logger::init_logging(&settings)? {
        tracing::info!(log = %path.display(), "netconverge started");
    }

    match invocation.args {
        Args::Reconcile {
            candidate,
            parents,
            strategy,
            before,
            after,
            layout,
            encoding,
            set_action,
            device,
        } => {
            let strategy = match strategy {
                Some(name) => name.parse::<MatchStrategy>()?,
                None => config.strategy()?,
            };
            let encoding = resolve_encoding(&config, encoding, set_action)?;
            let candidate = load_candidate(candidate)?;

            let request = Request::new(candidate)
                .with_parents(parents)
                .with_strategy(strategy)
                .with_before(before)
                .with_after(after)
                .with_encoding(encoding)
                .dry_run(!device.exec)
                .include_defaults(device.include_defaults);

            let parser = build_parser(&config, &layout);
            run_device(&config, &device, parser, |reconciler| reconciler.reconcile(&request))?;
        }
        Args::Tree { file, layout, json } => {
            let text = read_input(&file)?;
            let parser = build_parser(&config, &layout);
            let tree = parser.parse(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&tree).context("Failed to serialize tree")?);
            } else {
                print!("{}", DiffFormatter::format_tree(&tree, parser.classifier().indent().max(2)));
            }
        }
        Args::Updates {
            candidate,
            running,
            merged,
            json,
        } => {
            show_updates(&candidate, &running, merged, json)?;
        }
        Args::System { options, device } => {
            let options = SystemOptions::load(&options)?;
            let parser = build_parser(&config, &LayoutFlags::default());
            let dry_run = !device.exec;
            run_device(&config, &device, parser, |reconciler| {
                reconciler.reconcile_options(&options, dry_run)
            })?;
        }
        Args::SetLines {
            file,
            action,
            layout,
            device,
        } => {
            let text = read_input(&file)?;
            let lines: Vec<&str> = text.lines().collect();
            let parser = build_parser(&config, &layout);
            let dry_run = !device.exec;
            run_device(&config, &device, parser, |reconciler| {
                reconciler.reconcile_set_lines(&lines, &action, dry_run)
            })?;
        }
        Args::History { show } => {
            let manager = backup_manager(&config, None)?;
            match show {
                Some(id) => print!("{}", manager.read_snapshot(&manager.resolve_id(&id)?)?),
                None => println!("{}", DiffFormatter::format_history(&manager.list_backups()?)),
            }
        }
        Args::Config { show, log_path } => {
            edit_config(&config, show, log_path)?;
        }
    }

    Ok(())
}

fn resolve_encoding(config: &Config, encoding: Option<String>, set_action: Option<String>) -> Result<Encoding> {
    let encoding = match encoding {
        Some(name) => name.parse::<Encoding>()?,
        None => config.encoding()?,
    };
    Ok(match (encoding, set_action) {
        (Encoding::Set { .. }, Some(action)) => Encoding::Set { action },
        (encoding, _) => encoding,
    })
}

/// Parser from the config file, with command-line overrides
fn build_parser(config: &Config, layout: &LayoutFlags) -> Parser {
    if layout.indent.is_none() && layout.noop_markers.is_empty() {
        return config.parser();
    }

    let indent = layout.indent.or(config.parser.indent).unwrap_or(1);
    let mut classifier = LineClassifier::new(indent);
    if !layout.noop_markers.is_empty() {
        classifier = classifier.with_markers(layout.noop_markers.iter().cloned());
    } else if let Some(markers) = &config.parser.noop_markers {
        classifier = classifier.with_markers(markers.iter().cloned());
    }
    if let Some(prefixes) = &config.parser.comment_prefixes {
        classifier = classifier.with_comment_prefixes(prefixes.iter().cloned());
    }
    Parser::new(classifier)
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(file).with_context(|| format!("Failed to read file: {}", file))
}

fn load_candidate(input: CandidateInput) -> Result<Candidate> {
    Ok(match input {
        CandidateInput::File(path) => Candidate::Text(
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read candidate: {}", path.display()))?,
        ),
        CandidateInput::Stdin => Candidate::Text(read_input("-")?),
        CandidateInput::Lines(lines) => Candidate::Lines(lines),
        CandidateInput::Substitution { search, replace, state } => Candidate::Substitution {
            search,
            replace,
            state: state.parse::<DesiredState>()?,
        },
    })
}

fn build_source(device: &DeviceFlags) -> Result<Box<dyn ConfigSource>> {
    if let Some(path) = &device.running {
        return Ok(Box::new(FileSource::new(path)));
    }
    if let Some(line) = &device.running_cmd {
        let mut source = CommandSource::from_command_line(line)?;
        if let Some(arg) = &device.defaults_arg {
            source = source.with_defaults_arg(arg.clone());
        }
        return Ok(Box::new(source));
    }
    anyhow::bail!(
        "No running configuration source.\n\n\
         Possible fixes:\n\
         1. Pass a saved configuration: --running running.cfg\n\
         2. Pass a command that prints it: --running-cmd 'ssh r1 show running-config'"
    )
}

fn build_executor(device: &DeviceFlags) -> Result<Box<dyn Executor>> {
    if !device.exec {
        return Ok(Box::new(RecordingExecutor::new()));
    }
    if let Some(line) = &device.apply_cmd {
        let executor = ProcessExecutor::from_command_line(line)
            .map_err(|e| anyhow::anyhow!("Invalid --apply-cmd '{}': {}", line, e))?;
        return Ok(Box::new(executor));
    }
    if let Some(path) = &device.output {
        return Ok(Box::new(ScriptExecutor::new(path)));
    }
    anyhow::bail!("--exec needs somewhere to send commands: use --apply-cmd CMD or --output FILE")
}

fn backup_manager(config: &Config, dir_override: Option<&str>) -> Result<BackupManager> {
    let dir = dir_override.map(str::to_string).or_else(|| config.backup.backup_dir.clone());
    let manager = match dir {
        Some(dir) => BackupManager::with_directory(dir)?,
        None => BackupManager::new()?,
    };
    Ok(manager.with_max_backups(config.backup.max_backups.unwrap_or(netconverge::backup_manager::DEFAULT_MAX_BACKUPS)))
}

/// Build source, executor and optional snapshots, run one pass and print the outcome
fn run_device<F>(config: &Config, device: &DeviceFlags, parser: Parser, pass: F) -> Result<()>
where
    F: FnOnce(&mut Reconciler<'_>) -> Result<Outcome, netconverge::ReconcileError>,
{
    let source = build_source(device)?;
    let executor = build_executor(device)?;

    let backups_enabled = device.backup || config.backup.enabled.unwrap_or(false);
    let mut manager = if backups_enabled && device.exec {
        Some(backup_manager(config, device.backup_dir.as_deref())?)
    } else {
        None
    };

    let mut reconciler = Reconciler::new(source.as_ref(), executor.as_ref()).with_parser(parser);
    if let Some(manager) = manager.as_mut() {
        reconciler = reconciler.with_backups(manager);
    }

    let outcome = pass(&mut reconciler)?;
    print_outcome(&outcome, &source.describe(), device.json)
}

fn print_outcome(outcome: &Outcome, label: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome).context("Failed to serialize outcome")?);
    } else {
        print!("{}", DiffFormatter::format_outcome(outcome, label));
    }
    Ok(())
}

fn show_updates(candidate: &Path, running: &Path, merged: bool, json: bool) -> Result<()> {
    let candidate_tree = load_kv(candidate)?;
    let running_tree = load_kv(running)?;
    let updates = diff_kv(&candidate_tree, &running_tree);

    if merged {
        let document = merge_updates(&updates, &running_tree);
        println!("{}", serde_json::to_string_pretty(&document).context("Failed to serialize document")?);
    } else if json {
        println!("{}", serde_json::to_string_pretty(&updates).context("Failed to serialize updates")?);
    } else {
        print!("{}", DiffFormatter::format_updates(&updates));
    }
    Ok(())
}

fn load_kv(path: &Path) -> Result<KvTree> {
    Ok(fetch_kv(&FileSource::new(path))?)
}

fn edit_config(config: &Config, show: bool, log_path: bool) -> Result<()> {
    if log_path {
        println!("{}", logger::get_current_log_path(&config.logging).display());
        return Ok(());
    }

    let config_path = config::config_file_path()?;
    if !config_path.exists() {
        config::save_default_config()?;
    }

    if show {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        print!("{}", content);
        return Ok(());
    }

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .with_context(|| format!("Failed to start editor '{}'", editor))?;
    if !status.success() {
        anyhow::bail!("Editor '{}' exited with {}", editor, status);
    }

    let content = fs::read_to_string(&config_path)?;
    let edited: Config = toml::from_str(&content)
        .with_context(|| format!("Invalid TOML in {}", config_path.display()))?;
    config::validate_config(&edited)?;
    println!("Configuration saved: {}", config_path.display());
    Ok(())
}
