use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser)]
#[command(name = "netconverge")]
#[command(about = "Plan the minimal commands that bring a device configuration in line")]
#[command(long_about = "netconverge compares a candidate configuration against a device's running
configuration and prints the ordered commands needed to converge them.

Nothing is applied unless --exec is given, together with --apply-cmd (run a
program once per command) or --output (write the commands to a file).

MATCH STRATEGIES:
  line   (default) Submit only statements missing from the running configuration
  block  Resubmit the whole scope when anything is missing
  exact  Like block, but also when order or extra statements differ
  strict Compare the top-level sequence position by position
  force  Always submit everything; the running configuration is not read

EXAMPLES:
  netconverge candidate.cfg -r running.cfg
      Preview commands for a rendered candidate
  netconverge -p 'ip access-list web' -l '10 permit tcp any any eq 443' -m exact -r running.cfg
      Reconcile a block of lines under a parent
  netconverge --search 'router bgp (\\d+)' --replace 'no router bgp \\1' --state absent -r running.cfg
      Remove whatever BGP process is configured
  netconverge candidate.cfg --running-cmd 'ssh r1 show running-config' --exec --apply-cmd 'ssh r1'
      Apply over ssh, one command per invocation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Candidate configuration file ('-' for stdin)
    #[arg(value_name = "CANDIDATE", conflicts_with_all = ["lines", "search"])]
    candidate: Option<String>,

    /// Candidate line, nested under --parent (repeatable)
    #[arg(short = 'l', long = "line", value_name = "TEXT", conflicts_with = "search")]
    lines: Vec<String>,

    /// Ancestor of the reconciled scope, outermost first (repeatable)
    #[arg(short = 'p', long = "parent", value_name = "TEXT")]
    parents: Vec<String>,

    /// Match strategy: line, block, exact, strict or force
    #[arg(short = 'm', long = "match", value_name = "STRATEGY")]
    strategy: Option<String>,

    /// Search expression checked against the current scope (repeatable)
    #[arg(long, value_name = "REGEX")]
    search: Vec<String>,

    /// Replacement for the search expression at the same position (repeatable)
    #[arg(long, value_name = "TEXT", requires = "search")]
    #[arg(help = "Replacement for the search expression at the same position (repeatable)\n\\N inserts capture group N; {name} inserts a named group")]
    replace: Vec<String>,

    /// Desired state for search expressions: present or absent
    #[arg(long, value_name = "STATE", default_value = "present", requires = "search")]
    state: String,

    /// Command sent before the planned commands, only when there are any (repeatable)
    #[arg(long, value_name = "TEXT")]
    before: Vec<String>,

    /// Command sent after the planned commands, only when there are any (repeatable)
    #[arg(long, value_name = "TEXT")]
    after: Vec<String>,

    #[command(flatten)]
    layout: LayoutFlags,

    /// Output encoding: hierarchical or set
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Keyword used by the set encoding
    #[arg(long, value_name = "WORD")]
    set_action: Option<String>,

    #[command(flatten)]
    device: DeviceFlags,

    /// Write a debug log (see 'netconverge config --log-path')
    #[arg(long, global = true)]
    debug: bool,

    /// Print planning decisions to stderr (and at debug level to the log file)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// How configuration text is split into statements
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct LayoutFlags {
    /// Whitespace characters per nesting level
    #[arg(long, value_name = "N")]
    pub indent: Option<usize>,

    /// Line skipped entirely, e.g. 'end' or '}' (repeatable)
    #[arg(long = "noop-marker", value_name = "TEXT")]
    pub noop_markers: Vec<String>,
}

/// Where running configuration comes from and where commands go
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DeviceFlags {
    /// Saved running configuration
    #[arg(short = 'r', long, value_name = "FILE", conflicts_with = "running_cmd")]
    pub running: Option<PathBuf>,

    /// Command whose output is the running configuration (quote arguments with spaces)
    #[arg(long, value_name = "CMD")]
    pub running_cmd: Option<String>,

    /// Argument appended to --running-cmd when defaults are included, e.g. 'all'
    #[arg(long, value_name = "ARG", requires = "running_cmd")]
    pub defaults_arg: Option<String>,

    /// Include default settings in the running configuration
    #[arg(long)]
    pub include_defaults: bool,

    /// Apply the planned commands (default is a dry run)
    #[arg(short = 'x', long)]
    pub exec: bool,

    /// Program run once per command when applying (quote arguments with spaces)
    #[arg(long, value_name = "CMD", requires = "exec", conflicts_with = "output")]
    pub apply_cmd: Option<String>,

    /// File the commands are written to when applying
    #[arg(short = 'o', long, value_name = "FILE", requires = "exec")]
    pub output: Option<PathBuf>,

    /// Snapshot the running configuration before applying
    #[arg(long)]
    pub backup: bool,

    /// Custom snapshot directory
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a configuration is parsed
    #[command(long_about = "Parse a configuration and print the statement tree.

Lines indented past their parent are reported as warnings.

EXAMPLES:
  netconverge tree running.cfg
  netconverge tree --indent 4 --noop-marker '}' junos.conf")]
    Tree {
        /// Configuration file ('-' for stdin)
        #[arg(value_name = "FILE", default_value = "-")]
        file: String,

        #[command(flatten)]
        layout: LayoutFlags,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare structured (JSON) configuration
    #[command(long_about = "Compare a candidate JSON document against the current one.

Each update is printed as 'path.key: new (old)'. Lists are compared without
regard to order.

EXAMPLES:
  netconverge updates candidate.json -r running.json
  netconverge updates candidate.json -r running.json --merged")]
    Updates {
        /// Candidate JSON document
        #[arg(value_name = "CANDIDATE")]
        candidate: PathBuf,

        /// Current JSON document
        #[arg(short = 'r', long, value_name = "FILE")]
        running: PathBuf,

        /// Print the current document with the updates applied
        #[arg(long)]
        merged: bool,

        /// Print the updates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plan system options (hostname, name servers, ...)
    #[command(long_about = "Plan declarative system options from a TOML file.

Recognised keys: hostname, timezone, domain_name, domain_search, name_servers,
gateway_address, ipv4_forwarding, reboot_on_panic, ctrl_alt_del_action.
domain_name and domain_search cannot be combined.

EXAMPLES:
  netconverge system options.toml -r running.txt")]
    System {
        /// TOML file with the desired options
        #[arg(value_name = "OPTIONS")]
        options: PathBuf,

        #[command(flatten)]
        device: DeviceFlags,
    },

    /// Plan flat 'set'/'delete' lines against a brace-structured configuration
    #[command(name = "set-lines")]
    #[command(long_about = "Compare flat 'set ...' and 'delete ...' lines against the running
configuration flattened the same way. Set lines already present and delete
lines for absent paths are dropped.

EXAMPLES:
  netconverge set-lines changes.set -r junos.conf --indent 4 --noop-marker '}'")]
    SetLines {
        /// File of set/delete lines ('-' for stdin)
        #[arg(value_name = "FILE")]
        file: String,

        /// Keyword of lines that add configuration
        #[arg(long, value_name = "WORD", default_value = "set")]
        action: String,

        #[command(flatten)]
        layout: LayoutFlags,

        #[command(flatten)]
        device: DeviceFlags,
    },

    /// Show running-configuration snapshots
    #[command(long_about = "List the snapshots taken before commands were applied.

EXAMPLES:
  netconverge history
  netconverge history --show 20250110-120000123-abc12345
  netconverge history --show last")]
    History {
        /// Print the running configuration stored in a snapshot ('last' for the newest)
        #[arg(long, value_name = "ID")]
        show: Option<String>,
    },

    /// Edit configuration file
    #[command(long_about = "Open ~/.netconverge/config.toml in $EDITOR and validate it.

CONFIGURATION OPTIONS:
  [parser]
    indent = 1                    # Whitespace characters per level
    noop_markers = [\"end\"]        # Lines skipped entirely
    comment_prefixes = [\"!\"]      # Comment line prefixes
  [planner]
    match = \"line\"                # Default match strategy
    encoding = \"hierarchical\"     # Or \"set\"
    set_action = \"set\"            # Keyword for the set encoding
  [backup]
    enabled = false               # Snapshot before applying
    max_backups = 50              # Snapshots kept
    backup_dir = \"/path\"          # Custom directory (optional)
  [logging]
    debug = false                 # Write a debug log
    file = \"/path\"                # Custom log file (optional)

EXAMPLES:
  netconverge config              Edit configuration
  netconverge config --show       Show current configuration")]
    Config {
        /// Show current configuration without editing
        #[arg(long = "show")]
        show: bool,

        /// Print where the debug log is written
        #[arg(long = "log-path")]
        log_path: bool,
    },
}

/// Source of the candidate for the default invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateInput {
    File(PathBuf),
    Stdin,
    Lines(Vec<String>),
    Substitution {
        search: Vec<String>,
        replace: Vec<String>,
        state: String,
    },
}

#[derive(Debug)]
pub enum Args {
    Reconcile {
        candidate: CandidateInput,
        parents: Vec<String>,
        strategy: Option<String>,
        before: Vec<String>,
        after: Vec<String>,
        layout: LayoutFlags,
        encoding: Option<String>,
        set_action: Option<String>,
        device: DeviceFlags,
    },
    Tree {
        file: String,
        layout: LayoutFlags,
        json: bool,
    },
    Updates {
        candidate: PathBuf,
        running: PathBuf,
        merged: bool,
        json: bool,
    },
    System {
        options: PathBuf,
        device: DeviceFlags,
    },
    SetLines {
        file: String,
        action: String,
        layout: LayoutFlags,
        device: DeviceFlags,
    },
    History {
        show: Option<String>,
    },
    Config {
        show: bool,
        log_path: bool,
    },
}

/// Parsed command line plus the logging switches shared by every command
#[derive(Debug)]
pub struct Invocation {
    pub args: Args,
    pub debug: bool,
    pub verbose: bool,
}

pub fn parse_args() -> Result<Invocation> {
    from_cli(Cli::parse())
}

fn from_cli(cli: Cli) -> Result<Invocation> {
    let args = match cli.command {
        Some(Commands::Tree { file, layout, json }) => Args::Tree { file, layout, json },
        Some(Commands::Updates {
            candidate,
            running,
            merged,
            json,
        }) => Args::Updates {
            candidate,
            running,
            merged,
            json,
        },
        Some(Commands::System { options, device }) => Args::System { options, device },
        Some(Commands::SetLines {
            file,
            action,
            layout,
            device,
        }) => Args::SetLines {
            file,
            action,
            layout,
            device,
        },
        Some(Commands::History { show }) => Args::History { show },
        Some(Commands::Config { show, log_path }) => Args::Config { show, log_path },
        None => {
            let candidate = if !cli.search.is_empty() {
                CandidateInput::Substitution {
                    search: cli.search,
                    replace: cli.replace,
                    state: cli.state,
                }
            } else if !cli.lines.is_empty() {
                CandidateInput::Lines(cli.lines)
            } else {
                match cli.candidate.as_deref() {
                    Some("-") => CandidateInput::Stdin,
                    Some(path) => CandidateInput::File(PathBuf::from(path)),
                    None => bail!(
                        "Missing candidate. Usage: netconverge CANDIDATE -r RUNNING, or use --line / --search"
                    ),
                }
            };

            Args::Reconcile {
                candidate,
                parents: cli.parents,
                strategy: cli.strategy,
                before: cli.before,
                after: cli.after,
                layout: cli.layout,
                encoding: cli.encoding,
                set_action: cli.set_action,
                device: cli.device,
            }
        }
    };

    Ok(Invocation {
        args,
        debug: cli.debug,
        verbose: cli.verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(argv: &[&str]) -> Result<Invocation> {
        let cli = Cli::try_parse_from(argv)?;
        from_cli(cli)
    }

    #[test]
    fn test_candidate_file_invocation() {
        let invocation = invoke(&["netconverge", "candidate.cfg", "-r", "running.cfg", "-m", "block"]).unwrap();
        match invocation.args {
            Args::Reconcile {
                candidate,
                strategy,
                device,
                ..
            } => {
                assert_eq!(candidate, CandidateInput::File(PathBuf::from("candidate.cfg")));
                assert_eq!(strategy.as_deref(), Some("block"));
                assert_eq!(device.running, Some(PathBuf::from("running.cfg")));
                assert!(!device.exec);
            }
            other => panic!("Expected Reconcile, got {:?}", other),
        }
    }

    #[test]
    fn test_lines_with_parents() {
        let invocation = invoke(&[
            "netconverge",
            "-p",
            "interface lo0",
            "-l",
            "description X",
            "-l",
            "no shutdown",
            "-r",
            "r.cfg",
        ])
        .unwrap();
        match invocation.args {
            Args::Reconcile { candidate, parents, .. } => {
                assert_eq!(
                    candidate,
                    CandidateInput::Lines(vec!["description X".to_string(), "no shutdown".to_string()])
                );
                assert_eq!(parents, vec!["interface lo0".to_string()]);
            }
            other => panic!("Expected Reconcile, got {:?}", other),
        }
    }

    #[test]
    fn test_search_and_replace() {
        let invocation = invoke(&[
            "netconverge",
            "--search",
            "router bgp (\\d+)",
            "--replace",
            "no router bgp \\1",
            "--state",
            "absent",
        ])
        .unwrap();
        match invocation.args {
            Args::Reconcile {
                candidate: CandidateInput::Substitution { search, replace, state },
                ..
            } => {
                assert_eq!(search.len(), 1);
                assert_eq!(replace, vec!["no router bgp \\1".to_string()]);
                assert_eq!(state, "absent");
            }
            other => panic!("Expected substitution, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_candidate_is_error() {
        assert!(invoke(&["netconverge", "-r", "running.cfg"]).is_err());
    }

    #[test]
    fn test_apply_cmd_requires_exec() {
        assert!(invoke(&["netconverge", "c.cfg", "--apply-cmd", "ssh r1"]).is_err());
        assert!(invoke(&["netconverge", "c.cfg", "--exec", "--apply-cmd", "ssh r1"]).is_ok());
    }

    #[test]
    fn test_subcommands_and_global_flags() {
        let invocation = invoke(&["netconverge", "history", "--debug", "--show", "abc"]).unwrap();
        assert!(invocation.debug);
        assert!(matches!(invocation.args, Args::History { show: Some(_) }));

        let invocation = invoke(&["netconverge", "set-lines", "changes.set", "-r", "j.conf", "--indent", "4"]).unwrap();
        match invocation.args {
            Args::SetLines { action, layout, .. } => {
                assert_eq!(action, "set");
                assert_eq!(layout.indent, Some(4));
            }
            other => panic!("Expected SetLines, got {:?}", other),
        }
    }
}
