//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// opsnorm -- application log normalization.
///
/// Use `opsnorm <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "opsnorm", version, about, long_about = None)]
pub struct Cli {
    /// Path to the opsnorm.toml configuration file.
    #[arg(short, long, default_value = "opsnorm.toml")]
    pub config: PathBuf,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    Text,
    /// Machine-readable JSON (JSON lines for `normalize`).
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize a log file (or stdin) through one integration's rules.
    Normalize(NormalizeArgs),

    /// Inspect the built-in integrations.
    Apps(AppsArgs),

    /// Validate custom YAML rule sets.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- normalize ----

/// One-shot normalization.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input file; `-` or omitted reads stdin.
    pub input: Option<PathBuf>,

    /// Receiver type (built-in integration or custom rule set name).
    #[arg(short = 't', long = "type")]
    pub kind: String,

    /// Receiver name recorded on every output record (default: the type).
    #[arg(long)]
    pub receiver: Option<String>,

    /// Directory of custom YAML rule sets.
    #[arg(long)]
    pub rule_dir: Option<PathBuf>,

    /// Maximum physical lines per logical record.
    #[arg(long, default_value_t = 1000)]
    pub max_lines: usize,

    /// Maximum bytes per logical record.
    #[arg(long, default_value_t = 512 * 1024)]
    pub max_bytes: usize,
}

// ---- apps ----

#[derive(Args, Debug)]
pub struct AppsArgs {
    #[command(subcommand)]
    pub action: AppsAction,
}

#[derive(Subcommand, Debug)]
pub enum AppsAction {
    /// List built-in integrations.
    List,
    /// Show one integration's rule set.
    Show {
        /// Receiver type name (e.g. `couchdb`).
        kind: String,
    },
}

// ---- rules ----

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// Load and compile every `*.yml`/`*.yaml` file in a directory.
    Validate {
        /// Directory containing YAML rule sets.
        #[arg(default_value = "/etc/opsnorm/rules")]
        path: PathBuf,
    },
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, pipeline, metrics, output, receivers).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn normalize_requires_type() {
        assert!(Cli::try_parse_from(["opsnorm", "normalize", "x.log"]).is_err());
    }

    #[test]
    fn normalize_defaults() {
        let cli = Cli::try_parse_from(["opsnorm", "normalize", "-t", "couchdb"])
            .expect("parse normalize");
        match cli.command {
            Commands::Normalize(args) => {
                assert_eq!(args.kind, "couchdb");
                assert!(args.input.is_none());
                assert!(args.receiver.is_none());
                assert_eq!(args.max_lines, 1000);
                assert_eq!(args.max_bytes, 512 * 1024);
            }
            other => panic!("expected normalize, got {other:?}"),
        }
    }

    #[test]
    fn global_output_after_subcommand() {
        let cli = Cli::try_parse_from(["opsnorm", "apps", "list", "--output", "json"])
            .expect("parse apps list");
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Apps(AppsArgs {
                action: AppsAction::List
            })
        ));
    }

    #[test]
    fn config_show_section() {
        let cli = Cli::try_parse_from(["opsnorm", "-c", "/tmp/o.toml", "config", "show", "--section", "pipeline"])
            .expect("parse config show");
        assert_eq!(cli.config, PathBuf::from("/tmp/o.toml"));
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("pipeline")),
            other => panic!("expected config show, got {other:?}"),
        }
    }

    #[test]
    fn rules_validate_default_dir() {
        let cli = Cli::try_parse_from(["opsnorm", "rules", "validate"]).expect("parse rules");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Validate { path },
            }) => assert_eq!(path, PathBuf::from("/etc/opsnorm/rules")),
            other => panic!("expected rules validate, got {other:?}"),
        }
    }
}
