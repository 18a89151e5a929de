//! CLI argument definitions for opsnorm-daemon.

use std::path::PathBuf;

use clap::Parser;

/// opsnorm log normalization agent.
///
/// Tails the log files of the configured receivers, stitches multi-line
/// records, extracts and normalizes fields, and writes one JSON record
/// per line to the configured output.
#[derive(Parser, Debug)]
#[command(name = "opsnorm-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to opsnorm.toml configuration file.
    #[arg(short, long, default_value = "/etc/opsnorm/opsnorm.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and rule sets, then exit without starting.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut opsnorm_core::config::OpsnormConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsnorm_core::config::OpsnormConfig;

    #[test]
    fn defaults_point_at_system_config() {
        let cli = DaemonCli::parse_from(["opsnorm-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/opsnorm/opsnorm.toml"));
        assert!(!cli.validate);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = DaemonCli::parse_from([
            "opsnorm-daemon",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--pid-file",
            "",
        ]);
        let mut config = OpsnormConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert!(config.general.pid_file.is_empty());
    }

    #[test]
    fn no_overrides_keep_config() {
        let cli = DaemonCli::parse_from(["opsnorm-daemon", "-c", "/tmp/x.toml", "--validate"]);
        let mut config = OpsnormConfig::default();
        let before = config.general.log_level.clone();
        cli.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, before);
        assert!(cli.validate);
        assert_eq!(cli.config, PathBuf::from("/tmp/x.toml"));
    }
}
