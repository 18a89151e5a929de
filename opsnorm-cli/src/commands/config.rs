//! `opsnorm config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use opsnorm_core::config::OpsnormConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::normalize::load_registry;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: [&str; 5] = ["general", "pipeline", "metrics", "output", "receivers"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => {
            let report = validate(config_path).await;
            writer.render(&report)?;
            if !report.valid {
                return Err(CliError::Config("configuration is invalid".to_owned()));
            }
            Ok(())
        }
        ConfigAction::Show { section } => {
            let config = OpsnormConfig::load(config_path).await?;
            let report = show(&config, config_path, section.as_deref())?;
            writer.render(&report)
        }
    }
}

/// Load the file (env overrides included), validate it, and check that
/// every receiver type resolves against built-ins plus `rule_dir`.
pub async fn validate(config_path: &Path) -> ConfigValidationReport {
    info!(path = %config_path.display(), "validating configuration");

    let mut report = ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: false,
        receivers: 0,
        errors: Vec::new(),
    };

    let config = match OpsnormConfig::load(config_path).await {
        Ok(config) => config,
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    report.receivers = config.receivers.len();

    let rule_dir = (!config.pipeline.rule_dir.is_empty())
        .then(|| Path::new(&config.pipeline.rule_dir));
    match load_registry(rule_dir).await {
        Ok(registry) => {
            for receiver in &config.receivers {
                if !registry.contains(&receiver.kind) {
                    report.errors.push(format!(
                        "receiver '{}': unknown type '{}'",
                        receiver.name, receiver.kind
                    ));
                }
            }
        }
        Err(e) => report.errors.push(e.to_string()),
    }

    report.valid = report.errors.is_empty();
    report
}

/// Render the effective configuration, optionally one section only.
pub fn show(
    config: &OpsnormConfig,
    config_path: &Path,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let serialized = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("pipeline") => toml::to_string_pretty(&config.pipeline),
        Some("metrics") => toml::to_string_pretty(&config.metrics),
        Some("output") => toml::to_string_pretty(&config.output),
        Some("receivers") => {
            #[derive(Serialize)]
            struct Receivers<'a> {
                receivers: &'a [opsnorm_core::config::ReceiverConfig],
            }
            toml::to_string_pretty(&Receivers {
                receivers: &config.receivers,
            })
        }
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml: serialized
            .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))?,
    })
}

/// Effective configuration.
///
/// JSON output carries only the metadata; the TOML body is for text output.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.section {
            Some(section) => writeln!(
                w,
                "Configuration {} (source: {})",
                format!("[{section}]").bold(),
                self.source
            )?,
            None => writeln!(w, "Configuration (source: {})", self.source.bold())?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)
    }
}

/// Validation result.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    pub receivers: usize,
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;
        if self.valid {
            writeln!(w, "  Result: {} ({} receiver(s))", "VALID".green().bold(), self.receivers)?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }
        Ok(())
    }
}
