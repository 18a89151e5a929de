//! `opsnorm rules` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use opsnorm_log_pipeline::{CompiledRuleSet, RuleSetLoader};

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(args: RulesArgs, writer: &OutputWriter) -> Result<(), CliError> {
    match args.action {
        RulesAction::Validate { path } => {
            let report = validate_dir(&path).await?;
            writer.render(&report)?;
            if report.invalid > 0 {
                return Err(CliError::Rule(format!(
                    "{} of {} rule file(s) invalid",
                    report.invalid, report.total_files
                )));
            }
            Ok(())
        }
    }
}

/// Load and compile each YAML file on its own so every failure is reported.
pub async fn validate_dir(path: &Path) -> Result<RuleValidationReport, CliError> {
    info!(path = %path.display(), "validating rule sets");

    let files = RuleSetLoader::rule_files(path).await?;

    let mut report = RuleValidationReport {
        path: path.display().to_string(),
        total_files: files.len(),
        valid: 0,
        invalid: 0,
        rule_sets: Vec::new(),
        errors: Vec::new(),
    };

    for file in files {
        match check_file(&file).await {
            Ok(entry) => {
                report.valid += 1;
                report.rule_sets.push(entry);
            }
            Err(error) => {
                report.invalid += 1;
                report.errors.push(RuleFileError {
                    file: file.display().to_string(),
                    error,
                });
            }
        }
    }

    Ok(report)
}

async fn check_file(file: &Path) -> Result<RuleSetEntry, String> {
    let rule_set = RuleSetLoader::load_file(file)
        .await
        .map_err(|e| e.to_string())?;
    let compiled = CompiledRuleSet::compile(&rule_set).map_err(|e| e.to_string())?;
    Ok(RuleSetEntry {
        name: rule_set.name.clone(),
        file: file.display().to_string(),
        multiline: compiled.has_multiline(),
        processors: rule_set.processors.len(),
        shadows_builtin: RuleSetLoader::shadows_builtin(&rule_set),
    })
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub path: String,
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
    pub rule_sets: Vec<RuleSetEntry>,
    pub errors: Vec<RuleFileError>,
}

#[derive(Serialize)]
pub struct RuleSetEntry {
    pub name: String,
    pub file: String,
    pub multiline: bool,
    pub processors: usize,
    /// Built-in integrations win; this rule set would be ignored.
    pub shadows_builtin: bool,
}

#[derive(Serialize)]
pub struct RuleFileError {
    pub file: String,
    pub error: String,
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.path.bold())?;
        writeln!(
            w,
            "  Files: {} total, {} valid, {} invalid",
            self.total_files,
            self.valid.to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;

        for entry in &self.rule_sets {
            let note = if entry.shadows_builtin {
                " (ignored: built-in name)".yellow().to_string()
            } else {
                String::new()
            };
            writeln!(
                w,
                "  {:<24} {} processor(s), multiline: {}{}",
                entry.name, entry.processors, entry.multiline, note
            )?;
        }

        if !self.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors:")?;
            for e in &self.errors {
                writeln!(w, "  {}: {}", e.file.red(), e.error)?;
            }
        }
        Ok(())
    }
}
