//! `opsnorm normalize` command handler
//!
//! Runs one input through the same stitch -> extract -> modify path the
//! daemon uses, without tailing: the whole input is read, stitched, and
//! the final pending record is flushed at end of input.

use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use opsnorm_core::types::{LogRecord, Record, Value};
use opsnorm_log_pipeline::{CompiledRuleSet, RuleRegistry, RuleSetLoader};

use crate::cli::NormalizeArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `normalize` command.
pub async fn execute(args: NormalizeArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let registry = load_registry(args.rule_dir.as_deref()).await?;
    let rules = resolve(&registry, &args.kind)?;

    let (source, text) = read_input(args.input.as_deref()).await?;
    let receiver = args.receiver.unwrap_or_else(|| args.kind.clone());
    info!(receiver = %receiver, source = %source, bytes = text.len(), "normalizing input");

    let records = normalize_text(&rules, &receiver, &source, &text, args.max_lines, args.max_bytes);
    writer.render(&NormalizeReport { records })
}

/// Built-ins plus the rule sets under `rule_dir`, if given.
pub async fn load_registry(rule_dir: Option<&Path>) -> Result<RuleRegistry, CliError> {
    let mut registry = RuleRegistry::with_builtins()?;
    if let Some(dir) = rule_dir {
        for rule_set in RuleSetLoader::load_directory(dir).await? {
            registry.register(&rule_set)?;
        }
    }
    Ok(registry)
}

fn resolve(registry: &RuleRegistry, kind: &str) -> Result<CompiledRuleSet, CliError> {
    registry
        .resolve(kind, kind)
        .map_err(|_| CliError::UnknownType {
            kind: kind.to_owned(),
            known: registry.type_names().join(", "),
        })
}

async fn read_input(input: Option<&Path>) -> Result<(String, String), CliError> {
    match input {
        Some(path) if path != Path::new("-") => {
            let bytes = tokio::fs::read(path).await?;
            Ok((
                path.display().to_string(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        }
        _ => {
            let text = tokio::task::spawn_blocking(|| {
                let mut buf = Vec::new();
                std::io::stdin().read_to_end(&mut buf).map(|_| buf)
            })
            .await
            .map_err(|e| CliError::Command(format!("stdin reader failed: {e}")))??;
            Ok(("stdin".to_owned(), String::from_utf8_lossy(&text).into_owned()))
        }
    }
}

/// Stitch and process a whole text. `\r\n` line endings are accepted.
pub fn normalize_text(
    rules: &CompiledRuleSet,
    receiver: &str,
    source: &str,
    text: &str,
    max_lines: usize,
    max_bytes: usize,
) -> Vec<LogRecord> {
    let chain = rules.chain();
    rules
        .stitcher(max_lines, max_bytes)
        .stitch_all(text.lines())
        .into_iter()
        .map(|logical| chain.process(LogRecord::from_text(receiver, source, logical)))
        .collect()
}

/// Normalized records.
#[derive(Serialize)]
pub struct NormalizeReport {
    pub records: Vec<LogRecord>,
}

impl Render for NormalizeReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for (idx, record) in self.records.iter().enumerate() {
            if idx > 0 {
                writeln!(w)?;
            }
            writeln!(w, "{}", record.to_string().bold())?;
            write_fields(w, &record.fields, 1)?;
        }
        writeln!(w)?;
        writeln!(w, "{} record(s)", self.records.len())
    }

    fn render_json_lines(&self, w: &mut dyn Write) -> Result<Option<usize>, CliError> {
        for record in &self.records {
            serde_json::to_writer(&mut *w, record)?;
            writeln!(w)?;
        }
        Ok(Some(self.records.len()))
    }
}

fn write_fields(w: &mut dyn Write, fields: &Record, depth: usize) -> std::io::Result<()> {
    let indent = "  ".repeat(depth);
    for (key, value) in fields.iter() {
        match value {
            Value::Record(nested) => {
                writeln!(w, "{indent}{key}:")?;
                write_fields(w, nested, depth + 1)?;
            }
            Value::String(s) if s.contains('\n') => {
                writeln!(w, "{indent}{key}: |")?;
                for line in s.lines() {
                    writeln!(w, "{indent}  {line}")?;
                }
            }
            other => writeln!(w, "{indent}{key}: {other}")?,
        }
    }
    Ok(())
}
