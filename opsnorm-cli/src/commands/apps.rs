//! `opsnorm apps` command handler

use std::io::Write;

use serde::Serialize;

use opsnorm_log_pipeline::AppKind;
use opsnorm_log_pipeline::rule::{ProcessorSpec, RuleSet};

use crate::cli::{AppsAction, AppsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `apps` command.
pub fn execute(args: AppsArgs, writer: &OutputWriter) -> Result<(), CliError> {
    match args.action {
        AppsAction::List => writer.render(&list()),
        AppsAction::Show { kind } => writer.render(&show(&kind)?),
    }
}

/// Every built-in integration.
pub fn list() -> AppListReport {
    AppListReport {
        apps: AppKind::ALL
            .iter()
            .map(|kind| AppEntry {
                kind: kind.as_str().to_owned(),
                description: kind.description().to_owned(),
                default_include_paths: kind
                    .default_include_paths()
                    .iter()
                    .map(|p| (*p).to_owned())
                    .collect(),
            })
            .collect(),
    }
}

/// One integration's declarative rule set.
pub fn show(kind: &str) -> Result<AppDetailReport, CliError> {
    let app: AppKind = kind.parse().map_err(|_| CliError::UnknownType {
        kind: kind.to_owned(),
        known: AppKind::ALL.map(|k| k.as_str()).join(", "),
    })?;
    Ok(AppDetailReport {
        kind: app.as_str().to_owned(),
        description: app.description().to_owned(),
        rule_set: app.rule_set(),
    })
}

#[derive(Serialize)]
pub struct AppListReport {
    pub apps: Vec<AppEntry>,
}

#[derive(Serialize)]
pub struct AppEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub default_include_paths: Vec<String>,
}

impl Render for AppListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Built-in integrations ({} total)", self.apps.len().to_string().bold())?;
        writeln!(w)?;
        writeln!(w, "{:<20} {}", "TYPE", "DESCRIPTION")?;
        writeln!(w, "{}", "-".repeat(80))?;
        for app in &self.apps {
            writeln!(w, "{:<20} {}", app.kind.green(), app.description)?;
            for path in &app.default_include_paths {
                writeln!(w, "{:<20}   {}", "", path.dimmed())?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct AppDetailReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub rule_set: RuleSet,
}

impl Render for AppDetailReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{} -- {}", self.kind.bold(), self.description)?;
        writeln!(w)?;
        writeln!(w, "Default include paths:")?;
        for path in &self.rule_set.include_paths {
            writeln!(w, "  {path}")?;
        }

        writeln!(w, "Multiline rules: {}", self.rule_set.multiline.len())?;
        for rule in &self.rule_set.multiline {
            writeln!(w, "  {} -> {}  {}", rule.state_name, rule.next_state, rule.pattern.dimmed())?;
        }

        writeln!(w, "Processors:")?;
        for (idx, spec) in self.rule_set.processors.iter().enumerate() {
            let summary = match spec {
                ProcessorSpec::ParseRegex { field, rules } => {
                    format!("parse_regex on '{field}' ({} rule(s))", rules.len())
                }
                ProcessorSpec::ParseJson { field, time_key, .. } => format!(
                    "parse_json on '{field}' (time key: {})",
                    time_key.as_deref().unwrap_or("-")
                ),
                ProcessorSpec::ModifyFields { rules } => {
                    format!("modify_fields ({} rule(s))", rules.len())
                }
            };
            writeln!(w, "  {}. {summary}", idx + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_has_every_builtin() {
        let report = list();
        let kinds: Vec<&str> = report.apps.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["couchdb", "elasticsearch_json", "elasticsearch_gc", "solr_system"]
        );
        assert!(report.apps.iter().all(|a| !a.default_include_paths.is_empty()));
    }

    #[test]
    fn list_json_uses_type_key() {
        let json = serde_json::to_value(list()).expect("serialize");
        assert_eq!(json["apps"][0]["type"], "couchdb");
    }

    #[test]
    fn show_known_app() {
        let report = show("solr_system").expect("known");
        assert_eq!(report.rule_set.name, "solr_system");
        assert_eq!(report.rule_set.multiline.len(), 2);

        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let out = String::from_utf8(buffer).expect("utf-8");
        assert!(out.contains("/var/solr/logs/solr.log"));
        assert!(out.contains("1. parse_regex on 'message'"));
        assert!(out.contains("2. modify_fields"));
    }

    #[test]
    fn show_unknown_app() {
        let err = show("nginx").err().expect("unknown");
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("elasticsearch_gc"));
    }
}
