//! Solr 시스템 로그 통합

use opsnorm_core::types::BODY_FIELD;

use super::{instrumentation_rule, severity_rule};
use crate::rule::types::{ExtractionRule, MultilineRule, ProcessorSpec, RuleSet, START_STATE};

/// receiver 타입 이름
pub const TYPE_NAME: &str = "solr_system";

/// 기본 로그 파일
pub const DEFAULT_INCLUDE_PATHS: &[&str] = &["/var/solr/logs/solr.log"];

const SYSTEM_PATTERN: &str = r"^(?<timestamp>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3,6})\s(?<level>[A-z]+)\s{1,5}\((?<thread>[^\)]+)\)\s\[c?:?(?<collection>[^\s]*)\ss?:?(?<shard>[^\s]*)\sr?:?(?<replica>[^\s]*)\sx?:?(?<core>[^\]]*)\]\s(?<source>[^\s]+)\s(?<message>(?:(?!\s=>)[\s\S])+)\s?=?>?(?<exception>[\s\S]*)";

const RECORD_START: &str = r"^\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3}\s[A-z]+\s{1,5}";

const SEVERITY_TABLE: &[(&str, &str)] = &[
    ("TRACE", "DEBUG"),
    ("DEBUG", "DEBUG"),
    ("INFO", "INFO"),
    ("WARN", "WARNING"),
    ("ERROR", "ERROR"),
    ("FATAL", "CRITICAL"),
];

/// Solr 규칙 집합
pub fn rule_set() -> RuleSet {
    RuleSet {
        name: TYPE_NAME.to_owned(),
        include_paths: DEFAULT_INCLUDE_PATHS.iter().map(|p| (*p).to_owned()).collect(),
        multiline: vec![
            MultilineRule::new(START_STATE, RECORD_START, "cont"),
            MultilineRule::new("cont", format!("^(?!{})", &RECORD_START[1..]), "cont"),
        ],
        processors: vec![
            ProcessorSpec::ParseRegex {
                field: BODY_FIELD.to_owned(),
                rules: vec![
                    ExtractionRule::new(SYSTEM_PATTERN)
                        .with_time("timestamp", "%Y-%m-%d %H:%M:%S.%L"),
                ],
            },
            ProcessorSpec::ModifyFields {
                rules: vec![severity_rule(SEVERITY_TABLE), instrumentation_rule(TYPE_NAME)],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::CompiledRuleSet;
    use opsnorm_core::types::{LogRecord, Severity, Value};

    fn normalize(lines: &[&str]) -> Vec<LogRecord> {
        let compiled = CompiledRuleSet::compile(&rule_set()).unwrap();
        let texts = compiled
            .stitcher(1000, 512 * 1024)
            .stitch_all(lines.iter().copied());
        let chain = compiled.chain();
        texts
            .into_iter()
            .map(|text| chain.process(LogRecord::from_text(TYPE_NAME, "solr.log", text)))
            .collect()
    }

    #[test]
    fn continuation_rule_is_negated_start() {
        let set = rule_set();
        assert_eq!(
            set.multiline[1].pattern,
            r"^(?!\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3}\s[A-z]+\s{1,5})"
        );
    }

    #[test]
    fn request_line() {
        let records = normalize(&[
            "2022-01-06 04:16:08.794 INFO  (qtp1489933928-64) [   x:gettingstarted] o.a.s.c.S.Request [gettingstarted]  webapp=/solr path=/get params={q=*:*&_=1641440398872} status=0 QTime=2",
        ]);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.severity(), Some(Severity::Info));
        assert_eq!(
            record.fields.get("thread"),
            Some(&Value::from("qtp1489933928-64"))
        );
        assert_eq!(
            record.fields.get("core"),
            Some(&Value::from("gettingstarted"))
        );
        assert_eq!(
            record.fields.get("source"),
            Some(&Value::from("o.a.s.c.S.Request"))
        );
        assert!(
            record
                .body()
                .is_some_and(|body| body.starts_with("[gettingstarted]  webapp=/solr"))
        );
        assert_eq!(
            record.timestamp.unwrap().to_rfc3339(),
            "2022-01-06T04:16:08.794+00:00"
        );
    }

    #[test]
    fn exception_is_split_from_message() {
        let records = normalize(&[
            "2022-01-06 04:20:01.100 ERROR (main) [   ] o.a.s.c.SolrCore Failed to load => org.apache.solr.common.SolrException: boom",
            "\tat org.apache.solr.core.SolrCore.<init>(SolrCore.java:1012)",
            "2022-01-06 04:20:02.000 WARN  (main) [   ] o.a.s.c.SolrCore next",
        ]);
        assert_eq!(records.len(), 2);
        let record = &records[0];
        assert_eq!(record.severity(), Some(Severity::Error));
        assert_eq!(record.body(), Some("Failed to load"));
        assert!(
            record
                .fields
                .get("exception")
                .and_then(Value::as_str)
                .is_some_and(|e| e.contains("SolrCore.java:1012"))
        );
        assert_eq!(records[1].severity(), Some(Severity::Warning));
    }

    #[test]
    fn fatal_maps_to_critical() {
        let records = normalize(&["2022-01-06 04:20:01.100 FATAL (main) [   ] o.a.s.c.SolrCore dying"]);
        assert_eq!(records[0].severity(), Some(Severity::Critical));
    }
}
