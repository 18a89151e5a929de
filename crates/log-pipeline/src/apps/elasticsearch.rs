//! Elasticsearch 로그 통합
//!
//! - `elasticsearch_json`: log4j JSON 레이아웃 (서버, deprecation, slowlog, audit)
//! - `elasticsearch_gc`: JVM 통합 GC 로그

use opsnorm_core::types::BODY_FIELD;

use super::{instrumentation_rule, severity_rule};
use crate::parser::coerce::FieldType;
use crate::rule::types::{
    ExtractionRule, ModifierRule, MultilineRule, NestRule, ProcessorSpec, RuleSet, START_STATE,
};

/// JSON 로그 receiver 타입 이름
pub const JSON_TYPE_NAME: &str = "elasticsearch_json";

/// GC 로그 receiver 타입 이름
pub const GC_TYPE_NAME: &str = "elasticsearch_gc";

/// 기본 JSON 로그 파일
pub const JSON_DEFAULT_INCLUDE_PATHS: &[&str] = &[
    "/var/log/elasticsearch/*_server.json",
    "/var/log/elasticsearch/*_deprecation.json",
    "/var/log/elasticsearch/*_index_search_slowlog.json",
    "/var/log/elasticsearch/*_index_indexing_slowlog.json",
    "/var/log/elasticsearch/*_audit.json",
];

/// 기본 GC 로그 파일
pub const GC_DEFAULT_INCLUDE_PATHS: &[&str] = &["/var/log/elasticsearch/gc.log"];

const SEVERITY_TABLE: &[(&str, &str)] = &[
    ("TRACE", "DEBUG"),
    ("DEBUG", "DEBUG"),
    ("INFO", "INFO"),
    ("WARN", "WARNING"),
    ("DEPRECATION", "WARNING"),
    ("ERROR", "ERROR"),
    ("CRITICAL", "ERROR"),
    ("FATAL", "FATAL"),
];

/// 중첩 접두사 (audit 이벤트 속성 + 서버 레이아웃의 `cluster`)
///
/// 더 깊은 접두사가 먼저 와야 `user.run_by` 같은 그룹이 `user` 아래에 들어갑니다.
const NESTING_PREFIXES: &[&str] = &[
    "user.run_by",
    "user.run_as",
    "authentication.token",
    "node",
    "event",
    "authentication",
    "user",
    "origin",
    "request",
    "url",
    "host",
    "apikey",
    "cluster",
];

const GC_PATTERN: &str = r"\[(?<time>\d+-\d+-\d+T\d+:\d+:\d+.\d+\+\d+)\]\[\d+\]\[(?<type>[A-z,]+)\s*\]\s*(?:GC\((?<gc_run>\d+)\))?\s*(?<message>.*)";

/// JSON 로그 규칙 집합
pub fn json_rule_set() -> RuleSet {
    let nesting = NESTING_PREFIXES
        .iter()
        .map(|prefix| ModifierRule::NestWildcard(NestRule::by_prefix(prefix)))
        .collect();

    RuleSet {
        name: JSON_TYPE_NAME.to_owned(),
        include_paths: JSON_DEFAULT_INCLUDE_PATHS
            .iter()
            .map(|p| (*p).to_owned())
            .collect(),
        // 스택 트레이스가 포함되면 JSON 객체가 여러 줄에 걸칩니다
        multiline: vec![
            MultilineRule::new(START_STATE, r"^\{.*", "cont"),
            MultilineRule::new("cont", r"^[^{].*[,}]$", "cont"),
        ],
        processors: vec![
            ProcessorSpec::ParseJson {
                field: BODY_FIELD.to_owned(),
                time_key: Some("timestamp".to_owned()),
                time_format: Some("%Y-%m-%dT%H:%M:%S,%L%z".to_owned()),
            },
            ProcessorSpec::ModifyFields {
                rules: vec![
                    severity_rule(SEVERITY_TABLE),
                    instrumentation_rule(JSON_TYPE_NAME),
                ],
            },
            ProcessorSpec::ModifyFields { rules: nesting },
        ],
    }
}

/// GC 로그 규칙 집합
pub fn gc_rule_set() -> RuleSet {
    RuleSet {
        name: GC_TYPE_NAME.to_owned(),
        include_paths: GC_DEFAULT_INCLUDE_PATHS
            .iter()
            .map(|p| (*p).to_owned())
            .collect(),
        multiline: Vec::new(),
        processors: vec![
            ProcessorSpec::ParseRegex {
                field: BODY_FIELD.to_owned(),
                rules: vec![
                    ExtractionRule::new(GC_PATTERN)
                        .with_time("time", "%Y-%m-%dT%H:%M:%S.%L%z")
                        .with_type("gc_run", FieldType::Integer),
                ],
            },
            ProcessorSpec::ModifyFields {
                rules: vec![instrumentation_rule(GC_TYPE_NAME)],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::CompiledRuleSet;
    use opsnorm_core::types::{LogRecord, Severity, Value};

    fn normalize(rule_set: RuleSet, lines: &[&str]) -> Vec<LogRecord> {
        let compiled = CompiledRuleSet::compile(&rule_set).unwrap();
        let texts = compiled
            .stitcher(1000, 512 * 1024)
            .stitch_all(lines.iter().copied());
        let chain = compiled.chain();
        texts
            .into_iter()
            .map(|text| chain.process(LogRecord::from_text(compiled.name(), "es.log", text)))
            .collect()
    }

    #[test]
    fn server_json_line() {
        let records = normalize(
            json_rule_set(),
            &[
                r#"{"type": "server", "timestamp": "2022-01-17T18:31:47,365Z", "level": "INFO", "component": "o.e.n.Node", "cluster.name": "elasticsearch", "node.name": "ubuntu-jammy", "message": "initialized" }"#,
            ],
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.severity(), Some(Severity::Info));
        assert_eq!(record.body(), Some("initialized"));
        assert_eq!(
            record.fields.get_key("cluster").and_then(|c| c.as_record()).and_then(|c| c.get_key("name")),
            Some(&Value::from("elasticsearch"))
        );
        assert_eq!(
            record.fields.get("node.name"),
            Some(&Value::from("ubuntu-jammy"))
        );
        assert!(record.fields.get_key("cluster.name").is_none());
        assert_eq!(
            record.timestamp.unwrap().to_rfc3339(),
            "2022-01-17T18:31:47.365+00:00"
        );
        assert_eq!(
            record.fields.get("labels.instrumentation_source"),
            Some(&Value::from("opsnorm/elasticsearch_json"))
        );
    }

    #[test]
    fn stack_trace_spans_lines() {
        let records = normalize(
            json_rule_set(),
            &[
                r#"{"type": "server", "timestamp": "2022-01-20T15:46:00,131Z", "level": "ERROR", "component": "o.e.b.ElasticsearchUncaughtExceptionHandler", "message": "uncaught exception in thread [main]","#,
                r#""stacktrace": ["org.elasticsearch.bootstrap.StartupException: boom","#,
                r#""... 6 more"] }"#,
            ],
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity(), Some(Severity::Error));
        assert!(matches!(
            records[0].fields.get("stacktrace"),
            Some(Value::List(items)) if items.len() == 2
        ));
    }

    #[test]
    fn audit_fields_nest_deeply() {
        let records = normalize(
            json_rule_set(),
            &[
                r#"{"type":"audit","timestamp":"2022-01-17T18:31:47,365+0000","level":"INFO","user.name":"elastic","user.run_by.name":"root","event.action":"access_granted","origin.type":"rest"}"#,
            ],
        );
        let record = &records[0];
        let user = record.fields.get_key("user").and_then(Value::as_record).unwrap();
        assert_eq!(user.get_key("name"), Some(&Value::from("elastic")));
        let run_by = user.get_key("run_by").and_then(Value::as_record).unwrap();
        assert_eq!(run_by.get_key("name"), Some(&Value::from("root")));
        assert_eq!(
            record.fields.get("event.action"),
            Some(&Value::from("access_granted"))
        );
        assert_eq!(record.fields.get("origin.type"), Some(&Value::from("rest")));
    }

    #[test]
    fn deprecation_maps_to_warning() {
        let records = normalize(
            json_rule_set(),
            &[r#"{"timestamp":"2022-01-17T18:31:47,365Z","level":"DEPRECATION","message":"old"}"#],
        );
        assert_eq!(records[0].severity(), Some(Severity::Warning));
    }

    #[test]
    fn gc_line() {
        let records = normalize(
            gc_rule_set(),
            &["[2022-01-17T18:31:37.240+0000][652141][gc,start    ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)"],
        );
        let record = &records[0];
        assert_eq!(record.fields.get("type"), Some(&Value::from("gc,start")));
        assert_eq!(record.fields.get("gc_run"), Some(&Value::Integer(0)));
        assert_eq!(
            record.body(),
            Some("Pause Young (Normal) (G1 Evacuation Pause)")
        );
        assert_eq!(
            record.timestamp.unwrap().to_rfc3339(),
            "2022-01-17T18:31:37.240+00:00"
        );
    }

    #[test]
    fn gc_line_without_run_number() {
        let records = normalize(
            gc_rule_set(),
            &["[2022-01-17T18:31:30.001+0000][652141][gc,init] Version: 17.0.1+12"],
        );
        let record = &records[0];
        assert!(record.fields.get("gc_run").is_none());
        assert_eq!(record.body(), Some("Version: 17.0.1+12"));
    }
}
