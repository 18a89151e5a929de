//! CouchDB 로그 통합
//!
//! `couch_log` 형식: `[level] timestamp node@host <pid> tag ...`.
//! HTTP 접근 로그는 `httpRequest` 하위 레코드로 재구성됩니다.

use opsnorm_core::types::BODY_FIELD;

use super::{instrumentation_rule, severity_rule};
use crate::parser::coerce::FieldType;
use crate::rule::types::{
    ExtractionRule, FieldRule, ModifierRule, MultilineRule, ProcessorSpec, RuleSet, START_STATE,
};

/// receiver 타입 이름
pub const TYPE_NAME: &str = "couchdb";

/// 기본 로그 파일
pub const DEFAULT_INCLUDE_PATHS: &[&str] = &["/var/log/couchdb/couchdb.log"];

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%L%z";

const ACCESS_PATTERN: &str = r"^\[(?<level>\w*)\] (?<timestamp>[\d\-\.:TZ]+) (?<node>\S+)@(?<host>[^\s]+) <(?<pid>[^ ]*)> [\w-]+ (?<http_request_serverIp>[^ ]*) (?<http_request_remoteIp>[^ ]*) (?<message>(?<remote_user>[^ ]*) (?<http_request_requestMethod>[^ ]*) (?<path>[^ ]*) (?<http_request_status>[^ ]*) (?<status_message>[^ ]*) (?<http_request_responseSize>[\d]*)$)";

const GENERAL_PATTERN: &str = r"^\[(?<level>\w*)\] (?<timestamp>[\d\-\.:TZ]+) (?<node>\S+)@(?<host>[^\s]+) (?<message>[\s\S]*(<(?<pid>[^>]+)>)[\s\S]*)";

/// couch_log 레벨 → 정규화된 심각도
const SEVERITY_TABLE: &[(&str, &str)] = &[
    ("emerg", "EMERGENCY"),
    ("emergency", "EMERGENCY"),
    ("alert", "ALERT"),
    ("crit", "CRITICAL"),
    ("critical", "CRITICAL"),
    ("error", "ERROR"),
    ("err", "ERROR"),
    ("warn", "WARNING"),
    ("warning", "WARNING"),
    ("notice", "NOTICE"),
    ("info", "INFO"),
    ("debug", "DEBUG"),
];

const HTTP_REQUEST_FIELDS: &[&str] = &[
    "serverIp",
    "remoteIp",
    "requestMethod",
    "status",
    "responseSize",
];

/// CouchDB 규칙 집합
pub fn rule_set() -> RuleSet {
    let extraction = vec![
        ExtractionRule::new(ACCESS_PATTERN)
            .with_time("timestamp", TIME_FORMAT)
            .with_type("http_request_status", FieldType::Integer),
        ExtractionRule::new(GENERAL_PATTERN).with_time("timestamp", TIME_FORMAT),
    ];

    let mut modifiers = vec![
        severity_rule(SEVERITY_TABLE),
        instrumentation_rule(TYPE_NAME),
    ];
    modifiers.extend(HTTP_REQUEST_FIELDS.iter().map(|field| {
        ModifierRule::Field(
            FieldRule::new(format!("httpRequest.{field}"))
                .move_from(format!("http_request_{field}")),
        )
    }));

    RuleSet {
        name: TYPE_NAME.to_owned(),
        include_paths: DEFAULT_INCLUDE_PATHS.iter().map(|p| (*p).to_owned()).collect(),
        multiline: vec![
            MultilineRule::new(START_STATE, r"^\[\w+\]", "cont"),
            MultilineRule::new("cont", r"^(?!\[\w+\])", "cont"),
        ],
        processors: vec![
            ProcessorSpec::ParseRegex {
                field: BODY_FIELD.to_owned(),
                rules: extraction,
            },
            ProcessorSpec::ModifyFields { rules: modifiers },
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
            .map(|text| chain.process(LogRecord::from_text(TYPE_NAME, "couchdb.log", text)))
            .collect()
    }

    #[test]
    fn access_line_builds_http_request() {
        let records = normalize(&[
            "[notice] 2021-12-02T23:36:42.555157Z nonode@nohost <0.17165.1> a5f585a0d3 localhost:5984 127.0.0.1 otelu PUT /oteld 201 ok 16",
        ]);
        assert_eq!(records.len(), 1);
        let record = &records[0];

        assert_eq!(record.severity(), Some(Severity::Notice));
        assert_eq!(
            record.fields.get("httpRequest.status"),
            Some(&Value::Integer(201))
        );
        assert_eq!(
            record.fields.get("httpRequest.serverIp"),
            Some(&Value::from("localhost:5984"))
        );
        assert_eq!(
            record.fields.get("httpRequest.requestMethod"),
            Some(&Value::from("PUT"))
        );
        assert_eq!(
            record.fields.get("httpRequest.responseSize"),
            Some(&Value::from("16"))
        );
        assert!(record.fields.get("http_request_status").is_none());
        assert_eq!(record.body(), Some("otelu PUT /oteld 201 ok 16"));
        assert_eq!(
            record.fields.get("labels.instrumentation_source"),
            Some(&Value::from("opsnorm/couchdb"))
        );
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn general_line_uses_second_rule() {
        let records = normalize(&[
            "[info] 2022-01-12T16:52:56.998128Z nonode@nohost <0.216.0> -------- Apache CouchDB has started. Time to relax.",
        ]);
        let record = &records[0];
        assert_eq!(record.severity(), Some(Severity::Info));
        assert_eq!(record.fields.get("pid"), Some(&Value::from("0.216.0")));
        assert!(record.fields.get("httpRequest").is_none());
    }

    #[test]
    fn continuation_lines_join_previous_record() {
        let records = normalize(&[
            "[error] 2022-01-12T16:53:03.094488Z nonode@nohost emulator -------- Error in process <0.463.0> with exit value:",
            "{database_does_not_exist,[{mem3_shards,load_shards_from_db,\"_users\"}]}",
            "[info] 2022-01-12T16:53:04.000000Z nonode@nohost <0.1.0> -------- next",
        ]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity(), Some(Severity::Error));
        assert_eq!(records[0].fields.get("pid"), Some(&Value::from("0.463.0")));
        assert!(
            records[0]
                .body()
                .is_some_and(|body| body.ends_with("\"_users\"}]}"))
        );
    }

    #[test]
    fn unknown_level_drops_severity() {
        let records = normalize(&[
            "[verbose] 2022-01-12T16:52:56.998128Z nonode@nohost <0.216.0> -------- chatty",
        ]);
        assert!(records[0].fields.get("severity").is_none());
        assert_eq!(records[0].fields.get("level"), Some(&Value::from("verbose")));
    }
}
