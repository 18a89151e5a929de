//! 정규식 추출기 -- 우선순위 순 패턴 목록으로 필드를 추출합니다.
//!
//! 규칙은 선언 순서대로 시도되며, 논리 레코드 **전체**와 일치한 첫 규칙이 이깁니다.
//! 이름 있는 캡처 그룹이 그대로 필드가 되고, 선언된 타입과 시간 필드가 변환됩니다.
//!
//! # 실패 처리
//! - 어떤 규칙도 일치하지 않으면 `matched = false`, 원문이 `message`로 보존됩니다.
//! - 시간 해석 실패 시 타임스탬프는 비워 두고 원래 필드를 유지합니다.
//! - 정수 변환 실패 시 문자열을 유지합니다.
//!
//! # 사용 예시
//! ```ignore
//! let extractor = RegexExtractor::new(vec![
//!     ExtractionRule::new(r"^(?<level>\w+) (?<message>.*)$"),
//! ])?;
//! let extraction = extractor.extract("INFO started");
//! assert!(extraction.matched);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use opsnorm_core::metrics as m;
use opsnorm_core::pipeline::RecordProcessor;
use opsnorm_core::types::{BODY_FIELD, LogRecord, Record, Value};

use super::coerce::{FieldType, coerce};
use super::time::TimeFormat;
use crate::error::LogPipelineError;
use crate::rule::types::ExtractionRule;

/// 추출 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// 추출된 필드 (불일치 시 `message`만)
    pub fields: Record,
    /// 해석된 타임스탬프
    pub timestamp: Option<DateTime<Utc>>,
    /// 일치한 규칙이 있는지 여부
    pub matched: bool,
    /// 일치한 규칙 인덱스
    pub rule_index: Option<usize>,
    /// 시간 필드가 있었지만 해석하지 못했는지 여부
    pub time_parse_failed: bool,
}

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    group_names: Vec<String>,
    time: Option<(String, TimeFormat)>,
    typed_fields: BTreeMap<String, FieldType>,
}

/// 컴파일된 추출 규칙 목록
#[derive(Debug)]
pub struct RegexExtractor {
    source_field: String,
    rules: Vec<CompiledRule>,
}

impl RegexExtractor {
    /// `message` 필드를 입력으로 하는 추출기를 생성합니다.
    pub fn new(rules: Vec<ExtractionRule>) -> Result<Self, LogPipelineError> {
        Self::with_source_field(BODY_FIELD, rules)
    }

    /// 입력 필드를 지정해 추출기를 생성합니다.
    ///
    /// # Errors
    /// - 규칙이 비어 있는 경우
    /// - 패턴이 컴파일되지 않는 경우
    /// - `time_field`가 캡처 그룹 이름이 아니거나 `time_format`이 없는 경우
    pub fn with_source_field(
        source_field: impl Into<String>,
        rules: Vec<ExtractionRule>,
    ) -> Result<Self, LogPipelineError> {
        if rules.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule_id: "parse_regex".to_owned(),
                reason: "at least one extraction rule is required".to_owned(),
            });
        }

        let compiled = rules
            .iter()
            .enumerate()
            .map(|(idx, rule)| compile_rule(idx, rule))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source_field: source_field.into(),
            rules: compiled,
        })
    }

    /// 규칙 개수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 텍스트에서 필드를 추출합니다.
    pub fn extract(&self, text: &str) -> Extraction {
        for (idx, rule) in self.rules.iter().enumerate() {
            let caps = match rule.regex.captures(text) {
                Ok(Some(caps)) => caps,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(rule = idx, error = %e, "regex evaluation aborted, trying next rule");
                    continue;
                }
            };

            let mut fields = Record::new();
            for name in &rule.group_names {
                let Some(m) = caps.name(name) else {
                    continue;
                };
                let value = match rule.typed_fields.get(name) {
                    Some(field_type) => coerce(m.as_str(), *field_type),
                    None => Value::String(m.as_str().to_owned()),
                };
                fields.insert_key(name.clone(), value);
            }

            let mut timestamp = None;
            let mut time_parse_failed = false;
            if let Some((time_field, format)) = &rule.time
                && let Some(raw) = fields.get_key(time_field).and_then(Value::as_str)
            {
                match format.parse(raw) {
                    Ok(ts) => {
                        timestamp = Some(ts);
                        fields.remove_key(time_field);
                    }
                    Err(e) => {
                        time_parse_failed = true;
                        tracing::debug!(
                            field = %time_field,
                            value = raw,
                            template = format.template(),
                            error = %e,
                            "time parse failed, keeping raw field"
                        );
                    }
                }
            }

            return Extraction {
                fields,
                timestamp,
                matched: true,
                rule_index: Some(idx),
                time_parse_failed,
            };
        }

        let mut fields = Record::new();
        fields.insert_key(BODY_FIELD, Value::String(text.to_owned()));
        Extraction {
            fields,
            timestamp: None,
            matched: false,
            rule_index: None,
            time_parse_failed: false,
        }
    }
}

impl RecordProcessor for RegexExtractor {
    fn name(&self) -> &str {
        "parse_regex"
    }

    /// 일치하면 입력 필드를 지우고 추출한 필드를 최상위 키로 합칩니다.
    /// 입력 필드가 문자열이 아니거나 불일치하면 레코드를 그대로 둡니다.
    fn process(&self, mut record: LogRecord) -> LogRecord {
        let Some(text) = record.fields.get(&self.source_field).and_then(Value::as_str) else {
            return record;
        };
        let extraction = self.extract(text);
        if !extraction.matched {
            metrics::counter!(m::LOG_PIPELINE_RECORDS_UNMATCHED_TOTAL, m::LABEL_RECEIVER => record.receiver.clone())
                .increment(1);
        }
        if extraction.time_parse_failed {
            metrics::counter!(m::LOG_PIPELINE_TIME_PARSE_FAILURES_TOTAL, m::LABEL_RECEIVER => record.receiver.clone())
                .increment(1);
        }
        if extraction.matched {
            // 입력 필드만 추출 결과로 대체하고 나머지 필드는 유지
            record.fields.remove(&self.source_field);
            for (key, value) in extraction.fields {
                record.fields.insert_key(key, value);
            }
            if extraction.timestamp.is_some() {
                record.timestamp = extraction.timestamp;
            }
        }
        record
    }
}

fn compile_rule(idx: usize, rule: &ExtractionRule) -> Result<CompiledRule, LogPipelineError> {
    // 레코드 전체 일치를 강제
    let anchored = format!(r"\A(?:{})\z", rule.pattern);
    let regex = Regex::new(&anchored).map_err(|e| LogPipelineError::Pattern {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;

    let group_names: Vec<String> = regex
        .capture_names()
        .flatten()
        .map(str::to_owned)
        .collect();

    let rule_id = format!("parse_regex[{idx}]");
    let time = match (&rule.time_field, &rule.time_format) {
        (Some(field), Some(format)) => {
            if !group_names.iter().any(|g| g == field) {
                return Err(LogPipelineError::RuleValidation {
                    rule_id,
                    reason: format!("time_field '{field}' is not a capture group"),
                });
            }
            Some((field.clone(), TimeFormat::new(format)))
        }
        (Some(field), None) => {
            return Err(LogPipelineError::RuleValidation {
                rule_id,
                reason: format!("time_field '{field}' has no time_format"),
            });
        }
        (None, Some(_)) => {
            return Err(LogPipelineError::RuleValidation {
                rule_id,
                reason: "time_format set without time_field".to_owned(),
            });
        }
        (None, None) => None,
    };

    for field in rule.typed_fields.keys() {
        if !group_names.iter().any(|g| g == field) {
            tracing::warn!(
                rule = %rule_id,
                field = %field,
                "typed field is not a capture group, ignoring"
            );
        }
    }

    Ok(CompiledRule {
        regex,
        group_names,
        time,
        typed_fields: rule.typed_fields.clone(),
    })
}
