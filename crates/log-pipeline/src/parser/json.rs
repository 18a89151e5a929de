//! JSON 페이로드 파서
//!
//! 논리 레코드 본문이 JSON 객체이면 그 객체의 키를 레코드 필드로 펼칩니다.
//! 중첩 객체는 중첩 레코드로 유지됩니다.
//!
//! # 타임스탬프
//! `time_key`가 지정되면 해당 키를 해석해 레코드 타임스탬프로 옮깁니다.
//! - `time_format`이 있으면 그 템플릿으로 해석
//! - 없으면 RFC 3339, Unix 초/밀리초 순서로 시도
//!
//! # 사용 예시
//! ```ignore
//! let parser = JsonPayloadParser::new("message")
//!     .with_time_key("timestamp", Some("%Y-%m-%dT%H:%M:%S,%L%z"));
//! let record = parser.process(LogRecord::from_text("es", "/var/log/es.json", raw));
//! ```

use chrono::{DateTime, Utc};
use opsnorm_core::metrics as m;
use opsnorm_core::pipeline::RecordProcessor;
use opsnorm_core::types::{BODY_FIELD, LogRecord, Record, Value};

use super::time::TimeFormat;
use crate::error::LogPipelineError;

/// 기본 최대 입력 크기 (1MB)
const DEFAULT_MAX_INPUT_SIZE: usize = 1024 * 1024;

/// JSON 본문을 필드로 펼치는 처리기
#[derive(Debug)]
pub struct JsonPayloadParser {
    /// 입력 텍스트 필드
    source_field: String,
    /// 타임스탬프 키
    time_key: Option<String>,
    /// 타임스탬프 템플릿 (`None`이면 자동 감지)
    time_format: Option<TimeFormat>,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl JsonPayloadParser {
    /// 입력 필드를 지정해 새 파서를 생성합니다.
    pub fn new(source_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            time_key: None,
            time_format: None,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 타임스탬프 키와 템플릿을 설정합니다.
    pub fn with_time_key(mut self, key: impl Into<String>, format: Option<&str>) -> Self {
        self.time_key = Some(key.into());
        self.time_format = format.map(TimeFormat::new);
        self
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// JSON 텍스트를 레코드로 변환합니다.
    ///
    /// # Errors
    /// 입력이 너무 크거나, 유효한 JSON이 아니거나, 최상위가 객체가 아니면 실패합니다.
    pub fn parse_payload(&self, text: &str) -> Result<Record, LogPipelineError> {
        if text.len() > self.max_input_size {
            return Err(LogPipelineError::Parse {
                format: "json".to_owned(),
                offset: 0,
                reason: format!(
                    "input too large: {} bytes (max: {})",
                    text.len(),
                    self.max_input_size
                ),
            });
        }

        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| LogPipelineError::Parse {
                format: "json".to_owned(),
                offset: e.column(),
                reason: e.to_string(),
            })?;

        match Value::from(value) {
            Value::Record(record) => Ok(record),
            _ => Err(LogPipelineError::Parse {
                format: "json".to_owned(),
                offset: 0,
                reason: "expected JSON object at top level".to_owned(),
            }),
        }
    }

    fn parse_timestamp(&self, raw: &str) -> Result<DateTime<Utc>, LogPipelineError> {
        match &self.time_format {
            Some(format) => format.parse(raw),
            None => parse_auto_timestamp(raw),
        }
    }
}

impl Default for JsonPayloadParser {
    fn default() -> Self {
        Self::new(BODY_FIELD)
    }
}

impl RecordProcessor for JsonPayloadParser {
    fn name(&self) -> &str {
        "parse_json"
    }

    fn process(&self, mut record: LogRecord) -> LogRecord {
        let Some(text) = record.fields.get(&self.source_field).and_then(Value::as_str) else {
            return record;
        };

        let mut fields = match self.parse_payload(text) {
            Ok(fields) => fields,
            Err(e) => {
                metrics::counter!(m::LOG_PIPELINE_RECORDS_UNMATCHED_TOTAL, m::LABEL_RECEIVER => record.receiver.clone())
                    .increment(1);
                tracing::debug!(source = %record.source, error = %e, "payload is not a JSON object, keeping text");
                return record;
            }
        };

        if let Some(key) = &self.time_key {
            let parsed = fields
                .get_key(key)
                .map(|raw| self.parse_timestamp(&raw.to_string()));
            match parsed {
                Some(Ok(ts)) => {
                    record.timestamp = Some(ts);
                    fields.remove_key(key);
                }
                Some(Err(e)) => {
                    metrics::counter!(m::LOG_PIPELINE_TIME_PARSE_FAILURES_TOTAL, m::LABEL_RECEIVER => record.receiver.clone())
                        .increment(1);
                    tracing::debug!(key = %key, error = %e, "time parse failed, keeping raw field");
                }
                None => {}
            }
        }

        record.fields.remove(&self.source_field);
        for (key, value) in fields {
            record.fields.insert_key(key, value);
        }
        record
    }
}

/// 템플릿 없이 타임스탬프를 해석합니다.
///
/// 지원 형식:
/// - RFC 3339 (ISO 8601): `2024-01-15T12:00:00Z`
/// - Unix timestamp (초): `1705320000`
/// - Unix timestamp (밀리초): `1705320000000`
fn parse_auto_timestamp(raw: &str) -> Result<DateTime<Utc>, LogPipelineError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ts_num) = raw.parse::<i64>() {
        // 10자리 초과면 밀리초
        let dt = if ts_num > 9_999_999_999 {
            DateTime::from_timestamp_millis(ts_num)
        } else {
            DateTime::from_timestamp(ts_num, 0)
        };
        if let Some(dt) = dt {
            return Ok(dt);
        }
    }

    Err(LogPipelineError::Parse {
        format: "json".to_owned(),
        offset: 0,
        reason: format!("invalid timestamp format: '{raw}'"),
    })
}
