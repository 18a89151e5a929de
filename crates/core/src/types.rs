//! 도메인 타입 -- 정규화 엔진 전역에서 사용되는 레코드 타입
//!
//! 모든 단계(stitcher, extractor, modifier, sink)는 [`LogRecord`]를 주고받습니다.
//! 필드는 점(`.`)으로 구분된 경로로 접근하며, 중첩 그룹은 [`Value::Record`]로 표현합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PathConflict;

/// 원문 텍스트가 보존되는 본문 필드 이름
pub const BODY_FIELD: &str = "message";

/// 정규화된 심각도가 기록되는 필드 이름
pub const SEVERITY_FIELD: &str = "severity";

/// 계측 소스 태그가 기록되는 필드 경로
pub const INSTRUMENTATION_SOURCE_FIELD: &str = "labels.instrumentation_source";

/// 레코드 필드 값
///
/// 추출 단계는 `String`, `Integer`, `Timestamp`, 중첩 `Record`를 생성하며,
/// JSON 페이로드 파서는 나머지 변형(`Float`, `Bool`, `List`, `Null`)도 생성합니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// 값 없음 (JSON null)
    Null,
    /// 불리언
    Bool(bool),
    /// 부호 있는 정수
    Integer(i64),
    /// 부동소수점
    Float(f64),
    /// 타임스탬프 (RFC 3339로 직렬화)
    Timestamp(DateTime<Utc>),
    /// 문자열
    String(String),
    /// 목록
    List(Vec<Value>),
    /// 중첩 레코드
    Record(Record),
}

impl Value {
    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// 중첩 레코드이면 참조를 반환합니다.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// 값 매핑 테이블 조회에 사용할 키를 반환합니다.
    ///
    /// 스칼라 값만 키를 가지며, 목록/레코드/null은 `None`입니다.
    pub fn lookup_key(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Integer(n) => Some(n.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Null | Self::List(_) | Self::Record(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::String(s) => write!(f, "{s}"),
            Self::List(_) | Self::Record(_) => match serde_json::to_string(self) {
                Ok(json) => write!(f, "{json}"),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Record(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// 필드 경로 → 값 매핑
///
/// 키에는 점이 포함될 수 있습니다 (예: 평탄한 `"request.method"` 키).
/// 경로 조회는 먼저 정확히 일치하는 키를 찾고, 없으면 점 위치마다
/// 앞부분을 중첩 레코드 키로 보고 재귀적으로 내려갑니다.
///
/// # 사용 예시
/// ```ignore
/// let mut record = Record::new();
/// record.insert("httpRequest.status", Value::Integer(201))?;
/// assert_eq!(record.get("httpRequest.status"), Some(&Value::Integer(201)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// 빈 레코드를 생성합니다.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// 경로로 값을 조회합니다.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(path) {
            return Some(value);
        }
        for (idx, _) in path.match_indices('.') {
            let (head, tail) = (&path[..idx], &path[idx + 1..]);
            if let Some(Value::Record(inner)) = self.0.get(head)
                && let Some(value) = inner.get(tail)
            {
                return Some(value);
            }
        }
        None
    }

    /// 경로에 값이 존재하는지 확인합니다.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// 경로에 값을 기록하고 이전 값을 반환합니다.
    ///
    /// 정확히 일치하는 키가 이미 있으면 그 키를 덮어씁니다.
    /// 그렇지 않으면 첫 번째 점에서 분리하여 중첩 레코드를 만들어 기록합니다.
    ///
    /// # Errors
    /// 중간 경로에 레코드가 아닌 값이 있으면 레코드를 바꾸지 않고 [`PathConflict`]를 반환합니다.
    pub fn insert(&mut self, path: &str, value: Value) -> Result<Option<Value>, PathConflict> {
        if let Some(slot) = self.0.get_mut(path) {
            return Ok(Some(std::mem::replace(slot, value)));
        }
        let Some((head, tail)) = path.split_once('.') else {
            return Ok(self.0.insert(path.to_owned(), value));
        };
        let slot = self
            .0
            .entry(head.to_owned())
            .or_insert_with(|| Value::Record(Record::new()));
        match slot {
            Value::Record(inner) => inner.insert(tail, value).map_err(|conflict| PathConflict {
                path: path.to_owned(),
                blocked_at: format!("{head}.{}", conflict.blocked_at),
                rejected: conflict.rejected,
            }),
            _ => {
                tracing::debug!(path, blocked_at = head, "intermediate field is not a record, skipping write");
                Err(PathConflict {
                    path: path.to_owned(),
                    blocked_at: head.to_owned(),
                    rejected: value,
                })
            }
        }
    }

    /// 경로의 값을 제거하고 반환합니다.
    ///
    /// 제거 후 비어 버린 중첩 레코드는 함께 제거됩니다.
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        if let Some(value) = self.0.remove(path) {
            return Some(value);
        }
        for (idx, _) in path.match_indices('.') {
            let (head, tail) = (&path[..idx], &path[idx + 1..]);
            if let Some(Value::Record(inner)) = self.0.get_mut(head)
                && let Some(value) = inner.remove(tail)
            {
                if inner.is_empty() {
                    self.0.remove(head);
                }
                return Some(value);
            }
        }
        None
    }

    /// 최상위 키를 그대로(경로 해석 없이) 조회합니다.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 최상위 키에 그대로 기록합니다.
    pub fn insert_key(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// 최상위 키를 그대로 제거합니다.
    pub fn remove_key(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// 최상위 키 목록
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// 최상위 (키, 값) 순회
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 최상위 키 개수
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// 논리 로그 레코드
///
/// stitcher가 닫은 하나의 논리 레코드에서 시작해 processor 체인을 거쳐
/// sink로 전달됩니다. 처음에는 원문이 [`BODY_FIELD`]에만 들어 있습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// 레코드를 만든 receiver 이름
    pub receiver: String,
    /// 원본 소스 (파일 경로 등)
    pub source: String,
    /// 추출된 이벤트 시각 (파싱 실패 시 없음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// 수집 시각
    pub observed_at: DateTime<Utc>,
    /// 필드 집합
    pub fields: Record,
}

impl LogRecord {
    /// 원문 텍스트로 새 레코드를 만듭니다.
    pub fn from_text(
        receiver: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut fields = Record::new();
        fields.insert_key(BODY_FIELD, Value::String(text.into()));
        Self {
            receiver: receiver.into(),
            source: source.into(),
            timestamp: None,
            observed_at: Utc::now(),
            fields,
        }
    }

    /// 본문 필드가 문자열이면 반환합니다.
    pub fn body(&self) -> Option<&str> {
        self.fields.get_key(BODY_FIELD).and_then(Value::as_str)
    }

    /// 정규화된 심각도 필드를 해석합니다.
    pub fn severity(&self) -> Option<Severity> {
        self.fields
            .get(SEVERITY_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = self
            .severity()
            .map_or_else(|| "DEFAULT".to_owned(), |s| s.to_string());
        let ts = self
            .timestamp
            .map_or_else(|| "-".to_owned(), |t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        write!(
            f,
            "[{}] {} {} ({} fields)",
            severity,
            ts,
            self.receiver,
            self.fields.len()
        )
    }
}

/// 정규화된 심각도
///
/// 출력 레코드의 `severity` 필드가 가질 수 있는 닫힌 어휘입니다.
/// `Ord`는 낮은 심각도에서 높은 심각도 순입니다.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 디버그
    Debug,
    /// 정보성
    Info,
    /// 주목할 만한 정상 이벤트
    Notice,
    /// 경고
    Warning,
    /// 오류
    Error,
    /// 치명적 상태
    Critical,
    /// 프로세스 종료 수준 오류
    Fatal,
    /// 즉시 조치 필요
    Alert,
    /// 시스템 사용 불가
    Emergency,
}

impl Severity {
    /// 전체 어휘 (낮은 순)
    pub const ALL: [Self; 9] = [
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Fatal,
        Self::Alert,
        Self::Emergency,
    ];

    /// 출력 필드에 기록되는 대문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
            Self::Fatal => "FATAL",
            Self::Alert => "ALERT",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// 정규화된 대문자 이름만 받습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str() == s)
            .ok_or_else(|| format!("unknown severity: {s}"))
    }
}
