//! 규칙 데이터 구조 정의
//!
//! 통합(CouchDB, Elasticsearch, Solr)과 사용자 규칙 파일이 공유하는 선언형 규칙입니다.
//! 모든 타입은 serde로 (역)직렬화되며, 정규식 컴파일 전의 원본 형태를 담습니다.

use std::collections::BTreeMap;

use opsnorm_core::types::BODY_FIELD;
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;
use crate::parser::coerce::FieldType;

/// 멀티라인 상태 기계의 시작 상태 이름
pub const START_STATE: &str = "start_state";

/// 멀티라인 전이 규칙
///
/// 활성 상태가 `state_name`이고 줄이 `pattern`에 일치하면 `next_state`로 전이합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultilineRule {
    /// 이 규칙이 적용되는 상태
    pub state_name: String,
    /// 줄 단위 정규식
    pub pattern: String,
    /// 일치 시 전이할 상태
    pub next_state: String,
}

impl MultilineRule {
    /// 새 전이 규칙을 생성합니다.
    pub fn new(
        state_name: impl Into<String>,
        pattern: impl Into<String>,
        next_state: impl Into<String>,
    ) -> Self {
        Self {
            state_name: state_name.into(),
            pattern: pattern.into(),
            next_state: next_state.into(),
        }
    }
}

/// 정규식 추출 규칙
///
/// 패턴은 논리 레코드 전체와 일치해야 하며, 이름 있는 캡처 그룹이 필드가 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// 이름 있는 캡처 그룹을 포함한 정규식
    pub pattern: String,
    /// 타임스탬프로 해석할 캡처 그룹 이름
    #[serde(default)]
    pub time_field: Option<String>,
    /// `time_field` 해석 템플릿
    #[serde(default)]
    pub time_format: Option<String>,
    /// 타입 변환할 필드
    #[serde(default)]
    pub typed_fields: BTreeMap<String, FieldType>,
}

impl ExtractionRule {
    /// 패턴만 있는 규칙을 생성합니다.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            time_field: None,
            time_format: None,
            typed_fields: BTreeMap::new(),
        }
    }

    /// 시간 필드와 템플릿을 지정합니다.
    pub fn with_time(mut self, field: impl Into<String>, format: impl Into<String>) -> Self {
        self.time_field = Some(field.into());
        self.time_format = Some(format.into());
        self
    }

    /// 필드 타입을 선언합니다.
    pub fn with_type(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.typed_fields.insert(field.into(), field_type);
        self
    }
}

/// 단일 목적지 필드에 대한 변환 규칙
///
/// 평가 순서: 원본(`copy_from`/`move_from`) → `static_value` → `default_value`
/// → `map_values` → `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// 목적지 필드 경로
    pub dest: String,
    /// 복사 원본 (원본 유지)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_from: Option<String>,
    /// 이동 원본 (원본 제거)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_from: Option<String>,
    /// 항상 이 값으로 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<String>,
    /// 값이 없을 때만 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// 값 매핑 테이블
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub map_values: BTreeMap<String, String>,
    /// 매핑되지 않은 값을 제거할지 여부
    #[serde(default)]
    pub map_values_exclusive: bool,
    /// 최종 값의 타입
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl FieldRule {
    /// 목적지만 지정한 규칙을 생성합니다.
    pub fn new(dest: impl Into<String>) -> Self {
        Self {
            dest: dest.into(),
            ..Self::default()
        }
    }

    /// 복사 원본을 지정합니다.
    pub fn copy_from(mut self, src: impl Into<String>) -> Self {
        self.copy_from = Some(src.into());
        self
    }

    /// 이동 원본을 지정합니다.
    pub fn move_from(mut self, src: impl Into<String>) -> Self {
        self.move_from = Some(src.into());
        self
    }

    /// 고정 값을 지정합니다.
    pub fn static_value(mut self, value: impl Into<String>) -> Self {
        self.static_value = Some(value.into());
        self
    }

    /// 기본 값을 지정합니다.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// 값 매핑 테이블을 지정합니다.
    pub fn map_values<I, K, V>(mut self, table: I, exclusive: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.map_values = table
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.map_values_exclusive = exclusive;
        self
    }

    /// 최종 타입을 지정합니다.
    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// 규칙 자체의 일관성을 검증합니다.
    pub fn validate(&self, rule_id: &str) -> Result<(), LogPipelineError> {
        let fail = |reason: String| LogPipelineError::RuleValidation {
            rule_id: rule_id.to_owned(),
            reason,
        };
        if self.dest.is_empty() {
            return Err(fail("dest must not be empty".to_owned()));
        }
        if self.copy_from.is_some() && self.move_from.is_some() {
            return Err(fail(format!(
                "field '{}' cannot have both copy_from and move_from",
                self.dest
            )));
        }
        if let Some(src) = self.copy_from.as_ref().or(self.move_from.as_ref())
            && src.is_empty()
        {
            return Err(fail(format!("field '{}' has an empty source", self.dest)));
        }
        if self.map_values_exclusive && self.map_values.is_empty() {
            return Err(fail(format!(
                "field '{}' is map_values_exclusive without a map_values table",
                self.dest
            )));
        }
        Ok(())
    }
}

/// 와일드카드 중첩 규칙
///
/// 최상위 키 중 `wildcard`에 일치하는 키를 `nest_under` 아래로 옮기고
/// `remove_prefix`를 떼어 냅니다. `*`로 끝나는 와일드카드는 접두사 일치입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestRule {
    /// 키 패턴 (예: `request.*`)
    pub wildcard: String,
    /// 중첩될 최상위 키
    pub nest_under: String,
    /// 옮긴 키에서 제거할 접두사
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_prefix: Option<String>,
}

impl NestRule {
    /// `prefix.*`를 `prefix` 아래로 모으고 `prefix.`를 제거하는 규칙
    pub fn by_prefix(prefix: &str) -> Self {
        Self {
            wildcard: format!("{prefix}.*"),
            nest_under: prefix.to_owned(),
            remove_prefix: Some(format!("{prefix}.")),
        }
    }
}

/// 필드 변환 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierRule {
    /// 목적지 필드 규칙
    Field(FieldRule),
    /// 와일드카드 중첩
    NestWildcard(NestRule),
}

fn default_source_field() -> String {
    BODY_FIELD.to_owned()
}

/// 처리 단계 선언
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorSpec {
    /// 정규식 추출 (첫 번째로 일치한 규칙 사용)
    ParseRegex {
        /// 입력 텍스트 필드
        #[serde(default = "default_source_field")]
        field: String,
        /// 우선순위 순 추출 규칙
        rules: Vec<ExtractionRule>,
    },
    /// JSON 객체 파싱
    ParseJson {
        /// 입력 텍스트 필드
        #[serde(default = "default_source_field")]
        field: String,
        /// 타임스탬프 키
        #[serde(default)]
        time_key: Option<String>,
        /// 타임스탬프 템플릿
        #[serde(default)]
        time_format: Option<String>,
    },
    /// 필드 변환 (선언 순서대로 적용)
    ModifyFields {
        /// 변환 규칙
        rules: Vec<ModifierRule>,
    },
}

/// 하나의 통합이 제공하는 규칙 집합
///
/// # YAML 예시
/// ```yaml
/// name: nginx_error
/// include_paths: ["/var/log/nginx/error.log"]
/// multiline:
///   - state_name: start_state
///     pattern: '^\d{4}/\d{2}/\d{2}'
///     next_state: cont
///   - state_name: cont
///     pattern: '^\s'
///     next_state: cont
/// processors:
///   - type: parse_regex
///     rules:
///       - pattern: '^(?<time>\S+ \S+) \[(?<level>\w+)\] (?<message>[\s\S]*)$'
///         time_field: time
///         time_format: '%Y/%m/%d %H:%M:%S'
///   - type: modify_fields
///     rules:
///       - field: { dest: severity, move_from: level }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// 규칙 집합 이름 (receiver `type`으로 참조)
    pub name: String,
    /// 기본 수집 대상 glob
    #[serde(default)]
    pub include_paths: Vec<String>,
    /// 멀티라인 전이 규칙
    #[serde(default)]
    pub multiline: Vec<MultilineRule>,
    /// 처리 단계 (선언 순서대로 실행)
    #[serde(default)]
    pub processors: Vec<ProcessorSpec>,
}

impl RuleSet {
    /// 정규식 컴파일이 필요 없는 구조 검증을 수행합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.name.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule_id: "<unnamed>".to_owned(),
                reason: "rule set name must not be empty".to_owned(),
            });
        }
        if self.processors.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule_id: self.name.clone(),
                reason: "at least one processor is required".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_rule_builder() {
        let rule = FieldRule::new("severity")
            .copy_from("level")
            .map_values([("warn", "WARNING")], true);
        assert_eq!(rule.copy_from.as_deref(), Some("level"));
        assert_eq!(rule.map_values.get("warn").map(String::as_str), Some("WARNING"));
        assert!(rule.map_values_exclusive);
        rule.validate("t").unwrap();
    }

    #[test]
    fn field_rule_rejects_copy_and_move() {
        let rule = FieldRule::new("a").copy_from("b").move_from("c");
        let err = rule.validate("t").unwrap_err();
        assert!(err.to_string().contains("both copy_from and move_from"));
    }

    #[test]
    fn field_rule_rejects_exclusive_without_table() {
        let mut rule = FieldRule::new("a").copy_from("b");
        rule.map_values_exclusive = true;
        assert!(rule.validate("t").is_err());
    }

    #[test]
    fn nest_rule_by_prefix() {
        let rule = NestRule::by_prefix("request");
        assert_eq!(rule.wildcard, "request.*");
        assert_eq!(rule.nest_under, "request");
        assert_eq!(rule.remove_prefix.as_deref(), Some("request."));
    }

    #[test]
    fn rule_set_deserializes_from_yaml() {
        let yaml = r#"
name: custom
include_paths: ["/var/log/custom.log"]
multiline:
  - state_name: start_state
    pattern: '^\['
    next_state: cont
processors:
  - type: parse_regex
    rules:
      - pattern: '^\[(?<level>\w+)\] (?<message>.*)$'
        typed_fields: { code: integer }
  - type: parse_json
    time_key: ts
    time_format: '%Y-%m-%d'
  - type: modify_fields
    rules:
      - field: { dest: severity, move_from: level, map_values: { warn: WARNING }, map_values_exclusive: true }
      - nest_wildcard: { wildcard: 'req.*', nest_under: req, remove_prefix: 'req.' }
"#;
        let set: RuleSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.name, "custom");
        assert_eq!(set.multiline.len(), 1);
        assert_eq!(set.processors.len(), 3);
        match &set.processors[0] {
            ProcessorSpec::ParseRegex { field, rules } => {
                assert_eq!(field, BODY_FIELD);
                assert_eq!(rules[0].typed_fields.get("code"), Some(&FieldType::Integer));
            }
            other => panic!("unexpected processor: {other:?}"),
        }
        match &set.processors[2] {
            ProcessorSpec::ModifyFields { rules } => {
                assert!(matches!(rules[0], ModifierRule::Field(_)));
                assert!(matches!(rules[1], ModifierRule::NestWildcard(_)));
            }
            other => panic!("unexpected processor: {other:?}"),
        }
        set.validate().unwrap();
    }

    #[test]
    fn rule_set_requires_processors() {
        let set = RuleSet {
            name: "empty".to_owned(),
            include_paths: vec![],
            multiline: vec![],
            processors: vec![],
        };
        assert!(set.validate().is_err());
    }
}
