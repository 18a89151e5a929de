//! 필드 변환기 -- 추출된 레코드를 정규화된 형태로 재구성합니다.
//!
//! 규칙은 선언 순서대로 적용되며, 각 규칙은 이전 규칙의 결과를 봅니다.
//! 처리기는 상태를 갖지 않으므로 여러 소스가 하나의 인스턴스를 공유할 수 있습니다.
//!
//! # 필드 규칙 평가 순서
//! 1. `copy_from` / `move_from` (원본이 없으면 건너뜀)
//! 2. `static_value`
//! 3. `default_value` (목적지가 비어 있을 때만)
//! 4. `map_values` (일치하면 교체, 불일치 시 exclusive면 제거)
//! 5. `type` 변환
//!
//! # 와일드카드 중첩
//! 최상위 키 중 패턴에 일치하는 키를 `nest_under` 아래로 옮깁니다.
//! 기존 `nest_under` 레코드가 있으면 병합합니다.

use std::collections::HashSet;

use opsnorm_core::pipeline::RecordProcessor;
use opsnorm_core::types::{LogRecord, Record, Value};

use crate::error::LogPipelineError;
use crate::parser::coerce::coerce_value;
use crate::rule::types::{FieldRule, ModifierRule, NestRule};

/// 선언된 변환 규칙 목록을 적용하는 처리기
#[derive(Debug, Clone)]
pub struct FieldModifier {
    rules: Vec<ModifierRule>,
}

impl FieldModifier {
    /// 규칙을 검증하고 변환기를 생성합니다.
    ///
    /// # Errors
    /// - 개별 필드 규칙이 일관되지 않은 경우
    /// - 같은 목적지에 두 개 이상의 필드 규칙이 있는 경우
    /// - 와일드카드나 `nest_under`가 비어 있는 경우
    pub fn new(rules: Vec<ModifierRule>) -> Result<Self, LogPipelineError> {
        let mut seen = HashSet::new();
        for (idx, rule) in rules.iter().enumerate() {
            let rule_id = format!("modify_fields[{idx}]");
            match rule {
                ModifierRule::Field(field) => {
                    field.validate(&rule_id)?;
                    if !seen.insert(field.dest.as_str()) {
                        return Err(LogPipelineError::RuleValidation {
                            rule_id,
                            reason: format!("duplicate destination field '{}'", field.dest),
                        });
                    }
                }
                ModifierRule::NestWildcard(nest) => {
                    if nest.wildcard.is_empty() || nest.nest_under.is_empty() {
                        return Err(LogPipelineError::RuleValidation {
                            rule_id,
                            reason: "nest_wildcard requires wildcard and nest_under".to_owned(),
                        });
                    }
                }
            }
        }
        Ok(Self { rules })
    }

    /// 규칙 개수
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 필드 집합에 모든 규칙을 적용합니다.
    pub fn apply(&self, mut fields: Record) -> Record {
        for rule in &self.rules {
            match rule {
                ModifierRule::Field(field) => apply_field(&mut fields, field),
                ModifierRule::NestWildcard(nest) => apply_nest(&mut fields, nest),
            }
        }
        fields
    }
}

impl RecordProcessor for FieldModifier {
    fn name(&self) -> &str {
        "modify_fields"
    }

    fn process(&self, mut record: LogRecord) -> LogRecord {
        record.fields = self.apply(std::mem::take(&mut record.fields));
        record
    }
}

fn apply_field(fields: &mut Record, rule: &FieldRule) {
    let dest = rule.dest.as_str();

    // 중간 경로가 스칼라면 기록하지 않음 (Record::insert가 debug 로그를 남김)
    if let Some(src) = &rule.copy_from {
        if let Some(value) = fields.get(src).cloned() {
            let _ = fields.insert(dest, value);
        }
    } else if let Some(src) = &rule.move_from {
        let literal = fields.get_key(src).is_some();
        if let Some(value) = fields.remove(src)
            && let Err(conflict) = fields.insert(dest, value)
        {
            // 옮기지 못한 값은 원래 자리로 되돌림
            if literal {
                fields.insert_key(src.clone(), conflict.rejected);
            } else {
                let _ = fields.insert(src, conflict.rejected);
            }
        }
    }

    if let Some(value) = &rule.static_value {
        let _ = fields.insert(dest, Value::String(value.clone()));
    }

    if let Some(value) = &rule.default_value
        && !fields.contains(dest)
    {
        let _ = fields.insert(dest, Value::String(value.clone()));
    }

    if !rule.map_values.is_empty()
        && let Some(key) = fields.get(dest).and_then(Value::lookup_key)
    {
        match rule.map_values.get(&key) {
            Some(mapped) => {
                let _ = fields.insert(dest, Value::String(mapped.clone()));
            }
            None if rule.map_values_exclusive => {
                tracing::trace!(field = dest, value = %key, "unmapped value dropped");
                fields.remove(dest);
            }
            None => {}
        }
    }

    if let Some(field_type) = rule.field_type
        && let Some(value) = fields.get(dest).cloned()
    {
        let _ = fields.insert(dest, coerce_value(value, field_type));
    }
}

fn wildcard_matches(wildcard: &str, key: &str) -> bool {
    match wildcard.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == wildcard,
    }
}

fn apply_nest(fields: &mut Record, rule: &NestRule) {
    let matching: Vec<String> = fields
        .keys()
        .filter(|key| *key != rule.nest_under && wildcard_matches(&rule.wildcard, key))
        .map(str::to_owned)
        .collect();
    if matching.is_empty() {
        return;
    }

    let mut nested = match fields.remove_key(&rule.nest_under) {
        None => Record::new(),
        Some(Value::Record(existing)) => existing,
        Some(other) => {
            tracing::debug!(
                nest_under = %rule.nest_under,
                "nest target holds a non-record value, skipping"
            );
            fields.insert_key(rule.nest_under.clone(), other);
            return;
        }
    };

    for key in matching {
        let Some(value) = fields.remove_key(&key) else {
            continue;
        };
        let suffix = rule
            .remove_prefix
            .as_deref()
            .and_then(|prefix| key.strip_prefix(prefix))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(key.as_str());
        nested.insert_key(suffix.to_owned(), value);
    }

    fields.insert_key(rule.nest_under.clone(), Value::Record(nested));
}
