//! 타입 변환 -- 캡처된 문자열을 선언된 필드 타입으로 변환
//!
//! 변환 실패는 에러가 아닙니다. 원래 문자열이 그대로 유지되어
//! 레코드가 버려지지 않습니다.

use std::fmt;

use opsnorm_core::types::Value;
use serde::{Deserialize, Serialize};

/// 선언 가능한 필드 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// 문자열 (변환 없음)
    String,
    /// 부호 있는 64비트 정수
    Integer,
    /// 64비트 부동소수점
    Float,
    /// `true` / `false`
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// 문자열을 지정 타입의 값으로 변환합니다.
///
/// 변환에 실패하면 `Value::String`으로 강등됩니다.
pub fn coerce(text: &str, field_type: FieldType) -> Value {
    let converted = match field_type {
        FieldType::String => None,
        FieldType::Integer => text.parse::<i64>().ok().map(Value::Integer),
        FieldType::Float => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::Float),
        FieldType::Boolean => match text {
            "true" | "TRUE" | "True" => Some(Value::Bool(true)),
            "false" | "FALSE" | "False" => Some(Value::Bool(false)),
            _ => None,
        },
    };

    converted.unwrap_or_else(|| {
        if field_type != FieldType::String {
            tracing::trace!(value = text, target_type = %field_type, "type coercion failed, keeping string");
        }
        Value::String(text.to_owned())
    })
}

/// 이미 값이 된 필드를 다시 변환합니다.
///
/// 문자열 값만 변환 대상이며, 문자열로의 변환은 스칼라를 문자열화합니다.
pub fn coerce_value(value: Value, field_type: FieldType) -> Value {
    match (value, field_type) {
        (Value::String(s), t) => coerce(&s, t),
        (v @ (Value::Integer(_) | Value::Float(_) | Value::Bool(_)), FieldType::String) => {
            Value::String(v.to_string())
        }
        (Value::Integer(n), FieldType::Float) => Value::Float(n as f64),
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_success() {
        assert_eq!(coerce("201", FieldType::Integer), Value::Integer(201));
        assert_eq!(coerce("-7", FieldType::Integer), Value::Integer(-7));
    }

    #[test]
    fn integer_failure_keeps_string() {
        assert_eq!(coerce("20x", FieldType::Integer), Value::from("20x"));
        assert_eq!(coerce("", FieldType::Integer), Value::from(""));
        assert_eq!(
            coerce("99999999999999999999", FieldType::Integer),
            Value::from("99999999999999999999")
        );
    }

    #[test]
    fn string_is_passthrough() {
        assert_eq!(coerce("201", FieldType::String), Value::from("201"));
    }

    #[test]
    fn float_and_boolean() {
        assert_eq!(coerce("0.25", FieldType::Float), Value::Float(0.25));
        assert_eq!(coerce("NaN", FieldType::Float), Value::from("NaN"));
        assert_eq!(coerce("true", FieldType::Boolean), Value::Bool(true));
        assert_eq!(coerce("no", FieldType::Boolean), Value::from("no"));
    }

    #[test]
    fn coerce_value_converts_existing_values() {
        assert_eq!(
            coerce_value(Value::from("16"), FieldType::Integer),
            Value::Integer(16)
        );
        assert_eq!(
            coerce_value(Value::Integer(16), FieldType::String),
            Value::from("16")
        );
        assert_eq!(
            coerce_value(Value::Integer(2), FieldType::Float),
            Value::Float(2.0)
        );
        assert_eq!(coerce_value(Value::Null, FieldType::Integer), Value::Null);
    }

    #[test]
    fn field_type_deserializes_lowercase() {
        let t: FieldType = serde_json::from_str("\"integer\"").unwrap();
        assert_eq!(t, FieldType::Integer);
        assert_eq!(t.to_string(), "integer");
    }
}
