//! 레코드 처리 모듈 -- 정규식 추출, JSON 파싱, 시간/타입 변환
//!
//! [`ProcessorChain`]은 선언된 처리 단계를 순서대로 적용합니다.
//! 각 단계는 core의 [`RecordProcessor`] trait을 구현합니다.
//!
//! # 처리 단계
//! - 정규식 추출 ([`RegexExtractor`])
//! - JSON 본문 파싱 ([`JsonPayloadParser`])
//! - 필드 변환 ([`FieldModifier`](crate::modify::FieldModifier))
//!
//! # 사용 예시
//! ```ignore
//! use opsnorm_log_pipeline::parser::ProcessorChain;
//!
//! let chain = ProcessorChain::from_specs(&rule_set.processors)?;
//! let record = chain.process(LogRecord::from_text("couchdb", path, text));
//! ```

pub mod coerce;
pub mod json;
pub mod regex;
pub mod time;

pub use coerce::{FieldType, coerce, coerce_value};
pub use json::JsonPayloadParser;
pub use regex::{Extraction, RegexExtractor};
pub use time::{TimeFormat, parse_time};

use opsnorm_core::pipeline::RecordProcessor;
use opsnorm_core::types::LogRecord;

use crate::error::LogPipelineError;
use crate::modify::FieldModifier;
use crate::rule::types::ProcessorSpec;

/// 처리 단계 체인
///
/// 등록 순서대로 모든 단계를 적용합니다. 단계는 실패하지 않으며,
/// 적용할 수 없는 레코드는 그대로 다음 단계로 넘깁니다.
pub struct ProcessorChain {
    /// 등록된 처리 단계 (순서대로 적용)
    processors: Vec<Box<dyn RecordProcessor>>,
}

impl ProcessorChain {
    /// 빈 체인을 생성합니다.
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// 선언 목록으로부터 체인을 생성합니다.
    ///
    /// # Errors
    /// 어느 한 단계라도 컴파일에 실패하면 에러를 반환합니다.
    pub fn from_specs(specs: &[ProcessorSpec]) -> Result<Self, LogPipelineError> {
        let mut chain = Self::new();
        for spec in specs {
            let processor: Box<dyn RecordProcessor> = match spec {
                ProcessorSpec::ParseRegex { field, rules } => Box::new(
                    RegexExtractor::with_source_field(field.clone(), rules.clone())?,
                ),
                ProcessorSpec::ParseJson {
                    field,
                    time_key,
                    time_format,
                } => {
                    let mut parser = JsonPayloadParser::new(field.clone());
                    if let Some(key) = time_key {
                        parser = parser.with_time_key(key.clone(), time_format.as_deref());
                    }
                    Box::new(parser)
                }
                ProcessorSpec::ModifyFields { rules } => Box::new(FieldModifier::new(rules.clone())?),
            };
            chain.processors.push(processor);
        }
        Ok(chain)
    }

    /// 처리 단계를 등록합니다. 등록 순서대로 적용됩니다.
    pub fn register(mut self, processor: Box<dyn RecordProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// 레코드에 모든 단계를 적용합니다.
    pub fn process(&self, record: LogRecord) -> LogRecord {
        self.processors
            .iter()
            .fold(record, |record, processor| processor.process(record))
    }

    /// 등록된 단계 이름 목록
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// 등록된 단계 수
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// 단계가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.processor_names())
            .finish()
    }
}
