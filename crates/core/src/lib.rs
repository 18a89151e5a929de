//! opsnorm 공통 크레이트
//!
//! 정규화 엔진, 데몬, CLI가 함께 쓰는 레코드 모델([`Record`], [`LogRecord`]),
//! 에러 계층, `opsnorm.toml` 설정, 파이프라인 trait, 메트릭 이름을 제공합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, OpsnormError, ParseError, PathConflict, PipelineError};

// 설정
pub use config::OpsnormConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline, RecordProcessor};

// 도메인 타입
pub use types::{LogRecord, Record, Severity, Value};
