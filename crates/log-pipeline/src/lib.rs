#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: glob 기반 파일 tailer (오프셋, 로테이션, 부분 줄)
//! - [`multiline`]: 상태 기계 기반 멀티라인 결합기
//! - [`parser`]: 시간 해석기, 타입 변환기, 정규식 추출기, JSON 페이로드 파서, 처리 체인
//! - [`modify`]: 필드 변환기 (복사/이동/값 매핑/와일드카드 중첩)
//! - [`rule`]: 선언형 규칙 모델과 YAML 규칙 집합 로더
//! - [`apps`]: 내장 통합(CouchDB, Elasticsearch, Solr)과 규칙 레지스트리
//! - [`source`]: receiver별 순차 처리 루프
//! - [`pipeline`]: 전체 파이프라인 생명주기 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> MultilineStitcher -> RegexExtractor / JsonPayloadParser -> FieldModifier -> sink
//!     |                |                       |                                |
//!  glob + offset   state machine        named captures                 copy/move/map/nest
//! ```

pub mod apps;
pub mod config;
pub mod error;
pub mod modify;
pub mod multiline;
pub mod pipeline;
pub mod source;

pub mod collector;
pub mod parser;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};
pub use source::SourcePipeline;

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{JsonPayloadParser, ProcessorChain, RegexExtractor, TimeFormat};

// 멀티라인
pub use multiline::{MultilineRules, MultilineStitcher};

// 필드 변환
pub use modify::FieldModifier;

// 규칙
pub use rule::{CompiledRuleSet, RuleSet, RuleSetLoader};

// 통합
pub use apps::{AppKind, RuleRegistry};

// 수집기
pub use collector::{FileTailer, FileTailerConfig};
