//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for OpsnormError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 규칙 관련 에러(`RuleLoad`, `RuleValidation`, `Pattern`, `UnknownReceiverType`)는
//! 모두 시작 시점에 발생하며 치명적입니다. 레코드 단위 실패(`Parse`)는
//! 호출자가 로그를 남기고 최선의 표현으로 계속 진행합니다.

use opsnorm_core::error::{ConfigError, OpsnormError, ParseError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 레코드 단위 파싱 실패 (시간, JSON 등)
    #[error("parse error: {format} at offset {offset}: {reason}")]
    Parse {
        /// 파서 형식 (time, json 등)
        format: String,
        /// 실패 위치 (바이트 오프셋)
        offset: usize,
        /// 실패 사유
        reason: String,
    },

    /// 규칙 집합 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 식별자
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 정규식 컴파일 실패
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern {
        /// 원본 패턴
        pattern: String,
        /// 컴파일러 메시지
        reason: String,
    },

    /// 알 수 없는 receiver 타입
    #[error("unknown receiver type '{kind}' for receiver '{receiver}'")]
    UnknownReceiverType {
        /// receiver 이름
        receiver: String,
        /// 요청한 타입
        kind: String,
    },

    /// 수집기 에러 (파일 I/O, glob 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for OpsnormError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                OpsnormError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::UnknownReceiverType { receiver, kind } => {
                OpsnormError::Config(ConfigError::UnknownReceiverType { receiver, kind })
            }
            LogPipelineError::Parse { offset, reason, .. } => {
                OpsnormError::Parse(ParseError::Failed { offset, reason })
            }
            LogPipelineError::Channel(msg) => OpsnormError::Pipeline(PipelineError::ChannelSend(msg)),
            LogPipelineError::Io(e) => OpsnormError::Io(e),
            other => OpsnormError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
