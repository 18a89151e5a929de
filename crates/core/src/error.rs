//! 에러 타입 -- 도메인별 에러 정의

use crate::types::Value;

/// opsnorm 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum OpsnormError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 알 수 없는 receiver 타입
    #[error("unknown receiver type '{kind}' for receiver '{receiver}'")]
    UnknownReceiverType { receiver: String, kind: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 필드 경로 기록 실패
///
/// 중간 경로에 레코드가 아닌 값이 있어 기록하지 않은 경우입니다.
/// 기록하려던 값은 `rejected`로 돌려받습니다.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot write '{path}': '{blocked_at}' holds a non-record value")]
pub struct PathConflict {
    /// 기록하려던 경로
    pub path: String,
    /// 레코드가 아닌 값이 있는 중간 경로
    pub blocked_at: String,
    /// 기록되지 않은 값
    pub rejected: Value,
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 파싱 실패
    #[error("parse failed at offset {offset}: {reason}")]
    Failed { offset: usize, reason: String },
}
