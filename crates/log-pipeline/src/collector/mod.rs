//! 로그 수집 모듈 -- 로그 파일에서 물리적 줄을 수집합니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: glob 기반 파일 감시 (tail -F 방식)
//!
//! # 아키텍처
//! 수집기는 소스 파이프라인 태스크 안에서 주기적으로 폴링되며,
//! 반환된 줄은 같은 태스크에서 멀티라인 조립기로 전달됩니다.

pub mod file;

pub use file::{FileTailer, FileTailerConfig, TailedLine};

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

impl CollectorStatus {
    /// 실행 중인지 여부
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for CollectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Error(reason) => write!(f, "error: {reason}"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
