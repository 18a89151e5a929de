//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: 시작/정지/상태 확인이 가능한 장기 실행 컴포넌트
//! - [`RecordProcessor`]: 논리 레코드 하나를 받아 변환하는 동기 단계

use std::future::Future;

use serde::Serialize;

use crate::error::OpsnormError;
use crate::types::LogRecord;

/// 파이프라인 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 부분적으로 동작 (사유 포함)
    Degraded(String),
    /// 동작 불가 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 장기 실행 파이프라인 생명주기 trait
///
/// 구현체는 `async fn`으로 메서드를 정의할 수 있습니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), OpsnormError>> + Send;

    /// 파이프라인을 정지합니다. 대기 중인 레코드는 flush됩니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), OpsnormError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 레코드 처리 단계 trait
///
/// 새로운 파싱/변환 단계를 추가하려면 이 trait을 구현합니다.
/// 처리 단계는 레코드를 버리지 않습니다. 처리할 수 없는 입력은
/// 가능한 최선의 표현으로 그대로 통과시킵니다.
pub trait RecordProcessor: Send + Sync {
    /// 단계 이름
    fn name(&self) -> &str;

    /// 레코드를 변환합니다.
    fn process(&self, record: LogRecord) -> LogRecord;
}
