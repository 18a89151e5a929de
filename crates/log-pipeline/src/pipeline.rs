//! 파이프라인 오케스트레이션 -- receiver별 소스 파이프라인의 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](opsnorm_core::pipeline::Pipeline) trait을 구현하여
//! `opsnorm-daemon`에서 시작/정지/상태 확인됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! receiver A: SourcePipeline -> mpsc(A) -> forwarder ─┐
//! receiver B: SourcePipeline -> mpsc(B) -> forwarder ─┼─> mpsc<LogRecord> -> sink
//! receiver C: SourcePipeline -> mpsc(C) -> forwarder ─┘
//! ```
//!
//! 소스마다 `channel_capacity` 크기의 큐를 따로 가지므로 한 소스의 큐가 가득 차도
//! 그 소스만 대기합니다.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use opsnorm_core::error::{OpsnormError, PipelineError};
use opsnorm_core::pipeline::{HealthStatus, Pipeline};
use opsnorm_core::types::LogRecord;

use crate::apps::RuleRegistry;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::source::SourcePipeline;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

struct SourceTask {
    receiver: String,
    handle: JoinHandle<Result<u64, LogPipelineError>>,
    forwarder: JoinHandle<u64>,
}

/// 소스 큐의 레코드를 공유 sink로 옮깁니다.
///
/// 큐는 소스 태스크가 끝나면 닫히고, sink가 닫히면 큐를 버려 소스 쪽 전송이 실패하게 합니다.
async fn forward(
    receiver: String,
    mut queue: mpsc::Receiver<LogRecord>,
    sink: mpsc::Sender<LogRecord>,
) -> u64 {
    let mut forwarded = 0;
    while let Some(record) = queue.recv().await {
        if sink.send(record).await.is_err() {
            tracing::warn!(receiver = %receiver, "sink closed, dropping source queue");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

/// 로그 파이프라인
///
/// 빌드 시점에 모든 receiver의 규칙 집합을 확인하므로 알 수 없는 타입은
/// 어떤 태스크도 시작되기 전에 에러가 됩니다.
///
/// # 사용 예시
/// ```ignore
/// use opsnorm_log_pipeline::{LogPipelineBuilder, RuleRegistry};
///
/// let (mut pipeline, record_rx) = LogPipelineBuilder::new()
///     .config(config)
///     .registry(RuleRegistry::with_builtins()?)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct LogPipeline {
    config: PipelineConfig,
    state: PipelineState,
    registry: RuleRegistry,
    record_tx: mpsc::Sender<LogRecord>,
    cancel: CancellationToken,
    tasks: Vec<SourceTask>,
    emitted: u64,
}

impl LogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 설정된 receiver 수
    pub fn receiver_count(&self) -> usize {
        self.config.receivers.len()
    }

    /// 정지된 소스들이 내보낸 레코드 수 합계
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }

    /// 규칙 레지스트리
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    fn spawn_sources(&mut self) -> Result<(), LogPipelineError> {
        let mut sources = Vec::with_capacity(self.config.receivers.len());
        for receiver in &self.config.receivers {
            let rules = self.registry.resolve(&receiver.name, &receiver.kind)?;
            let (queue_tx, queue_rx) = mpsc::channel(self.config.channel_capacity);
            let source = SourcePipeline::new(receiver, rules, &self.config, queue_tx)?;
            sources.push((source, queue_rx));
        }

        // 모든 소스가 준비된 뒤에만 태스크를 시작
        for (source, queue_rx) in sources {
            let receiver = source.receiver().to_owned();
            let forwarder = tokio::spawn(forward(
                receiver.clone(),
                queue_rx,
                self.record_tx.clone(),
            ));
            let handle = tokio::spawn(source.run(self.cancel.child_token()));
            self.tasks.push(SourceTask {
                receiver,
                handle,
                forwarder,
            });
        }
        Ok(())
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), OpsnormError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(receivers = self.config.receivers.len(), "starting log pipeline");

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.spawn_sources()?;

        self.state = PipelineState::Running;
        tracing::info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), OpsnormError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");
        self.cancel.cancel();

        // 각 소스가 미완성 레코드를 flush할 때까지 대기
        for task in self.tasks.drain(..) {
            match task.handle.await {
                Ok(Ok(emitted)) => {
                    tracing::debug!(receiver = %task.receiver, emitted, "source finished");
                    self.emitted += emitted;
                }
                Ok(Err(e)) => {
                    tracing::warn!(receiver = %task.receiver, error = %e, "source finished with error");
                }
                Err(e) => {
                    tracing::error!(receiver = %task.receiver, error = %e, "source task panicked");
                }
            }
            // 소스가 끝나면 큐가 닫히므로 남은 레코드를 옮긴 뒤 종료됨
            match task.forwarder.await {
                Ok(forwarded) => {
                    tracing::debug!(receiver = %task.receiver, forwarded, "source queue drained");
                }
                Err(e) => {
                    tracing::error!(receiver = %task.receiver, error = %e, "forwarder task panicked");
                }
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!(emitted = self.emitted, "log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let dead: Vec<&str> = self
                    .tasks
                    .iter()
                    .filter(|task| task.handle.is_finished() || task.forwarder.is_finished())
                    .map(|task| task.receiver.as_str())
                    .collect();
                if dead.is_empty() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded(format!("sources stopped: {}", dead.join(", ")))
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인을 구성하고 레코드 채널을 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    registry: Option<RuleRegistry>,
    record_tx: Option<mpsc::Sender<LogRecord>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            registry: None,
            record_tx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 규칙 레지스트리를 지정합니다 (없으면 내장 통합만 사용).
    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 외부 레코드 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 `channel_capacity` 크기의 새 채널을 생성합니다.
    pub fn record_sender(mut self, tx: mpsc::Sender<LogRecord>) -> Self {
        self.record_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<LogRecord>>`: 레코드 수신 채널
    ///   (외부 record_sender를 설정한 경우 None)
    ///
    /// # Errors
    /// 설정이 잘못되었거나 receiver 타입을 찾을 수 없으면 에러를 반환합니다.
    pub fn build(
        self,
    ) -> Result<(LogPipeline, Option<mpsc::Receiver<LogRecord>>), LogPipelineError> {
        self.config.validate()?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => RuleRegistry::with_builtins()?,
        };
        for receiver in &self.config.receivers {
            registry.resolve(&receiver.name, &receiver.kind)?;
        }

        let (record_tx, record_rx) = match self.record_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                (tx, Some(rx))
            }
        };

        let pipeline = LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            registry,
            record_tx,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            emitted: 0,
        };

        Ok((pipeline, record_rx))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
