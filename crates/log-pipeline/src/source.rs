//! 소스 파이프라인 -- receiver 하나의 순차 처리 루프
//!
//! ```text
//! FileTailer -> (파일별) MultilineStitcher -> ProcessorChain -> 소스 큐
//! ```
//!
//! receiver마다 하나의 태스크에서 실행되며 다른 receiver와 상태를 공유하지 않습니다.
//! 같은 receiver 안에서는 레코드 순서가 보존됩니다. 내보내는 채널은 이 receiver
//! 전용 큐이므로 큐가 가득 차면 이 receiver만 대기합니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use opsnorm_core::config::ReceiverConfig;
use opsnorm_core::metrics as m;
use opsnorm_core::types::LogRecord;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::collector::{CollectorStatus, FileTailer, FileTailerConfig, TailedLine};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::multiline::MultilineStitcher;
use crate::parser::ProcessorChain;
use crate::rule::CompiledRuleSet;

/// 파일 하나의 결합 상태
struct FileStitch {
    stitcher: MultilineStitcher,
    last_activity: Instant,
}

/// receiver 하나의 수집-결합-추출-변환 루프
pub struct SourcePipeline {
    receiver: String,
    tailer: FileTailer,
    rules: CompiledRuleSet,
    chain: Arc<ProcessorChain>,
    stitches: HashMap<PathBuf, FileStitch>,
    max_lines: usize,
    max_bytes: usize,
    flush_timeout: Option<Duration>,
    tx: mpsc::Sender<LogRecord>,
    status: CollectorStatus,
    emitted: u64,
}

impl SourcePipeline {
    /// 새 소스 파이프라인을 생성합니다.
    ///
    /// receiver에 include 경로가 없으면 통합의 기본 경로를 사용합니다.
    ///
    /// # Errors
    /// 수집 경로가 하나도 없거나 glob이 잘못되면 에러를 반환합니다.
    pub fn new(
        receiver: &ReceiverConfig,
        rules: CompiledRuleSet,
        config: &PipelineConfig,
        tx: mpsc::Sender<LogRecord>,
    ) -> Result<Self, LogPipelineError> {
        let include_paths = if receiver.include_paths.is_empty() {
            rules.include_paths().to_vec()
        } else {
            receiver.include_paths.clone()
        };

        let tailer = FileTailer::new(FileTailerConfig {
            receiver: receiver.name.clone(),
            include_paths,
            exclude_paths: receiver.exclude_paths.clone(),
            poll_interval: config.poll_interval(),
            max_line_length: config.max_line_length,
            read_from_head: config.read_from_head,
            ..FileTailerConfig::default()
        })?;

        Ok(Self {
            receiver: receiver.name.clone(),
            tailer,
            chain: rules.chain(),
            rules,
            stitches: HashMap::new(),
            max_lines: config.max_lines_per_record,
            max_bytes: config.max_record_bytes,
            flush_timeout: config.flush_timeout(),
            tx,
            status: CollectorStatus::Idle,
            emitted: 0,
        })
    }

    /// receiver 이름
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// 현재 상태
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 지금까지 내보낸 레코드 수
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }

    /// 취소될 때까지 폴링 루프를 실행합니다.
    ///
    /// 종료 시 개행 없는 마지막 조각과 미완성 레코드를 모두 내보낸 뒤 반환합니다.
    ///
    /// # Errors
    /// sink 채널이 닫히면 `Channel` 에러를 반환합니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<u64, LogPipelineError> {
        self.status = CollectorStatus::Running;
        tracing::info!(
            receiver = %self.receiver,
            rule_set = %self.rules.name(),
            "source pipeline started"
        );

        let mut interval = tokio::time::interval(self.tailer.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(receiver = %self.receiver, "source pipeline received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        self.status = CollectorStatus::Error(e.to_string());
                        tracing::error!(receiver = %self.receiver, error = %e, "source pipeline stopped");
                        return Err(e);
                    }
                }
            }
        }

        self.shutdown().await?;
        self.status = CollectorStatus::Stopped;
        tracing::info!(
            receiver = %self.receiver,
            emitted = self.emitted,
            "source pipeline stopped"
        );
        Ok(self.emitted)
    }

    /// 한 번 폴링하고 유휴 레코드를 flush합니다.
    pub async fn poll_once(&mut self) -> Result<(), LogPipelineError> {
        let lines = self.tailer.poll().await;
        self.ingest(lines).await?;
        self.flush_forgotten().await?;
        self.flush_idle().await
    }

    /// 남은 조각과 미완성 레코드를 모두 내보냅니다.
    pub async fn shutdown(&mut self) -> Result<(), LogPipelineError> {
        let partial = self.tailer.drain_partial();
        self.ingest(partial).await?;

        let mut paths: Vec<PathBuf> = self.stitches.keys().cloned().collect();
        paths.sort();
        for path in paths {
            let pending = self
                .stitches
                .get_mut(&path)
                .and_then(|stitch| stitch.stitcher.flush());
            if let Some(text) = pending {
                self.emit(&path, text).await?;
            }
        }
        Ok(())
    }

    /// 수집된 줄을 파일별 결합기에 넣고 닫힌 레코드를 내보냅니다.
    pub async fn ingest(&mut self, lines: Vec<TailedLine>) -> Result<(), LogPipelineError> {
        for tailed in lines {
            let outcome = {
                let stitch = self
                    .stitches
                    .entry(tailed.path.clone())
                    .or_insert_with(|| FileStitch {
                        stitcher: self.rules.stitcher(self.max_lines, self.max_bytes),
                        last_activity: Instant::now(),
                    });
                stitch.last_activity = Instant::now();
                stitch.stitcher.push(&tailed.line)
            };

            if outcome.fallback {
                metrics::counter!(m::LOG_PIPELINE_MULTILINE_FALLBACKS_TOTAL, m::LABEL_RECEIVER => self.receiver.clone())
                    .increment(1);
            }
            if outcome.forced_split {
                metrics::counter!(m::LOG_PIPELINE_MULTILINE_SPLITS_TOTAL, m::LABEL_RECEIVER => self.receiver.clone())
                    .increment(1);
                tracing::debug!(
                    receiver = %self.receiver,
                    path = %tailed.path.display(),
                    "logical record hit size limit, forcing boundary"
                );
            }
            if let Some(text) = outcome.closed {
                self.emit(&tailed.path, text).await?;
            }
        }
        Ok(())
    }

    /// 수집기가 더 이상 추적하지 않는 파일의 결합 상태를 닫고 제거합니다.
    async fn flush_forgotten(&mut self) -> Result<(), LogPipelineError> {
        let mut gone: Vec<PathBuf> = self
            .stitches
            .keys()
            .filter(|path| !self.tailer.is_tracking(path))
            .cloned()
            .collect();
        gone.sort();

        for path in gone {
            let pending = self
                .stitches
                .remove(&path)
                .and_then(|mut stitch| stitch.stitcher.flush());
            if let Some(text) = pending {
                tracing::debug!(receiver = %self.receiver, path = %path.display(), "flushing record of forgotten file");
                self.emit(&path, text).await?;
            }
        }
        Ok(())
    }

    /// 유휴 시간이 `flush_timeout`을 넘은 미완성 레코드를 닫습니다.
    async fn flush_idle(&mut self) -> Result<(), LogPipelineError> {
        let Some(timeout) = self.flush_timeout else {
            return Ok(());
        };

        let idle: Vec<PathBuf> = self
            .stitches
            .iter()
            .filter(|(_, s)| s.stitcher.has_pending() && s.last_activity.elapsed() >= timeout)
            .map(|(path, _)| path.clone())
            .collect();

        for path in idle {
            let pending = self
                .stitches
                .get_mut(&path)
                .and_then(|stitch| stitch.stitcher.flush());
            if let Some(text) = pending {
                tracing::trace!(receiver = %self.receiver, path = %path.display(), "flushing idle record");
                self.emit(&path, text).await?;
            }
        }
        Ok(())
    }

    async fn emit(&mut self, path: &Path, text: String) -> Result<(), LogPipelineError> {
        let started = Instant::now();
        let record = self.chain.process(LogRecord::from_text(
            self.receiver.as_str(),
            path.display().to_string(),
            text,
        ));
        metrics::histogram!(m::LOG_PIPELINE_PROCESSING_DURATION_SECONDS, m::LABEL_RECEIVER => self.receiver.clone())
            .record(started.elapsed().as_secs_f64());

        let severity = record
            .severity()
            .map_or("NONE", |severity| severity.as_str());
        metrics::counter!(
            m::LOG_PIPELINE_RECORDS_EMITTED_TOTAL,
            m::LABEL_RECEIVER => self.receiver.clone(),
            m::LABEL_SEVERITY => severity
        )
        .increment(1);

        self.tx
            .send(record)
            .await
            .map_err(|e| LogPipelineError::Channel(format!("sink closed: {e}")))?;
        self.emitted += 1;
        Ok(())
    }
}
