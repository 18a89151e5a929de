//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`PipelineSettings`](opsnorm_core::config::PipelineSettings)와
//! receiver 목록을 합쳐 엔진이 사용하는 단일 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use opsnorm_core::config::OpsnormConfig;
//! use opsnorm_log_pipeline::config::PipelineConfig;
//!
//! let core_config = OpsnormConfig::default();
//! let config = PipelineConfig::from_core(&core_config.pipeline, &core_config.receivers);
//! ```

use std::path::{Component, Path};
use std::time::Duration;

use opsnorm_core::config::{PipelineSettings, ReceiverConfig};
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

const MAX_CHANNEL_CAPACITY: usize = 1_000_000;
const MAX_POLL_INTERVAL_MS: u64 = 3_600_000; // 1 hour
const MAX_RECORD_BYTES: usize = 64 * 1024 * 1024; // 64MB

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// sink 채널 용량
    pub channel_capacity: usize,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 유휴 미완성 레코드 flush 시간 (밀리초, 0이면 비활성)
    pub flush_timeout_ms: u64,
    /// 논리 레코드 최대 크기 (바이트)
    pub max_record_bytes: usize,
    /// 논리 레코드 최대 줄 수
    pub max_lines_per_record: usize,
    /// 물리 줄 최대 길이 (바이트)
    pub max_line_length: usize,
    /// 처음 발견한 파일을 처음부터 읽을지 여부
    pub read_from_head: bool,
    /// 사용자 정의 규칙 집합 디렉토리 (빈 문자열이면 사용 안 함)
    pub rule_dir: String,
    /// 로그 소스 목록
    pub receivers: Vec<ReceiverConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&PipelineSettings::default(), &[])
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(settings: &PipelineSettings, receivers: &[ReceiverConfig]) -> Self {
        Self {
            channel_capacity: settings.channel_capacity,
            poll_interval_ms: settings.poll_interval_ms,
            flush_timeout_ms: settings.flush_timeout_ms,
            max_record_bytes: settings.max_record_bytes,
            max_lines_per_record: settings.max_lines_per_record,
            max_line_length: settings.max_line_length,
            read_from_head: settings.read_from_head,
            rule_dir: settings.rule_dir.clone(),
            receivers: receivers.to_vec(),
        }
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 유휴 flush 시간 (비활성이면 `None`)
    pub fn flush_timeout(&self) -> Option<Duration> {
        (self.flush_timeout_ms > 0).then(|| Duration::from_millis(self.flush_timeout_ms))
    }

    /// 수집 경로 패턴을 검증합니다.
    ///
    /// - 비어 있지 않아야 함
    /// - 절대 경로여야 함
    /// - `..` 컴포넌트를 포함하지 않아야 함
    fn validate_path_pattern(field: &str, pattern: &str) -> Result<(), LogPipelineError> {
        if pattern.is_empty() {
            return Err(config_error(field, "path pattern must not be empty"));
        }

        let path = Path::new(pattern);
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(config_error(
                field,
                format!("path pattern '{pattern}' contains path traversal pattern '..'"),
            ));
        }
        if !path.is_absolute() {
            return Err(config_error(
                field,
                format!("path pattern '{pattern}' must be an absolute path"),
            ));
        }
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(config_error(
                "channel_capacity",
                format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            ));
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(config_error(
                "poll_interval_ms",
                format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.max_line_length == 0 {
            return Err(config_error("max_line_length", "must be greater than 0"));
        }

        if self.max_record_bytes < self.max_line_length || self.max_record_bytes > MAX_RECORD_BYTES
        {
            return Err(config_error(
                "max_record_bytes",
                format!("must be between max_line_length and {MAX_RECORD_BYTES}"),
            ));
        }

        if self.max_lines_per_record == 0 {
            return Err(config_error("max_lines_per_record", "must be greater than 0"));
        }

        for (idx, receiver) in self.receivers.iter().enumerate() {
            if receiver.name.is_empty() {
                return Err(config_error(
                    &format!("receivers[{idx}].name"),
                    "name must not be empty",
                ));
            }
            if self.receivers[..idx].iter().any(|r| r.name == receiver.name) {
                return Err(config_error(
                    &format!("receivers[{idx}].name"),
                    format!("duplicate receiver name '{}'", receiver.name),
                ));
            }
            for pattern in &receiver.include_paths {
                Self::validate_path_pattern(&format!("receivers[{idx}].include_paths"), pattern)?;
            }
            for pattern in &receiver.exclude_paths {
                Self::validate_path_pattern(&format!("receivers[{idx}].exclude_paths"), pattern)?;
            }
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// sink 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 유휴 flush 시간(밀리초)을 설정합니다.
    pub fn flush_timeout_ms(mut self, ms: u64) -> Self {
        self.config.flush_timeout_ms = ms;
        self
    }

    /// 논리 레코드 한계를 설정합니다.
    pub fn record_limits(mut self, max_lines: usize, max_bytes: usize) -> Self {
        self.config.max_lines_per_record = max_lines;
        self.config.max_record_bytes = max_bytes;
        self
    }

    /// 물리 줄 최대 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 기존 파일을 처음부터 읽을지 설정합니다.
    pub fn read_from_head(mut self, enabled: bool) -> Self {
        self.config.read_from_head = enabled;
        self
    }

    /// 규칙 디렉토리를 설정합니다.
    pub fn rule_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.rule_dir = dir.into();
        self
    }

    /// receiver를 추가합니다.
    pub fn receiver(mut self, receiver: ReceiverConfig) -> Self {
        self.config.receivers.push(receiver);
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
