//! 설정 관리 -- opsnorm.toml 파싱 및 런타임 설정
//!
//! [`OpsnormConfig`]는 데몬과 CLI가 공유하는 최상위 설정 구조체입니다.
//! 공통 그룹(`general`, `pipeline`, `metrics`, `output`)과
//! receiver 목록을 명시적으로 조합합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`OPSNORM_PIPELINE_POLL_INTERVAL_MS=500` 형식)
//! 3. 설정 파일 (`opsnorm.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), opsnorm_core::error::OpsnormError> {
//! use opsnorm_core::config::OpsnormConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = OpsnormConfig::load("opsnorm.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = OpsnormConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, OpsnormError};

/// opsnorm 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsnormConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파이프라인 공통 설정
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// 내부 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 정규화된 레코드 출력 설정
    #[serde(default)]
    pub output: OutputConfig,
    /// 로그 소스(receiver) 목록
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
}

impl OpsnormConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, OpsnormError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, OpsnormError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OpsnormError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                OpsnormError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, OpsnormError> {
        toml::from_str(toml_str).map_err(|e| {
            OpsnormError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `OPSNORM_{SECTION}_{FIELD}`
    /// receiver 목록은 환경변수로 바꿀 수 없습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "OPSNORM_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "OPSNORM_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "OPSNORM_GENERAL_PID_FILE");

        // Pipeline
        override_usize(
            &mut self.pipeline.channel_capacity,
            "OPSNORM_PIPELINE_CHANNEL_CAPACITY",
        );
        override_u64(
            &mut self.pipeline.poll_interval_ms,
            "OPSNORM_PIPELINE_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.pipeline.flush_timeout_ms,
            "OPSNORM_PIPELINE_FLUSH_TIMEOUT_MS",
        );
        override_usize(
            &mut self.pipeline.max_record_bytes,
            "OPSNORM_PIPELINE_MAX_RECORD_BYTES",
        );
        override_usize(
            &mut self.pipeline.max_lines_per_record,
            "OPSNORM_PIPELINE_MAX_LINES_PER_RECORD",
        );
        override_usize(
            &mut self.pipeline.max_line_length,
            "OPSNORM_PIPELINE_MAX_LINE_LENGTH",
        );
        override_bool(
            &mut self.pipeline.read_from_head,
            "OPSNORM_PIPELINE_READ_FROM_HEAD",
        );
        override_string(&mut self.pipeline.rule_dir, "OPSNORM_PIPELINE_RULE_DIR");

        // Metrics
        override_bool(&mut self.metrics.enabled, "OPSNORM_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "OPSNORM_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "OPSNORM_METRICS_PORT");

        // Output
        override_string(&mut self.output.kind, "OPSNORM_OUTPUT_KIND");
        override_string(&mut self.output.path, "OPSNORM_OUTPUT_PATH");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// receiver 타입이 실제로 존재하는지는 규칙 집합을 알고 있는
    /// 로그 파이프라인이 조립 시점에 확인합니다.
    pub fn validate(&self) -> Result<(), OpsnormError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.pipeline.validate()?;

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.kind.as_str()) {
            return Err(invalid(
                "output.kind",
                format!("must be one of: {}", valid_outputs.join(", ")),
            ));
        }
        if self.output.kind == "file" && self.output.path.is_empty() {
            return Err(invalid(
                "output.path",
                "path must not be empty when output kind is 'file'",
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid("metrics.port", "port must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for (idx, receiver) in self.receivers.iter().enumerate() {
            if receiver.name.is_empty() {
                return Err(invalid(
                    &format!("receivers[{idx}].name"),
                    "name must not be empty",
                ));
            }
            if receiver.kind.is_empty() {
                return Err(invalid(
                    &format!("receivers[{idx}].type"),
                    "type must not be empty",
                ));
            }
            if !seen.insert(receiver.name.as_str()) {
                return Err(invalid(
                    &format!("receivers[{idx}].name"),
                    format!("duplicate receiver name '{}'", receiver.name),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> OpsnormError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 기록하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 파이프라인 공통 설정
///
/// 모든 receiver가 공유하는 tailer/stitcher 한계값입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// sink 채널 용량 (가득 차면 해당 소스만 대기)
    pub channel_capacity: usize,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 유휴 상태의 미완성 레코드를 flush하기까지의 시간 (밀리초, 0이면 비활성)
    pub flush_timeout_ms: u64,
    /// 논리 레코드 최대 크기 (바이트)
    pub max_record_bytes: usize,
    /// 논리 레코드 최대 줄 수
    pub max_lines_per_record: usize,
    /// 물리 줄 최대 길이 (바이트, 초과분은 잘림)
    pub max_line_length: usize,
    /// 처음 발견한 파일을 처음부터 읽을지 여부
    pub read_from_head: bool,
    /// 사용자 정의 규칙 집합 디렉토리 (빈 문자열이면 사용 안 함)
    pub rule_dir: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            poll_interval_ms: 1000,
            flush_timeout_ms: 5000,
            max_record_bytes: 512 * 1024, // 512KB
            max_lines_per_record: 1000,
            max_line_length: 64 * 1024, // 64KB
            read_from_head: false,
            rule_dir: String::new(),
        }
    }
}

impl PipelineSettings {
    /// 파이프라인 설정값을 검증합니다.
    pub fn validate(&self) -> Result<(), OpsnormError> {
        if self.channel_capacity == 0 {
            return Err(invalid(
                "pipeline.channel_capacity",
                "must be greater than 0",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("pipeline.poll_interval_ms", "must be greater than 0"));
        }
        if self.max_line_length == 0 {
            return Err(invalid("pipeline.max_line_length", "must be greater than 0"));
        }
        if self.max_record_bytes < self.max_line_length {
            return Err(invalid(
                "pipeline.max_record_bytes",
                "must be at least max_line_length",
            ));
        }
        if self.max_lines_per_record == 0 {
            return Err(invalid(
                "pipeline.max_lines_per_record",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// 내부 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 출력 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 출력 종류 (stdout, file)
    pub kind: String,
    /// `file` 출력 경로
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kind: "stdout".to_owned(),
            path: String::new(),
        }
    }
}

/// 하나의 로그 소스 설정
///
/// `type`은 내장 통합 이름(`couchdb`, `elasticsearch_json`, ...)이거나
/// `rule_dir`에서 로드한 규칙 집합 이름입니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// receiver 이름 (출력 레코드에 기록)
    pub name: String,
    /// 통합 타입
    #[serde(rename = "type")]
    pub kind: String,
    /// 수집 대상 glob (비어 있으면 통합 기본값 사용)
    #[serde(default)]
    pub include_paths: Vec<String>,
    /// 제외 glob
    #[serde(default)]
    pub exclude_paths: Vec<String>,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
