//! 메트릭 상수 및 설명 등록
//!
//! 에이전트 자체의 동작 메트릭 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `opsnorm_`
//! - 모듈명: `log_pipeline_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(opsnorm_core::metrics::LOG_PIPELINE_LINES_READ_TOTAL,
//!     opsnorm_core::metrics::LABEL_RECEIVER => "couchdb").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// receiver 이름 레이블 키
pub const LABEL_RECEIVER: &str = "receiver";

/// 심각도 레이블 키 (DEBUG ~ EMERGENCY)
pub const LABEL_SEVERITY: &str = "severity";

/// 처리 단계 레이블 키 (regex, json, modify)
pub const LABEL_PROCESSOR: &str = "processor";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: 읽은 물리 줄 수 (counter)
pub const LOG_PIPELINE_LINES_READ_TOTAL: &str = "opsnorm_log_pipeline_lines_read_total";

/// Log Pipeline: 잘린 물리 줄 수 (counter)
pub const LOG_PIPELINE_LINES_TRUNCATED_TOTAL: &str =
    "opsnorm_log_pipeline_lines_truncated_total";

/// Log Pipeline: sink로 내보낸 논리 레코드 수 (counter)
pub const LOG_PIPELINE_RECORDS_EMITTED_TOTAL: &str =
    "opsnorm_log_pipeline_records_emitted_total";

/// Log Pipeline: 어떤 추출 패턴에도 맞지 않은 레코드 수 (counter)
pub const LOG_PIPELINE_RECORDS_UNMATCHED_TOTAL: &str =
    "opsnorm_log_pipeline_records_unmatched_total";

/// Log Pipeline: 시간 파싱 실패 수 (counter)
pub const LOG_PIPELINE_TIME_PARSE_FAILURES_TOTAL: &str =
    "opsnorm_log_pipeline_time_parse_failures_total";

/// Log Pipeline: 전이 규칙이 없어 새 레코드로 처리된 줄 수 (counter)
pub const LOG_PIPELINE_MULTILINE_FALLBACKS_TOTAL: &str =
    "opsnorm_log_pipeline_multiline_fallbacks_total";

/// Log Pipeline: 크기/줄 수 한계로 강제 분할된 레코드 수 (counter)
pub const LOG_PIPELINE_MULTILINE_SPLITS_TOTAL: &str =
    "opsnorm_log_pipeline_multiline_splits_total";

/// Log Pipeline: 감지된 파일 로테이션/절단 수 (counter)
pub const LOG_PIPELINE_FILE_ROTATIONS_TOTAL: &str = "opsnorm_log_pipeline_file_rotations_total";

/// Log Pipeline: 현재 추적 중인 파일 수 (gauge)
pub const LOG_PIPELINE_FILES_TRACKED: &str = "opsnorm_log_pipeline_files_tracked";

/// Log Pipeline: 레코드 하나의 처리 시간 (histogram, 초)
pub const LOG_PIPELINE_PROCESSING_DURATION_SECONDS: &str =
    "opsnorm_log_pipeline_processing_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "opsnorm_daemon_uptime_seconds";

/// Daemon: 설정된 receiver 수 (gauge)
pub const DAEMON_RECEIVERS_CONFIGURED: &str = "opsnorm_daemon_receivers_configured";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "opsnorm_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 레코드 처리 지연 시간 히스토그램 버킷 (초)
///
/// 10us ~ 100ms 범위
pub const PROCESSING_DURATION_BUCKETS: [f64; 8] =
    [0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.1];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        LOG_PIPELINE_LINES_READ_TOTAL,
        "Total number of physical lines read from tailed files"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_TRUNCATED_TOTAL,
        "Total number of physical lines truncated to max_line_length"
    );
    describe_counter!(
        LOG_PIPELINE_RECORDS_EMITTED_TOTAL,
        "Total number of normalized records handed to the sink"
    );
    describe_counter!(
        LOG_PIPELINE_RECORDS_UNMATCHED_TOTAL,
        "Total number of records no extraction pattern matched"
    );
    describe_counter!(
        LOG_PIPELINE_TIME_PARSE_FAILURES_TOTAL,
        "Total number of captured timestamps that failed to parse"
    );
    describe_counter!(
        LOG_PIPELINE_MULTILINE_FALLBACKS_TOTAL,
        "Total number of lines that matched no multiline transition"
    );
    describe_counter!(
        LOG_PIPELINE_MULTILINE_SPLITS_TOTAL,
        "Total number of records force-closed by size or line limits"
    );
    describe_counter!(
        LOG_PIPELINE_FILE_ROTATIONS_TOTAL,
        "Total number of file rotations or truncations detected"
    );
    describe_gauge!(
        LOG_PIPELINE_FILES_TRACKED,
        "Number of files currently tracked by tailers"
    );
    describe_histogram!(
        LOG_PIPELINE_PROCESSING_DURATION_SECONDS,
        "Time to run one logical record through the processor chain"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "opsnorm daemon uptime in seconds");
    describe_gauge!(
        DAEMON_RECEIVERS_CONFIGURED,
        "Number of receivers configured in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LOG_PIPELINE_LINES_READ_TOTAL,
        LOG_PIPELINE_LINES_TRUNCATED_TOTAL,
        LOG_PIPELINE_RECORDS_EMITTED_TOTAL,
        LOG_PIPELINE_RECORDS_UNMATCHED_TOTAL,
        LOG_PIPELINE_TIME_PARSE_FAILURES_TOTAL,
        LOG_PIPELINE_MULTILINE_FALLBACKS_TOTAL,
        LOG_PIPELINE_MULTILINE_SPLITS_TOTAL,
        LOG_PIPELINE_FILE_ROTATIONS_TOTAL,
        LOG_PIPELINE_FILES_TRACKED,
        LOG_PIPELINE_PROCESSING_DURATION_SECONDS,
        DAEMON_UPTIME_SECONDS,
        DAEMON_RECEIVERS_CONFIGURED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_opsnorm_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("opsnorm_"),
                "Metric '{}' does not start with 'opsnorm_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES.iter().filter(|n| n.contains("_total")) {
            assert!(name.ends_with("_total"), "counter '{}' misnamed", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_RECEIVER, LABEL_SEVERITY, LABEL_PROCESSOR] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn processing_duration_buckets_are_sorted() {
        let buckets = PROCESSING_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(buckets[i] > buckets[i - 1]);
        }
    }
}
