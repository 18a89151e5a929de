//! 파일 기반 로그 수집기
//!
//! glob 패턴에 일치하는 로그 파일을 감시하며 새로 추가된 줄을 수집합니다.
//! `tail -F`와 유사한 동작을 폴링 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등, Unix 전용)
//! - 파일 크기 축소 감지 (truncation)
//! - 새로 생긴 파일 자동 열기 (처음부터 읽음)
//!
//! # 부분 줄
//! 개행으로 끝나지 않은 마지막 조각은 파일별 버퍼에 보관되었다가 다음 읽기에서
//! 이어 붙습니다. `max_line_length`를 넘는 줄은 잘려서 전달되고 나머지는 버려집니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Buf, BytesMut};
use opsnorm_core::metrics as m;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::LogPipelineError;

/// 한 번의 폴링에서 파일당 최대 읽기 크기
const DEFAULT_MAX_READ_BYTES: usize = 1024 * 1024; // 1MB

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct FileTailerConfig {
    /// 메트릭 라벨로 쓰일 receiver 이름
    pub receiver: String,
    /// 감시할 파일 glob 목록
    pub include_paths: Vec<String>,
    /// 제외할 파일 glob 목록
    pub exclude_paths: Vec<String>,
    /// 파일 상태 체크 주기
    pub poll_interval: Duration,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 한 번에 읽을 최대 바이트 수
    pub max_read_bytes: usize,
    /// 시작 시 이미 존재하던 파일을 처음부터 읽을지 여부
    pub read_from_head: bool,
}

impl Default for FileTailerConfig {
    fn default() -> Self {
        Self {
            receiver: String::new(),
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            poll_interval: Duration::from_millis(1000),
            max_line_length: 64 * 1024, // 64KB
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            read_from_head: false,
        }
    }
}

/// 수집된 한 줄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailedLine {
    /// 원본 파일 경로
    pub path: PathBuf,
    /// 줄 내용 (개행 제외)
    pub line: String,
    /// `max_line_length`로 잘렸는지 여부
    pub truncated: bool,
}

/// 파일별 추적 상태
#[derive(Debug, Default)]
struct FileState {
    /// 마지막 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 현재 파일의 inode (Unix 전용)
    inode: Option<u64>,
    /// 개행을 기다리는 조각
    partial: BytesMut,
    /// 잘린 줄의 나머지를 버리는 중
    discarding: bool,
}

/// 파일 기반 로그 수집기
///
/// [`poll`](Self::poll)을 호출할 때마다 glob을 다시 평가하고,
/// 각 파일의 마지막 오프셋 이후에 추가된 완전한 줄을 반환합니다.
pub struct FileTailer {
    config: FileTailerConfig,
    include: Vec<String>,
    exclude: Vec<glob::Pattern>,
    files: HashMap<PathBuf, FileState>,
    /// 첫 스캔 완료 여부 (이후 발견된 파일은 처음부터 읽음)
    scanned: bool,
}

impl FileTailer {
    /// 새 파일 수집기를 생성합니다.
    ///
    /// # Errors
    /// include/exclude 패턴이 올바른 glob이 아니면 에러를 반환합니다.
    pub fn new(config: FileTailerConfig) -> Result<Self, LogPipelineError> {
        if config.include_paths.is_empty() {
            return Err(LogPipelineError::Collector {
                source_type: "file".to_owned(),
                reason: format!("receiver '{}' has no include paths", config.receiver),
            });
        }

        for pattern in &config.include_paths {
            glob::Pattern::new(pattern).map_err(|e| LogPipelineError::Collector {
                source_type: "file".to_owned(),
                reason: format!("invalid include pattern '{pattern}': {e}"),
            })?;
        }

        let exclude = config
            .exclude_paths
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| LogPipelineError::Collector {
                    source_type: "file".to_owned(),
                    reason: format!("invalid exclude pattern '{pattern}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include: config.include_paths.clone(),
            exclude,
            config,
            files: HashMap::new(),
            scanned: false,
        })
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// 현재 추적 중인 파일 수
    pub fn tracked_files(&self) -> usize {
        self.files.len()
    }

    /// include glob에 일치하고 exclude glob에 일치하지 않는 일반 파일 목록
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for pattern in &self.include {
            let entries = match glob::glob(pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "invalid include pattern");
                    continue;
                }
            };
            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => {
                        if !self.exclude.iter().any(|ex| ex.matches_path(&path))
                            && !found.contains(&path)
                        {
                            found.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "unreadable glob entry");
                    }
                }
            }
        }
        found.sort();
        found
    }

    /// 모든 대상 파일에서 새로 추가된 줄을 읽습니다.
    ///
    /// 개별 파일의 I/O 실패는 경고 로그를 남기고 다음 폴링에서 다시 시도합니다.
    pub async fn poll(&mut self) -> Vec<TailedLine> {
        let paths = self.discover();
        let first_scan = !self.scanned;
        self.scanned = true;

        // 사라진 파일은 남은 조각을 내보낸 뒤 잊음
        let mut lines = Vec::new();
        let mut forgotten: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| !paths.contains(*path))
            .cloned()
            .collect();
        forgotten.sort();
        for path in forgotten {
            if let Some(mut state) = self.files.remove(&path) {
                tracing::debug!(path = %path.display(), "file no longer matched, forgetting");
                lines.extend(take_partial(&path, &mut state));
            }
        }

        for path in paths {
            if !self.files.contains_key(&path) {
                let state = match self.initial_state(&path, first_scan).await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to open log file");
                        continue;
                    }
                };
                tracing::info!(
                    receiver = %self.config.receiver,
                    path = %path.display(),
                    offset = state.offset,
                    "tracking log file"
                );
                self.files.insert(path.clone(), state);
            }

            if let Err(e) = self.read_file(&path, &mut lines).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to read log file");
            }
        }

        metrics::gauge!(m::LOG_PIPELINE_FILES_TRACKED, m::LABEL_RECEIVER => self.config.receiver.clone())
            .set(self.files.len() as f64);
        if !lines.is_empty() {
            metrics::counter!(m::LOG_PIPELINE_LINES_READ_TOTAL, m::LABEL_RECEIVER => self.config.receiver.clone())
                .increment(lines.len() as u64);
        }

        lines
    }

    /// 개행 없이 남아 있는 조각을 줄로 내보냅니다 (종료 시).
    pub fn drain_partial(&mut self) -> Vec<TailedLine> {
        let mut paths: Vec<PathBuf> = self.files.keys().cloned().collect();
        paths.sort();
        paths
            .into_iter()
            .filter_map(|path| {
                let state = self.files.get_mut(&path)?;
                take_partial(&path, state)
            })
            .collect()
    }

    /// 이 경로를 추적 중인지 여부
    pub fn is_tracking(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    async fn initial_state(&self, path: &Path, first_scan: bool) -> Result<FileState, LogPipelineError> {
        let metadata = tokio::fs::metadata(path).await?;
        let offset = if first_scan && !self.config.read_from_head {
            metadata.len()
        } else {
            0
        };
        Ok(FileState {
            offset,
            inode: inode_of(&metadata),
            ..FileState::default()
        })
    }

    async fn read_file(&mut self, path: &Path, out: &mut Vec<TailedLine>) -> Result<(), LogPipelineError> {
        let max_line_length = self.config.max_line_length;
        let max_read_bytes = self.config.max_read_bytes;
        let receiver = self.config.receiver.clone();
        let Some(state) = self.files.get_mut(path) else {
            return Ok(());
        };

        let metadata = tokio::fs::metadata(path).await?;
        let inode = inode_of(&metadata);

        if state.inode.is_some() && inode != state.inode {
            tracing::info!(path = %path.display(), "file rotated (inode changed), reading from start");
            metrics::counter!(m::LOG_PIPELINE_FILE_ROTATIONS_TOTAL, m::LABEL_RECEIVER => receiver.clone())
                .increment(1);
            // 이전 파일의 마지막 조각
            out.extend(take_partial(path, state));
            *state = FileState {
                inode,
                ..FileState::default()
            };
        } else if metadata.len() < state.offset {
            tracing::info!(
                path = %path.display(),
                offset = state.offset,
                size = metadata.len(),
                "file truncated, reading from start"
            );
            metrics::counter!(m::LOG_PIPELINE_FILE_ROTATIONS_TOTAL, m::LABEL_RECEIVER => receiver.clone())
                .increment(1);
            state.offset = 0;
            state.partial.clear();
            state.discarding = false;
        }

        if metadata.len() == state.offset {
            return Ok(());
        }

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(std::io::SeekFrom::Start(state.offset)).await?;
        let mut chunk = Vec::new();
        let read = file
            .take(max_read_bytes as u64)
            .read_to_end(&mut chunk)
            .await?;
        state.offset += read as u64;
        state.partial.extend_from_slice(&chunk);

        let before = out.len();
        split_lines(path, state, max_line_length, out);
        let truncated = out[before..].iter().filter(|l| l.truncated).count();
        if truncated > 0 {
            metrics::counter!(m::LOG_PIPELINE_LINES_TRUNCATED_TOTAL, m::LABEL_RECEIVER => receiver)
                .increment(truncated as u64);
        }
        Ok(())
    }
}

/// 버퍼에서 완전한 줄을 꺼냅니다.
fn split_lines(path: &Path, state: &mut FileState, max_line_length: usize, out: &mut Vec<TailedLine>) {
    while let Some(pos) = state.partial.iter().position(|b| *b == b'\n') {
        let raw = state.partial.split_to(pos);
        state.partial.advance(1);

        if state.discarding {
            // 이미 잘린 줄의 나머지
            state.discarding = false;
            continue;
        }

        let (bytes, truncated) = if raw.len() > max_line_length {
            (&raw[..max_line_length], true)
        } else {
            (&raw[..], false)
        };
        out.push(TailedLine {
            path: path.to_path_buf(),
            line: decode_line(bytes),
            truncated,
        });
    }

    // 개행 없이 한도를 넘은 조각은 잘라서 내보내고 나머지는 버린다
    if !state.discarding && state.partial.len() > max_line_length {
        let raw = state.partial.split_to(max_line_length);
        out.push(TailedLine {
            path: path.to_path_buf(),
            line: decode_line(&raw),
            truncated: true,
        });
        state.discarding = true;
    }
    if state.discarding {
        state.partial.clear();
    }
}

/// 개행 없이 남은 조각을 줄로 꺼냅니다. 잘린 줄의 나머지는 버립니다.
fn take_partial(path: &Path, state: &mut FileState) -> Option<TailedLine> {
    let discarding = std::mem::take(&mut state.discarding);
    if discarding || state.partial.is_empty() {
        state.partial.clear();
        return None;
    }
    let bytes = state.partial.split();
    Some(TailedLine {
        path: path.to_path_buf(),
        line: decode_line(&bytes),
        truncated: false,
    })
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
