//! 사용자 정의 규칙 집합 로더 -- `rule_dir`의 YAML 파일을 receiver 타입으로 읽어 들입니다.
//!
//! 파일 하나가 receiver 타입 하나를 정의하며 `name`이 타입 이름이 됩니다.
//! 다음 파일은 경고 로그를 남기고 건너뜁니다.
//! - 읽을 수 없거나 YAML/구조 검증에 실패한 파일
//! - 내장 통합과 이름이 같은 규칙 집합 (내장 통합이 우선)
//! - 앞선 파일과 이름이 같은 규칙 집합 (파일명 순으로 먼저 온 것이 우선)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::apps::AppKind;
use crate::error::LogPipelineError;

use super::types::RuleSet;

const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULE_SETS_COUNT: usize = 1_000;

/// 규칙 집합을 받아들이지 않는 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// 내장 통합 이름과 같음
    ShadowsBuiltin,
    /// 이미 로드된 이름과 같음
    DuplicateName,
}

impl Rejection {
    /// 로그에 쓰이는 사유
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShadowsBuiltin => "name shadows a built-in integration",
            Self::DuplicateName => "duplicate rule set name",
        }
    }
}

/// 규칙 집합 파일 로더
pub struct RuleSetLoader;

impl RuleSetLoader {
    /// 디렉토리의 `.yml`/`.yaml` 파일 경로를 파일명 순으로 반환합니다.
    ///
    /// # Errors
    /// 디렉토리를 읽을 수 없으면 에러를 반환합니다.
    pub async fn rule_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, LogPipelineError> {
        let dir = dir.as_ref();
        let read_err = |e: std::io::Error| LogPipelineError::RuleLoad {
            path: dir.display().to_string(),
            reason: format!("failed to read directory: {e}"),
        };

        let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml")
            {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// 내장 통합과 이름이 겹치는지 확인합니다.
    pub fn shadows_builtin(rule_set: &RuleSet) -> bool {
        rule_set.name.parse::<AppKind>().is_ok()
    }

    /// 이미 받아들인 이름 목록을 기준으로 규칙 집합을 받아들일지 결정합니다.
    ///
    /// 받아들이면 이름을 `seen`에 추가합니다.
    pub fn admit(rule_set: &RuleSet, seen: &mut HashSet<String>) -> Result<(), Rejection> {
        if Self::shadows_builtin(rule_set) {
            return Err(Rejection::ShadowsBuiltin);
        }
        if !seen.insert(rule_set.name.clone()) {
            return Err(Rejection::DuplicateName);
        }
        Ok(())
    }

    /// 디렉토리에서 사용자 정의 receiver 타입을 모두 로드합니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 받아들인 규칙 집합 수가 `MAX_RULE_SETS_COUNT`를 초과하는 경우
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<RuleSet>, LogPipelineError> {
        let dir = dir.as_ref();
        let mut rule_sets = Vec::new();
        let mut seen = HashSet::new();

        for path in Self::rule_files(dir).await? {
            let rule_set = match Self::load_file(&path).await {
                Ok(rule_set) => rule_set,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load rule file, skipping");
                    continue;
                }
            };
            if let Err(rejection) = Self::admit(&rule_set, &mut seen) {
                tracing::warn!(
                    rule_set = %rule_set.name,
                    path = %path.display(),
                    reason = rejection.as_str(),
                    "rule set ignored"
                );
                continue;
            }

            tracing::debug!(rule_set = %rule_set.name, path = %path.display(), "custom receiver type loaded");
            rule_sets.push(rule_set);
            if rule_sets.len() > MAX_RULE_SETS_COUNT {
                return Err(LogPipelineError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rule sets: max {MAX_RULE_SETS_COUNT}"),
                });
            }
        }

        tracing::info!(dir = %dir.display(), count = rule_sets.len(), "loaded custom receiver types");
        Ok(rule_sets)
    }

    /// 단일 YAML 파일에서 규칙 집합을 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<RuleSet, LogPipelineError> {
        let path = path.as_ref();

        // 파일 크기 검증
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(LogPipelineError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LogPipelineError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙 집합을 생성합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<RuleSet, LogPipelineError> {
        let rule_set: RuleSet =
            serde_yaml::from_str(yaml_str).map_err(|e| LogPipelineError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        // 구조 검증 (정규식 컴파일은 CompiledRuleSet에서)
        rule_set.validate()?;

        Ok(rule_set)
    }
}
