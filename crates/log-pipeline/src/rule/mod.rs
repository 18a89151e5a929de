//! 규칙 집합 -- 통합별 멀티라인/추출/변환 규칙
//!
//! 선언형 [`RuleSet`]은 시작 시 한 번 [`CompiledRuleSet`]으로 컴파일되며,
//! 이후에는 읽기 전용으로 여러 소스가 공유합니다.
//!
//! # 규칙 형식
//! ```yaml
//! name: nginx_error
//! include_paths: ["/var/log/nginx/error.log"]
//! multiline:
//!   - state_name: start_state
//!     pattern: '^\d{4}/'
//!     next_state: cont
//! processors:
//!   - type: parse_regex
//!     rules:
//!       - pattern: '^(?<time>\S+ \S+) (?<message>[\s\S]*)$'
//! ```
//!
//! # 아키텍처
//! - [`CompiledRuleSet`]: 컴파일된 멀티라인 규칙 + 처리 체인
//! - [`loader`]: `rule_dir`의 사용자 정의 receiver 타입 로딩과 수용 판정
//! - [`types`]: 규칙 데이터 구조 정의

pub mod loader;
pub mod types;

pub use loader::{Rejection, RuleSetLoader};
pub use types::{
    ExtractionRule, FieldRule, ModifierRule, MultilineRule, NestRule, ProcessorSpec, RuleSet,
    START_STATE,
};

use std::sync::Arc;

use crate::error::LogPipelineError;
use crate::multiline::{MultilineRules, MultilineStitcher};
use crate::parser::ProcessorChain;

/// 컴파일된 규칙 집합
///
/// 설정 시점에 모든 정규식이 검증되므로, 컴파일에 성공한 규칙 집합은
/// 레코드 처리 중에 설정 에러를 내지 않습니다.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    name: String,
    include_paths: Vec<String>,
    multiline: Arc<MultilineRules>,
    chain: Arc<ProcessorChain>,
}

impl CompiledRuleSet {
    /// 선언형 규칙 집합을 컴파일합니다.
    ///
    /// # Errors
    /// 구조 검증, 멀티라인 패턴, 처리 단계 중 하나라도 실패하면 에러를 반환합니다.
    pub fn compile(rule_set: &RuleSet) -> Result<Self, LogPipelineError> {
        rule_set.validate()?;

        let multiline = MultilineRules::compile(&rule_set.multiline).map_err(|e| {
            tracing::error!(rule_set = %rule_set.name, error = %e, "invalid multiline rules");
            e
        })?;
        let chain = ProcessorChain::from_specs(&rule_set.processors).map_err(|e| {
            tracing::error!(rule_set = %rule_set.name, error = %e, "invalid processor rules");
            e
        })?;

        tracing::debug!(
            rule_set = %rule_set.name,
            multiline_rules = multiline.len(),
            processors = chain.len(),
            "compiled rule set"
        );

        Ok(Self {
            name: rule_set.name.clone(),
            include_paths: rule_set.include_paths.clone(),
            multiline: Arc::new(multiline),
            chain: Arc::new(chain),
        })
    }

    /// 규칙 집합 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 기본 수집 대상 glob
    pub fn include_paths(&self) -> &[String] {
        &self.include_paths
    }

    /// 멀티라인 규칙 유무
    pub fn has_multiline(&self) -> bool {
        !self.multiline.is_empty()
    }

    /// 공유 처리 체인
    pub fn chain(&self) -> Arc<ProcessorChain> {
        Arc::clone(&self.chain)
    }

    /// 소스 하나가 소유할 새 멀티라인 조립기를 생성합니다.
    pub fn stitcher(&self, max_lines: usize, max_bytes: usize) -> MultilineStitcher {
        MultilineStitcher::new(Arc::clone(&self.multiline)).with_limits(max_lines, max_bytes)
    }
}
