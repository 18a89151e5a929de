//! 내장 통합 -- 애플리케이션별 규칙 집합과 receiver 타입 레지스트리
//!
//! 내장 통합은 닫힌 열거형 [`AppKind`]로 표현되며, 각 변형은 정적 팩토리 함수에
//! 대응합니다. 사용자 정의 규칙 집합(YAML)은 [`RuleRegistry`]에 추가로 등록할 수
//! 있지만, 내장 이름과 충돌하면 내장 규칙이 우선합니다.
//!
//! # 사용 예시
//! ```ignore
//! let registry = RuleRegistry::with_builtins()?;
//! let rules = registry.resolve("couchdb-main", "couchdb")?;
//! ```

pub mod couchdb;
pub mod elasticsearch;
pub mod solr;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use opsnorm_core::types::{INSTRUMENTATION_SOURCE_FIELD, SEVERITY_FIELD};

use crate::error::LogPipelineError;
use crate::rule::{CompiledRuleSet, RuleSetLoader};
use crate::rule::types::{FieldRule, ModifierRule, RuleSet};

/// 계측 출처 값의 접두사
pub const INSTRUMENTATION_PREFIX: &str = "opsnorm";

/// 내장 통합 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AppKind {
    /// Apache CouchDB
    Couchdb,
    /// Elasticsearch JSON 로그
    ElasticsearchJson,
    /// Elasticsearch GC 로그
    ElasticsearchGc,
    /// Apache Solr 시스템 로그
    SolrSystem,
}

impl AppKind {
    /// 모든 내장 통합
    pub const ALL: [Self; 4] = [
        Self::Couchdb,
        Self::ElasticsearchJson,
        Self::ElasticsearchGc,
        Self::SolrSystem,
    ];

    /// receiver 타입 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Couchdb => couchdb::TYPE_NAME,
            Self::ElasticsearchJson => elasticsearch::JSON_TYPE_NAME,
            Self::ElasticsearchGc => elasticsearch::GC_TYPE_NAME,
            Self::SolrSystem => solr::TYPE_NAME,
        }
    }

    /// 한 줄 설명
    pub fn description(&self) -> &'static str {
        match self {
            Self::Couchdb => "Apache CouchDB server and access logs",
            Self::ElasticsearchJson => "Elasticsearch JSON logs (server, deprecation, slowlog, audit)",
            Self::ElasticsearchGc => "Elasticsearch JVM garbage collection log",
            Self::SolrSystem => "Apache Solr system log",
        }
    }

    /// 기본 수집 대상 glob
    pub fn default_include_paths(&self) -> &'static [&'static str] {
        match self {
            Self::Couchdb => couchdb::DEFAULT_INCLUDE_PATHS,
            Self::ElasticsearchJson => elasticsearch::JSON_DEFAULT_INCLUDE_PATHS,
            Self::ElasticsearchGc => elasticsearch::GC_DEFAULT_INCLUDE_PATHS,
            Self::SolrSystem => solr::DEFAULT_INCLUDE_PATHS,
        }
    }

    /// 선언형 규칙 집합 (팩토리)
    pub fn rule_set(&self) -> RuleSet {
        match self {
            Self::Couchdb => couchdb::rule_set(),
            Self::ElasticsearchJson => elasticsearch::json_rule_set(),
            Self::ElasticsearchGc => elasticsearch::gc_rule_set(),
            Self::SolrSystem => solr::rule_set(),
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LogPipelineError::UnknownReceiverType {
                receiver: String::new(),
                kind: s.to_owned(),
            })
    }
}

/// 계측 출처 태그 값 (`opsnorm/<type>`)
pub fn instrumentation_source(type_name: &str) -> String {
    format!("{INSTRUMENTATION_PREFIX}/{type_name}")
}

/// `level` 필드를 복사해 정규화된 심각도로 매핑하는 규칙 (미매핑 값은 제거)
pub(crate) fn severity_rule(table: &[(&str, &str)]) -> ModifierRule {
    ModifierRule::Field(
        FieldRule::new(SEVERITY_FIELD)
            .copy_from("level")
            .map_values(table.iter().copied(), true),
    )
}

/// 계측 출처 태그를 고정 값으로 설정하는 규칙
pub(crate) fn instrumentation_rule(type_name: &str) -> ModifierRule {
    ModifierRule::Field(
        FieldRule::new(INSTRUMENTATION_SOURCE_FIELD)
            .static_value(instrumentation_source(type_name)),
    )
}

/// receiver 타입 이름 → 컴파일된 규칙 집합
///
/// 시작 시 한 번 구성된 뒤에는 읽기 전용입니다.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rule_sets: BTreeMap<String, CompiledRuleSet>,
}

impl RuleRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 내장 통합을 컴파일해 등록합니다.
    ///
    /// # Errors
    /// 내장 규칙이 컴파일되지 않으면 에러를 반환합니다.
    pub fn with_builtins() -> Result<Self, LogPipelineError> {
        let mut registry = Self::new();
        for kind in AppKind::ALL {
            let compiled = CompiledRuleSet::compile(&kind.rule_set())?;
            registry.rule_sets.insert(kind.as_str().to_owned(), compiled);
        }
        Ok(registry)
    }

    /// 사용자 정의 규칙 집합을 등록합니다.
    ///
    /// [`RuleSetLoader::load_directory`]는
    /// 내장 통합 이름을 미리 걸러 냅니다.
    ///
    /// # Errors
    /// - 내장 통합과 이름이 같은 경우
    /// - 규칙 집합이 컴파일되지 않는 경우
    pub fn register(&mut self, rule_set: &RuleSet) -> Result<(), LogPipelineError> {
        if RuleSetLoader::shadows_builtin(rule_set) {
            return Err(LogPipelineError::RuleValidation {
                rule_id: rule_set.name.clone(),
                reason: "name is reserved by a built-in integration".to_owned(),
            });
        }
        let compiled = CompiledRuleSet::compile(rule_set)?;
        self.rule_sets.insert(rule_set.name.clone(), compiled);
        Ok(())
    }

    /// receiver 타입에 해당하는 규칙 집합을 찾습니다.
    ///
    /// # Errors
    /// 등록되지 않은 타입이면 `UnknownReceiverType`을 반환합니다.
    pub fn resolve(&self, receiver: &str, kind: &str) -> Result<CompiledRuleSet, LogPipelineError> {
        self.rule_sets
            .get(kind)
            .cloned()
            .ok_or_else(|| LogPipelineError::UnknownReceiverType {
                receiver: receiver.to_owned(),
                kind: kind.to_owned(),
            })
    }

    /// 등록된 타입 이름 목록 (정렬됨)
    pub fn type_names(&self) -> Vec<&str> {
        self.rule_sets.keys().map(String::as_str).collect()
    }

    /// 타입이 등록되어 있는지 확인합니다.
    pub fn contains(&self, kind: &str) -> bool {
        self.rule_sets.contains_key(kind)
    }
}
