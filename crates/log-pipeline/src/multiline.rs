//! 멀티라인 결합 -- 정규식 상태 기계로 물리 줄을 논리 레코드로 묶습니다.
//!
//! [`MultilineRules`]는 순수 전이 함수(`feed`)를, [`MultilineStitcher`]는
//! 소스별 상태와 미완성 레코드를 보관하는 상태 래퍼를 제공합니다.
//!
//! # 전이 규칙
//! 1. 활성 상태의 규칙을 선언 순서대로 검사합니다. 처음 일치한 규칙으로 전이합니다.
//!    활성 상태가 `start_state`이면 새 레코드를 시작하고, 아니면 현재 레코드에 붙입니다.
//! 2. 활성 상태가 `start_state`가 아니고 일치하는 규칙이 없으면 `start_state` 규칙을
//!    검사합니다. 일치하면 현재 레코드를 닫고 새 레코드를 시작합니다.
//! 3. 그래도 없으면 줄을 새 레코드의 시작으로 취급하되 활성 상태는 바꾸지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! let rules = Arc::new(MultilineRules::compile(&[
//!     MultilineRule::new("start_state", r"^\[\w+\]", "cont"),
//!     MultilineRule::new("cont", r"^(?!\[\w+\])", "cont"),
//! ])?);
//! let mut stitcher = MultilineStitcher::new(rules);
//! stitcher.push("[error] boom");
//! stitcher.push("  at frame 1");
//! let record = stitcher.flush(); // Some("[error] boom\n  at frame 1")
//! ```

use std::sync::Arc;

use fancy_regex::Regex;

use crate::error::LogPipelineError;
use crate::rule::types::{MultilineRule, START_STATE};

/// 줄 하나에 대한 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// 미완성 레코드를 닫고 이 줄로 새 레코드 시작
    StartNewRecord,
    /// 미완성 레코드에 이 줄을 덧붙임
    AppendToCurrentRecord,
}

/// `feed`의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<'r> {
    /// 줄 처리 방식
    pub action: LineAction,
    /// 다음 활성 상태
    pub next_state: &'r str,
    /// 일치하는 전이가 없어 새 레코드로 처리했는지 여부
    pub fallback: bool,
}

#[derive(Debug)]
struct CompiledRule {
    state_name: String,
    next_state: String,
    regex: Regex,
}

/// 컴파일된 멀티라인 규칙 목록
///
/// 시작 후에는 읽기 전용이며 `Arc`로 여러 소스가 공유합니다.
#[derive(Debug, Default)]
pub struct MultilineRules {
    rules: Vec<CompiledRule>,
}

impl MultilineRules {
    /// 규칙을 컴파일합니다.
    ///
    /// # Errors
    /// - 패턴이 컴파일되지 않는 경우
    /// - 규칙이 있는데 `start_state` 규칙이 하나도 없는 경우
    pub fn compile(rules: &[MultilineRule]) -> Result<Self, LogPipelineError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.state_name.is_empty() || rule.next_state.is_empty() {
                return Err(LogPipelineError::RuleValidation {
                    rule_id: format!("multiline '{}'", rule.pattern),
                    reason: "state_name and next_state must not be empty".to_owned(),
                });
            }
            let regex = Regex::new(&rule.pattern).map_err(|e| LogPipelineError::Pattern {
                pattern: rule.pattern.clone(),
                reason: e.to_string(),
            })?;
            compiled.push(CompiledRule {
                state_name: rule.state_name.clone(),
                next_state: rule.next_state.clone(),
                regex,
            });
        }

        if !compiled.is_empty() && !compiled.iter().any(|r| r.state_name == START_STATE) {
            return Err(LogPipelineError::RuleValidation {
                rule_id: "multiline".to_owned(),
                reason: format!("no rule for '{START_STATE}'"),
            });
        }

        Ok(Self { rules: compiled })
    }

    /// 규칙이 없는지 여부 (모든 줄이 개별 레코드)
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 규칙 개수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 순수 전이 함수
    pub fn feed<'r>(&'r self, line: &str, state: &'r str) -> Transition<'r> {
        if self.rules.is_empty() {
            return Transition {
                action: LineAction::StartNewRecord,
                next_state: START_STATE,
                fallback: false,
            };
        }

        if let Some(next) = self.first_match(line, state) {
            let action = if state == START_STATE {
                LineAction::StartNewRecord
            } else {
                LineAction::AppendToCurrentRecord
            };
            return Transition {
                action,
                next_state: next,
                fallback: false,
            };
        }

        if state != START_STATE
            && let Some(next) = self.first_match(line, START_STATE)
        {
            return Transition {
                action: LineAction::StartNewRecord,
                next_state: next,
                fallback: false,
            };
        }

        // 활성 상태는 그대로 두고 미완성 레코드만 닫음
        Transition {
            action: LineAction::StartNewRecord,
            next_state: state,
            fallback: true,
        }
    }

    fn first_match(&self, line: &str, state: &str) -> Option<&str> {
        self.rules
            .iter()
            .filter(|r| r.state_name == state)
            .find(|r| match r.regex.is_match(line) {
                Ok(matched) => matched,
                Err(e) => {
                    tracing::debug!(pattern = r.regex.as_str(), error = %e, "multiline match aborted");
                    false
                }
            })
            .map(|r| r.next_state.as_str())
    }
}

/// `push` 결과
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// 이 줄 때문에 닫힌 레코드
    pub closed: Option<String>,
    /// 전이 규칙 없이 새 레코드가 된 줄인지 여부
    pub fallback: bool,
    /// 크기/줄 수 한계로 강제로 닫혔는지 여부
    pub forced_split: bool,
}

#[derive(Debug)]
struct Pending {
    text: String,
    lines: usize,
}

/// 소스별 멀티라인 결합기
///
/// 하나의 소스만 사용하며 상태를 공유하지 않습니다.
#[derive(Debug)]
pub struct MultilineStitcher {
    rules: Arc<MultilineRules>,
    state: String,
    pending: Option<Pending>,
    max_lines: usize,
    max_bytes: usize,
}

impl MultilineStitcher {
    /// 기본 한계(1000줄, 512KB)로 결합기를 생성합니다.
    pub fn new(rules: Arc<MultilineRules>) -> Self {
        Self {
            rules,
            state: START_STATE.to_owned(),
            pending: None,
            max_lines: 1000,
            max_bytes: 512 * 1024,
        }
    }

    /// 논리 레코드 한계를 설정합니다.
    pub fn with_limits(mut self, max_lines: usize, max_bytes: usize) -> Self {
        self.max_lines = max_lines.max(1);
        self.max_bytes = max_bytes.max(1);
        self
    }

    /// 현재 활성 상태
    pub fn state(&self) -> &str {
        &self.state
    }

    /// 미완성 레코드가 있는지 여부
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 물리 줄 하나를 넣습니다.
    pub fn push(&mut self, line: &str) -> PushOutcome {
        let transition = self.rules.feed(line, &self.state);
        let action = transition.action;
        let fallback = transition.fallback;
        let next_state = transition.next_state.to_owned();
        self.state = next_state;

        let mut outcome = PushOutcome {
            fallback,
            ..PushOutcome::default()
        };

        match (action, self.pending.as_mut()) {
            (LineAction::AppendToCurrentRecord, Some(pending)) => {
                let over_lines = pending.lines + 1 > self.max_lines;
                let over_bytes = pending.text.len() + 1 + line.len() > self.max_bytes;
                if over_lines || over_bytes {
                    outcome.forced_split = true;
                    outcome.closed = self.start(line);
                } else {
                    pending.text.push('\n');
                    pending.text.push_str(line);
                    pending.lines += 1;
                }
            }
            // 타임아웃 flush 뒤의 연속 줄은 새 레코드가 됨
            (LineAction::AppendToCurrentRecord, None) | (LineAction::StartNewRecord, _) => {
                outcome.closed = self.start(line);
            }
        }

        outcome
    }

    /// 미완성 레코드를 닫아 반환합니다 (스트림 종료, 타임아웃, 종료 시).
    pub fn flush(&mut self) -> Option<String> {
        self.pending.take().map(|p| p.text)
    }

    /// 남은 줄을 모두 넣고 마지막 레코드까지 비웁니다.
    pub fn stitch_all<'a>(mut self, lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut records: Vec<String> = lines
            .into_iter()
            .filter_map(|line| self.push(line).closed)
            .collect();
        records.extend(self.flush());
        records
    }

    fn start(&mut self, line: &str) -> Option<String> {
        let closed = self.pending.take().map(|p| p.text);
        self.pending = Some(Pending {
            text: line.to_owned(),
            lines: 1,
        });
        closed
    }
}

/// 줄 목록을 한 번에 논리 레코드로 결합합니다.
pub fn stitch_all<'a>(
    rules: Arc<MultilineRules>,
    lines: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    MultilineStitcher::new(rules).stitch_all(lines)
}
