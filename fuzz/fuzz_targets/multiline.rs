#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use opsnorm_log_pipeline::{AppKind, CompiledRuleSet};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    app: u8,
    max_lines: u8,
    max_bytes: u16,
    lines: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    let app = AppKind::ALL[usize::from(input.app) % AppKind::ALL.len()];
    let Ok(compiled) = CompiledRuleSet::compile(&app.rule_set()) else {
        return;
    };
    let max_lines = usize::from(input.max_lines).max(1);
    let max_bytes = usize::from(input.max_bytes).max(1);
    let total: usize = input.lines.iter().map(|l| l.len()).sum();

    let records = compiled
        .stitcher(max_lines, max_bytes)
        .stitch_all(input.lines.iter().copied());

    // 결합 구분자 외에는 입력보다 커지지 않아야 함
    let joined: usize = records.iter().map(String::len).sum();
    assert!(joined <= total + input.lines.len());
});
