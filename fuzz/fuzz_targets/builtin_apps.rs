#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use opsnorm_core::types::LogRecord;
use opsnorm_log_pipeline::{AppKind, CompiledRuleSet};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    app: u8,
    line: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let app = AppKind::ALL[usize::from(input.app) % AppKind::ALL.len()];
    let Ok(compiled) = CompiledRuleSet::compile(&app.rule_set()) else {
        return;
    };
    let _ = compiled
        .chain()
        .process(LogRecord::from_text(app.as_str(), "fuzz", input.line));
});
