#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use opsnorm_log_pipeline::parser::parse_time;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    text: &'a str,
    template: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let _ = parse_time(input.text, input.template);
});
