#![no_main]

use libfuzzer_sys::fuzz_target;
use opsnorm_log_pipeline::JsonPayloadParser;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let parser = JsonPayloadParser::default().with_time_key("timestamp", None);
        let _ = parser.parse_payload(text);
    }
});
