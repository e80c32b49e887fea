#![no_main]

use libfuzzer_sys::fuzz_target;
use trial_analyzer::event::parse_line;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // Any line is either an event, ignored, or a parse error; never a panic
        if let Ok(Some(event)) = parse_line(line) {
            let _ = event.timestamp();
            let _ = event.sample_kind();
        }
    }
});
