#![no_main]

use libfuzzer_sys::fuzz_target;
use trial_analyzer::interface::InterfaceRule;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // A parsed rule must survive a Display round trip
        if let Ok(rule) = input.parse::<InterfaceRule>() {
            let again: InterfaceRule = rule.to_string().parse().unwrap();
            assert_eq!(rule, again);
        }
    }
});
