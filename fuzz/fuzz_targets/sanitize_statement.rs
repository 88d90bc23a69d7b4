#![no_main]

use libfuzzer_sys::fuzz_target;
use xdb_client::instrumentation::{SanitizationConfig, extract_operation, sanitize_statement};

fuzz_target!(|data: &[u8]| {
    let sql = String::from_utf8_lossy(data);
    let _ = extract_operation(&sql);
    let sanitized = sanitize_statement(&sql);
    let _ = SanitizationConfig::default().sanitize(&sanitized);
});
