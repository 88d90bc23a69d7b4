#![no_main]

use libfuzzer_sys::fuzz_target;
use xdb_client::ClientOptions;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    // Accepted documents must survive a serialize/parse cycle.
    if let Ok(options) = ClientOptions::from_json(json) {
        let rendered = options.to_json().expect("accepted options serialize");
        let reparsed = ClientOptions::from_json(&rendered).expect("rendered options parse");
        assert_eq!(reparsed.pooling, options.pooling);
    }
});
