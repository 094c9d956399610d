#![no_main]

// Harness: expr_compile
// Focus: compilation never panics and is deterministic for arbitrary rule text.

use libfuzzer_sys::fuzz_target;
use warden_core::access::Expression;

fuzz_target!(|raw: Vec<String>| {
    let first = Expression::compile(&raw);
    let second = Expression::compile(&raw);
    assert_eq!(first, second);

    let tokens = raw.iter().flat_map(|e| e.split(',')).filter(|t| !t.is_empty()).count();
    assert_eq!(first.len(), tokens);
});
