use std::fs;
use std::path::Path;

/// The clock source must stay a plain read: no logging or printing between samples.
#[test]
fn clock_does_not_log_or_print() {
    let clock_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("clock.rs");
    let src = fs::read_to_string(clock_path).expect("failed to read clock.rs");
    for forbidden in ["tracing::", "println!", "eprintln!"] {
        assert!(
            !src.contains(forbidden),
            "clock.rs must not use `{}`; sampling sits inside every timed run",
            forbidden
        );
    }
}
