//! Decode fuzz target: parse arbitrary bytes as a DNS message, re-encode on success.
//! Malformed pointers, truncation and bad label types must surface as errors.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const DNS_SCHEMA: &str = include_str!("../../schemas/dns.schema");

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let schema = match wirestruct::Schema::parse(DNS_SCHEMA) {
        Ok(s) => s,
        Err(_) => return,
    };
    let Some(message) = schema.get("Message") else {
        return;
    };
    if let Ok(record) = message.parse_bytes(data) {
        let _ = record.to_bytes();
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
