#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Converter must not panic on any input.
    let _ = undercov::convert::istanbul::convert(data);
});
