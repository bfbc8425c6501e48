#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Converter must not panic on any input, including lines whose
    // condition coverage takes more branches than it has.
    let _ = undercov::convert::cobertura::convert(data);
});
