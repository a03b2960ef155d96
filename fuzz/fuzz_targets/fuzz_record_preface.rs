#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = seclink_tls::record::parse_preface(data, true);
    let _ = seclink_tls::record::parse_preface(data, false);
    let _ = seclink_tls::record::parse_ssl2_preface(data);
});
