#![no_main]
use libfuzzer_sys::fuzz_target;

use seclink_tls::ssl2;

fuzz_target!(|data: &[u8]| {
    let _ = ssl2::decode_client_hello(data);
    let _ = ssl2::decode_server_hello(data);
    let _ = ssl2::decode_client_master_key(data);
    let _ = ssl2::decode_client_finished(data);
    let _ = ssl2::decode_server_verify(data);
    let _ = ssl2::decode_server_finished(data);
    let _ = ssl2::decode_error(data);
});
