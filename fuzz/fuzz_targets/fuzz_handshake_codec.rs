#![no_main]
use libfuzzer_sys::fuzz_target;

use seclink_tls::handshake::codec;
use seclink_tls::handshake::HandshakeReassembly;

fuzz_target!(|data: &[u8]| {
    // Reassemble arbitrary fragments into framed messages.
    let mut reassembly = HandshakeReassembly::new();
    reassembly.push(data);
    while let Ok(Some(msg)) = reassembly.next() {
        let _ = codec::decode_client_hello(&msg.body);
        let _ = codec::decode_server_hello(&msg.body);
        let _ = codec::decode_certificate(&msg.body);
        let _ = codec::decode_server_key_exchange(&msg.body);
        let _ = codec::decode_certificate_request(&msg.body);
        let _ = codec::decode_certificate_verify(&msg.body);
    }
    // Also hit the decoders with unframed input.
    if data.len() >= 4 {
        let body = &data[4..];
        let _ = codec::decode_client_hello(body);
        let _ = codec::decode_server_hello(body);
        let _ = codec::decode_certificate(body);
    }
});
