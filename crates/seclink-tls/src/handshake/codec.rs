//! Handshake message body encoders and decoders. Encoders produce the
//! body only; the engines add the four-byte handshake header.
//!
//! Certificate chains cross this boundary in wire order (leaf first); the
//! rest of the crate holds chains root first, so the chain encoders and
//! decoders reverse.

use crate::codec::{WireReader, WireWriter};
use crate::session::MAX_SESSION_ID_LEN;
use crate::{CipherSuite, TlsVersion};
use seclink_types::TlsError;

/// ClientHello fields.
#[derive(Debug, Clone)]
pub struct ClientHello {
    /// Highest version the client offers, as raw wire bytes. Kept raw so a
    /// newer-than-known offer still negotiates down.
    pub client_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
}

/// ServerHello fields.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub server_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
}

/// ServerKeyExchange carrying a provider-encoded RSA key and the signature
/// over both hello randoms and the key blob.
#[derive(Debug, Clone)]
pub struct ServerKeyExchange {
    pub key_blob: Vec<u8>,
    pub signature: Vec<u8>,
}

/// CertificateRequest fields. Authority names are raw DER distinguished
/// names, opaque at this layer.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub authorities: Vec<Vec<u8>>,
}

/// RSA certificate type in CertificateRequest.
pub const CERT_TYPE_RSA_SIGN: u8 = 1;

pub fn encode_client_hello(hello: &ClientHello) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(48 + 2 * hello.cipher_suites.len());
    w.put_u16(hello.client_version);
    w.put_bytes(&hello.random);
    w.put_u8_prefixed(&hello.session_id)?;
    let mut suites = WireWriter::with_capacity(2 * hello.cipher_suites.len());
    for suite in &hello.cipher_suites {
        suites.put_u16(suite.0);
    }
    w.put_u16_prefixed(suites.as_slice())?;
    w.put_u8_prefixed(&hello.compression_methods)?;
    Ok(w.into_vec())
}

/// Decode a ClientHello body. Trailing bytes after the compression list are
/// extension data from newer clients and are ignored.
pub fn decode_client_hello(body: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = WireReader::new(body);
    let client_version = r.take_u16()?;
    let mut random = [0u8; 32];
    random.copy_from_slice(r.take(32)?);
    let session_id = r.take_u8_prefixed()?.to_vec();
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(TlsError::ProtocolError(format!(
            "session id of {} bytes",
            session_id.len()
        )));
    }
    let suite_bytes = r.take_u16_prefixed()?;
    if suite_bytes.is_empty() || suite_bytes.len() % 2 != 0 {
        return Err(TlsError::ProtocolError(
            "malformed cipher suite list".into(),
        ));
    }
    let cipher_suites = suite_bytes
        .chunks_exact(2)
        .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
        .collect();
    let compression_methods = r.take_u8_prefixed()?.to_vec();
    if compression_methods.is_empty() {
        return Err(TlsError::ProtocolError(
            "empty compression method list".into(),
        ));
    }
    Ok(ClientHello {
        client_version,
        random,
        session_id,
        cipher_suites,
        compression_methods,
    })
}

pub fn encode_server_hello(hello: &ServerHello) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(44 + hello.session_id.len());
    w.put_u16(hello.server_version);
    w.put_bytes(&hello.random);
    w.put_u8_prefixed(&hello.session_id)?;
    w.put_u16(hello.cipher_suite.0);
    w.put_u8(hello.compression_method);
    Ok(w.into_vec())
}

/// Decode a ServerHello body, ignoring trailing extension data.
pub fn decode_server_hello(body: &[u8]) -> Result<ServerHello, TlsError> {
    let mut r = WireReader::new(body);
    let server_version = r.take_u16()?;
    let mut random = [0u8; 32];
    random.copy_from_slice(r.take(32)?);
    let session_id = r.take_u8_prefixed()?.to_vec();
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(TlsError::ProtocolError(format!(
            "session id of {} bytes",
            session_id.len()
        )));
    }
    let cipher_suite = CipherSuite(r.take_u16()?);
    let compression_method = r.take_u8()?;
    Ok(ServerHello {
        server_version,
        random,
        session_id,
        cipher_suite,
        compression_method,
    })
}

/// Encode a Certificate body from a root-first chain. The wire carries
/// the leaf first.
pub fn encode_certificate(chain_root_first: &[Vec<u8>]) -> Result<Vec<u8>, TlsError> {
    let mut list = WireWriter::new();
    for cert in chain_root_first.iter().rev() {
        list.put_u24_prefixed(cert)?;
    }
    let mut w = WireWriter::with_capacity(3 + list.len());
    w.put_u24_prefixed(list.as_slice())?;
    Ok(w.into_vec())
}

/// Decode a Certificate body into a root-first chain. An empty list is
/// legal; it is the TLS client's "no certificate" answer.
pub fn decode_certificate(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut r = WireReader::new(body);
    let list = r.take_u24_prefixed()?;
    r.expect_end()?;
    let mut chain_leaf_first = Vec::new();
    let mut lr = WireReader::new(list);
    while !lr.is_empty() {
        chain_leaf_first.push(lr.take_u24_prefixed()?.to_vec());
    }
    chain_leaf_first.reverse();
    Ok(chain_leaf_first)
}

pub fn encode_server_key_exchange(ske: &ServerKeyExchange) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(4 + ske.key_blob.len() + ske.signature.len());
    w.put_u16_prefixed(&ske.key_blob)?;
    w.put_u16_prefixed(&ske.signature)?;
    Ok(w.into_vec())
}

pub fn decode_server_key_exchange(body: &[u8]) -> Result<ServerKeyExchange, TlsError> {
    let mut r = WireReader::new(body);
    let key_blob = r.take_u16_prefixed()?.to_vec();
    let signature = r.take_u16_prefixed()?.to_vec();
    r.expect_end()?;
    if key_blob.is_empty() || signature.is_empty() {
        return Err(TlsError::ProtocolError(
            "empty server key exchange field".into(),
        ));
    }
    Ok(ServerKeyExchange { key_blob, signature })
}

/// The bytes a ServerKeyExchange signature covers: both hello randoms
/// followed by the key blob exactly as sent.
pub fn build_ske_signed_data(
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    key_blob: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(64 + key_blob.len());
    data.extend_from_slice(client_random);
    data.extend_from_slice(server_random);
    data.extend_from_slice(key_blob);
    data
}

pub fn encode_certificate_request(req: &CertificateRequest) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::new();
    w.put_u8_prefixed(&req.certificate_types)?;
    let mut names = WireWriter::new();
    for dn in &req.authorities {
        names.put_u16_prefixed(dn)?;
    }
    w.put_u16_prefixed(names.as_slice())?;
    Ok(w.into_vec())
}

pub fn decode_certificate_request(body: &[u8]) -> Result<CertificateRequest, TlsError> {
    let mut r = WireReader::new(body);
    let certificate_types = r.take_u8_prefixed()?.to_vec();
    if certificate_types.is_empty() {
        return Err(TlsError::ProtocolError(
            "empty certificate type list".into(),
        ));
    }
    let names = r.take_u16_prefixed()?;
    r.expect_end()?;
    let mut authorities = Vec::new();
    let mut nr = WireReader::new(names);
    while !nr.is_empty() {
        authorities.push(nr.take_u16_prefixed()?.to_vec());
    }
    Ok(CertificateRequest {
        certificate_types,
        authorities,
    })
}

/// Encode a ClientKeyExchange body. SSL 3.0 sends the RSA ciphertext
/// bare; TLS prefixes it with a two-byte length.
pub fn encode_client_key_exchange(
    version: TlsVersion,
    encrypted_pre_master: &[u8],
) -> Result<Vec<u8>, TlsError> {
    match version {
        TlsVersion::Tls10 => {
            let mut w = WireWriter::with_capacity(2 + encrypted_pre_master.len());
            w.put_u16_prefixed(encrypted_pre_master)?;
            Ok(w.into_vec())
        }
        _ => Ok(encrypted_pre_master.to_vec()),
    }
}

/// Decode a ClientKeyExchange into the raw RSA ciphertext.
pub fn decode_client_key_exchange(
    version: TlsVersion,
    body: &[u8],
) -> Result<Vec<u8>, TlsError> {
    match version {
        TlsVersion::Tls10 => {
            let mut r = WireReader::new(body);
            let ciphertext = r.take_u16_prefixed()?.to_vec();
            r.expect_end()?;
            Ok(ciphertext)
        }
        _ => Ok(body.to_vec()),
    }
}

pub fn encode_certificate_verify(signature: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(2 + signature.len());
    w.put_u16_prefixed(signature)?;
    Ok(w.into_vec())
}

pub fn decode_certificate_verify(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = WireReader::new(body);
    let signature = r.take_u16_prefixed()?.to_vec();
    r.expect_end()?;
    Ok(signature)
}

/// The one-byte ChangeCipherSpec record payload.
pub fn encode_change_cipher_spec() -> Vec<u8> {
    vec![0x01]
}
