//! SSL 2.0 wire formats, cipher kinds, and record protection.
//!
//! The 1995 protocol shares almost nothing with its successors: records
//! carry 2- or 3-byte headers with no content type, each handshake message
//! fills exactly one record, cipher kinds are 24-bit values, and record
//! integrity is keyed MD5 over a 32-bit sequence counter. Everything here
//! is scoped to the compatibility path; the v3 stack never touches it.

pub(crate) mod engine;

use crate::codec::{WireReader, WireWriter};
use crate::CipherSuite;
use seclink_provider::{CryptoProvider, SymmetricCipher};
use seclink_types::{CipherAlgId, CipherDirection, HashAlgId, TlsError};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub const MSG_ERROR: u8 = 0;
pub const MSG_CLIENT_HELLO: u8 = 1;
pub const MSG_CLIENT_MASTER_KEY: u8 = 2;
pub const MSG_CLIENT_FINISHED: u8 = 3;
pub const MSG_SERVER_HELLO: u8 = 4;
pub const MSG_SERVER_VERIFY: u8 = 5;
pub const MSG_SERVER_FINISHED: u8 = 6;

pub const ERR_NO_CIPHER: u16 = 0x0001;
pub const ERR_NO_CERTIFICATE: u16 = 0x0002;
pub const ERR_BAD_CERTIFICATE: u16 = 0x0004;
pub const ERR_UNSUPPORTED_CERT_TYPE: u16 = 0x0006;

/// X.509 is the only certificate encoding the protocol ever defined.
pub const CERT_TYPE_X509: u8 = 1;

pub const MAC_LEN: usize = 16;
pub const CHALLENGE_LEN: usize = 16;
pub const CONNECTION_ID_LEN: usize = 16;
pub const SESSION_ID_LEN: usize = 16;

/// Payload ceiling for the 2-byte record header (15-bit length).
pub const MAX_TWO_BYTE_RECORD: usize = 0x7FFF;
/// Payload ceiling for the 3-byte record header (14-bit length).
pub const MAX_THREE_BYTE_RECORD: usize = 0x3FFF;

/// 24-bit SSL 2.0 cipher kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherKind(pub u32);

impl CipherKind {
    pub const RC4_128_WITH_MD5: Self = Self(0x01_0080);
    pub const RC4_128_EXPORT40_WITH_MD5: Self = Self(0x02_0080);
    pub const RC2_128_CBC_WITH_MD5: Self = Self(0x03_0080);
    pub const RC2_128_CBC_EXPORT40_WITH_MD5: Self = Self(0x04_0080);
    pub const IDEA_128_CBC_WITH_MD5: Self = Self(0x05_0080);
    pub const DES_64_CBC_WITH_MD5: Self = Self(0x06_0040);
    pub const DES_192_EDE3_CBC_WITH_MD5: Self = Self(0x07_00C0);
}

/// Working parameters for one negotiable kind. `key_len` is the master
/// key length; export kinds transmit `clear_len` of it unencrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KindParams {
    pub kind: CipherKind,
    pub cipher: CipherAlgId,
    pub key_len: usize,
    pub clear_len: usize,
    pub iv_len: usize,
}

impl KindParams {
    /// Parameters for the kinds this stack can actually run. IDEA and the
    /// domestic RC2 kind have no provider mapping and stay unlisted.
    pub fn from_kind(kind: CipherKind) -> Option<KindParams> {
        let p = match kind {
            CipherKind::RC4_128_WITH_MD5 => KindParams {
                kind,
                cipher: CipherAlgId::Rc4,
                key_len: 16,
                clear_len: 0,
                iv_len: 0,
            },
            CipherKind::RC4_128_EXPORT40_WITH_MD5 => KindParams {
                kind,
                cipher: CipherAlgId::Rc4,
                key_len: 16,
                clear_len: 11,
                iv_len: 0,
            },
            CipherKind::RC2_128_CBC_EXPORT40_WITH_MD5 => KindParams {
                kind,
                cipher: CipherAlgId::Rc2Cbc,
                key_len: 16,
                clear_len: 11,
                iv_len: 8,
            },
            CipherKind::DES_64_CBC_WITH_MD5 => KindParams {
                kind,
                cipher: CipherAlgId::DesCbc,
                key_len: 8,
                clear_len: 0,
                iv_len: 8,
            },
            CipherKind::DES_192_EDE3_CBC_WITH_MD5 => KindParams {
                kind,
                cipher: CipherAlgId::TripleDesCbc,
                key_len: 24,
                clear_len: 0,
                iv_len: 8,
            },
            _ => return None,
        };
        Some(p)
    }

    pub fn is_stream(&self) -> bool {
        self.cipher.block_size() == 1
    }
}

/// The v3 suite carrying the same cipher and MAC, used to record v2
/// sessions in the shared cache format.
pub(crate) fn v3_equivalent(kind: CipherKind) -> Option<CipherSuite> {
    let suite = match kind {
        CipherKind::RC4_128_WITH_MD5 => CipherSuite::SSL_RSA_WITH_RC4_128_MD5,
        CipherKind::RC4_128_EXPORT40_WITH_MD5 => CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5,
        CipherKind::RC2_128_CBC_EXPORT40_WITH_MD5 => {
            CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5
        }
        CipherKind::DES_64_CBC_WITH_MD5 => CipherSuite::SSL_RSA_WITH_DES_CBC_SHA,
        CipherKind::DES_192_EDE3_CBC_WITH_MD5 => CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA,
        _ => return None,
    };
    Some(suite)
}

/// Inverse of [`v3_equivalent`]: which v2 kind can stand in for a v3
/// suite in a compatibility hello.
pub(crate) fn kind_for_suite(suite: CipherSuite) -> Option<CipherKind> {
    let kind = match suite {
        CipherSuite::SSL_RSA_WITH_RC4_128_MD5 => CipherKind::RC4_128_WITH_MD5,
        CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5 => CipherKind::RC4_128_EXPORT40_WITH_MD5,
        CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5 => {
            CipherKind::RC2_128_CBC_EXPORT40_WITH_MD5
        }
        CipherSuite::SSL_RSA_WITH_DES_CBC_SHA => CipherKind::DES_64_CBC_WITH_MD5,
        CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA => CipherKind::DES_192_EDE3_CBC_WITH_MD5,
        _ => return None,
    };
    Some(kind)
}

/// A cipher-spec value below 0x010000 is a v3 suite code smuggled into
/// the 3-byte field as {0x00, high, low}.
pub(crate) fn spec_as_v3_suite(spec: u32) -> Option<CipherSuite> {
    if spec < 0x01_0000 {
        Some(CipherSuite(spec as u16))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssl2ClientHello {
    pub version: u16,
    pub cipher_specs: Vec<u32>,
    pub session_id: Vec<u8>,
    pub challenge: Vec<u8>,
}

pub fn encode_client_hello(hello: &Ssl2ClientHello) -> Result<Vec<u8>, TlsError> {
    if hello.challenge.len() < CHALLENGE_LEN || hello.challenge.len() > 32 {
        return Err(TlsError::InternalError(format!(
            "challenge of {} bytes",
            hello.challenge.len()
        )));
    }
    let mut w = WireWriter::with_capacity(9 + hello.cipher_specs.len() * 3 + 48);
    w.put_u8(MSG_CLIENT_HELLO);
    w.put_u16(hello.version);
    w.put_u16((hello.cipher_specs.len() * 3) as u16);
    w.put_u16(hello.session_id.len() as u16);
    w.put_u16(hello.challenge.len() as u16);
    for spec in &hello.cipher_specs {
        w.put_u24(*spec);
    }
    w.put_bytes(&hello.session_id);
    w.put_bytes(&hello.challenge);
    Ok(w.into_vec())
}

pub fn decode_client_hello(body: &[u8]) -> Result<Ssl2ClientHello, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_CLIENT_HELLO {
        return Err(TlsError::ProtocolError("not an SSL 2.0 ClientHello".into()));
    }
    let version = r.take_u16()?;
    let spec_len = r.take_u16()? as usize;
    let sid_len = r.take_u16()? as usize;
    let challenge_len = r.take_u16()? as usize;
    if spec_len % 3 != 0 {
        return Err(TlsError::ProtocolError(
            "cipher spec length not a multiple of 3".into(),
        ));
    }
    let specs = r
        .take(spec_len)?
        .chunks_exact(3)
        .map(|c| u32::from_be_bytes([0, c[0], c[1], c[2]]))
        .collect();
    let session_id = r.take(sid_len)?.to_vec();
    let challenge = r.take(challenge_len)?.to_vec();
    if challenge.len() < CHALLENGE_LEN || challenge.len() > 32 {
        return Err(TlsError::ProtocolError(format!(
            "challenge of {} bytes",
            challenge.len()
        )));
    }
    r.expect_end()?;
    Ok(Ssl2ClientHello {
        version,
        cipher_specs: specs,
        session_id,
        challenge,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssl2ServerHello {
    pub session_hit: bool,
    pub certificate_type: u8,
    pub version: u16,
    pub certificate: Vec<u8>,
    pub cipher_specs: Vec<u32>,
    pub connection_id: Vec<u8>,
}

pub fn encode_server_hello(hello: &Ssl2ServerHello) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(
        11 + hello.certificate.len() + hello.cipher_specs.len() * 3 + hello.connection_id.len(),
    );
    w.put_u8(MSG_SERVER_HELLO);
    w.put_u8(u8::from(hello.session_hit));
    w.put_u8(hello.certificate_type);
    w.put_u16(hello.version);
    w.put_u16(hello.certificate.len() as u16);
    w.put_u16((hello.cipher_specs.len() * 3) as u16);
    w.put_u16(hello.connection_id.len() as u16);
    w.put_bytes(&hello.certificate);
    for spec in &hello.cipher_specs {
        w.put_u24(*spec);
    }
    w.put_bytes(&hello.connection_id);
    Ok(w.into_vec())
}

pub fn decode_server_hello(body: &[u8]) -> Result<Ssl2ServerHello, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_SERVER_HELLO {
        return Err(TlsError::ProtocolError("not an SSL 2.0 ServerHello".into()));
    }
    let session_hit = match r.take_u8()? {
        0 => false,
        1 => true,
        other => {
            return Err(TlsError::ProtocolError(format!(
                "session hit flag {other}"
            )))
        }
    };
    let certificate_type = r.take_u8()?;
    let version = r.take_u16()?;
    let cert_len = r.take_u16()? as usize;
    let spec_len = r.take_u16()? as usize;
    let connid_len = r.take_u16()? as usize;
    if spec_len % 3 != 0 {
        return Err(TlsError::ProtocolError(
            "cipher spec length not a multiple of 3".into(),
        ));
    }
    let certificate = r.take(cert_len)?.to_vec();
    let cipher_specs = r
        .take(spec_len)?
        .chunks_exact(3)
        .map(|c| u32::from_be_bytes([0, c[0], c[1], c[2]]))
        .collect();
    let connection_id = r.take(connid_len)?.to_vec();
    if connection_id.len() < CONNECTION_ID_LEN || connection_id.len() > 32 {
        return Err(TlsError::ProtocolError(format!(
            "connection id of {} bytes",
            connection_id.len()
        )));
    }
    r.expect_end()?;
    Ok(Ssl2ServerHello {
        session_hit,
        certificate_type,
        version,
        certificate,
        cipher_specs,
        connection_id,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssl2ClientMasterKey {
    pub kind: u32,
    pub clear_key: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub key_arg: Vec<u8>,
}

pub fn encode_client_master_key(msg: &Ssl2ClientMasterKey) -> Result<Vec<u8>, TlsError> {
    let mut w = WireWriter::with_capacity(
        10 + msg.clear_key.len() + msg.encrypted_key.len() + msg.key_arg.len(),
    );
    w.put_u8(MSG_CLIENT_MASTER_KEY);
    w.put_u24(msg.kind);
    w.put_u16(msg.clear_key.len() as u16);
    w.put_u16(msg.encrypted_key.len() as u16);
    w.put_u16(msg.key_arg.len() as u16);
    w.put_bytes(&msg.clear_key);
    w.put_bytes(&msg.encrypted_key);
    w.put_bytes(&msg.key_arg);
    Ok(w.into_vec())
}

pub fn decode_client_master_key(body: &[u8]) -> Result<Ssl2ClientMasterKey, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_CLIENT_MASTER_KEY {
        return Err(TlsError::ProtocolError(
            "not an SSL 2.0 ClientMasterKey".into(),
        ));
    }
    let kind = r.take_u24()?;
    let clear_len = r.take_u16()? as usize;
    let enc_len = r.take_u16()? as usize;
    let arg_len = r.take_u16()? as usize;
    let clear_key = r.take(clear_len)?.to_vec();
    let encrypted_key = r.take(enc_len)?.to_vec();
    let key_arg = r.take(arg_len)?.to_vec();
    r.expect_end()?;
    Ok(Ssl2ClientMasterKey {
        kind,
        clear_key,
        encrypted_key,
        key_arg,
    })
}

pub fn encode_client_finished(connection_id: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + connection_id.len());
    out.push(MSG_CLIENT_FINISHED);
    out.extend_from_slice(connection_id);
    out
}

pub fn decode_client_finished(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_CLIENT_FINISHED {
        return Err(TlsError::ProtocolError(
            "not an SSL 2.0 ClientFinished".into(),
        ));
    }
    Ok(r.take_rest().to_vec())
}

pub fn encode_server_verify(challenge: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + challenge.len());
    out.push(MSG_SERVER_VERIFY);
    out.extend_from_slice(challenge);
    out
}

pub fn decode_server_verify(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_SERVER_VERIFY {
        return Err(TlsError::ProtocolError("not an SSL 2.0 ServerVerify".into()));
    }
    Ok(r.take_rest().to_vec())
}

pub fn encode_server_finished(session_id: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + session_id.len());
    out.push(MSG_SERVER_FINISHED);
    out.extend_from_slice(session_id);
    out
}

pub fn decode_server_finished(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_SERVER_FINISHED {
        return Err(TlsError::ProtocolError(
            "not an SSL 2.0 ServerFinished".into(),
        ));
    }
    Ok(r.take_rest().to_vec())
}

pub fn encode_error(code: u16) -> Vec<u8> {
    let mut w = WireWriter::with_capacity(3);
    w.put_u8(MSG_ERROR);
    w.put_u16(code);
    w.into_vec()
}

pub fn decode_error(body: &[u8]) -> Result<u16, TlsError> {
    let mut r = WireReader::new(body);
    if r.take_u8()? != MSG_ERROR {
        return Err(TlsError::ProtocolError("not an SSL 2.0 Error".into()));
    }
    let code = r.take_u16()?;
    r.expect_end()?;
    Ok(code)
}

/// KEY-MATERIAL-i = MD5(MASTER-KEY, '0'+i, CHALLENGE, CONNECTION-ID),
/// concatenated until `out_len` bytes are available.
pub(crate) fn key_material(
    provider: &dyn CryptoProvider,
    master_key: &[u8],
    challenge: &[u8],
    connection_id: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut out = Vec::with_capacity(out_len + MAC_LEN);
    let mut index = 0u8;
    while out.len() < out_len {
        let mut buf =
            Vec::with_capacity(master_key.len() + 1 + challenge.len() + connection_id.len());
        buf.extend_from_slice(master_key);
        buf.push(b'0' + index);
        buf.extend_from_slice(challenge);
        buf.extend_from_slice(connection_id);
        let km = provider.hash(HashAlgId::Md5, &buf)?;
        buf.zeroize();
        out.extend_from_slice(&km);
        index += 1;
    }
    out.truncate(out_len);
    Ok(out)
}

/// Frame one record body. A pad count forces the 3-byte header form; the
/// 2-byte form carries the high bit set and a 15-bit length.
pub fn encode_record_header(body_len: usize, padding: u8) -> Result<Vec<u8>, TlsError> {
    if padding == 0 {
        if body_len > MAX_TWO_BYTE_RECORD {
            return Err(TlsError::InternalError(format!(
                "record body of {body_len} bytes"
            )));
        }
        Ok(vec![0x80 | (body_len >> 8) as u8, body_len as u8])
    } else {
        if body_len > MAX_THREE_BYTE_RECORD {
            return Err(TlsError::InternalError(format!(
                "record body of {body_len} bytes"
            )));
        }
        Ok(vec![(body_len >> 8) as u8, body_len as u8, padding])
    }
}

/// One direction's record protection. The sequence number counts every
/// record from the first cleartext hello onward, so activation mid-stream
/// keeps the running value.
pub(crate) struct Ssl2Cipher {
    mac_key: Vec<u8>,
    cipher: Option<Box<dyn SymmetricCipher>>,
    block: usize,
    seq: u32,
}

impl Drop for Ssl2Cipher {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl Ssl2Cipher {
    pub fn new() -> Self {
        Ssl2Cipher {
            mac_key: Vec::new(),
            cipher: None,
            block: 1,
            seq: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cipher.is_some()
    }

    #[cfg(test)]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Switch this direction to the negotiated kind. The write key doubles
    /// as the MAC secret.
    pub fn activate(
        &mut self,
        provider: &dyn CryptoProvider,
        params: &KindParams,
        key: &[u8],
        iv: &[u8],
        direction: CipherDirection,
    ) -> Result<(), TlsError> {
        self.cipher = Some(provider.cipher(params.cipher, direction, key, iv)?);
        self.mac_key = key.to_vec();
        self.block = params.cipher.block_size();
        Ok(())
    }

    /// MAC = MD5(SECRET, ACTUAL-DATA, PADDING-DATA, SEQUENCE-NUMBER).
    fn record_mac(
        &self,
        provider: &dyn CryptoProvider,
        data: &[u8],
        padding: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let mut buf = Vec::with_capacity(self.mac_key.len() + data.len() + padding.len() + 4);
        buf.extend_from_slice(&self.mac_key);
        buf.extend_from_slice(data);
        buf.extend_from_slice(padding);
        buf.extend_from_slice(&self.seq.to_be_bytes());
        let mac = provider.hash(HashAlgId::Md5, &buf)?;
        buf.zeroize();
        Ok(mac)
    }

    /// Protect one payload. Returns the record body plus the pad count the
    /// header must carry. Counters wrap at 2^32 per the original protocol.
    pub fn seal(
        &mut self,
        provider: &dyn CryptoProvider,
        payload: &[u8],
    ) -> Result<(Vec<u8>, u8), TlsError> {
        if self.cipher.is_none() {
            self.seq = self.seq.wrapping_add(1);
            return Ok((payload.to_vec(), 0));
        }
        let pad = if self.block > 1 {
            (self.block - (MAC_LEN + payload.len()) % self.block) % self.block
        } else {
            0
        };
        let padding = vec![0u8; pad];
        let mac = self.record_mac(provider, payload, &padding)?;
        let mut body = Vec::with_capacity(MAC_LEN + payload.len() + pad);
        body.extend_from_slice(&mac);
        body.extend_from_slice(payload);
        body.extend_from_slice(&padding);
        if let Some(cipher) = &mut self.cipher {
            cipher.process(&mut body)?;
        }
        self.seq = self.seq.wrapping_add(1);
        Ok((body, pad as u8))
    }

    /// Unprotect one record body under the pad count from its header.
    pub fn open(
        &mut self,
        provider: &dyn CryptoProvider,
        body: &[u8],
        padding: u8,
    ) -> Result<Vec<u8>, TlsError> {
        if self.cipher.is_none() {
            self.seq = self.seq.wrapping_add(1);
            return Ok(body.to_vec());
        }
        let mut data = body.to_vec();
        if self.block > 1 && (data.is_empty() || data.len() % self.block != 0) {
            return Err(TlsError::RecordError("bad record mac".into()));
        }
        if let Some(cipher) = &mut self.cipher {
            cipher.process(&mut data)?;
        }
        let pad = padding as usize;
        if data.len() < MAC_LEN + pad {
            return Err(TlsError::RecordError("bad record mac".into()));
        }
        let content_end = data.len() - pad;
        let expected = self.record_mac(provider, &data[MAC_LEN..content_end], &data[content_end..])?;
        if !bool::from(expected.as_slice().ct_eq(&data[..MAC_LEN])) {
            return Err(TlsError::RecordError("bad record mac".into()));
        }
        self.seq = self.seq.wrapping_add(1);
        Ok(data[MAC_LEN..content_end].to_vec())
    }
}
