//! Handshake protocol state machine.

pub mod codec;

mod client;
mod server;

pub use client::ClientEngine;
pub use server::ServerEngine;

use crate::alert::Alert;
use crate::config::TlsConfig;
use crate::crypt::{DerivedKeys, SuiteParams};
use crate::TlsVersion;
use seclink_provider::CryptoProvider;
use seclink_types::{HashAlgId, TlsError, TrustFailure};

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(HandshakeType::HelloRequest),
            1 => Ok(HandshakeType::ClientHello),
            2 => Ok(HandshakeType::ServerHello),
            11 => Ok(HandshakeType::Certificate),
            12 => Ok(HandshakeType::ServerKeyExchange),
            13 => Ok(HandshakeType::CertificateRequest),
            14 => Ok(HandshakeType::ServerHelloDone),
            15 => Ok(HandshakeType::CertificateVerify),
            16 => Ok(HandshakeType::ClientKeyExchange),
            20 => Ok(HandshakeType::Finished),
            _ => Err(v),
        }
    }
}

/// Handshake state. Each state names the message the side is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Before the first flight.
    Idle,
    /// Client: waiting for ServerHello.
    WaitServerHello,
    /// Client: waiting for the server Certificate.
    WaitCertificate,
    /// Client: waiting for ServerKeyExchange, CertificateRequest or
    /// ServerHelloDone.
    WaitKeyExchange,
    /// Client: waiting for ServerHelloDone. ServerKeyExchange is still
    /// accepted here for RSA suites, matching servers that send it even
    /// when the certificate key suffices.
    WaitHelloDone,
    /// Server: waiting for ClientHello.
    WaitClientHello,
    /// Server: waiting for the client Certificate answer.
    WaitClientCertificate,
    /// Server: waiting for ClientKeyExchange.
    WaitClientKeyExchange,
    /// Server: waiting for CertificateVerify.
    WaitCertVerify,
    /// Waiting for the peer's ChangeCipherSpec.
    WaitChangeCipherSpec,
    /// Waiting for the peer's Finished under the new cipher spec.
    WaitFinished,
    /// Handshake complete; application data may flow.
    Connected,
}

/// A reassembled handshake message.
#[derive(Debug, Clone)]
pub struct HandshakeMessage {
    pub msg_type: HandshakeType,
    pub body: Vec<u8>,
    /// Header plus body as they appeared on the wire; this is what the
    /// transcript hashes.
    pub raw: Vec<u8>,
}

/// Upper bound on one handshake message. Certificate chains dominate; the
/// u24 wire maximum would let a peer stage 16 MiB per message.
pub const MAX_HANDSHAKE_LEN: usize = 1 << 17;

const HEADER_LEN: usize = 4;

/// Prefix `body` with the 4-byte handshake header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len() as u32;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(msg_type as u8);
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// Handshake messages may span records and share records; this buffer
/// stitches record payloads back into whole messages.
#[derive(Default)]
pub struct HandshakeReassembly {
    buf: Vec<u8>,
}

impl HandshakeReassembly {
    pub fn new() -> Self {
        HandshakeReassembly::default()
    }

    pub fn push(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    /// Whether any partial message is pending. A clean close with bytes
    /// here is a truncation.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Pop the next complete message, if one is buffered.
    pub fn next(&mut self) -> Result<Option<HandshakeMessage>, TlsError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let len = usize::from(self.buf[1]) << 16 | usize::from(self.buf[2]) << 8
            | usize::from(self.buf[3]);
        if len > MAX_HANDSHAKE_LEN {
            return Err(TlsError::ProtocolError(format!(
                "handshake message of {len} bytes"
            )));
        }
        let total = HEADER_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let msg_type = HandshakeType::from_u8(self.buf[0]).map_err(|b| {
            TlsError::ProtocolError(format!("unknown handshake message type {b}"))
        })?;
        let raw: Vec<u8> = self.buf.drain(..total).collect();
        let body = raw[HEADER_LEN..].to_vec();
        Ok(Some(HandshakeMessage { msg_type, body, raw }))
    }
}

/// Keys staged for the next ChangeCipherSpec, both directions.
#[derive(Debug)]
pub(crate) struct PendingCipher {
    pub params: SuiteParams,
    pub version: TlsVersion,
    pub keys: DerivedKeys,
}

/// One step's output from a handshake engine, executed in order by the
/// connection.
#[derive(Debug)]
pub(crate) enum OutboundOp {
    /// Stage both pending cipher directions.
    InstallPending(Box<PendingCipher>),
    /// Seal and queue one handshake message (already transcript-hashed).
    SendHandshake(Vec<u8>),
    /// Send ChangeCipherSpec and switch the write direction to pending.
    SendChangeCipherSpec,
    /// Send a warning alert without failing the handshake.
    SendWarningAlert(Alert),
}

/// Evaluate a peer chain against the configured trust policy. The allow
/// flags downgrade their specific failure to acceptance; an invalid chain
/// never passes.
pub(crate) fn verify_peer_chain(config: &TlsConfig, chain: &[Vec<u8>]) -> Result<(), TlsError> {
    if !config.verify_peer {
        return Ok(());
    }
    let evaluator = config.trust_evaluator.as_ref().ok_or_else(|| {
        TlsError::ConfigError("peer verification enabled without a trust evaluator".into())
    })?;
    match evaluator.evaluate(chain, &config.trusted_certs) {
        Ok(()) => Ok(()),
        Err(failure) => {
            let tolerated = match failure {
                TrustFailure::UnknownRoot => config.allow_unknown_root,
                TrustFailure::NoRoot => config.allow_missing_root,
                TrustFailure::CertExpired => config.allow_expired,
                TrustFailure::CertNotYetValid => config.allow_not_yet_valid,
                TrustFailure::ChainInvalid => false,
            };
            if tolerated {
                Ok(())
            } else {
                Err(TlsError::TrustFailed(failure))
            }
        }
    }
}

/// MD5 followed by SHA-1 over a signed parameter block, the 36-byte digest
/// an RSA signature on ServerKeyExchange covers.
pub(crate) fn signed_params_digest(
    provider: &dyn CryptoProvider,
    data: &[u8],
) -> Result<[u8; 36], TlsError> {
    let md5 = provider.hash(HashAlgId::Md5, data)?;
    let sha1 = provider.hash(HashAlgId::Sha1, data)?;
    let mut digest = [0u8; 36];
    digest[..16].copy_from_slice(&md5);
    digest[16..].copy_from_slice(&sha1);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_handshake_header() {
        let msg = wrap_handshake(HandshakeType::ServerHelloDone, &[]);
        assert_eq!(msg, vec![14, 0, 0, 0]);
        let msg = wrap_handshake(HandshakeType::Finished, &[0xaa; 12]);
        assert_eq!(&msg[..4], &[20, 0, 0, 12]);
        assert_eq!(msg.len(), 16);
    }

    #[test]
    fn test_reassembly_across_fragments() {
        let mut r = HandshakeReassembly::new();
        let msg = wrap_handshake(HandshakeType::Finished, &[0x11; 12]);
        r.push(&msg[..3]);
        assert!(r.next().unwrap().is_none());
        assert!(r.has_partial());
        r.push(&msg[3..]);
        let out = r.next().unwrap().unwrap();
        assert_eq!(out.msg_type, HandshakeType::Finished);
        assert_eq!(out.body, vec![0x11; 12]);
        assert_eq!(out.raw, msg);
        assert!(!r.has_partial());
    }

    #[test]
    fn test_reassembly_two_messages_in_one_fragment() {
        let mut r = HandshakeReassembly::new();
        let mut bytes = wrap_handshake(HandshakeType::ServerHelloDone, &[]);
        bytes.extend_from_slice(&wrap_handshake(HandshakeType::Finished, &[0u8; 12]));
        r.push(&bytes);
        assert_eq!(
            r.next().unwrap().unwrap().msg_type,
            HandshakeType::ServerHelloDone
        );
        assert_eq!(r.next().unwrap().unwrap().msg_type, HandshakeType::Finished);
        assert!(r.next().unwrap().is_none());
    }

    #[test]
    fn test_reassembly_rejects_unknown_type() {
        let mut r = HandshakeReassembly::new();
        r.push(&[99, 0, 0, 0]);
        assert!(r.next().is_err());
    }

    #[test]
    fn test_reassembly_rejects_oversized_message() {
        let mut r = HandshakeReassembly::new();
        // Type 11, 3-byte length well past the cap.
        r.push(&[11, 0xff, 0xff, 0xff]);
        assert!(r.next().is_err());
    }

    #[test]
    fn test_handshake_type_round_trip() {
        for t in [
            HandshakeType::HelloRequest,
            HandshakeType::ClientHello,
            HandshakeType::ServerHello,
            HandshakeType::Certificate,
            HandshakeType::ServerKeyExchange,
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
            HandshakeType::CertificateVerify,
            HandshakeType::ClientKeyExchange,
            HandshakeType::Finished,
        ] {
            assert_eq!(HandshakeType::from_u8(t as u8), Ok(t));
        }
        assert_eq!(HandshakeType::from_u8(3), Err(3));
    }
}
