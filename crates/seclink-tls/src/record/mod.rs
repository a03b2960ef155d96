//! Record layer framing and per-direction cipher state.
//!
//! Incoming bytes are framed either as v3 records (5-byte header: type,
//! version, length) or as SSL 2.0 records (2- or 3-byte headers with the
//! length in the low bits). Detection happens on the first byte of each
//! record and SSL 2.0 framing is only recognized while the connection has
//! not yet committed to a v3 version.

mod cipher;
mod queue;

pub use cipher::CipherContext;
pub use queue::RecordQueue;

use crate::TlsVersion;
use seclink_types::TlsError;

/// Record payload limit before ciphering.
pub const MAX_PLAINTEXT: usize = 16384;
/// Ciphertext may grow by MAC plus padding, bounded by the protocol.
pub const MAX_CIPHERTEXT: usize = MAX_PLAINTEXT + 2048;

pub const V3_HEADER_LEN: usize = 5;

/// v3 record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            20 => Ok(ContentType::ChangeCipherSpec),
            21 => Ok(ContentType::Alert),
            22 => Ok(ContentType::Handshake),
            23 => Ok(ContentType::ApplicationData),
            _ => Err(v),
        }
    }
}

/// The framing read off the front of one incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPreface {
    V3 {
        content_type: ContentType,
        /// Raw version bytes from the header; checked loosely (major 3).
        version: u16,
        body_len: usize,
    },
    Ssl2 {
        body_len: usize,
        header_len: usize,
        /// Trailing padding byte count (3-byte headers only).
        padding: u8,
        /// Security-escape flag (3-byte headers only).
        escape: bool,
    },
}

impl RecordPreface {
    pub fn header_len(&self) -> usize {
        match self {
            RecordPreface::V3 { .. } => V3_HEADER_LEN,
            RecordPreface::Ssl2 { header_len, .. } => *header_len,
        }
    }

    pub fn body_len(&self) -> usize {
        match self {
            RecordPreface::V3 { body_len, .. } => *body_len,
            RecordPreface::Ssl2 { body_len, .. } => *body_len,
        }
    }
}

/// Parse the front of `buf` into a record preface. Returns Ok(None) when
/// more bytes are needed to decide. The length bound is enforced here,
/// before any body byte is consumed.
///
/// `ssl2_allowed` arms the SSL 2.0 header forms; once a connection commits
/// to a v3 version, bytes outside the v3 content types are an error.
pub fn parse_preface(buf: &[u8], ssl2_allowed: bool) -> Result<Option<RecordPreface>, TlsError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    if let Ok(content_type) = ContentType::from_u8(first) {
        if buf.len() < V3_HEADER_LEN {
            return Ok(None);
        }
        let version = u16::from_be_bytes([buf[1], buf[2]]);
        if version >> 8 != 3 {
            return Err(TlsError::ProtocolError(format!(
                "record version 0x{version:04x} is not SSL3/TLS"
            )));
        }
        let body_len = usize::from(u16::from_be_bytes([buf[3], buf[4]]));
        if body_len > MAX_CIPHERTEXT {
            return Err(TlsError::RecordError(format!(
                "record length {body_len} exceeds maximum"
            )));
        }
        return Ok(Some(RecordPreface::V3 {
            content_type,
            version,
            body_len,
        }));
    }

    if !ssl2_allowed {
        return Err(TlsError::ProtocolError(format!(
            "unknown record content type {first}"
        )));
    }

    parse_ssl2_preface(buf)
}

/// Parse assuming SSL 2.0 framing only. Once a connection commits to the
/// v2 protocol every record is v2-framed and a ciphertext first byte in
/// the v3 content-type range must not be mistaken for a v3 header.
pub fn parse_ssl2_preface(buf: &[u8]) -> Result<Option<RecordPreface>, TlsError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    if first & 0x80 != 0 {
        // 2-byte header: 15-bit length, no padding.
        if buf.len() < 2 {
            return Ok(None);
        }
        let body_len = usize::from(u16::from_be_bytes([first & 0x7f, buf[1]]));
        if body_len > MAX_CIPHERTEXT {
            return Err(TlsError::RecordError(format!(
                "record length {body_len} exceeds maximum"
            )));
        }
        Ok(Some(RecordPreface::Ssl2 {
            body_len,
            header_len: 2,
            padding: 0,
            escape: false,
        }))
    } else {
        // 3-byte header: 14-bit length, escape bit, padding count.
        if buf.len() < 3 {
            return Ok(None);
        }
        let body_len = usize::from(u16::from_be_bytes([first & 0x3f, buf[1]]));
        if body_len > MAX_CIPHERTEXT {
            return Err(TlsError::RecordError(format!(
                "record length {body_len} exceeds maximum"
            )));
        }
        Ok(Some(RecordPreface::Ssl2 {
            body_len,
            header_len: 3,
            padding: buf[2],
            escape: first & 0x40 != 0,
        }))
    }
}

/// Encode a v3 record header.
pub fn encode_header(content_type: ContentType, version: TlsVersion, body_len: usize) -> [u8; 5] {
    let wire = version.wire().to_be_bytes();
    let len = (body_len as u16).to_be_bytes();
    [content_type as u8, wire[0], wire[1], len[0], len[1]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v3_preface_round_trip() {
        let header = encode_header(ContentType::Handshake, TlsVersion::Tls10, 0x1234);
        let preface = parse_preface(&header, true).unwrap().unwrap();
        assert_eq!(
            preface,
            RecordPreface::V3 {
                content_type: ContentType::Handshake,
                version: 0x0301,
                body_len: 0x1234,
            }
        );
    }

    #[test]
    fn test_preface_needs_more_bytes() {
        assert_eq!(parse_preface(&[], true).unwrap(), None);
        assert_eq!(parse_preface(&[22], true).unwrap(), None);
        assert_eq!(parse_preface(&[22, 3, 1, 0], true).unwrap(), None);
        assert_eq!(parse_preface(&[0x81], true).unwrap(), None);
        assert_eq!(parse_preface(&[0x01, 0x02], true).unwrap(), None);
    }

    #[test]
    fn test_oversized_record_rejected_at_header() {
        // 0x4801 = 18433, one past the 16384 + 2048 cap.
        let header = [23, 3, 0, 0x48, 0x01];
        assert!(matches!(
            parse_preface(&header, true),
            Err(TlsError::RecordError(_))
        ));
        let at_cap = [23, 3, 0, 0x48, 0x00];
        assert!(parse_preface(&at_cap, true).unwrap().is_some());
    }

    #[test]
    fn test_bad_major_version_rejected() {
        let header = [22, 2, 0, 0, 16];
        assert!(matches!(
            parse_preface(&header, true),
            Err(TlsError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_ssl2_two_byte_header() {
        // High bit set: 15-bit length 0x0102.
        let preface = parse_preface(&[0x81, 0x02], true).unwrap().unwrap();
        assert_eq!(
            preface,
            RecordPreface::Ssl2 {
                body_len: 0x0102,
                header_len: 2,
                padding: 0,
                escape: false,
            }
        );
    }

    #[test]
    fn test_ssl2_three_byte_header_with_padding_and_escape() {
        let preface = parse_preface(&[0x40 | 0x01, 0x10, 7], true).unwrap().unwrap();
        assert_eq!(
            preface,
            RecordPreface::Ssl2 {
                body_len: 0x0110,
                header_len: 3,
                padding: 7,
                escape: true,
            }
        );
    }

    #[test]
    fn test_committed_ssl2_parse_ignores_v3_lookalikes() {
        // First byte 22 reads as a v3 Handshake header in mixed mode but
        // as a 3-byte v2 header once the connection is locked to v2.
        let preface = parse_ssl2_preface(&[22, 0x10, 4]).unwrap().unwrap();
        assert_eq!(
            preface,
            RecordPreface::Ssl2 {
                body_len: (22 << 8) | 0x10,
                header_len: 3,
                padding: 4,
                escape: false,
            }
        );
    }

    #[test]
    fn test_ssl2_framing_refused_after_version_commit() {
        assert!(matches!(
            parse_preface(&[0x81, 0x02], false),
            Err(TlsError::ProtocolError(_))
        ));
        assert!(matches!(
            parse_preface(&[0x01, 0x02, 0x03], false),
            Err(TlsError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_v3_preface_still_parses_when_ssl2_disallowed() {
        let header = encode_header(ContentType::Alert, TlsVersion::Ssl3, 2);
        assert!(parse_preface(&header, false).unwrap().is_some());
    }
}
