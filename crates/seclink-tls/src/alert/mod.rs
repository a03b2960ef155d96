//! SSL3/TLS alert protocol.
//!
//! Alerts are two-byte records: a level and a description. SSL 3.0 defines
//! codes up to 47; TLS 1.0 added the 48..=100 block. A fixed set of
//! descriptions is fatal no matter what level byte the peer claims.

use crate::codec::WireReader;
use crate::TlsVersion;
use seclink_types::{TlsError, TrustFailure};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

impl AlertLevel {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

/// Alert description codes (SSL 3.0 set plus the TLS 1.0 additions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    DecryptionFailed = 21,
    RecordOverflow = 22,
    DecompressionFailure = 30,
    HandshakeFailure = 40,
    /// SSL 3.0 only: a client's answer to a certificate request it cannot
    /// satisfy. The handshake continues.
    NoCertificate = 41,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateRevoked = 44,
    CertificateExpired = 45,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    UnknownCa = 48,
    AccessDenied = 49,
    DecodeError = 50,
    DecryptError = 51,
    ExportRestriction = 60,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
}

impl AlertDescription {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            21 => Ok(AlertDescription::DecryptionFailed),
            22 => Ok(AlertDescription::RecordOverflow),
            30 => Ok(AlertDescription::DecompressionFailure),
            40 => Ok(AlertDescription::HandshakeFailure),
            41 => Ok(AlertDescription::NoCertificate),
            42 => Ok(AlertDescription::BadCertificate),
            43 => Ok(AlertDescription::UnsupportedCertificate),
            44 => Ok(AlertDescription::CertificateRevoked),
            45 => Ok(AlertDescription::CertificateExpired),
            46 => Ok(AlertDescription::CertificateUnknown),
            47 => Ok(AlertDescription::IllegalParameter),
            48 => Ok(AlertDescription::UnknownCa),
            49 => Ok(AlertDescription::AccessDenied),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            60 => Ok(AlertDescription::ExportRestriction),
            70 => Ok(AlertDescription::ProtocolVersion),
            71 => Ok(AlertDescription::InsufficientSecurity),
            80 => Ok(AlertDescription::InternalError),
            90 => Ok(AlertDescription::UserCanceled),
            100 => Ok(AlertDescription::NoRenegotiation),
            _ => Err(v),
        }
    }

    /// Descriptions treated as fatal regardless of the claimed level byte.
    pub fn always_fatal(&self) -> bool {
        matches!(
            self,
            AlertDescription::UnexpectedMessage
                | AlertDescription::BadRecordMac
                | AlertDescription::DecryptionFailed
                | AlertDescription::RecordOverflow
                | AlertDescription::DecompressionFailure
                | AlertDescription::HandshakeFailure
                | AlertDescription::IllegalParameter
                | AlertDescription::UnknownCa
                | AlertDescription::AccessDenied
                | AlertDescription::DecodeError
                | AlertDescription::DecryptError
                | AlertDescription::ExportRestriction
                | AlertDescription::ProtocolVersion
                | AlertDescription::InsufficientSecurity
                | AlertDescription::InternalError
        )
    }
}

/// A parsed alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn warning(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Warning,
            description,
        }
    }

    pub fn fatal(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Fatal,
            description,
        }
    }

    /// The record payload.
    pub fn to_bytes(&self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    /// Parse an alert record body. Unknown description codes are a decode
    /// error carrying the raw byte.
    pub fn parse(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = WireReader::new(body);
        let level_byte = r.take_u8()?;
        let desc_byte = r.take_u8()?;
        r.expect_end()?;
        let level = AlertLevel::from_u8(level_byte)
            .map_err(|b| TlsError::ProtocolError(format!("bad alert level {b}")))?;
        let description = AlertDescription::from_u8(desc_byte)
            .map_err(|b| TlsError::ProtocolError(format!("unknown alert description {b}")))?;
        Ok(Alert { level, description })
    }

    /// Fatal either by level byte or by the fixed always-fatal set.
    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal || self.description.always_fatal()
    }
}

/// The alert to send for an internal error, or None when no alert belongs
/// on the wire (retry signals, closures, a peer that already aborted, dead
/// transports).
///
/// SSL 3.0 peers predate the 48..=100 block, so failures that TLS reports
/// precisely degrade to the closest SSL 3.0 code.
pub fn alert_for_error(err: &TlsError, version: TlsVersion) -> Option<AlertDescription> {
    let tls = version >= TlsVersion::Tls10;
    let desc = match err {
        TlsError::ProtocolError(_) => {
            if tls {
                AlertDescription::DecodeError
            } else {
                AlertDescription::IllegalParameter
            }
        }
        TlsError::HandshakeFailed(_) | TlsError::NoSharedCipherSuite => {
            AlertDescription::HandshakeFailure
        }
        TlsError::UnsupportedVersion => {
            if tls {
                AlertDescription::ProtocolVersion
            } else {
                AlertDescription::HandshakeFailure
            }
        }
        TlsError::RecordError(_) => AlertDescription::BadRecordMac,
        TlsError::TrustFailed(f) => match f {
            TrustFailure::UnknownRoot | TrustFailure::NoRoot => {
                if tls {
                    AlertDescription::UnknownCa
                } else {
                    AlertDescription::CertificateUnknown
                }
            }
            TrustFailure::CertExpired | TrustFailure::CertNotYetValid => {
                AlertDescription::CertificateExpired
            }
            TrustFailure::ChainInvalid => AlertDescription::BadCertificate,
        },
        TlsError::CryptoError(_) | TlsError::InternalError(_) | TlsError::ConfigError(_) => {
            if tls {
                AlertDescription::InternalError
            } else {
                AlertDescription::HandshakeFailure
            }
        }
        TlsError::AlertReceived(_)
        | TlsError::WouldBlock
        | TlsError::ClosedGraceful
        | TlsError::ClosedNoNotify
        | TlsError::IoError(_) => return None,
    };
    Some(desc)
}
