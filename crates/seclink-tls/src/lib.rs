#![forbid(unsafe_code)]
#![doc = "TLS 1.0 / SSL 3.0 protocol engine with an SSL 2.0 compatibility path."]

pub mod alert;
pub mod codec;
pub mod config;
pub mod connection;
pub mod crypt;
pub mod handshake;
pub mod record;
pub mod session;
pub mod ssl2;

use seclink_types::TlsError;

/// Protocol version, ordered oldest to newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Ssl2,
    Ssl3,
    Tls10,
}

impl TlsVersion {
    /// The two-byte version field as it appears on the wire.
    pub fn wire(&self) -> u16 {
        match self {
            TlsVersion::Ssl2 => 0x0002,
            TlsVersion::Ssl3 => 0x0300,
            TlsVersion::Tls10 => 0x0301,
        }
    }

    pub fn from_wire(v: u16) -> Option<Self> {
        match v {
            0x0002 => Some(TlsVersion::Ssl2),
            0x0300 => Some(TlsVersion::Ssl3),
            0x0301 => Some(TlsVersion::Tls10),
            _ => None,
        }
    }
}

/// TLS cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    pub const SSL_NULL_WITH_NULL_NULL: Self = Self(0x0000);
    pub const SSL_RSA_WITH_NULL_MD5: Self = Self(0x0001);
    pub const SSL_RSA_WITH_NULL_SHA: Self = Self(0x0002);
    pub const SSL_RSA_EXPORT_WITH_RC4_40_MD5: Self = Self(0x0003);
    pub const SSL_RSA_WITH_RC4_128_MD5: Self = Self(0x0004);
    pub const SSL_RSA_WITH_RC4_128_SHA: Self = Self(0x0005);
    pub const SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5: Self = Self(0x0006);
    pub const SSL_RSA_EXPORT_WITH_DES40_CBC_SHA: Self = Self(0x0008);
    pub const SSL_RSA_WITH_DES_CBC_SHA: Self = Self(0x0009);
    pub const SSL_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x000A);
    pub const SSL_DH_ANON_EXPORT_WITH_RC4_40_MD5: Self = Self(0x0017);
    pub const SSL_DH_ANON_WITH_RC4_128_MD5: Self = Self(0x0018);
    pub const SSL_DH_ANON_WITH_DES_CBC_SHA: Self = Self(0x001A);
    pub const SSL_DH_ANON_WITH_3DES_EDE_CBC_SHA: Self = Self(0x001B);
    pub const SSL_FORTEZZA_DMS_WITH_NULL_SHA: Self = Self(0x001C);
    pub const SSL_FORTEZZA_DMS_WITH_FORTEZZA_CBC_SHA: Self = Self(0x001D);
}

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRole {
    Client,
    Server,
}

impl TlsRole {
    pub fn peer(&self) -> TlsRole {
        match self {
            TlsRole::Client => TlsRole::Server,
            TlsRole::Server => TlsRole::Client,
        }
    }
}

/// A synchronous TLS connection.
pub trait TlsConnection {
    /// Drive the TLS handshake to completion.
    fn handshake(&mut self) -> Result<(), TlsError>;
    /// Read decrypted data into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Write data to be encrypted and sent.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError>;
    /// Shut down the TLS connection gracefully.
    fn shutdown(&mut self) -> Result<(), TlsError>;
    /// Get the negotiated protocol version.
    fn version(&self) -> Option<TlsVersion>;
    /// Get the negotiated cipher suite.
    fn cipher_suite(&self) -> Option<CipherSuite>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering_matches_age() {
        assert!(TlsVersion::Ssl2 < TlsVersion::Ssl3);
        assert!(TlsVersion::Ssl3 < TlsVersion::Tls10);
    }

    #[test]
    fn test_version_wire_round_trip() {
        for v in [TlsVersion::Ssl2, TlsVersion::Ssl3, TlsVersion::Tls10] {
            assert_eq!(TlsVersion::from_wire(v.wire()), Some(v));
        }
        assert_eq!(TlsVersion::from_wire(0x0302), None);
    }
}
