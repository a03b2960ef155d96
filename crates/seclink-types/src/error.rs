/// Cryptographic provider errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("null or empty input")]
    NullInput,
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid key")]
    InvalidKey,

    // Buffer errors
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },

    // Symmetric cipher errors
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("invalid padding")]
    InvalidPadding,

    // RSA errors
    #[error("rsa: verification failed")]
    RsaVerifyFail,
    #[error("rsa: encryption failed")]
    RsaEncryptFail,
    #[error("rsa: decryption failed")]
    RsaDecryptFail,
    #[error("rsa: signing failed")]
    RsaSignFail,

    // Key codec errors
    #[error("key encode failed")]
    KeyEncodeFail,
    #[error("key decode failed")]
    KeyDecodeFail,

    // Randomness
    #[error("random generation failed")]
    RandFail,

    // Certificate glue
    #[error("no public key in certificate")]
    CertNoKey,
}

/// Why a certificate chain failed trust evaluation.
///
/// Each variant can be individually tolerated through the connection
/// configuration; untolerated failures abort the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrustFailure {
    #[error("chain anchored to an unknown root")]
    UnknownRoot,
    #[error("chain contains no root certificate")]
    NoRoot,
    #[error("certificate expired")]
    CertExpired,
    #[error("certificate not yet valid")]
    CertNotYetValid,
    #[error("certificate chain invalid")]
    ChainInvalid,
}

/// TLS protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Malformed or out-of-order peer data.
    #[error("protocol error: {0}")]
    ProtocolError(String),
    /// Negotiation or key-confirmation failure that is not a version/suite
    /// mismatch.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("record layer error: {0}")]
    RecordError(String),
    /// The peer sent a fatal alert; payload is the alert description name.
    #[error("alert received: {0}")]
    AlertReceived(String),
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("certificate verification failed: {0}")]
    TrustFailed(#[from] TrustFailure),
    /// The transport has no bytes to read or cannot accept bytes right now.
    /// Retry the same operation once the transport is ready; the connection
    /// state is unchanged.
    #[error("operation would block")]
    WouldBlock,
    /// The peer closed the connection with close_notify.
    #[error("connection closed by peer")]
    ClosedGraceful,
    /// The transport hit EOF on a record boundary without a close_notify.
    #[error("connection closed by peer without notification")]
    ClosedNoNotify,
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("io error: {0}")]
    IoError(std::io::Error),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

impl From<std::io::Error> for TlsError {
    /// Transport errors map to the taxonomy, not straight into `IoError`:
    /// `WouldBlock` is a retry signal the caller must be able to match on.
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock => TlsError::WouldBlock,
            _ => TlsError::IoError(e),
        }
    }
}

impl TlsError {
    /// True for the non-fatal retry signal.
    pub fn is_would_block(&self) -> bool {
        matches!(self, TlsError::WouldBlock)
    }

    /// True for the clean-closure conditions that end a connection without
    /// being failures.
    pub fn is_closure(&self) -> bool {
        matches!(self, TlsError::ClosedGraceful | TlsError::ClosedNoNotify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_from_io() {
        let e = std::io::Error::new(std::io::ErrorKind::WouldBlock, "not ready");
        let t = TlsError::from(e);
        assert!(t.is_would_block());
        assert!(!t.is_closure());
    }

    #[test]
    fn test_other_io_errors_stay_io() {
        let e = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let t = TlsError::from(e);
        assert!(matches!(t, TlsError::IoError(_)));
    }

    #[test]
    fn test_trust_failure_converts() {
        let t = TlsError::from(TrustFailure::CertExpired);
        assert!(matches!(
            t,
            TlsError::TrustFailed(TrustFailure::CertExpired)
        ));
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(
            TlsError::ProtocolError("bad length".into()).to_string(),
            "protocol error: bad length"
        );
        assert_eq!(
            CryptoError::BufferTooSmall { need: 48, got: 12 }.to_string(),
            "buffer length not enough: need 48, got 12"
        );
    }
}
