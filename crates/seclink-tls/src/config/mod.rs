//! TLS configuration with builder pattern.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::crypt::DEFAULT_SUITES;
use crate::session::{SessionCache, TlsSession};
use crate::{CipherSuite, TlsVersion};
use seclink_provider::{
    Credentials, CredentialStore, CryptoProvider, DerCert, KeyCodec, TrustEvaluator,
};
use seclink_types::TlsError;

/// Key log callback, called with one NSS-format line per connection.
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Server-side client authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMode {
    /// Never request a client certificate.
    Off,
    /// Request one; an empty answer is accepted.
    Request,
    /// Request one; an empty answer fails the handshake.
    Require,
}

/// Which configured identity an export-suite server presents.
///
/// Export suites need a short-modulus key on the wire. With
/// `PreferSigningKey` the server serves them only when its signing key is
/// already export-grade; `PreferEncryptionKey` lets a separate short
/// encryption identity carry the key exchange while the signing identity
/// authenticates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKeyPolicy {
    PreferSigningKey,
    PreferEncryptionKey,
}

/// TLS configuration.
#[derive(Clone)]
pub struct TlsConfig {
    /// Crypto operations provider.
    pub provider: Arc<dyn CryptoProvider>,
    /// Minimum enabled protocol version.
    pub min_version: TlsVersion,
    /// Maximum enabled protocol version.
    pub max_version: TlsVersion,
    /// Enabled cipher suites (in preference order).
    pub cipher_suites: Vec<CipherSuite>,
    /// Local identity: certificate chain (root first) plus keys.
    pub credentials: Option<Credentials>,
    /// Separate short-modulus identity for export key exchange.
    pub encryption_credentials: Option<Credentials>,
    /// Which identity backs export suites.
    pub export_key_policy: ExportKeyPolicy,
    /// Server-side client certificate policy.
    pub client_auth: ClientAuthMode,
    /// Whether to verify the peer's certificate chain.
    pub verify_peer: bool,
    /// Trusted root certificates (DER-encoded).
    pub trusted_certs: Vec<DerCert>,
    /// Chain verifier. Required whenever `verify_peer` is set.
    pub trust_evaluator: Option<Arc<dyn TrustEvaluator>>,
    /// Accept chains anchored at an unknown root.
    pub allow_unknown_root: bool,
    /// Accept expired certificates.
    pub allow_expired: bool,
    /// Accept certificates that are not yet valid.
    pub allow_not_yet_valid: bool,
    /// Accept chains that carry no root at all.
    pub allow_missing_root: bool,
    /// Stable identifier for the peer, used as the client-side cache key.
    pub peer_identity: Option<String>,
    /// Shared session cache. Absent means no resumption on either role.
    pub session_cache: Option<Arc<Mutex<dyn SessionCache>>>,
    /// Session the client offers for resumption, overriding cache lookup.
    pub resumption_session: Option<TlsSession>,
    /// Whether this side participates in renegotiation.
    pub allow_renegotiation: bool,
    /// Skip the close_notify exchange on shutdown.
    pub quiet_shutdown: bool,
    /// NSS-format key log callback.
    pub key_log_callback: Option<KeyLogCallback>,
    /// Optional identity resolver for multi-identity servers.
    pub credential_store: Option<Arc<dyn CredentialStore>>,
    /// Public key encode/decode for ServerKeyExchange blobs.
    pub key_codec: Option<Arc<dyn KeyCodec>>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("client_auth", &self.client_auth)
            .field("verify_peer", &self.verify_peer)
            .field("export_key_policy", &self.export_key_policy)
            .field("credentials", &self.credentials.as_ref().map(|_| "<identity>"))
            .field(
                "key_log_callback",
                &self.key_log_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    /// Create a builder seeded with a crypto provider.
    pub fn builder(provider: Arc<dyn CryptoProvider>) -> TlsConfigBuilder {
        TlsConfigBuilder {
            provider,
            min_version: TlsVersion::Ssl3,
            max_version: TlsVersion::Tls10,
            cipher_suites: DEFAULT_SUITES.to_vec(),
            credentials: None,
            encryption_credentials: None,
            export_key_policy: ExportKeyPolicy::PreferSigningKey,
            client_auth: ClientAuthMode::Off,
            verify_peer: true,
            trusted_certs: Vec::new(),
            trust_evaluator: None,
            allow_unknown_root: false,
            allow_expired: false,
            allow_not_yet_valid: false,
            allow_missing_root: false,
            peer_identity: None,
            session_cache: None,
            resumption_session: None,
            allow_renegotiation: true,
            quiet_shutdown: false,
            key_log_callback: None,
            credential_store: None,
            key_codec: None,
        }
    }

    /// Whether SSL 2.0 compatibility is inside the enabled version range.
    pub fn ssl2_enabled(&self) -> bool {
        self.min_version == TlsVersion::Ssl2
    }
}

/// Builder for `TlsConfig`.
pub struct TlsConfigBuilder {
    provider: Arc<dyn CryptoProvider>,
    min_version: TlsVersion,
    max_version: TlsVersion,
    cipher_suites: Vec<CipherSuite>,
    credentials: Option<Credentials>,
    encryption_credentials: Option<Credentials>,
    export_key_policy: ExportKeyPolicy,
    client_auth: ClientAuthMode,
    verify_peer: bool,
    trusted_certs: Vec<DerCert>,
    trust_evaluator: Option<Arc<dyn TrustEvaluator>>,
    allow_unknown_root: bool,
    allow_expired: bool,
    allow_not_yet_valid: bool,
    allow_missing_root: bool,
    peer_identity: Option<String>,
    session_cache: Option<Arc<Mutex<dyn SessionCache>>>,
    resumption_session: Option<TlsSession>,
    allow_renegotiation: bool,
    quiet_shutdown: bool,
    key_log_callback: Option<KeyLogCallback>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    key_codec: Option<Arc<dyn KeyCodec>>,
}

impl fmt::Debug for TlsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigBuilder")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .finish_non_exhaustive()
    }
}

impl TlsConfigBuilder {
    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.min_version = version;
        self
    }

    pub fn max_version(mut self, version: TlsVersion) -> Self {
        self.max_version = version;
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn encryption_credentials(mut self, credentials: Credentials) -> Self {
        self.encryption_credentials = Some(credentials);
        self
    }

    pub fn export_key_policy(mut self, policy: ExportKeyPolicy) -> Self {
        self.export_key_policy = policy;
        self
    }

    pub fn client_auth(mut self, mode: ClientAuthMode) -> Self {
        self.client_auth = mode;
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    pub fn trusted_cert(mut self, der_cert: DerCert) -> Self {
        self.trusted_certs.push(der_cert);
        self
    }

    pub fn trust_evaluator(mut self, evaluator: Arc<dyn TrustEvaluator>) -> Self {
        self.trust_evaluator = Some(evaluator);
        self
    }

    pub fn allow_unknown_root(mut self, allow: bool) -> Self {
        self.allow_unknown_root = allow;
        self
    }

    pub fn allow_expired(mut self, allow: bool) -> Self {
        self.allow_expired = allow;
        self
    }

    pub fn allow_not_yet_valid(mut self, allow: bool) -> Self {
        self.allow_not_yet_valid = allow;
        self
    }

    pub fn allow_missing_root(mut self, allow: bool) -> Self {
        self.allow_missing_root = allow;
        self
    }

    pub fn peer_identity(mut self, identity: &str) -> Self {
        self.peer_identity = Some(identity.to_string());
        self
    }

    pub fn session_cache(mut self, cache: Arc<Mutex<dyn SessionCache>>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    pub fn resumption_session(mut self, session: TlsSession) -> Self {
        self.resumption_session = Some(session);
        self
    }

    pub fn allow_renegotiation(mut self, allow: bool) -> Self {
        self.allow_renegotiation = allow;
        self
    }

    pub fn quiet_shutdown(mut self, quiet: bool) -> Self {
        self.quiet_shutdown = quiet;
        self
    }

    pub fn key_log(mut self, callback: KeyLogCallback) -> Self {
        self.key_log_callback = Some(callback);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn key_codec(mut self, codec: Arc<dyn KeyCodec>) -> Self {
        self.key_codec = Some(codec);
        self
    }

    pub fn build(self) -> Result<TlsConfig, TlsError> {
        if self.cipher_suites.is_empty() {
            return Err(TlsError::ConfigError("no cipher suites enabled".into()));
        }
        if self.min_version > self.max_version {
            return Err(TlsError::ConfigError(format!(
                "min version {:?} above max version {:?}",
                self.min_version, self.max_version
            )));
        }
        Ok(TlsConfig {
            provider: self.provider,
            min_version: self.min_version,
            max_version: self.max_version,
            cipher_suites: self.cipher_suites,
            credentials: self.credentials,
            encryption_credentials: self.encryption_credentials,
            export_key_policy: self.export_key_policy,
            client_auth: self.client_auth,
            verify_peer: self.verify_peer,
            trusted_certs: self.trusted_certs,
            trust_evaluator: self.trust_evaluator,
            allow_unknown_root: self.allow_unknown_root,
            allow_expired: self.allow_expired,
            allow_not_yet_valid: self.allow_not_yet_valid,
            allow_missing_root: self.allow_missing_root,
            peer_identity: self.peer_identity,
            session_cache: self.session_cache,
            resumption_session: self.resumption_session,
            allow_renegotiation: self.allow_renegotiation,
            quiet_shutdown: self.quiet_shutdown,
            key_log_callback: self.key_log_callback,
            credential_store: self.credential_store,
            key_codec: self.key_codec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seclink_provider::testing::TestProvider;

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(TestProvider::new(0))
    }

    #[test]
    fn test_builder_defaults() {
        let config = TlsConfig::builder(provider()).build().unwrap();
        assert_eq!(config.min_version, TlsVersion::Ssl3);
        assert_eq!(config.max_version, TlsVersion::Tls10);
        assert_eq!(config.cipher_suites, DEFAULT_SUITES.to_vec());
        assert_eq!(config.client_auth, ClientAuthMode::Off);
        assert_eq!(config.export_key_policy, ExportKeyPolicy::PreferSigningKey);
        assert!(config.verify_peer);
        assert!(config.allow_renegotiation);
        assert!(!config.quiet_shutdown);
        assert!(!config.ssl2_enabled());
    }

    #[test]
    fn test_ssl2_enabled_through_version_floor() {
        let config = TlsConfig::builder(provider())
            .min_version(TlsVersion::Ssl2)
            .build()
            .unwrap();
        assert!(config.ssl2_enabled());
    }

    #[test]
    fn test_empty_suite_list_rejected() {
        let err = TlsConfig::builder(provider())
            .cipher_suites(&[])
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::ConfigError(_)));
    }

    #[test]
    fn test_inverted_version_range_rejected() {
        let err = TlsConfig::builder(provider())
            .min_version(TlsVersion::Tls10)
            .max_version(TlsVersion::Ssl3)
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::ConfigError(_)));
    }

    #[test]
    fn test_debug_redacts_identity_and_callbacks() {
        let config = TlsConfig::builder(provider())
            .key_log(Arc::new(|_| {}))
            .build()
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<callback>"));
        assert!(!rendered.contains("TestProvider"));
    }

    #[test]
    fn test_trust_flags_default_off() {
        let config = TlsConfig::builder(provider()).build().unwrap();
        assert!(!config.allow_unknown_root);
        assert!(!config.allow_expired);
        assert!(!config.allow_not_yet_valid);
        assert!(!config.allow_missing_root);
    }
}
