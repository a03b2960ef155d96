#![forbid(unsafe_code)]
//! Trait-based provider interfaces for the cryptographic, trust and
//! credential operations the TLS engine delegates.
//!
//! The engine never implements an algorithm itself: everything below is an
//! abstract interface a backend satisfies. The `testing` feature ships
//! deterministic non-cryptographic doubles for protocol tests.

use std::any::Any;
use std::sync::Arc;

use seclink_types::{
    CipherAlgId, CipherDirection, CryptoError, HashAlgId, MacAlgId, TrustFailure,
};

#[cfg(feature = "testing")]
pub mod testing;

/// A DER-encoded certificate blob. The engine treats it as opaque.
pub type DerCert = Vec<u8>;

/// A hash / message digest algorithm instance.
pub trait Digest: Send + Sync {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// The internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize the hash and write the digest to `out`.
    /// The length of `out` must be at least `output_size()`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the hash state to process a new message.
    fn reset(&mut self);

    /// Snapshot the running state into an independent instance.
    ///
    /// The handshake transcript finalizes interim digests (Finished,
    /// CertificateVerify) while continuing to absorb messages, so every
    /// digest implementation must support forking its state.
    fn clone_state(&self) -> Box<dyn Digest>;
}

/// A keyed Message Authentication Code instance.
///
/// Instances come out of [`CryptoProvider::mac`] already keyed; `reset`
/// rewinds to the post-key state for reuse.
pub trait Mac: Send + Sync {
    /// The output size of the MAC in bytes.
    fn output_size(&self) -> usize;

    /// Feed data into the MAC computation.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize and write the MAC value to `out`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the MAC state for reuse with the same key.
    fn reset(&mut self);
}

/// A symmetric cipher instance with a fixed key, IV and direction.
///
/// Stream ciphers and CBC block ciphers both transform in place and carry
/// their chaining state across calls; the record layer feeds one record per
/// call.
pub trait SymmetricCipher: Send + Sync {
    /// Block size in bytes; 1 for stream ciphers.
    fn block_size(&self) -> usize;

    /// Transform `data` in place in the instance's direction.
    /// For block ciphers the length must be a multiple of the block size.
    fn process(&mut self, data: &mut [u8]) -> Result<(), CryptoError>;
}

/// An opaque public-key handle produced by a provider.
pub trait PublicKey: Send + Sync {
    /// Modulus size in bytes (RSA keys; the engine's key-size introspection).
    fn modulus_size(&self) -> usize;

    /// Downcast support for provider-internal use.
    fn as_any(&self) -> &dyn Any;
}

/// An opaque private-key handle produced by a provider.
pub trait PrivateKey: Send + Sync {
    /// Modulus size in bytes.
    fn modulus_size(&self) -> usize;

    /// Downcast support for provider-internal use.
    fn as_any(&self) -> &dyn Any;
}

/// The cryptographic backend for a connection.
pub trait CryptoProvider: Send + Sync {
    /// Create a digest context.
    fn digest(&self, alg: HashAlgId) -> Result<Box<dyn Digest>, CryptoError>;

    /// Create a keyed MAC context. `MacAlgId::Null` yields a zero-length MAC.
    fn mac(&self, alg: MacAlgId, key: &[u8]) -> Result<Box<dyn Mac>, CryptoError>;

    /// Create a symmetric cipher context. `iv` is empty for stream ciphers.
    fn cipher(
        &self,
        alg: CipherAlgId,
        direction: CipherDirection,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn SymmetricCipher>, CryptoError>;

    /// Fill `out` with cryptographically secure random bytes.
    fn random(&self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// RSA PKCS#1 v1.5 encryption under the peer's public key.
    fn rsa_encrypt(&self, key: &dyn PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// RSA PKCS#1 v1.5 decryption under a local private key.
    fn rsa_decrypt(&self, key: &dyn PrivateKey, ciphertext: &[u8])
        -> Result<Vec<u8>, CryptoError>;

    /// Raw RSA signature over an externally computed digest (PKCS#1 v1.5
    /// padding, no DigestInfo wrapper; the SSL3/TLS1.0 signature form).
    fn rsa_sign_raw(&self, key: &dyn PrivateKey, digest: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verify a raw RSA signature. Ok(false) means a well-formed but wrong
    /// signature.
    fn rsa_verify_raw(
        &self,
        key: &dyn PublicKey,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError>;

    /// Extract the subject public key carried by a DER certificate.
    fn cert_public_key(&self, cert_der: &[u8]) -> Result<Arc<dyn PublicKey>, CryptoError>;

    /// One-shot hash convenience.
    fn hash(&self, alg: HashAlgId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = self.digest(alg)?;
        ctx.update(data)?;
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out)?;
        Ok(out)
    }
}

/// Certificate-chain trust evaluation.
pub trait TrustEvaluator: Send + Sync {
    /// Evaluate a peer chain (root-first) against the configured anchors.
    fn evaluate(&self, chain: &[DerCert], anchors: &[DerCert]) -> Result<(), TrustFailure>;
}

/// A resolved local identity: certificate chain plus key handles.
#[derive(Clone)]
pub struct Credentials {
    /// Certificate chain, root first, leaf last.
    pub chain: Vec<DerCert>,
    /// Private key matching the leaf certificate.
    pub private_key: Arc<dyn PrivateKey>,
    /// Public key matching the leaf certificate.
    pub public_key: Arc<dyn PublicKey>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("chain_len", &self.chain.len())
            .field("modulus_size", &self.private_key.modulus_size())
            .finish()
    }
}

/// Resolves opaque identity references into credentials.
pub trait CredentialStore: Send + Sync {
    fn resolve(&self, identity: &str) -> Result<Credentials, CryptoError>;
}

/// Encode/decode a raw RSA public key to/from its PKCS#1-style wire blob,
/// used for server-initiated key exchange.
pub trait KeyCodec: Send + Sync {
    fn encode_rsa_public(&self, key: &dyn PublicKey) -> Result<Vec<u8>, CryptoError>;
    fn decode_rsa_public(&self, blob: &[u8]) -> Result<Arc<dyn PublicKey>, CryptoError>;
}

/// OS-entropy helper for provider implementations.
pub fn system_random(out: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(out).map_err(|_| CryptoError::RandFail)
}
