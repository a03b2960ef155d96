//! Per-direction record protection state.

use crate::crypt::{version_crypt, DirectionKeys, SuiteParams, VersionCrypt};
use crate::{CipherSuite, TlsVersion};
use seclink_provider::{CryptoProvider, SymmetricCipher};
use seclink_types::{CipherAlgId, CipherDirection, MacAlgId, TlsError};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use super::MAX_PLAINTEXT;

fn null_params() -> SuiteParams {
    SuiteParams {
        suite: CipherSuite::SSL_NULL_WITH_NULL_NULL,
        key_exchange: crate::crypt::KeyExchangeAlg::Null,
        cipher: CipherAlgId::Null,
        mac: MacAlgId::Null,
        key_material_len: 0,
        expanded_key_len: 0,
        iv_len: 0,
        exportable: false,
    }
}

/// One direction's active cipher spec: MAC secret, cipher state, and the
/// 64-bit record sequence number.
pub struct CipherContext {
    params: SuiteParams,
    crypt: &'static dyn VersionCrypt,
    version: TlsVersion,
    mac_secret: Vec<u8>,
    cipher: Option<Box<dyn SymmetricCipher>>,
    seq: u64,
}

impl Drop for CipherContext {
    fn drop(&mut self) {
        self.mac_secret.zeroize();
    }
}

impl CipherContext {
    /// The initial null spec: no MAC, no cipher, sequence counting only.
    pub fn null(version: TlsVersion) -> Self {
        CipherContext {
            params: null_params(),
            crypt: version_crypt(version),
            version,
            mac_secret: Vec::new(),
            cipher: None,
            seq: 0,
        }
    }

    /// Build the protection state for one direction out of its write keys.
    pub fn new(
        provider: &dyn CryptoProvider,
        params: SuiteParams,
        version: TlsVersion,
        keys: &DirectionKeys,
        direction: CipherDirection,
    ) -> Result<Self, TlsError> {
        let cipher = match params.cipher {
            CipherAlgId::Null => None,
            alg => Some(provider.cipher(alg, direction, &keys.key, &keys.iv)?),
        };
        Ok(CipherContext {
            params,
            crypt: version_crypt(version),
            version,
            mac_secret: keys.mac_secret.clone(),
            cipher,
            seq: 0,
        })
    }

    pub fn suite(&self) -> CipherSuite {
        self.params.suite
    }

    pub fn is_active(&self) -> bool {
        self.params.suite != CipherSuite::SSL_NULL_WITH_NULL_NULL
    }

    #[cfg(test)]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn bump_seq(&mut self) -> Result<(), TlsError> {
        self.seq = self
            .seq
            .checked_add(1)
            .ok_or_else(|| TlsError::RecordError("record sequence number overflow".into()))?;
        Ok(())
    }

    /// Protect one outgoing fragment: MAC, pad, encrypt.
    pub fn seal(
        &mut self,
        provider: &dyn CryptoProvider,
        content_type: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if payload.len() > MAX_PLAINTEXT {
            return Err(TlsError::InternalError(format!(
                "fragment of {} bytes handed to the record layer",
                payload.len()
            )));
        }
        let mac = self.crypt.record_mac(
            provider,
            self.params.mac,
            &self.mac_secret,
            self.seq,
            content_type,
            self.version,
            payload,
        )?;

        let mut body = Vec::with_capacity(payload.len() + mac.len() + 9);
        body.extend_from_slice(payload);
        body.extend_from_slice(&mac);

        if let Some(cipher) = &mut self.cipher {
            if self.params.is_block_cipher() {
                let block = self.params.cipher.block_size();
                let pad = (block - (body.len() + 1) % block) % block;
                // Every padding byte carries the pad count, the form both
                // generations accept.
                body.resize(body.len() + pad + 1, pad as u8);
            }
            cipher.process(&mut body)?;
        }
        self.bump_seq()?;
        Ok(body)
    }

    /// Unprotect one incoming record body. Padding and MAC failures
    /// collapse into a single error taken on one branch at the end.
    pub fn open(
        &mut self,
        provider: &dyn CryptoProvider,
        content_type: u8,
        body: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        let mac_len = self.params.mac_len();
        let mut data = body.to_vec();

        if let Some(cipher) = &mut self.cipher {
            if self.params.is_block_cipher() {
                let block = self.params.cipher.block_size();
                if data.is_empty() || data.len() % block != 0 {
                    return Err(TlsError::RecordError("bad record mac".into()));
                }
            }
            cipher.process(&mut data)?;
        }

        let mut ok = Choice::from(1u8);
        let mut pad_overhead = 0usize;

        if self.cipher.is_some() && self.params.is_block_cipher() {
            let block = self.params.cipher.block_size();
            let claimed = usize::from(*data.last().ok_or_else(|| {
                TlsError::RecordError("bad record mac".into())
            })?);
            let structural = claimed + 1 + mac_len <= data.len()
                && (self.version >= TlsVersion::Tls10 || claimed < block);
            let pad = if structural { claimed } else { 0 };
            ok &= Choice::from(u8::from(structural));
            if self.version >= TlsVersion::Tls10 {
                let pad_byte = pad as u8;
                for &b in &data[data.len() - 1 - pad..data.len() - 1] {
                    ok &= b.ct_eq(&pad_byte);
                }
            }
            pad_overhead = pad + 1;
        }

        if data.len() < pad_overhead + mac_len {
            return Err(TlsError::RecordError("bad record mac".into()));
        }
        let content_len = data.len() - pad_overhead - mac_len;
        let received_mac = &data[content_len..content_len + mac_len];
        let expected = self.crypt.record_mac(
            provider,
            self.params.mac,
            &self.mac_secret,
            self.seq,
            content_type,
            self.version,
            &data[..content_len],
        )?;
        ok &= expected.as_slice().ct_eq(received_mac);

        if !bool::from(ok) {
            return Err(TlsError::RecordError("bad record mac".into()));
        }
        self.bump_seq()?;
        data.truncate(content_len);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::DerivedKeys;
    use seclink_provider::testing::TestProvider;

    fn contexts(
        provider: &TestProvider,
        suite: CipherSuite,
        version: TlsVersion,
    ) -> (CipherContext, CipherContext) {
        let params = SuiteParams::from_suite(suite).unwrap();
        let master = [0x5au8; 48];
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let keys = DerivedKeys::derive(
            provider,
            version_crypt(version),
            &params,
            &master,
            &cr,
            &sr,
        )
        .unwrap();
        let write = CipherContext::new(
            provider,
            params,
            version,
            &keys.client,
            CipherDirection::Encrypt,
        )
        .unwrap();
        let read = CipherContext::new(
            provider,
            params,
            version,
            &keys.client,
            CipherDirection::Decrypt,
        )
        .unwrap();
        (write, read)
    }

    #[test]
    fn test_null_context_is_passthrough() {
        let provider = TestProvider::new(4);
        let mut ctx = CipherContext::null(TlsVersion::Tls10);
        assert!(!ctx.is_active());
        let sealed = ctx.seal(&provider, 22, b"client hello bytes").unwrap();
        assert_eq!(sealed, b"client hello bytes");
        let opened = ctx.open(&provider, 22, &sealed).unwrap();
        assert_eq!(opened, b"client hello bytes");
        assert_eq!(ctx.seq(), 2);
    }

    #[test]
    fn test_stream_suite_round_trip() {
        let provider = TestProvider::new(4);
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let (mut write, mut read) =
                contexts(&provider, CipherSuite::SSL_RSA_WITH_RC4_128_SHA, version);
            for msg in [&b"first"[..], &b"second record"[..], &b""[..]] {
                let sealed = write.seal(&provider, 23, msg).unwrap();
                assert_ne!(sealed, msg);
                let opened = read.open(&provider, 23, &sealed).unwrap();
                assert_eq!(opened, msg);
            }
        }
    }

    #[test]
    fn test_block_suite_round_trip_pads_to_block() {
        let provider = TestProvider::new(4);
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let (mut write, mut read) =
                contexts(&provider, CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA, version);
            let sealed = write.seal(&provider, 23, b"0123456").unwrap();
            assert_eq!(sealed.len() % 8, 0);
            let opened = read.open(&provider, 23, &sealed).unwrap();
            assert_eq!(opened, b"0123456");
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails_mac() {
        let provider = TestProvider::new(4);
        let (mut write, mut read) =
            contexts(&provider, CipherSuite::SSL_RSA_WITH_RC4_128_MD5, TlsVersion::Tls10);
        let mut sealed = write.seal(&provider, 23, b"payload").unwrap();
        sealed[0] ^= 0x80;
        assert!(matches!(
            read.open(&provider, 23, &sealed),
            Err(TlsError::RecordError(_))
        ));
    }

    #[test]
    fn test_sequence_mismatch_fails_mac() {
        let provider = TestProvider::new(4);
        let (mut write, mut read) =
            contexts(&provider, CipherSuite::SSL_RSA_WITH_RC4_128_SHA, TlsVersion::Ssl3);
        let first = write.seal(&provider, 23, b"a").unwrap();
        let second = write.seal(&provider, 23, b"b").unwrap();
        // Replay: deliver the second record first.
        assert!(read.open(&provider, 23, &second).is_err());
        let _ = first;
    }

    #[test]
    fn test_content_type_is_authenticated() {
        let provider = TestProvider::new(4);
        let (mut write, mut read) =
            contexts(&provider, CipherSuite::SSL_RSA_WITH_RC4_128_SHA, TlsVersion::Tls10);
        let sealed = write.seal(&provider, 23, b"x").unwrap();
        assert!(read.open(&provider, 22, &sealed).is_err());
    }

    #[test]
    fn test_ragged_block_body_rejected() {
        let provider = TestProvider::new(4);
        let (_, mut read) =
            contexts(&provider, CipherSuite::SSL_RSA_WITH_DES_CBC_SHA, TlsVersion::Tls10);
        assert!(read.open(&provider, 23, &[0u8; 13]).is_err());
        assert!(read.open(&provider, 23, &[]).is_err());
    }

    #[test]
    fn test_oversized_fragment_refused_on_seal() {
        let provider = TestProvider::new(4);
        let mut ctx = CipherContext::null(TlsVersion::Tls10);
        let big = vec![0u8; MAX_PLAINTEXT + 1];
        assert!(matches!(
            ctx.seal(&provider, 23, &big),
            Err(TlsError::InternalError(_))
        ));
    }

    #[test]
    fn test_export_suite_round_trip() {
        let provider = TestProvider::new(4);
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let (mut write, mut read) = contexts(
                &provider,
                CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5,
                version,
            );
            let sealed = write.seal(&provider, 23, b"export grade").unwrap();
            let opened = read.open(&provider, 23, &sealed).unwrap();
            assert_eq!(opened, b"export grade");
        }
    }
}
