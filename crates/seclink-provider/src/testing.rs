//! Deterministic, non-cryptographic provider doubles for protocol tests.
//!
//! Nothing here is secure. The doubles are deterministic functions of their
//! inputs so that two endpoints running a handshake in-process derive the
//! same secrets, and any tampering with protected bytes is detected. Key
//! pairs are derived from a name string, which lets certificate blobs carry
//! just the name and the key size.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use seclink_types::{
    CipherAlgId, CipherDirection, CryptoError, HashAlgId, MacAlgId, TrustFailure,
};
use zeroize::Zeroize;

use crate::{
    CredentialStore, Credentials, CryptoProvider, Digest, KeyCodec, Mac, PrivateKey, PublicKey,
    SymmetricCipher, TrustEvaluator,
};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv64(seed: u64, data: &[u8]) -> u64 {
    let mut h = FNV_OFFSET ^ seed;
    for &b in data {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Stretch a 64-bit seed into `len` pseudo-random bytes.
fn stretch(seed: u64, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut state = seed;
    while out.len() < len {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        out.extend_from_slice(&state.to_be_bytes());
    }
    out.truncate(len);
    out
}

/// Three-lane rolling-hash digest. Order-sensitive, cheap to clone.
#[derive(Clone)]
pub struct TestDigest {
    alg: HashAlgId,
    lanes: [u64; 3],
    len: u64,
}

impl TestDigest {
    pub fn new(alg: HashAlgId) -> Self {
        let tag = match alg {
            HashAlgId::Md5 => 5,
            HashAlgId::Sha1 => 1,
        };
        Self {
            alg,
            lanes: [
                FNV_OFFSET ^ tag,
                0x9e37_79b9_7f4a_7c15 ^ tag,
                0x517c_c1b7_2722_0a95 ^ tag,
            ],
            len: 0,
        }
    }
}

impl Digest for TestDigest {
    fn output_size(&self) -> usize {
        self.alg.output_size()
    }

    fn block_size(&self) -> usize {
        self.alg.block_size()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        for &b in data {
            for (i, lane) in self.lanes.iter_mut().enumerate() {
                *lane ^= u64::from(b);
                *lane = lane.wrapping_mul(FNV_PRIME.wrapping_add(2 * i as u64));
            }
        }
        self.len += data.len() as u64;
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let n = self.output_size();
        if out.len() < n {
            return Err(CryptoError::BufferTooSmall {
                need: n,
                got: out.len(),
            });
        }
        let mut bytes = Vec::with_capacity(24);
        for lane in self.lanes {
            let mixed = (lane ^ self.len).wrapping_mul(FNV_PRIME);
            bytes.extend_from_slice(&mixed.to_be_bytes());
        }
        out[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::new(self.alg);
    }

    fn clone_state(&self) -> Box<dyn Digest> {
        Box::new(self.clone())
    }
}

/// Keyed double: digest over key || data || key.
pub struct TestMac {
    alg: MacAlgId,
    key: Vec<u8>,
    data: Vec<u8>,
}

impl TestMac {
    pub fn new(alg: MacAlgId, key: &[u8]) -> Self {
        Self {
            alg,
            key: key.to_vec(),
            data: Vec::new(),
        }
    }
}

impl Drop for TestMac {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl Mac for TestMac {
    fn output_size(&self) -> usize {
        self.alg.output_size()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let n = self.output_size();
        if out.len() < n {
            return Err(CryptoError::BufferTooSmall {
                need: n,
                got: out.len(),
            });
        }
        if n == 0 {
            return Ok(());
        }
        let hash = match self.alg.hash() {
            Some(h) => h,
            None => return Ok(()),
        };
        let mut d = TestDigest::new(hash);
        d.update(&self.key)?;
        d.update(&self.data)?;
        d.update(&self.key)?;
        d.finish(out)
    }

    fn reset(&mut self) {
        self.data.clear();
    }
}

/// XOR keystream cipher. Identical in both directions, stateful across
/// calls so consecutive records chain like the real thing.
pub struct TestCipher {
    key: Vec<u8>,
    block: usize,
    pos: u64,
}

impl TestCipher {
    pub fn new(alg: CipherAlgId, key: &[u8], iv: &[u8]) -> Self {
        let mut folded = key.to_vec();
        for (i, &b) in iv.iter().enumerate() {
            if !folded.is_empty() {
                let n = folded.len();
                folded[i % n] ^= b;
            }
        }
        Self {
            key: folded,
            block: alg.block_size(),
            pos: 0,
        }
    }
}

impl Drop for TestCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl SymmetricCipher for TestCipher {
    fn block_size(&self) -> usize {
        self.block
    }

    fn process(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        if self.block > 1 && data.len() % self.block != 0 {
            return Err(CryptoError::InvalidArg);
        }
        if self.key.is_empty() {
            return Ok(());
        }
        for b in data.iter_mut() {
            let k = self.key[(self.pos % self.key.len() as u64) as usize];
            *b ^= k ^ (self.pos as u8).rotate_left(1);
            self.pos += 1;
        }
        Ok(())
    }
}

fn derive_modulus(name: &str, size: usize) -> Vec<u8> {
    let mut m = stretch(fnv64(0x6d6f64, name.as_bytes()), size);
    // RSA moduli have the top bit set; keep the introspected size honest.
    if let Some(first) = m.first_mut() {
        *first |= 0x80;
    }
    m
}

fn mask_for(modulus: &[u8], len: usize) -> Vec<u8> {
    stretch(fnv64(0x6d61736b, modulus), len)
}

/// Public half of a name-derived test key pair.
#[derive(Clone)]
pub struct TestRsaPublic {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

impl PublicKey for TestRsaPublic {
    fn modulus_size(&self) -> usize {
        self.modulus.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Private half of a name-derived test key pair.
#[derive(Clone)]
pub struct TestRsaPrivate {
    pub modulus: Vec<u8>,
}

impl PrivateKey for TestRsaPrivate {
    fn modulus_size(&self) -> usize {
        self.modulus.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Derive the deterministic key pair for `name`.
pub fn test_key_pair(name: &str, size: usize) -> (TestRsaPublic, TestRsaPrivate) {
    let modulus = derive_modulus(name, size);
    (
        TestRsaPublic {
            modulus: modulus.clone(),
            exponent: vec![0x01, 0x00, 0x01],
        },
        TestRsaPrivate { modulus },
    )
}

/// Build a fake DER certificate carrying a subject name and key size.
pub fn make_cert(subject: &str, key_size: usize) -> Vec<u8> {
    let mut blob = Vec::new();
    blob.extend_from_slice(b"TCRT");
    blob.push(subject.len() as u8);
    blob.extend_from_slice(subject.as_bytes());
    blob.extend_from_slice(&(key_size as u16).to_be_bytes());
    blob
}

fn parse_cert(blob: &[u8]) -> Option<(String, usize)> {
    if blob.len() < 7 || &blob[..4] != b"TCRT" {
        return None;
    }
    let name_len = blob[4] as usize;
    if blob.len() != 7 + name_len {
        return None;
    }
    let name = String::from_utf8(blob[5..5 + name_len].to_vec()).ok()?;
    let size = u16::from_be_bytes([blob[5 + name_len], blob[6 + name_len]]) as usize;
    Some((name, size))
}

/// Build a root-first chain from names; every cert carries the leaf key size.
pub fn make_chain(names: &[&str], key_size: usize) -> Vec<Vec<u8>> {
    names.iter().map(|n| make_cert(n, key_size)).collect()
}

/// Credentials for a root-first chain of `names`; the key pair belongs to
/// the last (leaf) name.
pub fn make_credentials(names: &[&str], key_size: usize) -> Credentials {
    let leaf = names.last().copied().unwrap_or("leaf");
    let (public, private) = test_key_pair(leaf, key_size);
    Credentials {
        chain: make_chain(names, key_size),
        private_key: Arc::new(private),
        public_key: Arc::new(public),
    }
}

/// The deterministic provider. Seed it differently per endpoint so the two
/// sides of an in-process handshake draw distinct "randomness".
pub struct TestProvider {
    seed: u64,
    counter: AtomicU64,
}

impl TestProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for TestProvider {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CryptoProvider for TestProvider {
    fn digest(&self, alg: HashAlgId) -> Result<Box<dyn Digest>, CryptoError> {
        Ok(Box::new(TestDigest::new(alg)))
    }

    fn mac(&self, alg: MacAlgId, key: &[u8]) -> Result<Box<dyn Mac>, CryptoError> {
        if alg != MacAlgId::Null && key.is_empty() {
            return Err(CryptoError::NullInput);
        }
        Ok(Box::new(TestMac::new(alg, key)))
    }

    fn cipher(
        &self,
        alg: CipherAlgId,
        _direction: CipherDirection,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Box<dyn SymmetricCipher>, CryptoError> {
        match alg {
            CipherAlgId::Null => {}
            CipherAlgId::DesCbc if key.len() != 8 => {
                return Err(CryptoError::InvalidKeyLength {
                    expected: 8,
                    got: key.len(),
                })
            }
            CipherAlgId::TripleDesCbc if key.len() != 24 => {
                return Err(CryptoError::InvalidKeyLength {
                    expected: 24,
                    got: key.len(),
                })
            }
            _ if key.is_empty() => return Err(CryptoError::NullInput),
            _ => {}
        }
        if alg.is_block() && iv.len() != alg.block_size() {
            return Err(CryptoError::InvalidIvLength);
        }
        Ok(Box::new(TestCipher::new(alg, key, iv)))
    }

    fn random(&self, out: &mut [u8]) -> Result<(), CryptoError> {
        let call = self.counter.fetch_add(1, Ordering::Relaxed);
        let bytes = stretch(fnv64(self.seed, &call.to_be_bytes()), out.len());
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn rsa_encrypt(&self, key: &dyn PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let public = key
            .as_any()
            .downcast_ref::<TestRsaPublic>()
            .ok_or(CryptoError::InvalidKey)?;
        let k = public.modulus.len();
        if plaintext.len() + 11 > k {
            return Err(CryptoError::RsaEncryptFail);
        }
        let mut block = vec![0xA5u8; k];
        block[0] = 0x00;
        block[1] = 0x02;
        block[k - plaintext.len() - 1] = 0x00;
        block[k - plaintext.len()..].copy_from_slice(plaintext);
        let mask = mask_for(&public.modulus, k);
        for (b, m) in block.iter_mut().zip(mask.iter()) {
            *b ^= m;
        }
        Ok(block)
    }

    fn rsa_decrypt(
        &self,
        key: &dyn PrivateKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let private = key
            .as_any()
            .downcast_ref::<TestRsaPrivate>()
            .ok_or(CryptoError::InvalidKey)?;
        let k = private.modulus.len();
        if ciphertext.len() != k {
            return Err(CryptoError::RsaDecryptFail);
        }
        let mask = mask_for(&private.modulus, k);
        let mut block: Vec<u8> = ciphertext
            .iter()
            .zip(mask.iter())
            .map(|(c, m)| c ^ m)
            .collect();
        if block[0] != 0x00 || block[1] != 0x02 {
            block.zeroize();
            return Err(CryptoError::RsaDecryptFail);
        }
        let sep = block[2..]
            .iter()
            .position(|&b| b == 0x00)
            .ok_or(CryptoError::RsaDecryptFail)?;
        let out = block[2 + sep + 1..].to_vec();
        block.zeroize();
        Ok(out)
    }

    fn rsa_sign_raw(&self, key: &dyn PrivateKey, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let private = key
            .as_any()
            .downcast_ref::<TestRsaPrivate>()
            .ok_or(CryptoError::InvalidKey)?;
        let seed = fnv64(fnv64(0x736967, &private.modulus), digest);
        Ok(stretch(seed, private.modulus.len()))
    }

    fn rsa_verify_raw(
        &self,
        key: &dyn PublicKey,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let public = key
            .as_any()
            .downcast_ref::<TestRsaPublic>()
            .ok_or(CryptoError::InvalidKey)?;
        let seed = fnv64(fnv64(0x736967, &public.modulus), digest);
        Ok(signature == stretch(seed, public.modulus.len()).as_slice())
    }

    fn cert_public_key(&self, cert_der: &[u8]) -> Result<Arc<dyn PublicKey>, CryptoError> {
        let (name, size) = parse_cert(cert_der).ok_or(CryptoError::CertNoKey)?;
        let (public, _) = test_key_pair(&name, size);
        Ok(Arc::new(public))
    }
}

/// Trust double: optional forced verdict, otherwise the chain's root must
/// appear among the anchors byte-for-byte.
pub struct TestTrustEvaluator {
    pub verdict: Option<TrustFailure>,
}

impl TestTrustEvaluator {
    pub fn accepting() -> Self {
        Self { verdict: None }
    }

    pub fn failing(verdict: TrustFailure) -> Self {
        Self {
            verdict: Some(verdict),
        }
    }
}

impl TrustEvaluator for TestTrustEvaluator {
    fn evaluate(&self, chain: &[Vec<u8>], anchors: &[Vec<u8>]) -> Result<(), TrustFailure> {
        if let Some(v) = self.verdict {
            return Err(v);
        }
        let root = chain.first().ok_or(TrustFailure::ChainInvalid)?;
        if anchors.is_empty() {
            return Ok(());
        }
        if anchors.iter().any(|a| a == root) {
            Ok(())
        } else {
            Err(TrustFailure::UnknownRoot)
        }
    }
}

/// Name → credentials map.
#[derive(Default)]
pub struct MapCredentialStore {
    entries: HashMap<String, Credentials>,
}

impl MapCredentialStore {
    pub fn with(mut self, identity: &str, creds: Credentials) -> Self {
        self.entries.insert(identity.to_string(), creds);
        self
    }
}

impl CredentialStore for MapCredentialStore {
    fn resolve(&self, identity: &str) -> Result<Credentials, CryptoError> {
        self.entries
            .get(identity)
            .cloned()
            .ok_or(CryptoError::InvalidKey)
    }
}

/// Pseudo-PKCS#1 blob: 0x30 marker, then length-prefixed modulus and
/// exponent.
pub struct TestKeyCodec;

impl KeyCodec for TestKeyCodec {
    fn encode_rsa_public(&self, key: &dyn PublicKey) -> Result<Vec<u8>, CryptoError> {
        let public = key
            .as_any()
            .downcast_ref::<TestRsaPublic>()
            .ok_or(CryptoError::KeyEncodeFail)?;
        let mut blob = vec![0x30];
        blob.extend_from_slice(&(public.modulus.len() as u16).to_be_bytes());
        blob.extend_from_slice(&public.modulus);
        blob.extend_from_slice(&(public.exponent.len() as u16).to_be_bytes());
        blob.extend_from_slice(&public.exponent);
        Ok(blob)
    }

    fn decode_rsa_public(&self, blob: &[u8]) -> Result<Arc<dyn PublicKey>, CryptoError> {
        if blob.len() < 3 || blob[0] != 0x30 {
            return Err(CryptoError::KeyDecodeFail);
        }
        let mod_len = u16::from_be_bytes([blob[1], blob[2]]) as usize;
        if blob.len() < 3 + mod_len + 2 {
            return Err(CryptoError::KeyDecodeFail);
        }
        let modulus = blob[3..3 + mod_len].to_vec();
        let exp_off = 3 + mod_len;
        let exp_len = u16::from_be_bytes([blob[exp_off], blob[exp_off + 1]]) as usize;
        if blob.len() != exp_off + 2 + exp_len {
            return Err(CryptoError::KeyDecodeFail);
        }
        let exponent = blob[exp_off + 2..].to_vec();
        Ok(Arc::new(TestRsaPublic { modulus, exponent }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic_and_order_sensitive() {
        let mut a = TestDigest::new(HashAlgId::Sha1);
        a.update(b"ab").unwrap();
        let mut out_a = [0u8; 20];
        a.finish(&mut out_a).unwrap();

        let mut b = TestDigest::new(HashAlgId::Sha1);
        b.update(b"a").unwrap();
        b.update(b"b").unwrap();
        let mut out_b = [0u8; 20];
        b.finish(&mut out_b).unwrap();
        assert_eq!(out_a, out_b);

        let mut c = TestDigest::new(HashAlgId::Sha1);
        c.update(b"ba").unwrap();
        let mut out_c = [0u8; 20];
        c.finish(&mut out_c).unwrap();
        assert_ne!(out_a, out_c);
    }

    #[test]
    fn test_digest_clone_state_is_independent() {
        let mut d = TestDigest::new(HashAlgId::Md5);
        d.update(b"prefix").unwrap();
        let mut fork = d.clone_state();
        let mut at_prefix = [0u8; 16];
        fork.finish(&mut at_prefix).unwrap();

        d.update(b"more").unwrap();
        let mut after_more = [0u8; 16];
        d.finish(&mut after_more).unwrap();
        assert_ne!(at_prefix, after_more);

        let mut fresh = TestDigest::new(HashAlgId::Md5);
        fresh.update(b"prefix").unwrap();
        let mut check = [0u8; 16];
        fresh.finish(&mut check).unwrap();
        assert_eq!(at_prefix, check);
    }

    #[test]
    fn test_cipher_round_trips_with_position_state() {
        let mut enc = TestCipher::new(CipherAlgId::Rc4, b"0123456789abcdef", &[]);
        let mut dec = TestCipher::new(CipherAlgId::Rc4, b"0123456789abcdef", &[]);
        let mut first = b"hello world".to_vec();
        let mut second = b"second record".to_vec();
        enc.process(&mut first).unwrap();
        enc.process(&mut second).unwrap();
        assert_ne!(&first, b"hello world");
        dec.process(&mut first).unwrap();
        dec.process(&mut second).unwrap();
        assert_eq!(&first, b"hello world");
        assert_eq!(&second, b"second record");
    }

    #[test]
    fn test_block_cipher_rejects_ragged_input() {
        let mut c = TestCipher::new(CipherAlgId::DesCbc, b"01234567", &[0u8; 8]);
        let mut data = vec![0u8; 13];
        assert!(c.process(&mut data).is_err());
    }

    #[test]
    fn test_rsa_round_trip_and_wrong_key() {
        let provider = TestProvider::default();
        let (public, private) = test_key_pair("server", 128);
        let ct = provider.rsa_encrypt(&public, b"premaster secret bytes").unwrap();
        assert_eq!(ct.len(), 128);
        let pt = provider.rsa_decrypt(&private, &ct).unwrap();
        assert_eq!(pt, b"premaster secret bytes");

        let (_, other) = test_key_pair("intruder", 128);
        assert!(provider.rsa_decrypt(&other, &ct).is_err());
    }

    #[test]
    fn test_rsa_sign_verify_and_tamper() {
        let provider = TestProvider::default();
        let (public, private) = test_key_pair("signer", 64);
        let digest = [7u8; 36];
        let mut sig = provider.rsa_sign_raw(&private, &digest).unwrap();
        assert!(provider.rsa_verify_raw(&public, &digest, &sig).unwrap());
        sig[0] ^= 1;
        assert!(!provider.rsa_verify_raw(&public, &digest, &sig).unwrap());
    }

    #[test]
    fn test_cert_key_extraction_matches_pair() {
        let provider = TestProvider::default();
        let cert = make_cert("host.example", 96);
        let extracted = provider.cert_public_key(&cert).unwrap();
        assert_eq!(extracted.modulus_size(), 96);
        let (public, private) = test_key_pair("host.example", 96);
        assert_eq!(
            extracted
                .as_any()
                .downcast_ref::<TestRsaPublic>()
                .unwrap()
                .modulus,
            public.modulus
        );
        let ct = provider.rsa_encrypt(extracted.as_ref(), b"x").unwrap();
        assert_eq!(provider.rsa_decrypt(&private, &ct).unwrap(), b"x");
    }

    #[test]
    fn test_key_codec_round_trip() {
        let codec = TestKeyCodec;
        let (public, _) = test_key_pair("export", 64);
        let blob = codec.encode_rsa_public(&public).unwrap();
        let decoded = codec.decode_rsa_public(&blob).unwrap();
        assert_eq!(decoded.modulus_size(), 64);
        assert!(codec.decode_rsa_public(&blob[..blob.len() - 1]).is_err());
    }

    #[test]
    fn test_providers_with_different_seeds_diverge() {
        let a = TestProvider::new(1);
        let b = TestProvider::new(2);
        let mut ra = [0u8; 32];
        let mut rb = [0u8; 32];
        a.random(&mut ra).unwrap();
        b.random(&mut rb).unwrap();
        assert_ne!(ra, rb);
    }

    #[test]
    fn test_trust_evaluator_anchor_check() {
        let eval = TestTrustEvaluator::accepting();
        let chain = make_chain(&["root", "leaf"], 64);
        let anchors = vec![make_cert("root", 64)];
        assert!(eval.evaluate(&chain, &anchors).is_ok());

        let strangers = vec![make_cert("other-root", 64)];
        assert_eq!(
            eval.evaluate(&chain, &strangers),
            Err(TrustFailure::UnknownRoot)
        );
    }
}
