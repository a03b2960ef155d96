//! Version-specific secret derivation.
//!
//! SSL 3.0 and TLS 1.0 share a handshake shape but disagree on every
//! derivation: master secret, key block, record MAC, Finished, and
//! CertificateVerify. Each generation implements [`VersionCrypt`] and the
//! rest of the stack calls through the trait once the version is settled.

use crate::crypt::Transcript;
use crate::{TlsRole, TlsVersion};
use seclink_provider::CryptoProvider;
use seclink_types::{CryptoError, HashAlgId, MacAlgId};
use zeroize::Zeroize;

pub const PRE_MASTER_LEN: usize = 48;
pub const MASTER_SECRET_LEN: usize = 48;

/// SSL 3.0 Finished sender labels.
const SSL3_SENDER_CLIENT: [u8; 4] = [0x43, 0x4c, 0x4e, 0x54];
const SSL3_SENDER_SERVER: [u8; 4] = [0x53, 0x52, 0x56, 0x52];

fn ssl3_pad_len(alg: HashAlgId) -> usize {
    match alg {
        HashAlgId::Md5 => 48,
        HashAlgId::Sha1 => 40,
    }
}

pub trait VersionCrypt: Send + Sync {
    /// Derive the 48-byte master secret from the pre-master secret.
    fn master_secret(
        &self,
        provider: &dyn CryptoProvider,
        pre_master: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<[u8; MASTER_SECRET_LEN], CryptoError>;

    /// Derive `len` bytes of key block from the master secret.
    fn key_block(
        &self,
        provider: &dyn CryptoProvider,
        master: &[u8; MASTER_SECRET_LEN],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Expand an export suite's short write key to its final length.
    fn export_write_key(
        &self,
        provider: &dyn CryptoProvider,
        short_key: &[u8],
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        expanded_len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Derive an export suite's IV. Export key blocks carry no IV bytes.
    fn export_iv(
        &self,
        provider: &dyn CryptoProvider,
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        iv_len: usize,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Length of the Finished verify value (36 for SSL 3.0, 12 for TLS).
    fn finished_len(&self) -> usize;

    /// Compute the Finished verify value over the transcript as it stands.
    fn finished_value(
        &self,
        provider: &dyn CryptoProvider,
        transcript: &Transcript,
        master: &[u8; MASTER_SECRET_LEN],
        sender: TlsRole,
    ) -> Result<Vec<u8>, CryptoError>;

    /// The 36-byte digest a CertificateVerify signature covers.
    fn cert_verify_digest(
        &self,
        provider: &dyn CryptoProvider,
        transcript: &Transcript,
        master: &[u8; MASTER_SECRET_LEN],
    ) -> Result<[u8; 36], CryptoError>;

    /// Record-layer MAC over one plaintext fragment.
    fn record_mac(
        &self,
        provider: &dyn CryptoProvider,
        mac_alg: MacAlgId,
        secret: &[u8],
        seq: u64,
        content_type: u8,
        version: TlsVersion,
        payload: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Select the derivation engine for a committed version. SSL 2.0 records
/// promoted to v3 handshakes always land on SSL 3.0 or TLS 1.0 before any
/// derivation runs.
pub fn version_crypt(version: TlsVersion) -> &'static dyn VersionCrypt {
    match version {
        TlsVersion::Tls10 => &Tls1Crypt,
        TlsVersion::Ssl3 | TlsVersion::Ssl2 => &Ssl3Crypt,
    }
}

pub struct Ssl3Crypt;
pub struct Tls1Crypt;

/// SSL 3.0 expansion: rounds of MD5(secret + SHA1(salt_i + secret + r1 + r2))
/// where salt_i is the i-th uppercase letter repeated i+1 times.
fn ssl3_expand(
    provider: &dyn CryptoProvider,
    secret: &[u8],
    rand1: &[u8; 32],
    rand2: &[u8; 32],
    len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let rounds = len.div_ceil(16);
    if rounds > 26 {
        return Err(CryptoError::InvalidArg);
    }
    let mut out = Vec::with_capacity(rounds * 16);
    for i in 0..rounds {
        let salt = vec![b'A' + i as u8; i + 1];
        let mut sha = provider.digest(HashAlgId::Sha1)?;
        sha.update(&salt)?;
        sha.update(secret)?;
        sha.update(rand1)?;
        sha.update(rand2)?;
        let mut inner = [0u8; 20];
        sha.finish(&mut inner)?;

        let mut md5 = provider.digest(HashAlgId::Md5)?;
        md5.update(secret)?;
        md5.update(&inner)?;
        let mut block = [0u8; 16];
        md5.finish(&mut block)?;
        out.extend_from_slice(&block);
        block.zeroize();
        inner.zeroize();
    }
    out.truncate(len);
    Ok(out)
}

/// P_hash from the TLS 1.0 PRF.
fn p_hash(
    provider: &dyn CryptoProvider,
    mac_alg: MacAlgId,
    secret: &[u8],
    seed: &[u8],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    let hash_len = mac_alg.output_size();
    let mut a = vec![0u8; hash_len];
    {
        let mut mac = provider.mac(mac_alg, secret)?;
        mac.update(seed)?;
        mac.finish(&mut a)?;
    }
    let mut offset = 0;
    let mut chunk = vec![0u8; hash_len];
    while offset < out.len() {
        let mut mac = provider.mac(mac_alg, secret)?;
        mac.update(&a)?;
        mac.update(seed)?;
        mac.finish(&mut chunk)?;

        let take = (out.len() - offset).min(hash_len);
        for (dst, src) in out[offset..offset + take].iter_mut().zip(chunk.iter()) {
            *dst ^= *src;
        }
        offset += take;

        let mut mac = provider.mac(mac_alg, secret)?;
        mac.update(&a)?;
        mac.finish(&mut a)?;
    }
    a.zeroize();
    chunk.zeroize();
    Ok(())
}

/// TLS 1.0 PRF: P_MD5 over the first half of the secret XOR P_SHA1 over the
/// second half, both keyed on label + seed. Odd-length secrets share the
/// middle byte.
pub(crate) fn tls_prf(
    provider: &dyn CryptoProvider,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let mut out = vec![0u8; len];
    p_hash(provider, MacAlgId::HmacMd5, s1, &label_seed, &mut out)?;
    p_hash(provider, MacAlgId::HmacSha1, s2, &label_seed, &mut out)?;
    Ok(out)
}

fn concat_randoms(a: &[u8; 32], b: &[u8; 32]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(a);
    out[32..].copy_from_slice(b);
    out
}

impl VersionCrypt for Ssl3Crypt {
    fn master_secret(
        &self,
        provider: &dyn CryptoProvider,
        pre_master: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<[u8; MASTER_SECRET_LEN], CryptoError> {
        let mut derived = ssl3_expand(
            provider,
            pre_master,
            client_random,
            server_random,
            MASTER_SECRET_LEN,
        )?;
        let mut master = [0u8; MASTER_SECRET_LEN];
        master.copy_from_slice(&derived);
        derived.zeroize();
        Ok(master)
    }

    fn key_block(
        &self,
        provider: &dyn CryptoProvider,
        master: &[u8; MASTER_SECRET_LEN],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        // Key block salts the randoms server-first, unlike the master
        // secret derivation.
        ssl3_expand(provider, master, server_random, client_random, len)
    }

    fn export_write_key(
        &self,
        provider: &dyn CryptoProvider,
        short_key: &[u8],
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        expanded_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut md5 = provider.digest(HashAlgId::Md5)?;
        md5.update(short_key)?;
        match writer {
            TlsRole::Client => {
                md5.update(client_random)?;
                md5.update(server_random)?;
            }
            TlsRole::Server => {
                md5.update(server_random)?;
                md5.update(client_random)?;
            }
        }
        let mut block = [0u8; 16];
        md5.finish(&mut block)?;
        if expanded_len > block.len() {
            return Err(CryptoError::InvalidArg);
        }
        let key = block[..expanded_len].to_vec();
        block.zeroize();
        Ok(key)
    }

    fn export_iv(
        &self,
        provider: &dyn CryptoProvider,
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        iv_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let mut md5 = provider.digest(HashAlgId::Md5)?;
        match writer {
            TlsRole::Client => {
                md5.update(client_random)?;
                md5.update(server_random)?;
            }
            TlsRole::Server => {
                md5.update(server_random)?;
                md5.update(client_random)?;
            }
        }
        let mut block = [0u8; 16];
        md5.finish(&mut block)?;
        if iv_len > block.len() {
            return Err(CryptoError::InvalidArg);
        }
        Ok(block[..iv_len].to_vec())
    }

    fn finished_len(&self) -> usize {
        36
    }

    fn finished_value(
        &self,
        provider: &dyn CryptoProvider,
        transcript: &Transcript,
        master: &[u8; MASTER_SECRET_LEN],
        sender: TlsRole,
    ) -> Result<Vec<u8>, CryptoError> {
        let sender_label = match sender {
            TlsRole::Client => SSL3_SENDER_CLIENT,
            TlsRole::Server => SSL3_SENDER_SERVER,
        };
        let (fork_md5, fork_sha) = transcript.fork();
        let mut out = Vec::with_capacity(36);
        for (alg, mut inner_ctx) in [(HashAlgId::Md5, fork_md5), (HashAlgId::Sha1, fork_sha)] {
            let pad = ssl3_pad_len(alg);
            inner_ctx.update(&sender_label)?;
            inner_ctx.update(master)?;
            inner_ctx.update(&vec![0x36u8; pad])?;
            let mut inner = vec![0u8; alg.output_size()];
            inner_ctx.finish(&mut inner)?;

            let mut outer = provider.digest(alg)?;
            outer.update(master)?;
            outer.update(&vec![0x5cu8; pad])?;
            outer.update(&inner)?;
            let mut value = vec![0u8; alg.output_size()];
            outer.finish(&mut value)?;
            out.extend_from_slice(&value);
            inner.zeroize();
        }
        Ok(out)
    }

    fn cert_verify_digest(
        &self,
        provider: &dyn CryptoProvider,
        transcript: &Transcript,
        master: &[u8; MASTER_SECRET_LEN],
    ) -> Result<[u8; 36], CryptoError> {
        // Same pad sandwich as Finished but with no sender label.
        let (fork_md5, fork_sha) = transcript.fork();
        let mut out = [0u8; 36];
        let mut offset = 0;
        for (alg, mut inner_ctx) in [(HashAlgId::Md5, fork_md5), (HashAlgId::Sha1, fork_sha)] {
            let pad = ssl3_pad_len(alg);
            inner_ctx.update(master)?;
            inner_ctx.update(&vec![0x36u8; pad])?;
            let mut inner = vec![0u8; alg.output_size()];
            inner_ctx.finish(&mut inner)?;

            let mut outer = provider.digest(alg)?;
            outer.update(master)?;
            outer.update(&vec![0x5cu8; pad])?;
            outer.update(&inner)?;
            outer.finish(&mut out[offset..offset + alg.output_size()])?;
            offset += alg.output_size();
            inner.zeroize();
        }
        Ok(out)
    }

    fn record_mac(
        &self,
        provider: &dyn CryptoProvider,
        mac_alg: MacAlgId,
        secret: &[u8],
        seq: u64,
        content_type: u8,
        _version: TlsVersion,
        payload: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let Some(hash) = mac_alg.hash() else {
            return Ok(Vec::new());
        };
        let pad = ssl3_pad_len(hash);

        let mut inner_ctx = provider.digest(hash)?;
        inner_ctx.update(secret)?;
        inner_ctx.update(&vec![0x36u8; pad])?;
        inner_ctx.update(&seq.to_be_bytes())?;
        inner_ctx.update(&[content_type])?;
        inner_ctx.update(&(payload.len() as u16).to_be_bytes())?;
        inner_ctx.update(payload)?;
        let mut inner = vec![0u8; hash.output_size()];
        inner_ctx.finish(&mut inner)?;

        let mut outer = provider.digest(hash)?;
        outer.update(secret)?;
        outer.update(&vec![0x5cu8; pad])?;
        outer.update(&inner)?;
        let mut mac = vec![0u8; hash.output_size()];
        outer.finish(&mut mac)?;
        inner.zeroize();
        Ok(mac)
    }
}

impl VersionCrypt for Tls1Crypt {
    fn master_secret(
        &self,
        provider: &dyn CryptoProvider,
        pre_master: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<[u8; MASTER_SECRET_LEN], CryptoError> {
        let seed = concat_randoms(client_random, server_random);
        let mut derived = tls_prf(
            provider,
            pre_master,
            b"master secret",
            &seed,
            MASTER_SECRET_LEN,
        )?;
        let mut master = [0u8; MASTER_SECRET_LEN];
        master.copy_from_slice(&derived);
        derived.zeroize();
        Ok(master)
    }

    fn key_block(
        &self,
        provider: &dyn CryptoProvider,
        master: &[u8; MASTER_SECRET_LEN],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let seed = concat_randoms(server_random, client_random);
        tls_prf(provider, master, b"key expansion", &seed, len)
    }

    fn export_write_key(
        &self,
        provider: &dyn CryptoProvider,
        short_key: &[u8],
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        expanded_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        let label: &[u8] = match writer {
            TlsRole::Client => b"client write key",
            TlsRole::Server => b"server write key",
        };
        let seed = concat_randoms(client_random, server_random);
        tls_prf(provider, short_key, label, &seed, expanded_len)
    }

    fn export_iv(
        &self,
        provider: &dyn CryptoProvider,
        writer: TlsRole,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        iv_len: usize,
    ) -> Result<Vec<u8>, CryptoError> {
        // One secretless expansion yields both IVs: client takes the first
        // half of the block, server the second.
        let seed = concat_randoms(client_random, server_random);
        let block = tls_prf(provider, &[], b"IV block", &seed, 2 * iv_len)?;
        let iv = match writer {
            TlsRole::Client => block[..iv_len].to_vec(),
            TlsRole::Server => block[iv_len..].to_vec(),
        };
        Ok(iv)
    }

    fn finished_len(&self) -> usize {
        12
    }

    fn finished_value(
        &self,
        provider: &dyn CryptoProvider,
        transcript: &Transcript,
        master: &[u8; MASTER_SECRET_LEN],
        sender: TlsRole,
    ) -> Result<Vec<u8>, CryptoError> {
        let label: &[u8] = match sender {
            TlsRole::Client => b"client finished",
            TlsRole::Server => b"server finished",
        };
        let (md5, sha1) = transcript.current()?;
        let mut seed = [0u8; 36];
        seed[..16].copy_from_slice(&md5);
        seed[16..].copy_from_slice(&sha1);
        tls_prf(provider, master, label, &seed, 12)
    }

    fn cert_verify_digest(
        &self,
        _provider: &dyn CryptoProvider,
        transcript: &Transcript,
        _master: &[u8; MASTER_SECRET_LEN],
    ) -> Result<[u8; 36], CryptoError> {
        let (md5, sha1) = transcript.current()?;
        let mut out = [0u8; 36];
        out[..16].copy_from_slice(&md5);
        out[16..].copy_from_slice(&sha1);
        Ok(out)
    }

    fn record_mac(
        &self,
        provider: &dyn CryptoProvider,
        mac_alg: MacAlgId,
        secret: &[u8],
        seq: u64,
        content_type: u8,
        version: TlsVersion,
        payload: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if mac_alg == MacAlgId::Null {
            return Ok(Vec::new());
        }
        let mut mac = provider.mac(mac_alg, secret)?;
        mac.update(&seq.to_be_bytes())?;
        mac.update(&[content_type])?;
        mac.update(&version.wire().to_be_bytes())?;
        mac.update(&(payload.len() as u16).to_be_bytes())?;
        mac.update(payload)?;
        let mut out = vec![0u8; mac.output_size()];
        mac.finish(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seclink_provider::testing::TestProvider;

    fn randoms() -> ([u8; 32], [u8; 32]) {
        let mut c = [0u8; 32];
        let mut s = [0u8; 32];
        for i in 0..32 {
            c[i] = i as u8;
            s[i] = 0xa0 ^ i as u8;
        }
        (c, s)
    }

    #[test]
    fn test_prf_is_deterministic_and_label_sensitive() {
        let provider = TestProvider::new(1);
        let a = tls_prf(&provider, b"secret", b"label one", b"seed", 40).unwrap();
        let b = tls_prf(&provider, b"secret", b"label one", b"seed", 40).unwrap();
        let c = tls_prf(&provider, b"secret", b"label two", b"seed", 40).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_prf_prefix_stability() {
        let provider = TestProvider::new(1);
        let long = tls_prf(&provider, b"secret", b"label", b"seed", 64).unwrap();
        let short = tls_prf(&provider, b"secret", b"label", b"seed", 16).unwrap();
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn test_master_secret_differs_between_versions() {
        let provider = TestProvider::new(1);
        let (cr, sr) = randoms();
        let pre = [0x42u8; PRE_MASTER_LEN];
        let ssl3 = version_crypt(TlsVersion::Ssl3)
            .master_secret(&provider, &pre, &cr, &sr)
            .unwrap();
        let tls = version_crypt(TlsVersion::Tls10)
            .master_secret(&provider, &pre, &cr, &sr)
            .unwrap();
        assert_ne!(ssl3, tls);
    }

    #[test]
    fn test_master_secret_binds_both_randoms() {
        let provider = TestProvider::new(1);
        let (cr, sr) = randoms();
        let pre = [0x42u8; PRE_MASTER_LEN];
        for crypt in [
            version_crypt(TlsVersion::Ssl3),
            version_crypt(TlsVersion::Tls10),
        ] {
            let base = crypt.master_secret(&provider, &pre, &cr, &sr).unwrap();
            let mut cr2 = cr;
            cr2[0] ^= 1;
            assert_ne!(base, crypt.master_secret(&provider, &pre, &cr2, &sr).unwrap());
            let mut sr2 = sr;
            sr2[31] ^= 1;
            assert_ne!(base, crypt.master_secret(&provider, &pre, &cr, &sr2).unwrap());
        }
    }

    #[test]
    fn test_key_block_salt_order_is_not_master_order() {
        // Swapping the randoms must not map one derivation onto the other.
        let provider = TestProvider::new(1);
        let (cr, sr) = randoms();
        let master = [0x17u8; MASTER_SECRET_LEN];
        for crypt in [
            version_crypt(TlsVersion::Ssl3),
            version_crypt(TlsVersion::Tls10),
        ] {
            let kb = crypt.key_block(&provider, &master, &cr, &sr, 48).unwrap();
            let swapped = crypt.key_block(&provider, &master, &sr, &cr, 48).unwrap();
            assert_ne!(kb, swapped);
        }
    }

    #[test]
    fn test_finished_lengths_and_role_separation() {
        let provider = TestProvider::new(1);
        let master = [0x55u8; MASTER_SECRET_LEN];
        let mut t = Transcript::new(&provider).unwrap();
        t.update(b"handshake messages").unwrap();

        for (version, len) in [(TlsVersion::Ssl3, 36), (TlsVersion::Tls10, 12)] {
            let crypt = version_crypt(version);
            assert_eq!(crypt.finished_len(), len);
            let client = crypt
                .finished_value(&provider, &t, &master, TlsRole::Client)
                .unwrap();
            let server = crypt
                .finished_value(&provider, &t, &master, TlsRole::Server)
                .unwrap();
            assert_eq!(client.len(), len);
            assert_ne!(client, server);
        }
    }

    #[test]
    fn test_finished_tracks_transcript() {
        let provider = TestProvider::new(1);
        let master = [0x55u8; MASTER_SECRET_LEN];
        let crypt = version_crypt(TlsVersion::Ssl3);

        let mut t = Transcript::new(&provider).unwrap();
        t.update(b"one").unwrap();
        let before = crypt
            .finished_value(&provider, &t, &master, TlsRole::Client)
            .unwrap();
        t.update(b"two").unwrap();
        let after = crypt
            .finished_value(&provider, &t, &master, TlsRole::Client)
            .unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_cert_verify_digest_shapes() {
        let provider = TestProvider::new(1);
        let master = [0x31u8; MASTER_SECRET_LEN];
        let mut t = Transcript::new(&provider).unwrap();
        t.update(b"through client key exchange").unwrap();

        let tls = version_crypt(TlsVersion::Tls10)
            .cert_verify_digest(&provider, &t, &master)
            .unwrap();
        let (md5, sha1) = t.current().unwrap();
        assert_eq!(&tls[..16], &md5);
        assert_eq!(&tls[16..], &sha1);

        // The SSL3 form mixes in the master secret, so it cannot equal the
        // plain concatenation.
        let ssl3 = version_crypt(TlsVersion::Ssl3)
            .cert_verify_digest(&provider, &t, &master)
            .unwrap();
        assert_ne!(ssl3, tls);
    }

    #[test]
    fn test_record_mac_covers_seq_type_and_payload() {
        let provider = TestProvider::new(1);
        let secret = [0x77u8; 20];
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let crypt = version_crypt(version);
            let base = crypt
                .record_mac(&provider, MacAlgId::HmacSha1, &secret, 5, 23, version, b"data")
                .unwrap();
            assert_eq!(base.len(), 20);
            let bumped_seq = crypt
                .record_mac(&provider, MacAlgId::HmacSha1, &secret, 6, 23, version, b"data")
                .unwrap();
            let other_type = crypt
                .record_mac(&provider, MacAlgId::HmacSha1, &secret, 5, 22, version, b"data")
                .unwrap();
            let other_payload = crypt
                .record_mac(&provider, MacAlgId::HmacSha1, &secret, 5, 23, version, b"datA")
                .unwrap();
            assert_ne!(base, bumped_seq);
            assert_ne!(base, other_type);
            assert_ne!(base, other_payload);
        }
    }

    #[test]
    fn test_null_mac_is_empty() {
        let provider = TestProvider::new(1);
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let mac = version_crypt(version)
                .record_mac(&provider, MacAlgId::Null, &[], 0, 23, version, b"data")
                .unwrap();
            assert!(mac.is_empty());
        }
    }

    #[test]
    fn test_export_expansion_separates_directions() {
        let provider = TestProvider::new(1);
        let (cr, sr) = randoms();
        let short = [1u8, 2, 3, 4, 5];
        for version in [TlsVersion::Ssl3, TlsVersion::Tls10] {
            let crypt = version_crypt(version);
            let client = crypt
                .export_write_key(&provider, &short, TlsRole::Client, &cr, &sr, 16)
                .unwrap();
            let server = crypt
                .export_write_key(&provider, &short, TlsRole::Server, &cr, &sr, 16)
                .unwrap();
            assert_eq!(client.len(), 16);
            assert_ne!(client, server);

            let civ = crypt
                .export_iv(&provider, TlsRole::Client, &cr, &sr, 8)
                .unwrap();
            let siv = crypt
                .export_iv(&provider, TlsRole::Server, &cr, &sr, 8)
                .unwrap();
            assert_eq!(civ.len(), 8);
            assert_ne!(civ, siv);
        }
    }
}
