//! Cipher suite parameters and the version-specific key schedules.

mod key_schedule;
pub mod keylog;
mod secrets;
mod transcript;

pub use key_schedule::{DerivedKeys, DirectionKeys};
pub use secrets::{version_crypt, VersionCrypt, MASTER_SECRET_LEN, PRE_MASTER_LEN};
pub use transcript::Transcript;

use crate::CipherSuite;
use seclink_types::{CipherAlgId, MacAlgId, TlsError};

/// Key exchange family of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    /// No key exchange; the null suite placeholder before negotiation.
    Null,
    /// RSA-encrypted pre-master secret.
    Rsa,
    /// RSA with export-grade restrictions: the server may need to present
    /// a short-modulus key via ServerKeyExchange.
    RsaExport,
    /// Anonymous Diffie-Hellman. Defined for suite identification; no
    /// provider operation backs it, so negotiation never selects it.
    DhAnon,
    /// FORTEZZA/KEA token suites. Identification only, never selected.
    Fortezza,
}

/// Everything the record layer and key schedule need to know about a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteParams {
    pub suite: CipherSuite,
    pub key_exchange: KeyExchangeAlg,
    pub cipher: CipherAlgId,
    pub mac: MacAlgId,
    /// Bytes drawn from the key block per direction.
    pub key_material_len: usize,
    /// Final write key length after export expansion. Equal to
    /// `key_material_len` for non-export suites.
    pub expanded_key_len: usize,
    pub iv_len: usize,
    pub exportable: bool,
}

impl SuiteParams {
    /// Look up the parameter set for a suite. Unknown code points are an
    /// error carrying the raw value.
    pub fn from_suite(suite: CipherSuite) -> Result<SuiteParams, TlsError> {
        let p = match suite {
            CipherSuite::SSL_NULL_WITH_NULL_NULL => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Null,
                cipher: CipherAlgId::Null,
                mac: MacAlgId::Null,
                key_material_len: 0,
                expanded_key_len: 0,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_RSA_WITH_NULL_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::Null,
                mac: MacAlgId::HmacMd5,
                key_material_len: 0,
                expanded_key_len: 0,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_RSA_WITH_NULL_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::Null,
                mac: MacAlgId::HmacSha1,
                key_material_len: 0,
                expanded_key_len: 0,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::RsaExport,
                cipher: CipherAlgId::Rc4,
                mac: MacAlgId::HmacMd5,
                key_material_len: 5,
                expanded_key_len: 16,
                iv_len: 0,
                exportable: true,
            },
            CipherSuite::SSL_RSA_WITH_RC4_128_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::Rc4,
                mac: MacAlgId::HmacMd5,
                key_material_len: 16,
                expanded_key_len: 16,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_RSA_WITH_RC4_128_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::Rc4,
                mac: MacAlgId::HmacSha1,
                key_material_len: 16,
                expanded_key_len: 16,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::RsaExport,
                cipher: CipherAlgId::Rc2Cbc,
                mac: MacAlgId::HmacMd5,
                key_material_len: 5,
                expanded_key_len: 16,
                iv_len: 8,
                exportable: true,
            },
            CipherSuite::SSL_RSA_EXPORT_WITH_DES40_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::RsaExport,
                cipher: CipherAlgId::DesCbc,
                mac: MacAlgId::HmacSha1,
                key_material_len: 5,
                expanded_key_len: 8,
                iv_len: 8,
                exportable: true,
            },
            CipherSuite::SSL_RSA_WITH_DES_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::DesCbc,
                mac: MacAlgId::HmacSha1,
                key_material_len: 8,
                expanded_key_len: 8,
                iv_len: 8,
                exportable: false,
            },
            CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Rsa,
                cipher: CipherAlgId::TripleDesCbc,
                mac: MacAlgId::HmacSha1,
                key_material_len: 24,
                expanded_key_len: 24,
                iv_len: 8,
                exportable: false,
            },
            CipherSuite::SSL_DH_ANON_EXPORT_WITH_RC4_40_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::DhAnon,
                cipher: CipherAlgId::Rc4,
                mac: MacAlgId::HmacMd5,
                key_material_len: 5,
                expanded_key_len: 16,
                iv_len: 0,
                exportable: true,
            },
            CipherSuite::SSL_DH_ANON_WITH_RC4_128_MD5 => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::DhAnon,
                cipher: CipherAlgId::Rc4,
                mac: MacAlgId::HmacMd5,
                key_material_len: 16,
                expanded_key_len: 16,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_DH_ANON_WITH_DES_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::DhAnon,
                cipher: CipherAlgId::DesCbc,
                mac: MacAlgId::HmacSha1,
                key_material_len: 8,
                expanded_key_len: 8,
                iv_len: 8,
                exportable: false,
            },
            CipherSuite::SSL_DH_ANON_WITH_3DES_EDE_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::DhAnon,
                cipher: CipherAlgId::TripleDesCbc,
                mac: MacAlgId::HmacSha1,
                key_material_len: 24,
                expanded_key_len: 24,
                iv_len: 8,
                exportable: false,
            },
            CipherSuite::SSL_FORTEZZA_DMS_WITH_NULL_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Fortezza,
                cipher: CipherAlgId::Null,
                mac: MacAlgId::HmacSha1,
                key_material_len: 0,
                expanded_key_len: 0,
                iv_len: 0,
                exportable: false,
            },
            CipherSuite::SSL_FORTEZZA_DMS_WITH_FORTEZZA_CBC_SHA => SuiteParams {
                suite,
                key_exchange: KeyExchangeAlg::Fortezza,
                cipher: CipherAlgId::Null,
                mac: MacAlgId::HmacSha1,
                key_material_len: 24,
                expanded_key_len: 24,
                iv_len: 8,
                exportable: false,
            },
            CipherSuite(other) => {
                return Err(TlsError::HandshakeFailed(format!(
                    "unknown cipher suite 0x{other:04x}"
                )))
            }
        };
        Ok(p)
    }

    /// Whether this implementation can actually run the suite. Anonymous DH
    /// and FORTEZZA suites are recognized but have no backing operation.
    pub fn servable(&self) -> bool {
        matches!(
            self.key_exchange,
            KeyExchangeAlg::Rsa | KeyExchangeAlg::RsaExport
        )
    }

    pub fn mac_len(&self) -> usize {
        self.mac.output_size()
    }

    /// Per-connection key block size. Export suites do not draw IVs from
    /// the key block; those come out of a separate expansion.
    pub fn key_block_len(&self) -> usize {
        let iv = if self.exportable { 0 } else { self.iv_len };
        2 * (self.mac_len() + self.key_material_len + iv)
    }

    pub fn is_block_cipher(&self) -> bool {
        self.cipher.is_block()
    }
}

/// Default enabled suites, in preference order.
pub const DEFAULT_SUITES: &[CipherSuite] = &[
    CipherSuite::SSL_RSA_WITH_RC4_128_SHA,
    CipherSuite::SSL_RSA_WITH_RC4_128_MD5,
    CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA,
    CipherSuite::SSL_RSA_WITH_DES_CBC_SHA,
    CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5,
    CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5,
    CipherSuite::SSL_RSA_EXPORT_WITH_DES40_CBC_SHA,
];

/// Pick the first suite in `peer_order` that also appears in `enabled`.
/// The peer's preference wins ties, matching how the reference servers of
/// this protocol generation resolved the intersection.
pub fn negotiate_suite(peer_order: &[CipherSuite], enabled: &[CipherSuite]) -> Option<CipherSuite> {
    peer_order
        .iter()
        .copied()
        .find(|s| enabled.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_params_lookup() {
        let p = SuiteParams::from_suite(CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA).unwrap();
        assert_eq!(p.key_exchange, KeyExchangeAlg::Rsa);
        assert_eq!(p.cipher, CipherAlgId::TripleDesCbc);
        assert_eq!(p.mac, MacAlgId::HmacSha1);
        assert_eq!(p.key_material_len, 24);
        assert_eq!(p.expanded_key_len, 24);
        assert_eq!(p.iv_len, 8);
        assert!(!p.exportable);
        assert!(p.servable());
    }

    #[test]
    fn test_unknown_suite_rejected() {
        assert!(SuiteParams::from_suite(CipherSuite(0xfefe)).is_err());
    }

    #[test]
    fn test_export_suites_use_short_key_material() {
        for suite in [
            CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5,
            CipherSuite::SSL_RSA_EXPORT_WITH_RC2_CBC_40_MD5,
            CipherSuite::SSL_RSA_EXPORT_WITH_DES40_CBC_SHA,
        ] {
            let p = SuiteParams::from_suite(suite).unwrap();
            assert!(p.exportable);
            assert_eq!(p.key_material_len, 5);
            assert!(p.expanded_key_len > p.key_material_len);
        }
    }

    #[test]
    fn test_key_block_excludes_export_ivs() {
        let des = SuiteParams::from_suite(CipherSuite::SSL_RSA_WITH_DES_CBC_SHA).unwrap();
        assert_eq!(des.key_block_len(), 2 * (20 + 8 + 8));
        let des40 = SuiteParams::from_suite(CipherSuite::SSL_RSA_EXPORT_WITH_DES40_CBC_SHA).unwrap();
        assert_eq!(des40.key_block_len(), 2 * (20 + 5));
    }

    #[test]
    fn test_anon_and_fortezza_not_servable() {
        for suite in [
            CipherSuite::SSL_DH_ANON_WITH_RC4_128_MD5,
            CipherSuite::SSL_DH_ANON_EXPORT_WITH_RC4_40_MD5,
            CipherSuite::SSL_FORTEZZA_DMS_WITH_FORTEZZA_CBC_SHA,
        ] {
            let p = SuiteParams::from_suite(suite).unwrap();
            assert!(!p.servable());
        }
    }

    #[test]
    fn test_negotiation_prefers_peer_order() {
        let peer = [
            CipherSuite::SSL_RSA_WITH_DES_CBC_SHA,
            CipherSuite::SSL_RSA_WITH_RC4_128_SHA,
        ];
        let enabled = [
            CipherSuite::SSL_RSA_WITH_RC4_128_SHA,
            CipherSuite::SSL_RSA_WITH_DES_CBC_SHA,
        ];
        assert_eq!(
            negotiate_suite(&peer, &enabled),
            Some(CipherSuite::SSL_RSA_WITH_DES_CBC_SHA)
        );
    }

    #[test]
    fn test_negotiation_skips_unknown_peer_suites() {
        let peer = [CipherSuite(0x9999), CipherSuite::SSL_RSA_WITH_RC4_128_MD5];
        let enabled = [CipherSuite::SSL_RSA_WITH_RC4_128_MD5];
        assert_eq!(
            negotiate_suite(&peer, &enabled),
            Some(CipherSuite::SSL_RSA_WITH_RC4_128_MD5)
        );
    }

    #[test]
    fn test_negotiation_empty_intersection() {
        let peer = [CipherSuite::SSL_RSA_WITH_RC4_128_MD5];
        let enabled = [CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA];
        assert_eq!(negotiate_suite(&peer, &enabled), None);
    }

    #[test]
    fn test_default_suites_all_servable() {
        for &suite in DEFAULT_SUITES {
            let p = SuiteParams::from_suite(suite).unwrap();
            assert!(p.servable(), "{suite:?} in defaults but not servable");
            assert!(p.mac != MacAlgId::Null);
        }
    }
}
