//! Key block partition and export key expansion.

use crate::crypt::{SuiteParams, VersionCrypt, MASTER_SECRET_LEN};
use crate::TlsRole;
use seclink_provider::CryptoProvider;
use seclink_types::CryptoError;
use zeroize::Zeroize;

/// Write keys for one direction of the connection.
#[derive(Debug)]
pub struct DirectionKeys {
    pub mac_secret: Vec<u8>,
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl Drop for DirectionKeys {
    fn drop(&mut self) {
        self.mac_secret.zeroize();
        self.key.zeroize();
        self.iv.zeroize();
    }
}

/// Both directions' write keys, partitioned out of the key block.
#[derive(Debug)]
pub struct DerivedKeys {
    pub client: DirectionKeys,
    pub server: DirectionKeys,
}

impl DerivedKeys {
    /// Partition the key block in the fixed order client MAC, server MAC,
    /// client key, server key, client IV, server IV. Export suites draw
    /// short keys from the block and expand them; their IVs come entirely
    /// out of the expansion step.
    pub fn derive(
        provider: &dyn CryptoProvider,
        crypt: &dyn VersionCrypt,
        params: &SuiteParams,
        master: &[u8; MASTER_SECRET_LEN],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<DerivedKeys, CryptoError> {
        let mut block = crypt.key_block(
            provider,
            master,
            client_random,
            server_random,
            params.key_block_len(),
        )?;

        let mac_len = params.mac_len();
        let km = params.key_material_len;
        let iv_len = if params.exportable { 0 } else { params.iv_len };

        let mut cursor = block.as_slice();
        let mut take = |n: usize| {
            let (head, tail) = cursor.split_at(n);
            cursor = tail;
            head.to_vec()
        };
        let client_mac = take(mac_len);
        let server_mac = take(mac_len);
        let client_key = take(km);
        let server_key = take(km);
        let client_iv = take(iv_len);
        let server_iv = take(iv_len);

        let keys = if params.exportable {
            let client = DirectionKeys {
                mac_secret: client_mac,
                key: crypt.export_write_key(
                    provider,
                    &client_key,
                    TlsRole::Client,
                    client_random,
                    server_random,
                    params.expanded_key_len,
                )?,
                iv: crypt.export_iv(
                    provider,
                    TlsRole::Client,
                    client_random,
                    server_random,
                    params.iv_len,
                )?,
            };
            let server = DirectionKeys {
                mac_secret: server_mac,
                key: crypt.export_write_key(
                    provider,
                    &server_key,
                    TlsRole::Server,
                    client_random,
                    server_random,
                    params.expanded_key_len,
                )?,
                iv: crypt.export_iv(
                    provider,
                    TlsRole::Server,
                    client_random,
                    server_random,
                    params.iv_len,
                )?,
            };
            DerivedKeys { client, server }
        } else {
            DerivedKeys {
                client: DirectionKeys {
                    mac_secret: client_mac,
                    key: client_key,
                    iv: client_iv,
                },
                server: DirectionKeys {
                    mac_secret: server_mac,
                    key: server_key,
                    iv: server_iv,
                },
            }
        };
        block.zeroize();
        Ok(keys)
    }
}
