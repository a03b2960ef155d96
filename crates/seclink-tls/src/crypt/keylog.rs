//! NSS Key Log Format support (SSLKEYLOGFILE).
//!
//! Wireshark-compatible key logging, one line per connection:
//! `CLIENT_RANDOM <client_random_hex> <master_secret_hex>`.
//! SSL 3.0 and TLS 1.0 both log under the CLIENT_RANDOM label.

use crate::config::TlsConfig;

/// Convert bytes to lowercase hex string.
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Log a key material line in NSS key log format.
///
/// Calls the `key_log_callback` on `config` (if set) with a line:
/// `<label> <client_random_hex> <secret_hex>`
pub fn log_key(config: &TlsConfig, label: &str, client_random: &[u8; 32], secret: &[u8]) {
    if let Some(cb) = &config.key_log_callback {
        let line = format!("{} {} {}", label, to_hex(client_random), to_hex(secret));
        cb(&line);
    }
}

/// Log a connection's master secret once it is derived.
pub fn log_master_secret(config: &TlsConfig, client_random: &[u8; 32], master_secret: &[u8]) {
    log_key(config, "CLIENT_RANDOM", client_random, master_secret);
}

#[cfg(test)]
mod tests {
    use super::*;
    use seclink_provider::testing::TestProvider;
    use std::sync::{Arc, Mutex};

    fn capture() -> (TlsConfig, Arc<Mutex<Vec<String>>>) {
        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let lines_clone = lines.clone();
        let config = TlsConfig::builder(Arc::new(TestProvider::new(0)))
            .key_log(Arc::new(move |line: &str| {
                lines_clone.lock().unwrap().push(line.to_string());
            }))
            .build()
            .unwrap();
        (config, lines)
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x01, 0xab, 0xff]), "01abff");
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x00, 0xFF, 0x0A, 0xF0]), "00ff0af0");
    }

    #[test]
    fn test_log_key_no_callback() {
        let config = TlsConfig::builder(Arc::new(TestProvider::new(0)))
            .build()
            .unwrap();
        // Should not panic
        log_key(&config, "CLIENT_RANDOM", &[0u8; 32], &[1, 2, 3]);
    }

    #[test]
    fn test_log_key_with_callback() {
        let (config, lines) = capture();
        let client_random = [0x42u8; 32];
        let secret = [0xAB, 0xCD];
        log_key(&config, "CLIENT_RANDOM", &client_random, &secret);

        let logged = lines.lock().unwrap();
        assert_eq!(logged.len(), 1);
        let expected_cr_hex: String = "42".repeat(32);
        let expected = format!("CLIENT_RANDOM {} abcd", expected_cr_hex);
        assert_eq!(logged[0], expected);
    }

    #[test]
    fn test_log_master_secret_format() {
        let (config, lines) = capture();
        log_master_secret(&config, &[0x01u8; 32], &[0x02u8; 48]);

        let logged = lines.lock().unwrap();
        assert_eq!(logged.len(), 1);
        let parts: Vec<&str> = logged[0].split(' ').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CLIENT_RANDOM");
        assert_eq!(parts[1].len(), 64);
        assert_eq!(parts[2].len(), 96);
    }

    #[test]
    fn test_multiple_calls_preserve_order() {
        let (config, lines) = capture();
        log_key(&config, "LABEL_A", &[0x01; 32], &[0x10; 16]);
        log_key(&config, "LABEL_B", &[0x02; 32], &[0x20; 16]);

        let logged = lines.lock().unwrap();
        assert_eq!(logged.len(), 2);
        assert!(logged[0].starts_with("LABEL_A "));
        assert!(logged[1].starts_with("LABEL_B "));
    }
}
