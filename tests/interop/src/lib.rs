//! End-to-end tests for the seclink TLS stack.
//! Both connection roles over an in-memory transport, exercised through
//! the public API only.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::{self, Read, Write};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use seclink_provider::testing::{make_credentials, TestKeyCodec, TestProvider, TestTrustEvaluator};
    use seclink_provider::{Credentials, CryptoProvider};
    use seclink_tls::config::{ExportKeyPolicy, TlsConfig, TlsConfigBuilder};
    use seclink_tls::connection::{TlsClientConnection, TlsServerConnection};
    use seclink_tls::session::InMemorySessionCache;
    use seclink_tls::{CipherSuite, TlsConnection, TlsVersion};
    use seclink_types::{TlsError, TrustFailure};

    /// Non-blocking in-memory duplex pipe.
    struct PipeEnd {
        incoming: Rc<RefCell<VecDeque<u8>>>,
        outgoing: Rc<RefCell<VecDeque<u8>>>,
    }

    impl Read for PipeEnd {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut incoming = self.incoming.borrow_mut();
            if incoming.is_empty() {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "pipe empty"));
            }
            let n = incoming.len().min(buf.len());
            for slot in buf[..n].iter_mut() {
                *slot = incoming.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    impl Write for PipeEnd {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.borrow_mut().extend(buf.iter().copied());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pipe() -> (PipeEnd, PipeEnd) {
        let a = Rc::new(RefCell::new(VecDeque::new()));
        let b = Rc::new(RefCell::new(VecDeque::new()));
        (
            PipeEnd {
                incoming: a.clone(),
                outgoing: b.clone(),
            },
            PipeEnd {
                incoming: b,
                outgoing: a,
            },
        )
    }

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(TestProvider::new(97))
    }

    fn server_creds() -> Credentials {
        make_credentials(&["interop-root", "interop-server"], 128)
    }

    fn client_config(tweak: impl FnOnce(TlsConfigBuilder) -> TlsConfigBuilder) -> Arc<TlsConfig> {
        let builder = TlsConfig::builder(provider())
            .trust_evaluator(Arc::new(TestTrustEvaluator::accepting()));
        Arc::new(tweak(builder).build().unwrap())
    }

    fn server_config(tweak: impl FnOnce(TlsConfigBuilder) -> TlsConfigBuilder) -> Arc<TlsConfig> {
        let builder = TlsConfig::builder(provider())
            .credentials(server_creds())
            .trust_evaluator(Arc::new(TestTrustEvaluator::accepting()));
        Arc::new(tweak(builder).build().unwrap())
    }

    fn connect(
        client_cfg: Arc<TlsConfig>,
        server_cfg: Arc<TlsConfig>,
    ) -> (TlsClientConnection<PipeEnd>, TlsServerConnection<PipeEnd>) {
        let (client_end, server_end) = pipe();
        let client = TlsClientConnection::new(client_end, client_cfg).unwrap();
        let server = TlsServerConnection::new(server_end, server_cfg).unwrap();
        (client, server)
    }

    fn run_handshakes(
        client: &mut TlsClientConnection<PipeEnd>,
        server: &mut TlsServerConnection<PipeEnd>,
    ) -> Result<(), TlsError> {
        for _ in 0..64 {
            let client_step = client.handshake();
            let server_step = server.handshake();
            if client_step.is_ok() && server_step.is_ok() {
                return Ok(());
            }
            if let Err(err) = client_step {
                if !err.is_would_block() {
                    return Err(err);
                }
            }
            if let Err(err) = server_step {
                if !err.is_would_block() {
                    return Err(err);
                }
            }
        }
        panic!("handshake did not converge");
    }

    fn expect_read(conn: &mut impl TlsConnection, want: &[u8]) {
        let mut got = vec![0u8; want.len()];
        let mut filled = 0;
        while filled < want.len() {
            let n = conn.read(&mut got[filled..]).unwrap();
            assert!(n > 0, "peer closed before all data arrived");
            filled += n;
        }
        assert_eq!(got, want);
    }

    fn exchange(
        client: &mut TlsClientConnection<PipeEnd>,
        server: &mut TlsServerConnection<PipeEnd>,
    ) {
        client.write(b"ping from client").unwrap();
        expect_read(server, b"ping from client");
        server.write(b"pong from server").unwrap();
        expect_read(client, b"pong from server");
    }

    #[test]
    fn test_tls10_with_matching_key_log_lines() {
        let client_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let server_lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = |lines: &Arc<Mutex<Vec<String>>>| {
            let lines = lines.clone();
            Arc::new(move |line: &str| lines.lock().unwrap().push(line.to_string()))
        };

        let (mut client, mut server) = connect(
            client_config(|b| b.key_log(sink(&client_lines))),
            server_config(|b| b.key_log(sink(&server_lines))),
        );
        run_handshakes(&mut client, &mut server).unwrap();
        exchange(&mut client, &mut server);

        let client_lines = client_lines.lock().unwrap();
        let server_lines = server_lines.lock().unwrap();
        assert_eq!(client_lines.len(), 1);
        assert_eq!(*client_lines, *server_lines);
        assert!(client_lines[0].starts_with("CLIENT_RANDOM "));
    }

    #[test]
    fn test_three_des_cbc_end_to_end() {
        let (mut client, mut server) = connect(
            client_config(|b| b.cipher_suites(&[CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA])),
            server_config(|b| b),
        );
        run_handshakes(&mut client, &mut server).unwrap();
        assert_eq!(
            client.cipher_suite(),
            Some(CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA)
        );
        exchange(&mut client, &mut server);

        // Odd sizes exercise the CBC padding.
        let data: Vec<u8> = (0..777).map(|i| (i % 253) as u8).collect();
        client.write(&data).unwrap();
        expect_read(&mut server, &data);
    }

    #[test]
    fn test_export_suite_served_from_encryption_identity() {
        let (mut client, mut server) = connect(
            client_config(|b| {
                b.cipher_suites(&[CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5])
                    .key_codec(Arc::new(TestKeyCodec))
            }),
            server_config(|b| {
                b.encryption_credentials(make_credentials(&["interop-export"], 64))
                    .export_key_policy(ExportKeyPolicy::PreferEncryptionKey)
                    .key_codec(Arc::new(TestKeyCodec))
            }),
        );
        run_handshakes(&mut client, &mut server).unwrap();
        assert_eq!(
            client.cipher_suite(),
            Some(CipherSuite::SSL_RSA_EXPORT_WITH_RC4_40_MD5)
        );
        exchange(&mut client, &mut server);
    }

    #[test]
    fn test_untrusted_server_chain_rejected() {
        let (mut client, mut server) = connect(
            client_config(|b| {
                b.trust_evaluator(Arc::new(TestTrustEvaluator::failing(
                    TrustFailure::UnknownRoot,
                )))
            }),
            server_config(|b| b),
        );
        let err = run_handshakes(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, TlsError::TrustFailed(_)));

        // The server learns about it through the client's fatal alert.
        let err = server.handshake().unwrap_err();
        assert!(matches!(err, TlsError::AlertReceived(_)));
    }

    #[test]
    fn test_version_floor_rejects_old_server() {
        let (mut client, mut server) = connect(
            client_config(|b| b.min_version(TlsVersion::Tls10)),
            server_config(|b| b.max_version(TlsVersion::Ssl3)),
        );
        let err = run_handshakes(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, TlsError::UnsupportedVersion));
    }

    #[test]
    fn test_ssl2_compat_hello_promotes_to_tls10() {
        let (mut client, mut server) = connect(
            client_config(|b| b.min_version(TlsVersion::Ssl2)),
            server_config(|b| b),
        );
        run_handshakes(&mut client, &mut server).unwrap();
        assert_eq!(client.version(), Some(TlsVersion::Tls10));
        assert_eq!(server.version(), Some(TlsVersion::Tls10));
        exchange(&mut client, &mut server);
    }

    #[test]
    fn test_native_ssl2_des_end_to_end() {
        let (mut client, mut server) = connect(
            client_config(|b| {
                b.min_version(TlsVersion::Ssl2)
                    .max_version(TlsVersion::Ssl2)
                    .cipher_suites(&[CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA])
            }),
            server_config(|b| {
                b.min_version(TlsVersion::Ssl2)
                    .max_version(TlsVersion::Ssl2)
                    .cipher_suites(&[CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA])
            }),
        );
        run_handshakes(&mut client, &mut server).unwrap();
        assert_eq!(client.version(), Some(TlsVersion::Ssl2));
        assert_eq!(
            client.cipher_suite(),
            Some(CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA)
        );
        exchange(&mut client, &mut server);
    }

    #[test]
    fn test_resumed_session_carries_peer_chain() {
        let client_cache = Arc::new(Mutex::new(InMemorySessionCache::new(4)));
        let server_cache = Arc::new(Mutex::new(InMemorySessionCache::new(4)));
        let client_cfg = client_config(|b| {
            b.peer_identity("interop-server")
                .session_cache(client_cache.clone())
        });
        let server_cfg = server_config(|b| {
            b.peer_identity("interop-client")
                .session_cache(server_cache.clone())
        });

        let (mut client, mut server) = connect(client_cfg.clone(), server_cfg.clone());
        run_handshakes(&mut client, &mut server).unwrap();
        assert!(!client.session_resumed());
        let full_chain = client.peer_certificates();
        assert_eq!(full_chain.len(), 2);

        let (mut client, mut server) = connect(client_cfg, server_cfg);
        run_handshakes(&mut client, &mut server).unwrap();
        assert!(client.session_resumed());
        assert!(server.session_resumed());
        // The chain comes back from the cache, not the wire.
        assert_eq!(client.peer_certificates(), full_chain);
        exchange(&mut client, &mut server);
    }
}
