//! Loopback tests: both roles over an in-memory pipe, including the
//! non-blocking stalls a real socket would produce.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use super::{ConnectionState, TlsClientConnection, TlsServerConnection};
use crate::config::{ClientAuthMode, TlsConfig, TlsConfigBuilder};
use crate::session::{InMemorySessionCache, SessionCache};
use crate::{CipherSuite, TlsConnection, TlsVersion};
use seclink_provider::testing::{make_credentials, TestProvider, TestTrustEvaluator};
use seclink_provider::{Credentials, CryptoProvider};
use seclink_types::TlsError;

/// One direction of an in-memory duplex pipe. Reading from an empty
/// queue reports `WouldBlock`, like a non-blocking socket with nothing
/// buffered.
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
    Arc::new(TestProvider::new(47))
}

fn server_creds() -> Credentials {
    make_credentials(&["test-root", "server"], 128)
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

/// Alternate `handshake` calls until both sides complete or one fails
/// with something other than a stall.
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

/// Run reads on both sides, swallowing stalls, until traffic quiesces.
fn pump_reads(
    client: &mut TlsClientConnection<PipeEnd>,
    server: &mut TlsServerConnection<PipeEnd>,
) {
    let mut buf = [0u8; 128];
    for _ in 0..32 {
        match client.read(&mut buf) {
            Ok(_) => {}
            Err(err) if err.is_would_block() => {}
            Err(err) => panic!("client read failed: {err}"),
        }
        match server.read(&mut buf) {
            Ok(_) => {}
            Err(err) if err.is_would_block() => {}
            Err(err) => panic!("server read failed: {err}"),
        }
    }
}

#[test]
fn test_tls10_handshake_and_data() {
    let (mut client, mut server) = connect(client_config(|b| b), server_config(|b| b));
    run_handshakes(&mut client, &mut server).unwrap();

    assert_eq!(client.version(), Some(TlsVersion::Tls10));
    assert_eq!(server.version(), Some(TlsVersion::Tls10));
    assert_eq!(client.cipher_suite(), server.cipher_suite());
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(server.state(), ConnectionState::Connected);
    assert_eq!(client.peer_certificates().len(), 2);
    assert!(server.peer_certificates().is_empty());
    assert_eq!(
        client.local_finished_verify_data(),
        server.peer_finished_verify_data()
    );
    assert_eq!(
        server.local_finished_verify_data(),
        client.peer_finished_verify_data()
    );

    client.write(b"hello from the client").unwrap();
    expect_read(&mut server, b"hello from the client");
    server.write(b"hello from the server").unwrap();
    expect_read(&mut client, b"hello from the server");
}

#[test]
fn test_ssl3_only_connection() {
    let (mut client, mut server) = connect(
        client_config(|b| b.max_version(TlsVersion::Ssl3)),
        server_config(|b| b),
    );
    run_handshakes(&mut client, &mut server).unwrap();
    assert_eq!(client.version(), Some(TlsVersion::Ssl3));
    assert_eq!(server.version(), Some(TlsVersion::Ssl3));

    server.write(b"ssl3 payload").unwrap();
    expect_read(&mut client, b"ssl3 payload");
}

#[test]
fn test_large_write_fragments_across_records() {
    let (mut client, mut server) = connect(client_config(|b| b), server_config(|b| b));
    run_handshakes(&mut client, &mut server).unwrap();

    let data: Vec<u8> = (0..40_000).map(|i| (i * 31 % 251) as u8).collect();
    assert_eq!(client.write(&data).unwrap(), data.len());
    expect_read(&mut server, &data);
}

#[test]
fn test_write_before_server_answers_stalls() {
    let (mut client, mut server) = connect(client_config(|b| b), server_config(|b| b));
    let err = client.write(b"too early").unwrap_err();
    assert!(err.is_would_block());

    // The stalled write committed nothing; the connection still works.
    run_handshakes(&mut client, &mut server).unwrap();
    client.write(b"on time").unwrap();
    expect_read(&mut server, b"on time");
}

#[test]
fn test_shutdown_exchanges_close_notify() {
    let (mut client, mut server) = connect(client_config(|b| b), server_config(|b| b));
    run_handshakes(&mut client, &mut server).unwrap();

    client.shutdown().unwrap();
    assert_eq!(client.state(), ConnectionState::GracefulClose);

    let mut buf = [0u8; 16];
    assert_eq!(server.read(&mut buf).unwrap(), 0);
    assert_eq!(server.state(), ConnectionState::GracefulClose);

    // The answering close_notify is already in flight.
    assert_eq!(client.read(&mut buf).unwrap(), 0);
    assert!(matches!(
        client.write(b"late"),
        Err(TlsError::ClosedGraceful)
    ));
    // Repeat shutdowns are no-ops.
    client.shutdown().unwrap();
    server.shutdown().unwrap();
}

#[test]
fn test_quiet_shutdown_skips_close_notify() {
    let (mut client, mut server) = connect(
        client_config(|b| b.quiet_shutdown(true)),
        server_config(|b| b),
    );
    run_handshakes(&mut client, &mut server).unwrap();

    client.shutdown().unwrap();
    assert_eq!(client.state(), ConnectionState::NoNotifyClose);

    // Nothing reached the server; from its side the connection idles.
    let mut buf = [0u8; 16];
    let err = server.read(&mut buf).unwrap_err();
    assert!(err.is_would_block());
}

#[test]
fn test_session_resumption_between_connections() {
    let client_cache = Arc::new(Mutex::new(InMemorySessionCache::new(4)));
    let server_cache = Arc::new(Mutex::new(InMemorySessionCache::new(4)));
    let client_cfg = client_config(|b| {
        b.peer_identity("server").session_cache(client_cache.clone())
    });
    let server_cfg = server_config(|b| {
        b.peer_identity("client").session_cache(server_cache.clone())
    });

    let (mut client, mut server) = connect(client_cfg.clone(), server_cfg.clone());
    run_handshakes(&mut client, &mut server).unwrap();
    assert!(!client.session_resumed());
    assert!(client_cache.lock().unwrap().get(b"server").is_some());

    let (mut client, mut server) = connect(client_cfg, server_cfg);
    run_handshakes(&mut client, &mut server).unwrap();
    assert!(client.session_resumed());
    assert!(server.session_resumed());

    client.write(b"resumed traffic").unwrap();
    expect_read(&mut server, b"resumed traffic");
}

#[test]
fn test_client_authentication_required() {
    let (mut client, mut server) = connect(
        client_config(|b| b.credentials(make_credentials(&["client-root", "client"], 128))),
        server_config(|b| b.client_auth(ClientAuthMode::Require)),
    );
    run_handshakes(&mut client, &mut server).unwrap();
    assert_eq!(server.peer_certificates().len(), 2);

    server.write(b"authenticated").unwrap();
    expect_read(&mut client, b"authenticated");
}

#[test]
fn test_no_shared_suite_surfaces_alert() {
    let (mut client, mut server) = connect(
        client_config(|b| b.cipher_suites(&[CipherSuite::SSL_RSA_WITH_RC4_128_MD5])),
        server_config(|b| b.cipher_suites(&[CipherSuite::SSL_RSA_WITH_3DES_EDE_CBC_SHA])),
    );
    let err = run_handshakes(&mut client, &mut server).unwrap_err();
    assert!(matches!(err, TlsError::NoSharedCipherSuite));
    assert_eq!(server.state(), ConnectionState::Error);

    let err = client.handshake().unwrap_err();
    assert!(matches!(err, TlsError::AlertReceived(_)));
    assert_eq!(client.state(), ConnectionState::Error);
}

#[test]
fn test_v2_hello_promoted_to_tls10() {
    let (mut client, mut server) = connect(
        client_config(|b| b.min_version(TlsVersion::Ssl2)),
        server_config(|b| b),
    );
    run_handshakes(&mut client, &mut server).unwrap();

    assert_eq!(client.version(), Some(TlsVersion::Tls10));
    assert_eq!(server.version(), Some(TlsVersion::Tls10));

    client.write(b"promoted").unwrap();
    expect_read(&mut server, b"promoted");
    server.write(b"and answered").unwrap();
    expect_read(&mut client, b"and answered");
}

#[test]
fn test_native_ssl2_connection() {
    let (mut client, mut server) = connect(
        client_config(|b| {
            b.min_version(TlsVersion::Ssl2).max_version(TlsVersion::Ssl2)
        }),
        server_config(|b| {
            b.min_version(TlsVersion::Ssl2).max_version(TlsVersion::Ssl2)
        }),
    );
    run_handshakes(&mut client, &mut server).unwrap();

    assert_eq!(client.version(), Some(TlsVersion::Ssl2));
    assert_eq!(server.version(), Some(TlsVersion::Ssl2));
    assert_eq!(
        client.cipher_suite(),
        Some(CipherSuite::SSL_RSA_WITH_RC4_128_MD5)
    );
    assert_eq!(client.peer_certificates().len(), 1);

    client.write(b"v2 request").unwrap();
    expect_read(&mut server, b"v2 request");
    server.write(b"v2 response").unwrap();
    expect_read(&mut client, b"v2 response");

    // No closure alert in this dialect; shutdown is silent.
    client.shutdown().unwrap();
    assert_eq!(client.state(), ConnectionState::NoNotifyClose);
}

#[test]
fn test_server_initiated_renegotiation() {
    let server_cache = Arc::new(Mutex::new(InMemorySessionCache::new(4)));
    let (mut client, mut server) = connect(
        client_config(|b| b),
        server_config(|b| {
            b.peer_identity("client").session_cache(server_cache.clone())
        }),
    );
    run_handshakes(&mut client, &mut server).unwrap();
    let first_id = server_cache
        .lock()
        .unwrap()
        .get(b"client")
        .unwrap()
        .id
        .clone();

    server.initiate_renegotiation().unwrap();
    pump_reads(&mut client, &mut server);

    let second_id = server_cache
        .lock()
        .unwrap()
        .get(b"client")
        .unwrap()
        .id
        .clone();
    assert_ne!(first_id, second_id);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.write(b"after renegotiation").unwrap();
    expect_read(&mut server, b"after renegotiation");
}

#[test]
fn test_client_renegotiation_declined_with_warning() {
    let (mut client, mut server) = connect(
        client_config(|b| b),
        server_config(|b| b.allow_renegotiation(false)),
    );
    run_handshakes(&mut client, &mut server).unwrap();

    client.initiate_renegotiation().unwrap();
    pump_reads(&mut client, &mut server);

    // Declined with a warning; the established exchange keeps going.
    assert_eq!(client.state(), ConnectionState::Connected);
    client.write(b"still here").unwrap();
    expect_read(&mut server, b"still here");
    server.write(b"still served").unwrap();
    expect_read(&mut client, b"still served");
}

#[test]
fn test_renegotiation_rejected_on_ssl2() {
    let (mut client, mut server) = connect(
        client_config(|b| {
            b.min_version(TlsVersion::Ssl2).max_version(TlsVersion::Ssl2)
        }),
        server_config(|b| {
            b.min_version(TlsVersion::Ssl2).max_version(TlsVersion::Ssl2)
        }),
    );
    run_handshakes(&mut client, &mut server).unwrap();

    assert!(matches!(
        client.initiate_renegotiation(),
        Err(TlsError::ConfigError(_))
    ));
    assert!(matches!(
        server.initiate_renegotiation(),
        Err(TlsError::ConfigError(_))
    ));
}
