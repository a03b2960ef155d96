//! Native SSL 2.0 handshake engines.
//!
//! Like their v3 counterparts these are pure message reactors: one
//! decrypted record payload in, a list of operations out, no transport
//! IO. A v2 handshake message always fills exactly one record, so there
//! is no reassembly layer.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::config::TlsConfig;
use crate::handshake::codec::ClientHello;
use crate::handshake::verify_peer_chain;
use crate::session::TlsSession;
use crate::ssl2::{
    decode_client_finished, decode_client_hello, decode_client_master_key, decode_error,
    decode_server_finished, decode_server_hello, decode_server_verify, encode_client_finished,
    encode_client_hello, encode_client_master_key, encode_server_finished, encode_server_hello,
    encode_server_verify, key_material, kind_for_suite, spec_as_v3_suite, v3_equivalent,
    CipherKind, KindParams, Ssl2ClientHello, Ssl2ClientMasterKey, Ssl2ServerHello,
    CERT_TYPE_X509, CHALLENGE_LEN, CONNECTION_ID_LEN, ERR_BAD_CERTIFICATE, ERR_NO_CIPHER,
    ERR_UNSUPPORTED_CERT_TYPE, MSG_CLIENT_FINISHED, MSG_CLIENT_HELLO, MSG_CLIENT_MASTER_KEY,
    MSG_ERROR, MSG_SERVER_FINISHED, MSG_SERVER_HELLO, MSG_SERVER_VERIFY, SESSION_ID_LEN,
};
use crate::{CipherSuite, TlsVersion};
use seclink_types::TlsError;

/// What the connection must do with one engine step.
#[derive(Debug)]
pub(crate) enum Ssl2Op {
    /// Queue one handshake message as a record, sealed under the current
    /// write state.
    Send(Vec<u8>),
    /// Activate both record directions with the derived keys.
    InstallCiphers(Box<Ssl2Keys>),
}

/// Key material for both directions, already split for this endpoint's
/// role. The key-arg IV serves reads and writes alike.
#[derive(Debug)]
pub(crate) struct Ssl2Keys {
    pub params: KindParams,
    pub read_key: Vec<u8>,
    pub write_key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl Drop for Ssl2Keys {
    fn drop(&mut self) {
        self.read_key.zeroize();
        self.write_key.zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ssl2State {
    Idle,
    WaitServerHello,
    WaitServerVerify,
    WaitServerFinished,
    WaitClientHello,
    WaitClientMasterKey,
    WaitClientFinished,
    Connected,
}

/// The session a native v2 hello may offer. Only stream kinds resume:
/// block kinds would need the original key-arg IV, which the shared
/// session format does not carry.
pub(crate) fn stage_v2_resumption(config: &TlsConfig) -> Option<TlsSession> {
    let session = if let Some(session) = &config.resumption_session {
        session.clone()
    } else {
        let key = config.peer_identity.as_ref()?;
        let cache = config.session_cache.as_ref()?;
        let guard = cache.lock().ok()?;
        guard.get(key.as_bytes())?.clone()
    };
    if session.version != TlsVersion::Ssl2 || session.id.is_empty() {
        return None;
    }
    let kind = kind_for_suite(session.cipher_suite)?;
    let params = KindParams::from_kind(kind)?;
    if !params.is_stream() || session.master_secret.len() != params.key_len {
        return None;
    }
    Some(session)
}

/// Translate a v2 hello into the v3 form for a promoting server. Native
/// kinds map to their v3 equivalents, 3-byte v3 codes pass through, and
/// the challenge right-aligns into the 32-byte random.
pub(crate) fn promote_client_hello(hello: &Ssl2ClientHello) -> Result<ClientHello, TlsError> {
    let mut random = [0u8; 32];
    random[32 - hello.challenge.len()..].copy_from_slice(&hello.challenge);
    let mut suites = Vec::with_capacity(hello.cipher_specs.len());
    for &spec in &hello.cipher_specs {
        let mapped = spec_as_v3_suite(spec).or_else(|| v3_equivalent(CipherKind(spec)));
        if let Some(suite) = mapped {
            if !suites.contains(&suite) {
                suites.push(suite);
            }
        }
    }
    if suites.is_empty() {
        return Err(TlsError::NoSharedCipherSuite);
    }
    Ok(ClientHello {
        client_version: hello.version,
        random,
        session_id: hello.session_id.clone(),
        cipher_suites: suites,
        compression_methods: vec![0],
    })
}

/// The hello a v3-capable client sends in v2 framing: every enabled suite
/// as a 3-byte v3 code, plus the native kind alongside when a v2 fallback
/// is acceptable.
pub(crate) fn build_compat_hello(
    config: &TlsConfig,
    challenge: &[u8; CHALLENGE_LEN],
    session_id: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let mut specs = Vec::with_capacity(config.cipher_suites.len() * 2);
    for suite in &config.cipher_suites {
        specs.push(u32::from(suite.0));
        if config.ssl2_enabled() {
            if let Some(kind) = kind_for_suite(*suite) {
                specs.push(kind.0);
            }
        }
    }
    encode_client_hello(&Ssl2ClientHello {
        version: config.max_version.wire(),
        cipher_specs: specs,
        session_id: session_id.to_vec(),
        challenge: challenge.to_vec(),
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub struct Ssl2ClientEngine {
    config: Arc<TlsConfig>,
    state: Ssl2State,
    challenge: [u8; CHALLENGE_LEN],
    connection_id: Vec<u8>,
    session_id: Vec<u8>,
    offered_session: Option<TlsSession>,
    resumed: bool,
    params: Option<KindParams>,
    master_key: Vec<u8>,
    server_cert: Vec<u8>,
    error_code: Option<u16>,
}

impl Ssl2ClientEngine {
    pub fn new(config: Arc<TlsConfig>) -> Self {
        Ssl2ClientEngine {
            config,
            state: Ssl2State::Idle,
            challenge: [0u8; CHALLENGE_LEN],
            connection_id: Vec::new(),
            session_id: Vec::new(),
            offered_session: None,
            resumed: false,
            params: None,
            master_key: Vec::new(),
            server_cert: Vec::new(),
            error_code: None,
        }
    }

    /// Open a pure v2 handshake: offer the native kinds for the enabled
    /// suites and any resumable cached session.
    pub(crate) fn start(&mut self) -> Result<Vec<Ssl2Op>, TlsError> {
        let specs: Vec<u32> = self
            .config
            .cipher_suites
            .iter()
            .filter_map(|s| kind_for_suite(*s))
            .map(|k| k.0)
            .collect();
        if specs.is_empty() {
            return Err(TlsError::ConfigError(
                "no SSL 2.0 capable cipher suite enabled".into(),
            ));
        }
        self.config.provider.random(&mut self.challenge)?;
        self.offered_session = stage_v2_resumption(&self.config);
        let session_id = self
            .offered_session
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_default();
        let hello = encode_client_hello(&Ssl2ClientHello {
            version: TlsVersion::Ssl2.wire(),
            cipher_specs: specs,
            session_id,
            challenge: self.challenge.to_vec(),
        })?;
        self.state = Ssl2State::WaitServerHello;
        Ok(vec![Ssl2Op::Send(hello)])
    }

    /// Adopt a compatibility hello the connection already sent, after the
    /// server answered it natively.
    pub(crate) fn start_after_compat_hello(
        &mut self,
        challenge: &[u8; CHALLENGE_LEN],
        offered_session: Option<TlsSession>,
    ) {
        self.challenge = *challenge;
        self.offered_session = offered_session;
        self.state = Ssl2State::WaitServerHello;
    }

    /// Feed one decrypted record payload through the state machine.
    pub(crate) fn handle_message(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        match body.first() {
            Some(&MSG_SERVER_HELLO) => self.process_server_hello(body),
            Some(&MSG_SERVER_VERIFY) => self.process_server_verify(body),
            Some(&MSG_SERVER_FINISHED) => self.process_server_finished(body),
            Some(&MSG_ERROR) => {
                let code = decode_error(body)?;
                Err(TlsError::AlertReceived(format!(
                    "SSL 2.0 error 0x{code:04x}"
                )))
            }
            Some(&other) => Err(TlsError::ProtocolError(format!(
                "unexpected SSL 2.0 message type {other}"
            ))),
            None => Err(TlsError::ProtocolError("empty SSL 2.0 record".into())),
        }
    }

    fn process_server_hello(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitServerHello {
            return Err(self.unexpected(MSG_SERVER_HELLO));
        }
        let hello = decode_server_hello(body)?;
        if hello.version != TlsVersion::Ssl2.wire() {
            return Err(TlsError::UnsupportedVersion);
        }
        self.connection_id = hello.connection_id.clone();

        if hello.session_hit {
            return self.resume(hello);
        }
        self.full_handshake(hello)
    }

    fn resume(&mut self, hello: Ssl2ServerHello) -> Result<Vec<Ssl2Op>, TlsError> {
        let session = self.offered_session.take().ok_or_else(|| {
            TlsError::ProtocolError("session hit without an offered session".into())
        })?;
        if !hello.certificate.is_empty() || !hello.cipher_specs.is_empty() {
            return Err(TlsError::ProtocolError(
                "session hit carries negotiation data".into(),
            ));
        }
        let kind = kind_for_suite(session.cipher_suite)
            .ok_or_else(|| TlsError::InternalError("staged session lost its kind".into()))?;
        let params = KindParams::from_kind(kind)
            .ok_or_else(|| TlsError::InternalError("staged session lost its kind".into()))?;
        self.params = Some(params);
        self.master_key = session.master_secret.clone();
        self.server_cert = session.peer_chain.first().cloned().unwrap_or_default();
        self.session_id = session.id.clone();
        self.resumed = true;

        let ops = vec![
            self.install_op(&[])?,
            Ssl2Op::Send(encode_client_finished(&self.connection_id)),
        ];
        self.state = Ssl2State::WaitServerVerify;
        Ok(ops)
    }

    fn full_handshake(&mut self, hello: Ssl2ServerHello) -> Result<Vec<Ssl2Op>, TlsError> {
        self.offered_session = None;
        if hello.certificate.is_empty() {
            return Err(TlsError::ProtocolError("missing server certificate".into()));
        }
        if hello.certificate_type != CERT_TYPE_X509 {
            self.error_code = Some(ERR_UNSUPPORTED_CERT_TYPE);
            return Err(TlsError::HandshakeFailed(format!(
                "server certificate type {}",
                hello.certificate_type
            )));
        }
        let chain = vec![hello.certificate];
        if let Err(err) = verify_peer_chain(&self.config, &chain) {
            self.error_code = Some(ERR_BAD_CERTIFICATE);
            return Err(err);
        }
        let cert = chain.into_iter().next().unwrap_or_default();

        let mut chosen = None;
        for suite in &self.config.cipher_suites {
            if let Some(kind) = kind_for_suite(*suite) {
                if hello.cipher_specs.contains(&kind.0) {
                    chosen = KindParams::from_kind(kind);
                    break;
                }
            }
        }
        let params = match chosen {
            Some(params) => params,
            None => {
                self.error_code = Some(ERR_NO_CIPHER);
                return Err(TlsError::NoSharedCipherSuite);
            }
        };
        self.params = Some(params);

        self.master_key = vec![0u8; params.key_len];
        self.config.provider.random(&mut self.master_key)?;
        let mut key_arg = vec![0u8; params.iv_len];
        self.config.provider.random(&mut key_arg)?;

        let public_key = self.config.provider.cert_public_key(&cert)?;
        let encrypted = self
            .config
            .provider
            .rsa_encrypt(public_key.as_ref(), &self.master_key[params.clear_len..])?;
        let cmk = encode_client_master_key(&Ssl2ClientMasterKey {
            kind: params.kind.0,
            clear_key: self.master_key[..params.clear_len].to_vec(),
            encrypted_key: encrypted,
            key_arg: key_arg.clone(),
        })?;
        self.server_cert = cert;

        let ops = vec![
            Ssl2Op::Send(cmk),
            self.install_op(&key_arg)?,
            Ssl2Op::Send(encode_client_finished(&self.connection_id)),
        ];
        self.state = Ssl2State::WaitServerVerify;
        Ok(ops)
    }

    fn process_server_verify(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitServerVerify {
            return Err(self.unexpected(MSG_SERVER_VERIFY));
        }
        let echoed = decode_server_verify(body)?;
        if !bool::from(echoed.as_slice().ct_eq(&self.challenge)) {
            return Err(TlsError::HandshakeFailed(
                "server challenge verification failed".into(),
            ));
        }
        self.state = Ssl2State::WaitServerFinished;
        Ok(Vec::new())
    }

    fn process_server_finished(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitServerFinished {
            return Err(self.unexpected(MSG_SERVER_FINISHED));
        }
        let session_id = decode_server_finished(body)?;
        if session_id.len() != SESSION_ID_LEN {
            return Err(TlsError::ProtocolError(format!(
                "session id of {} bytes",
                session_id.len()
            )));
        }
        self.session_id = session_id;
        self.state = Ssl2State::Connected;
        Ok(Vec::new())
    }

    /// Split the derived key material for the client role: the server
    /// write key comes first.
    fn install_op(&self, key_arg: &[u8]) -> Result<Ssl2Op, TlsError> {
        let params = self
            .params
            .ok_or_else(|| TlsError::InternalError("no negotiated kind".into()))?;
        let mut km = key_material(
            self.config.provider.as_ref(),
            &self.master_key,
            &self.challenge,
            &self.connection_id,
            2 * params.key_len,
        )?;
        let keys = Ssl2Keys {
            params,
            read_key: km[..params.key_len].to_vec(),
            write_key: km[params.key_len..].to_vec(),
            iv: key_arg.to_vec(),
        };
        km.zeroize();
        Ok(Ssl2Op::InstallCiphers(Box::new(keys)))
    }

    fn unexpected(&self, msg_type: u8) -> TlsError {
        TlsError::ProtocolError(format!(
            "unexpected SSL 2.0 message type {msg_type} in state {:?}",
            self.state
        ))
    }

    pub(crate) fn session_to_store(&self) -> Option<TlsSession> {
        if self.resumed || self.state != Ssl2State::Connected || self.session_id.is_empty() {
            return None;
        }
        let params = self.params?;
        if !params.is_stream() {
            return None;
        }
        Some(TlsSession {
            id: self.session_id.clone(),
            version: TlsVersion::Ssl2,
            cipher_suite: v3_equivalent(params.kind)?,
            master_secret: self.master_key.clone(),
            peer_chain: vec![self.server_cert.clone()],
            created_at: now_secs(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.state == Ssl2State::Connected
    }

    pub fn session_resumed(&self) -> bool {
        self.resumed
    }

    pub fn kind(&self) -> Option<CipherKind> {
        self.params.map(|p| p.kind)
    }

    /// The v3 suite equivalent to the negotiated kind, for uniform
    /// connection introspection.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.params.and_then(|p| v3_equivalent(p.kind))
    }

    pub fn peer_certificate(&self) -> Option<&[u8]> {
        if self.server_cert.is_empty() {
            None
        } else {
            Some(&self.server_cert)
        }
    }

    pub(crate) fn take_error_code(&mut self) -> Option<u16> {
        self.error_code.take()
    }
}

impl Drop for Ssl2ClientEngine {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}

pub struct Ssl2ServerEngine {
    config: Arc<TlsConfig>,
    state: Ssl2State,
    challenge: Vec<u8>,
    connection_id: Vec<u8>,
    session_id: Vec<u8>,
    resumed: bool,
    params: Option<KindParams>,
    master_key: Vec<u8>,
    error_code: Option<u16>,
}

impl Ssl2ServerEngine {
    pub fn new(config: Arc<TlsConfig>) -> Self {
        Ssl2ServerEngine {
            config,
            state: Ssl2State::WaitClientHello,
            challenge: Vec::new(),
            connection_id: Vec::new(),
            session_id: Vec::new(),
            resumed: false,
            params: None,
            master_key: Vec::new(),
            error_code: None,
        }
    }

    pub(crate) fn handle_message(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        match body.first() {
            Some(&MSG_CLIENT_HELLO) => self.process_client_hello(body),
            Some(&MSG_CLIENT_MASTER_KEY) => self.process_client_master_key(body),
            Some(&MSG_CLIENT_FINISHED) => self.process_client_finished(body),
            Some(&MSG_ERROR) => {
                let code = decode_error(body)?;
                Err(TlsError::AlertReceived(format!(
                    "SSL 2.0 error 0x{code:04x}"
                )))
            }
            Some(&other) => Err(TlsError::ProtocolError(format!(
                "unexpected SSL 2.0 message type {other}"
            ))),
            None => Err(TlsError::ProtocolError("empty SSL 2.0 record".into())),
        }
    }

    fn process_client_hello(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitClientHello {
            return Err(self.unexpected(MSG_CLIENT_HELLO));
        }
        let hello = decode_client_hello(body)?;
        if hello.version < TlsVersion::Ssl2.wire() {
            return Err(TlsError::UnsupportedVersion);
        }
        self.challenge = hello.challenge.clone();
        self.connection_id = vec![0u8; CONNECTION_ID_LEN];
        self.config.provider.random(&mut self.connection_id)?;

        if !hello
            .cipher_specs
            .iter()
            .any(|&spec| self.can_serve(CipherKind(spec)).is_some())
        {
            self.error_code = Some(ERR_NO_CIPHER);
            return Err(TlsError::NoSharedCipherSuite);
        }

        if let Some(session) = self.take_resumable(&hello) {
            return self.resume(session);
        }
        self.full_handshake()
    }

    /// A kind this server can run: mappable, stream or block, with its v3
    /// equivalent among the enabled suites.
    fn can_serve(&self, kind: CipherKind) -> Option<KindParams> {
        let params = KindParams::from_kind(kind)?;
        let suite = v3_equivalent(kind)?;
        if self.config.cipher_suites.contains(&suite) {
            Some(params)
        } else {
            None
        }
    }

    fn take_resumable(&self, hello: &Ssl2ClientHello) -> Option<TlsSession> {
        if hello.session_id.is_empty() {
            return None;
        }
        let key = self.config.peer_identity.as_ref()?;
        let cache = self.config.session_cache.as_ref()?;
        let mut guard = cache.lock().ok()?;
        let session = guard.get(key.as_bytes())?.clone();
        if session.id != hello.session_id {
            return None;
        }
        let fits = session.version == TlsVersion::Ssl2
            && kind_for_suite(session.cipher_suite)
                .and_then(|kind| self.can_serve(kind))
                .is_some_and(|params| {
                    params.is_stream() && session.master_secret.len() == params.key_len
                });
        if !fits {
            guard.remove(key.as_bytes());
            return None;
        }
        Some(session)
    }

    fn resume(&mut self, session: TlsSession) -> Result<Vec<Ssl2Op>, TlsError> {
        let kind = kind_for_suite(session.cipher_suite)
            .ok_or_else(|| TlsError::InternalError("cached session lost its kind".into()))?;
        let params = KindParams::from_kind(kind)
            .ok_or_else(|| TlsError::InternalError("cached session lost its kind".into()))?;
        self.params = Some(params);
        self.master_key = session.master_secret.clone();
        self.session_id = session.id.clone();
        self.resumed = true;

        let hello = encode_server_hello(&Ssl2ServerHello {
            session_hit: true,
            certificate_type: 0,
            version: TlsVersion::Ssl2.wire(),
            certificate: Vec::new(),
            cipher_specs: Vec::new(),
            connection_id: self.connection_id.clone(),
        })?;
        let ops = vec![
            Ssl2Op::Send(hello),
            self.install_op(&[])?,
            Ssl2Op::Send(encode_server_verify(&self.challenge)),
        ];
        self.state = Ssl2State::WaitClientFinished;
        Ok(ops)
    }

    fn full_handshake(&mut self) -> Result<Vec<Ssl2Op>, TlsError> {
        let cert = self
            .config
            .credentials
            .as_ref()
            .and_then(|c| c.chain.last().cloned())
            .ok_or_else(|| TlsError::InternalError("no server credentials".into()))?;
        let specs: Vec<u32> = self
            .config
            .cipher_suites
            .iter()
            .filter_map(|s| kind_for_suite(*s))
            .map(|k| k.0)
            .collect();
        let hello = encode_server_hello(&Ssl2ServerHello {
            session_hit: false,
            certificate_type: CERT_TYPE_X509,
            version: TlsVersion::Ssl2.wire(),
            certificate: cert,
            cipher_specs: specs,
            connection_id: self.connection_id.clone(),
        })?;
        self.state = Ssl2State::WaitClientMasterKey;
        Ok(vec![Ssl2Op::Send(hello)])
    }

    fn process_client_master_key(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitClientMasterKey {
            return Err(self.unexpected(MSG_CLIENT_MASTER_KEY));
        }
        let msg = decode_client_master_key(body)?;
        let params = self.can_serve(CipherKind(msg.kind)).ok_or_else(|| {
            TlsError::ProtocolError(format!("cipher kind 0x{:06x} was not offered", msg.kind))
        })?;
        if msg.clear_key.len() != params.clear_len {
            return Err(TlsError::ProtocolError(format!(
                "clear key of {} bytes for kind 0x{:06x}",
                msg.clear_key.len(),
                msg.kind
            )));
        }
        if msg.key_arg.len() != params.iv_len {
            return Err(TlsError::ProtocolError(format!(
                "key arg of {} bytes for kind 0x{:06x}",
                msg.key_arg.len(),
                msg.kind
            )));
        }
        let private_key = self
            .config
            .credentials
            .as_ref()
            .map(|c| c.private_key.clone())
            .ok_or_else(|| TlsError::InternalError("no server credentials".into()))?;
        let mut secret = self
            .config
            .provider
            .rsa_decrypt(private_key.as_ref(), &msg.encrypted_key)
            .map_err(|_| TlsError::HandshakeFailed("master key decryption failed".into()))?;
        self.master_key = Vec::with_capacity(params.key_len);
        self.master_key.extend_from_slice(&msg.clear_key);
        self.master_key.extend_from_slice(&secret);
        secret.zeroize();
        if self.master_key.len() != params.key_len {
            return Err(TlsError::HandshakeFailed(format!(
                "master key of {} bytes for kind 0x{:06x}",
                self.master_key.len(),
                msg.kind
            )));
        }
        self.params = Some(params);

        let ops = vec![
            self.install_op(&msg.key_arg)?,
            Ssl2Op::Send(encode_server_verify(&self.challenge)),
        ];
        self.state = Ssl2State::WaitClientFinished;
        Ok(ops)
    }

    fn process_client_finished(&mut self, body: &[u8]) -> Result<Vec<Ssl2Op>, TlsError> {
        if self.state != Ssl2State::WaitClientFinished {
            return Err(self.unexpected(MSG_CLIENT_FINISHED));
        }
        let echoed = decode_client_finished(body)?;
        if !bool::from(echoed.as_slice().ct_eq(self.connection_id.as_slice())) {
            return Err(TlsError::HandshakeFailed(
                "connection id verification failed".into(),
            ));
        }
        if !self.resumed {
            self.session_id = vec![0u8; SESSION_ID_LEN];
            self.config.provider.random(&mut self.session_id)?;
        }
        let ops = vec![Ssl2Op::Send(encode_server_finished(&self.session_id))];
        self.state = Ssl2State::Connected;
        Ok(ops)
    }

    /// Split the derived key material for the server role: its write key
    /// comes first.
    fn install_op(&self, key_arg: &[u8]) -> Result<Ssl2Op, TlsError> {
        let params = self
            .params
            .ok_or_else(|| TlsError::InternalError("no negotiated kind".into()))?;
        let mut km = key_material(
            self.config.provider.as_ref(),
            &self.master_key,
            &self.challenge,
            &self.connection_id,
            2 * params.key_len,
        )?;
        let keys = Ssl2Keys {
            params,
            write_key: km[..params.key_len].to_vec(),
            read_key: km[params.key_len..].to_vec(),
            iv: key_arg.to_vec(),
        };
        km.zeroize();
        Ok(Ssl2Op::InstallCiphers(Box::new(keys)))
    }

    fn unexpected(&self, msg_type: u8) -> TlsError {
        TlsError::ProtocolError(format!(
            "unexpected SSL 2.0 message type {msg_type} in state {:?}",
            self.state
        ))
    }

    pub(crate) fn session_to_store(&self) -> Option<TlsSession> {
        if self.resumed || self.state != Ssl2State::Connected || self.session_id.is_empty() {
            return None;
        }
        let params = self.params?;
        if !params.is_stream() {
            return None;
        }
        Some(TlsSession {
            id: self.session_id.clone(),
            version: TlsVersion::Ssl2,
            cipher_suite: v3_equivalent(params.kind)?,
            master_secret: self.master_key.clone(),
            peer_chain: Vec::new(),
            created_at: now_secs(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.state == Ssl2State::Connected
    }

    pub fn session_resumed(&self) -> bool {
        self.resumed
    }

    pub fn kind(&self) -> Option<CipherKind> {
        self.params.map(|p| p.kind)
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.params.and_then(|p| v3_equivalent(p.kind))
    }

    pub(crate) fn take_error_code(&mut self) -> Option<u16> {
        self.error_code.take()
    }
}

impl Drop for Ssl2ServerEngine {
    fn drop(&mut self) {
        self.master_key.zeroize();
    }
}
