//! Client-side handshake engine.
//!
//! The engine consumes reassembled handshake messages and returns the
//! operations the connection must carry out: messages to queue, cipher
//! states to stage, warning alerts to send. It performs no transport IO,
//! so a would-block at any point leaves it resumable.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::alert::{Alert, AlertDescription};
use crate::config::TlsConfig;
use crate::crypt::{
    keylog, version_crypt, DerivedKeys, SuiteParams, Transcript, VersionCrypt, MASTER_SECRET_LEN,
    PRE_MASTER_LEN,
};
use crate::handshake::codec::{
    build_ske_signed_data, decode_certificate, decode_certificate_request, decode_server_hello,
    decode_server_key_exchange, encode_certificate, encode_certificate_verify, encode_client_hello,
    encode_client_key_exchange, CertificateRequest, ClientHello, CERT_TYPE_RSA_SIGN,
};
use crate::handshake::{
    signed_params_digest, verify_peer_chain, wrap_handshake, HandshakeMessage, HandshakeState,
    HandshakeType, OutboundOp, PendingCipher,
};
use crate::session::TlsSession;
use crate::{CipherSuite, TlsRole, TlsVersion};
use seclink_provider::PublicKey;
use seclink_types::TlsError;

pub struct ClientEngine {
    config: Arc<TlsConfig>,
    state: HandshakeState,
    transcript: Transcript,
    /// Version committed by ServerHello.
    version: Option<TlsVersion>,
    /// Raw version bytes offered in ClientHello; the pre-master embeds
    /// these so the server can catch a rollback.
    offered_version: u16,
    client_random: [u8; 32],
    server_random: [u8; 32],
    /// Session staged for a resumption offer, cleared once ServerHello
    /// settles full-vs-abbreviated.
    offered_session: Option<TlsSession>,
    session_id: Vec<u8>,
    resumed: bool,
    params: Option<SuiteParams>,
    master_secret: Option<[u8; MASTER_SECRET_LEN]>,
    peer_chain: Vec<Vec<u8>>,
    peer_cert_key: Option<Arc<dyn PublicKey>>,
    /// Ephemeral key from ServerKeyExchange; preferred over the
    /// certificate key when encrypting the pre-master.
    ske_key: Option<Arc<dyn PublicKey>>,
    cert_request: Option<CertificateRequest>,
    sent_client_chain: bool,
    local_verify_data: Vec<u8>,
    peer_verify_data: Vec<u8>,
    /// Alert overriding the generic error mapping; the connection takes
    /// it when an engine call fails.
    fatal_alert: Option<AlertDescription>,
    /// The hello went out in SSL 2.0 framing.
    sent_v2_hello: bool,
}

impl ClientEngine {
    pub fn new(config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        let transcript = Transcript::new(config.provider.as_ref())?;
        Ok(ClientEngine {
            config,
            state: HandshakeState::Idle,
            transcript,
            version: None,
            offered_version: 0,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            offered_session: None,
            session_id: Vec::new(),
            resumed: false,
            params: None,
            master_secret: None,
            peer_chain: Vec::new(),
            peer_cert_key: None,
            ske_key: None,
            cert_request: None,
            sent_client_chain: false,
            local_verify_data: Vec::new(),
            peer_verify_data: Vec::new(),
            fatal_alert: None,
            sent_v2_hello: false,
        })
    }

    /// Build and hash the ClientHello. Called once to open the handshake
    /// and again for each renegotiation.
    pub(crate) fn start(&mut self) -> Result<Vec<OutboundOp>, TlsError> {
        self.offered_session = self.stage_resumption();
        self.client_random = self.fresh_random()?;
        self.offered_version = self.config.max_version.wire();
        let hello = ClientHello {
            client_version: self.offered_version,
            random: self.client_random,
            session_id: self
                .offered_session
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_default(),
            cipher_suites: self.config.cipher_suites.clone(),
            compression_methods: vec![0],
        };
        let msg = wrap_handshake(HandshakeType::ClientHello, &encode_client_hello(&hello)?);
        self.transcript.update(&msg)?;
        self.state = HandshakeState::WaitServerHello;
        Ok(vec![OutboundOp::SendHandshake(msg)])
    }

    /// Open the handshake after an SSL 2.0 compatibility hello went out.
    /// The raw v2 hello body seeds the transcript so both Finished
    /// computations cover it exactly as transmitted; the 16-byte challenge
    /// right-aligns into the 32-byte client random.
    pub(crate) fn start_after_v2_hello(
        &mut self,
        v2_hello_body: &[u8],
        challenge: &[u8; 16],
    ) -> Result<(), TlsError> {
        self.client_random = [0u8; 32];
        self.client_random[16..].copy_from_slice(challenge);
        self.offered_version = self.config.max_version.wire();
        self.transcript.update(v2_hello_body)?;
        self.sent_v2_hello = true;
        self.state = HandshakeState::WaitServerHello;
        Ok(())
    }

    /// Feed one reassembled handshake message through the state machine.
    pub(crate) fn handle_message(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        match msg.msg_type {
            HandshakeType::HelloRequest => self.process_hello_request(msg),
            HandshakeType::ServerHello => self.process_server_hello(msg),
            HandshakeType::Certificate => self.process_certificate(msg),
            HandshakeType::ServerKeyExchange => self.process_server_key_exchange(msg),
            HandshakeType::CertificateRequest => self.process_certificate_request(msg),
            HandshakeType::ServerHelloDone => self.process_server_hello_done(msg),
            HandshakeType::Finished => self.process_finished(msg),
            other => self.unexpected(other),
        }
    }

    /// Open a renegotiation with a fresh ClientHello. The record layer
    /// keeps running under the current cipher states until the new
    /// ChangeCipherSpec.
    pub(crate) fn initiate_renegotiation(&mut self) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::Connected {
            return Err(TlsError::ProtocolError(
                "renegotiation before the handshake completed".into(),
            ));
        }
        if !self.config.allow_renegotiation {
            return Err(TlsError::ConfigError("renegotiation is disabled".into()));
        }
        self.reset_for_renegotiation();
        self.start()
    }

    /// The server declined our renegotiation request with a warning
    /// alert. Drop back to the established connection; the old cipher
    /// states never stopped running.
    pub(crate) fn handle_no_renegotiation(&mut self) {
        if self.state == HandshakeState::WaitServerHello && !self.peer_verify_data.is_empty() {
            self.state = HandshakeState::Connected;
        }
    }

    /// The peer's ChangeCipherSpec record. The connection activates the
    /// pending read state; the engine only checks sequencing.
    pub(crate) fn handle_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        if self.state != HandshakeState::WaitChangeCipherSpec {
            self.fatal_alert = Some(AlertDescription::UnexpectedMessage);
            return Err(TlsError::ProtocolError(format!(
                "ChangeCipherSpec in state {:?}",
                self.state
            )));
        }
        self.state = HandshakeState::WaitFinished;
        Ok(())
    }

    fn process_hello_request(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        if !msg.body.is_empty() {
            return Err(TlsError::ProtocolError("HelloRequest carries a body".into()));
        }
        if self.state != HandshakeState::Connected {
            // Mid-handshake HelloRequests are dropped, not hashed.
            return Ok(Vec::new());
        }
        if !self.config.allow_renegotiation {
            return Ok(vec![OutboundOp::SendWarningAlert(Alert::warning(
                AlertDescription::NoRenegotiation,
            ))]);
        }
        self.reset_for_renegotiation();
        self.start()
    }

    fn process_server_hello(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitServerHello {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        let hello = decode_server_hello(&msg.body)?;

        let version = TlsVersion::from_wire(hello.server_version)
            .filter(|v| *v >= TlsVersion::Ssl3)
            .ok_or(TlsError::UnsupportedVersion)?;
        if hello.server_version > self.offered_version
            || version < self.config.min_version.max(TlsVersion::Ssl3)
            || version > self.config.max_version
        {
            return Err(TlsError::UnsupportedVersion);
        }
        if self.version.is_some_and(|current| current != version) {
            // Renegotiation cannot move the record layer to another
            // version.
            self.fatal_alert = Some(AlertDescription::IllegalParameter);
            return Err(TlsError::HandshakeFailed(
                "server changed the protocol version on renegotiation".into(),
            ));
        }

        if !self.config.cipher_suites.contains(&hello.cipher_suite) {
            self.fatal_alert = Some(AlertDescription::IllegalParameter);
            return Err(TlsError::HandshakeFailed(format!(
                "server chose cipher suite 0x{:04x} that was not offered",
                hello.cipher_suite.0
            )));
        }
        let params = SuiteParams::from_suite(hello.cipher_suite)?;
        if !params.servable() {
            self.fatal_alert = Some(AlertDescription::IllegalParameter);
            return Err(TlsError::HandshakeFailed(format!(
                "cipher suite 0x{:04x} has no usable key exchange",
                hello.cipher_suite.0
            )));
        }
        if hello.compression_method != 0 {
            self.fatal_alert = Some(AlertDescription::IllegalParameter);
            return Err(TlsError::ProtocolError(format!(
                "server chose compression method {}",
                hello.compression_method
            )));
        }

        self.server_random = hello.random;
        self.version = Some(version);
        self.params = Some(params);

        let offered = self.offered_session.take();
        if let Some(session) =
            offered.filter(|s| !hello.session_id.is_empty() && s.id == hello.session_id)
        {
            // Abbreviated handshake. The server may have moved to another
            // suite; its choice in the hello is adopted either way. A
            // version change is not tolerated.
            if session.version != version {
                self.fatal_alert = Some(AlertDescription::IllegalParameter);
                return Err(TlsError::HandshakeFailed(
                    "server resumed the session under a different version".into(),
                ));
            }
            let master: [u8; MASTER_SECRET_LEN] =
                session.master_secret.as_slice().try_into().map_err(|_| {
                    TlsError::InternalError("cached master secret has wrong length".into())
                })?;
            self.resumed = true;
            self.session_id = hello.session_id;
            self.peer_chain = session.peer_chain.clone();
            self.master_secret = Some(master);
            keylog::log_master_secret(&self.config, &self.client_random, &master);
            let ops = vec![self.install_pending()?];
            self.state = HandshakeState::WaitChangeCipherSpec;
            return Ok(ops);
        }

        self.session_id = hello.session_id;
        self.state = HandshakeState::WaitCertificate;
        Ok(Vec::new())
    }

    fn process_certificate(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitCertificate {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        let chain = decode_certificate(&msg.body)?;
        let Some(leaf) = chain.last() else {
            return Err(TlsError::HandshakeFailed(
                "server sent an empty certificate chain".into(),
            ));
        };
        verify_peer_chain(&self.config, &chain)?;
        self.peer_cert_key = Some(self.config.provider.cert_public_key(leaf)?);
        self.peer_chain = chain;

        self.state = if self.current_params()?.exportable {
            HandshakeState::WaitKeyExchange
        } else {
            HandshakeState::WaitHelloDone
        };
        Ok(Vec::new())
    }

    fn process_server_key_exchange(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        let stage_ok = matches!(
            self.state,
            HandshakeState::WaitKeyExchange | HandshakeState::WaitHelloDone
        );
        if !stage_ok || self.ske_key.is_some() {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        let ske = decode_server_key_exchange(&msg.body)?;
        let codec = self.config.key_codec.as_ref().ok_or_else(|| {
            TlsError::ConfigError("ServerKeyExchange received without a key codec".into())
        })?;
        if self.config.verify_peer {
            let cert_key = self
                .peer_cert_key
                .as_ref()
                .ok_or_else(|| TlsError::InternalError("no server certificate key".into()))?;
            let signed =
                build_ske_signed_data(&self.client_random, &self.server_random, &ske.key_blob);
            let digest = signed_params_digest(self.config.provider.as_ref(), &signed)?;
            let ok = self
                .config
                .provider
                .rsa_verify_raw(cert_key.as_ref(), &digest, &ske.signature)?;
            if !ok {
                self.fatal_alert = Some(self.versioned_alert(
                    AlertDescription::DecryptError,
                    AlertDescription::HandshakeFailure,
                ));
                return Err(TlsError::HandshakeFailed(
                    "ServerKeyExchange signature check failed".into(),
                ));
            }
        }
        self.ske_key = Some(codec.decode_rsa_public(&ske.key_blob)?);
        self.state = HandshakeState::WaitHelloDone;
        Ok(Vec::new())
    }

    fn process_certificate_request(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        let stage_ok = matches!(
            self.state,
            HandshakeState::WaitKeyExchange | HandshakeState::WaitHelloDone
        );
        if !stage_ok || self.cert_request.is_some() {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        self.cert_request = Some(decode_certificate_request(&msg.body)?);
        self.state = HandshakeState::WaitHelloDone;
        Ok(Vec::new())
    }

    fn process_server_hello_done(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        let stage_ok = matches!(
            self.state,
            HandshakeState::WaitKeyExchange | HandshakeState::WaitHelloDone
        );
        if !stage_ok {
            return self.unexpected(msg.msg_type);
        }
        if !msg.body.is_empty() {
            return Err(TlsError::ProtocolError(
                "ServerHelloDone carries a body".into(),
            ));
        }
        self.transcript.update(&msg.raw)?;

        let version = self.current_version()?;
        let crypt = version_crypt(version);
        let mut ops = Vec::new();

        if self.cert_request.is_some() {
            ops.extend(self.answer_certificate_request(version)?);
        }

        // Pre-master: the offered version bytes then 46 random bytes. The
        // server checks the echo against the hello to catch a rollback.
        let mut pre_master = [0u8; PRE_MASTER_LEN];
        pre_master[..2].copy_from_slice(&self.offered_version.to_be_bytes());
        self.config.provider.random(&mut pre_master[2..])?;

        let exchange_key = self
            .ske_key
            .as_ref()
            .or(self.peer_cert_key.as_ref())
            .ok_or_else(|| {
                TlsError::HandshakeFailed("no server key to encrypt the pre-master under".into())
            })?;
        let encrypted = self
            .config
            .provider
            .rsa_encrypt(exchange_key.as_ref(), &pre_master)?;
        let cke = wrap_handshake(
            HandshakeType::ClientKeyExchange,
            &encode_client_key_exchange(version, &encrypted)?,
        );
        self.transcript.update(&cke)?;
        ops.push(OutboundOp::SendHandshake(cke));

        let master = crypt.master_secret(
            self.config.provider.as_ref(),
            &pre_master,
            &self.client_random,
            &self.server_random,
        )?;
        pre_master.zeroize();
        keylog::log_master_secret(&self.config, &self.client_random, &master);
        self.master_secret = Some(master);

        if self.sent_client_chain {
            ops.push(self.build_certificate_verify(crypt)?);
        }

        ops.push(self.install_pending()?);
        ops.push(OutboundOp::SendChangeCipherSpec);
        ops.push(self.build_finished(crypt, TlsRole::Client)?);
        self.state = HandshakeState::WaitChangeCipherSpec;
        Ok(ops)
    }

    fn process_finished(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitFinished {
            return self.unexpected(msg.msg_type);
        }
        let version = self.current_version()?;
        let crypt = version_crypt(version);
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no master secret".into()))?;
        let expected = crypt.finished_value(
            self.config.provider.as_ref(),
            &self.transcript,
            master,
            TlsRole::Server,
        )?;
        if !bool::from(expected.ct_eq(msg.body.as_slice())) {
            self.fatal_alert = Some(AlertDescription::HandshakeFailure);
            return Err(TlsError::HandshakeFailed(
                "server Finished verification failed".into(),
            ));
        }
        self.peer_verify_data = msg.body.clone();
        self.transcript.update(&msg.raw)?;

        if self.resumed {
            // Abbreviated flow: the server finished first, the client
            // answers with its own flight.
            let mut ops = vec![OutboundOp::SendChangeCipherSpec];
            ops.push(self.build_finished(crypt, TlsRole::Client)?);
            self.state = HandshakeState::Connected;
            return Ok(ops);
        }
        self.state = HandshakeState::Connected;
        Ok(Vec::new())
    }

    /// Answer a CertificateRequest: the configured chain when one fits,
    /// an empty Certificate under TLS, or the SSL 3.0 no_certificate
    /// warning alert.
    fn answer_certificate_request(
        &mut self,
        version: TlsVersion,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        let rsa_ok = self
            .cert_request
            .as_ref()
            .is_some_and(|req| req.certificate_types.contains(&CERT_TYPE_RSA_SIGN));
        let chain = self
            .config
            .credentials
            .as_ref()
            .map(|c| c.chain.clone())
            .filter(|chain| rsa_ok && !chain.is_empty());
        match chain {
            Some(chain) => {
                let msg = wrap_handshake(HandshakeType::Certificate, &encode_certificate(&chain)?);
                self.transcript.update(&msg)?;
                self.sent_client_chain = true;
                Ok(vec![OutboundOp::SendHandshake(msg)])
            }
            None if version >= TlsVersion::Tls10 => {
                let msg = wrap_handshake(HandshakeType::Certificate, &encode_certificate(&[])?);
                self.transcript.update(&msg)?;
                Ok(vec![OutboundOp::SendHandshake(msg)])
            }
            None => Ok(vec![OutboundOp::SendWarningAlert(Alert::warning(
                AlertDescription::NoCertificate,
            ))]),
        }
    }

    /// Sign the handshake digest with the client identity key. Sent only
    /// when a certificate with a key went out.
    fn build_certificate_verify(&mut self, crypt: &dyn VersionCrypt) -> Result<OutboundOp, TlsError> {
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no master secret".into()))?;
        let digest =
            crypt.cert_verify_digest(self.config.provider.as_ref(), &self.transcript, master)?;
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("certificate sent without credentials".into()))?;
        let signature = self
            .config
            .provider
            .rsa_sign_raw(credentials.private_key.as_ref(), &digest)?;
        let cv = wrap_handshake(
            HandshakeType::CertificateVerify,
            &encode_certificate_verify(&signature)?,
        );
        self.transcript.update(&cv)?;
        Ok(OutboundOp::SendHandshake(cv))
    }

    /// Compute, hash and queue this side's Finished message.
    fn build_finished(
        &mut self,
        crypt: &dyn VersionCrypt,
        sender: TlsRole,
    ) -> Result<OutboundOp, TlsError> {
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no master secret".into()))?;
        let verify =
            crypt.finished_value(self.config.provider.as_ref(), &self.transcript, master, sender)?;
        let fin = wrap_handshake(HandshakeType::Finished, &verify);
        self.transcript.update(&fin)?;
        self.local_verify_data = verify;
        Ok(OutboundOp::SendHandshake(fin))
    }

    /// Derive the key block for the negotiated parameters and stage both
    /// directions.
    fn install_pending(&self) -> Result<OutboundOp, TlsError> {
        let version = self.current_version()?;
        let params = self.current_params()?;
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no master secret".into()))?;
        let keys = DerivedKeys::derive(
            self.config.provider.as_ref(),
            version_crypt(version),
            &params,
            master,
            &self.client_random,
            &self.server_random,
        )?;
        Ok(OutboundOp::InstallPending(Box::new(PendingCipher {
            params,
            version,
            keys,
        })))
    }

    /// Choose the session to offer. An explicit configuration wins over
    /// the cache entry for the configured peer. Entries outside the
    /// enabled version range are dropped from the cache rather than
    /// offered; SSL 2.0 sessions only resume through the v2 path.
    fn stage_resumption(&self) -> Option<TlsSession> {
        let from_cache = self.config.resumption_session.is_none();
        let session = if let Some(session) = &self.config.resumption_session {
            session.clone()
        } else {
            let key = self.config.peer_identity.as_ref()?;
            let cache = self.config.session_cache.as_ref()?;
            let guard = cache.lock().ok()?;
            guard.get(key.as_bytes())?.clone()
        };
        // SSL 2.0 sessions stay cached for the compatibility path but are
        // never offered in a v3 hello.
        if session.version < TlsVersion::Ssl3 {
            return None;
        }
        if session.version < self.config.min_version || session.version > self.config.max_version {
            if from_cache {
                self.evict_cached_session();
            }
            return None;
        }
        if session.id.is_empty() || session.master_secret.len() != MASTER_SECRET_LEN {
            if from_cache {
                self.evict_cached_session();
            }
            return None;
        }
        Some(session)
    }

    fn evict_cached_session(&self) {
        if let (Some(key), Some(cache)) = (&self.config.peer_identity, &self.config.session_cache) {
            if let Ok(mut guard) = cache.lock() {
                guard.remove(key.as_bytes());
            }
        }
    }

    /// Clear per-handshake state ahead of a renegotiated exchange. The
    /// record layer keeps running under the current cipher states, so the
    /// committed version and active suite survive until the new
    /// ServerHello replaces them.
    fn reset_for_renegotiation(&mut self) {
        self.transcript.reset();
        self.state = HandshakeState::Idle;
        self.resumed = false;
        self.session_id.clear();
        self.offered_session = None;
        self.peer_chain.clear();
        self.peer_cert_key = None;
        self.ske_key = None;
        self.cert_request = None;
        self.sent_client_chain = false;
        if let Some(mut master) = self.master_secret.take() {
            master.zeroize();
        }
    }

    fn unexpected(&mut self, msg_type: HandshakeType) -> Result<Vec<OutboundOp>, TlsError> {
        self.fatal_alert = Some(AlertDescription::UnexpectedMessage);
        Err(TlsError::ProtocolError(format!(
            "unexpected {msg_type:?} in state {:?}",
            self.state
        )))
    }

    /// TLS alert codes past 47 need an SSL 3.0 stand-in.
    fn versioned_alert(
        &self,
        tls: AlertDescription,
        ssl3: AlertDescription,
    ) -> AlertDescription {
        match self.version {
            Some(v) if v >= TlsVersion::Tls10 => tls,
            _ => ssl3,
        }
    }

    fn fresh_random(&self) -> Result<[u8; 32], TlsError> {
        let mut random = [0u8; 32];
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        random[..4].copy_from_slice(&(now as u32).to_be_bytes());
        self.config.provider.random(&mut random[4..])?;
        Ok(random)
    }

    fn current_version(&self) -> Result<TlsVersion, TlsError> {
        self.version
            .ok_or_else(|| TlsError::InternalError("no negotiated version".into()))
    }

    fn current_params(&self) -> Result<SuiteParams, TlsError> {
        self.params
            .ok_or_else(|| TlsError::InternalError("no negotiated cipher suite".into()))
    }

    /// A full handshake that negotiated a session id yields a cacheable
    /// session once connected.
    pub(crate) fn session_to_store(&self) -> Option<TlsSession> {
        if self.resumed || self.session_id.is_empty() || self.state != HandshakeState::Connected {
            return None;
        }
        Some(TlsSession {
            id: self.session_id.clone(),
            version: self.version?,
            cipher_suite: self.params.as_ref()?.suite,
            master_secret: self.master_secret.as_ref()?.to_vec(),
            peer_chain: self.peer_chain.clone(),
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    pub fn version(&self) -> Option<TlsVersion> {
        self.version
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.params.as_ref().map(|p| p.suite)
    }

    pub fn session_resumed(&self) -> bool {
        self.resumed
    }

    pub fn sent_v2_hello(&self) -> bool {
        self.sent_v2_hello
    }

    pub fn peer_chain(&self) -> &[Vec<u8>] {
        &self.peer_chain
    }

    pub fn local_verify_data(&self) -> &[u8] {
        &self.local_verify_data
    }

    pub fn peer_verify_data(&self) -> &[u8] {
        &self.peer_verify_data
    }

    pub(crate) fn take_fatal_alert(&mut self) -> Option<AlertDescription> {
        self.fatal_alert.take()
    }
}

impl Drop for ClientEngine {
    fn drop(&mut self) {
        if let Some(mut master) = self.master_secret.take() {
            master.zeroize();
        }
    }
}
