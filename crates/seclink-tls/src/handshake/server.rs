//! Server-side handshake engine.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::alert::{Alert, AlertDescription};
use crate::config::{ClientAuthMode, ExportKeyPolicy, TlsConfig};
use crate::crypt::{
    keylog, version_crypt, DerivedKeys, SuiteParams, Transcript, VersionCrypt, MASTER_SECRET_LEN,
    PRE_MASTER_LEN,
};
use crate::handshake::codec::{
    build_ske_signed_data, decode_certificate, decode_certificate_verify, decode_client_hello,
    decode_client_key_exchange, encode_certificate, encode_certificate_request,
    encode_server_hello, encode_server_key_exchange, CertificateRequest, ClientHello, ServerHello,
    ServerKeyExchange, CERT_TYPE_RSA_SIGN,
};
use crate::handshake::{
    signed_params_digest, verify_peer_chain, wrap_handshake, HandshakeMessage, HandshakeState,
    HandshakeType, OutboundOp, PendingCipher,
};
use crate::session::TlsSession;
use crate::{CipherSuite, TlsRole, TlsVersion};
use seclink_provider::PublicKey;
use seclink_types::TlsError;

/// 512-bit cap on the modulus an export suite may use for key exchange.
const EXPORT_MODULUS_MAX: usize = 64;

/// Which configured identity decrypts the ClientKeyExchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KxIdentity {
    Signing,
    Encryption,
}

pub struct ServerEngine {
    config: Arc<TlsConfig>,
    state: HandshakeState,
    transcript: Transcript,
    version: Option<TlsVersion>,
    /// Raw version bytes from the hello, echoed inside the pre-master.
    client_version_offered: u16,
    client_random: [u8; 32],
    server_random: [u8; 32],
    session_id: Vec<u8>,
    resumed: bool,
    params: Option<SuiteParams>,
    master_secret: Option<[u8; MASTER_SECRET_LEN]>,
    kx_identity: KxIdentity,
    sent_cert_request: bool,
    client_chain: Vec<Vec<u8>>,
    client_cert_key: Option<Arc<dyn PublicKey>>,
    local_verify_data: Vec<u8>,
    peer_verify_data: Vec<u8>,
    fatal_alert: Option<AlertDescription>,
    /// A HelloRequest went out and the next ClientHello answers it.
    hello_request_pending: bool,
}

impl ServerEngine {
    pub fn new(config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        let transcript = Transcript::new(config.provider.as_ref())?;
        Ok(ServerEngine {
            config,
            state: HandshakeState::WaitClientHello,
            transcript,
            version: None,
            client_version_offered: 0,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            session_id: Vec::new(),
            resumed: false,
            params: None,
            master_secret: None,
            kx_identity: KxIdentity::Signing,
            sent_cert_request: false,
            client_chain: Vec::new(),
            client_cert_key: None,
            local_verify_data: Vec::new(),
            peer_verify_data: Vec::new(),
            fatal_alert: None,
            hello_request_pending: false,
        })
    }

    /// Feed one reassembled handshake message through the state machine.
    pub(crate) fn handle_message(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        match msg.msg_type {
            HandshakeType::ClientHello => self.process_client_hello(msg),
            HandshakeType::Certificate => self.process_client_certificate(msg),
            HandshakeType::ClientKeyExchange => self.process_client_key_exchange(msg),
            HandshakeType::CertificateVerify => self.process_certificate_verify(msg),
            HandshakeType::Finished => self.process_finished(msg),
            other => self.unexpected(other),
        }
    }

    /// The peer's ChangeCipherSpec record.
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

    /// Ask the client to renegotiate. HelloRequest is never hashed; the
    /// next transcript starts at the client's answering hello.
    pub(crate) fn initiate_renegotiation(&mut self) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::Connected {
            return Err(TlsError::ProtocolError(
                "renegotiation before the handshake completed".into(),
            ));
        }
        if !self.config.allow_renegotiation {
            return Err(TlsError::ConfigError("renegotiation is disabled".into()));
        }
        self.hello_request_pending = true;
        Ok(vec![OutboundOp::SendHandshake(wrap_handshake(
            HandshakeType::HelloRequest,
            &[],
        ))])
    }

    /// The client answered a HelloRequest with a no_renegotiation warning;
    /// the connection stays in its established state.
    pub(crate) fn handle_no_renegotiation(&mut self) {
        self.hello_request_pending = false;
    }

    /// A promoted SSL 2.0 ClientHello: the raw v2 hello bytes (without the
    /// record header) seed the transcript in place of a v3 message, then
    /// negotiation proceeds on the translated fields.
    pub(crate) fn handle_promoted_client_hello(
        &mut self,
        raw_v2_body: &[u8],
        hello: &ClientHello,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitClientHello {
            self.fatal_alert = Some(AlertDescription::UnexpectedMessage);
            return Err(TlsError::ProtocolError(
                "v2 hello after the handshake began".into(),
            ));
        }
        self.transcript.update(raw_v2_body)?;
        self.negotiate(hello)
    }

    /// SSL 3.0 clients decline a certificate request with a warning alert
    /// instead of an empty Certificate message.
    pub(crate) fn handle_no_certificate_alert(&mut self) -> Result<(), TlsError> {
        if self.state != HandshakeState::WaitClientCertificate {
            self.fatal_alert = Some(AlertDescription::UnexpectedMessage);
            return Err(TlsError::ProtocolError(
                "no_certificate outside a certificate request".into(),
            ));
        }
        if self.current_version()? >= TlsVersion::Tls10 {
            return Err(TlsError::ProtocolError(
                "no_certificate alert under TLS".into(),
            ));
        }
        if self.config.client_auth == ClientAuthMode::Require {
            self.fatal_alert = Some(AlertDescription::HandshakeFailure);
            return Err(TlsError::HandshakeFailed(
                "client declined the certificate request".into(),
            ));
        }
        self.state = HandshakeState::WaitClientKeyExchange;
        Ok(())
    }

    fn process_client_hello(&mut self, msg: &HandshakeMessage) -> Result<Vec<OutboundOp>, TlsError> {
        match self.state {
            HandshakeState::WaitClientHello => {}
            HandshakeState::Connected => {
                if !self.config.allow_renegotiation {
                    return Ok(vec![OutboundOp::SendWarningAlert(Alert::warning(
                        AlertDescription::NoRenegotiation,
                    ))]);
                }
                self.reset_for_renegotiation();
            }
            _ => return self.unexpected(msg.msg_type),
        }
        self.transcript.update(&msg.raw)?;
        let hello = decode_client_hello(&msg.body)?;
        self.negotiate(&hello)
    }

    fn negotiate(&mut self, hello: &ClientHello) -> Result<Vec<OutboundOp>, TlsError> {
        self.hello_request_pending = false;
        self.client_version_offered = hello.client_version;
        self.client_random = hello.random;

        let version = self.select_version(hello.client_version)?;
        self.version = Some(version);
        self.server_random = self.fresh_random()?;

        if let Some(session) = self.take_resumable(hello, version) {
            if self.can_serve(session.cipher_suite).is_some() {
                return self.resume(session);
            }
        }
        let (suite, kx) = self.select_suite(&hello.cipher_suites)?;
        self.full_handshake(suite, kx, version)
    }

    /// The highest enabled v3 version not above the client's offer. An
    /// SSL 2.0 version number inside v3 framing has no negotiable answer.
    fn select_version(&self, client_version: u16) -> Result<TlsVersion, TlsError> {
        let floor = self.config.min_version.max(TlsVersion::Ssl3);
        for v in [TlsVersion::Tls10, TlsVersion::Ssl3] {
            if v.wire() <= client_version && v >= floor && v <= self.config.max_version {
                return Ok(v);
            }
        }
        Err(TlsError::UnsupportedVersion)
    }

    /// The cached session for the configured peer, when the hello offers
    /// exactly its id. A version change invalidates the entry, forcing
    /// the full handshake the client will be told about via a fresh id.
    fn take_resumable(&self, hello: &ClientHello, version: TlsVersion) -> Option<TlsSession> {
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
        if session.version != version || session.master_secret.len() != MASTER_SECRET_LEN {
            guard.remove(key.as_bytes());
            return None;
        }
        Some(session)
    }

    /// Abbreviated handshake: echo the cached id and key the channel from
    /// the stored master secret. The server's flight goes out first.
    fn resume(&mut self, session: TlsSession) -> Result<Vec<OutboundOp>, TlsError> {
        let version = self.current_version()?;
        let params = SuiteParams::from_suite(session.cipher_suite)?;
        self.params = Some(params);
        self.resumed = true;
        self.session_id = session.id.clone();
        let master: [u8; MASTER_SECRET_LEN] =
            session.master_secret.as_slice().try_into().map_err(|_| {
                TlsError::InternalError("cached master secret has wrong length".into())
            })?;
        self.master_secret = Some(master);
        keylog::log_master_secret(&self.config, &self.client_random, &master);

        let hello = ServerHello {
            server_version: version.wire(),
            random: self.server_random,
            session_id: session.id.clone(),
            cipher_suite: params.suite,
            compression_method: 0,
        };
        let sh = wrap_handshake(HandshakeType::ServerHello, &encode_server_hello(&hello)?);
        self.transcript.update(&sh)?;
        let mut ops = vec![OutboundOp::SendHandshake(sh)];
        ops.push(self.install_pending()?);
        ops.push(OutboundOp::SendChangeCipherSpec);
        ops.push(self.build_finished(version_crypt(version), TlsRole::Server)?);
        self.state = HandshakeState::WaitChangeCipherSpec;
        Ok(ops)
    }

    fn full_handshake(
        &mut self,
        suite: CipherSuite,
        kx: KxIdentity,
        version: TlsVersion,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        let params = SuiteParams::from_suite(suite)?;
        self.params = Some(params);
        self.kx_identity = kx;
        // A fresh id is only worth assigning when a later hello can find
        // the session again.
        self.session_id =
            if self.config.peer_identity.is_some() && self.config.session_cache.is_some() {
                let mut id = vec![0u8; 16];
                self.config.provider.random(&mut id)?;
                id
            } else {
                Vec::new()
            };

        let hello = ServerHello {
            server_version: version.wire(),
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: suite,
            compression_method: 0,
        };
        let sh = wrap_handshake(HandshakeType::ServerHello, &encode_server_hello(&hello)?);
        self.transcript.update(&sh)?;
        let mut ops = vec![OutboundOp::SendHandshake(sh)];

        let chain = self
            .config
            .credentials
            .as_ref()
            .map(|c| c.chain.clone())
            .ok_or_else(|| TlsError::InternalError("no server credentials".into()))?;
        let cert = wrap_handshake(HandshakeType::Certificate, &encode_certificate(&chain)?);
        self.transcript.update(&cert)?;
        ops.push(OutboundOp::SendHandshake(cert));

        if self.kx_identity == KxIdentity::Encryption {
            ops.push(self.build_server_key_exchange()?);
        }

        if self.config.client_auth != ClientAuthMode::Off {
            let req = CertificateRequest {
                certificate_types: vec![CERT_TYPE_RSA_SIGN],
                authorities: Vec::new(),
            };
            let msg = wrap_handshake(
                HandshakeType::CertificateRequest,
                &encode_certificate_request(&req)?,
            );
            self.transcript.update(&msg)?;
            ops.push(OutboundOp::SendHandshake(msg));
            self.sent_cert_request = true;
        }

        let done = wrap_handshake(HandshakeType::ServerHelloDone, &[]);
        self.transcript.update(&done)?;
        ops.push(OutboundOp::SendHandshake(done));

        self.state = if self.sent_cert_request {
            HandshakeState::WaitClientCertificate
        } else {
            HandshakeState::WaitClientKeyExchange
        };
        Ok(ops)
    }

    /// Advertise the short encryption key, signed under the certificate
    /// key so the client can tie it to the chain.
    fn build_server_key_exchange(&mut self) -> Result<OutboundOp, TlsError> {
        let codec = self.config.key_codec.as_ref().ok_or_else(|| {
            TlsError::ConfigError("export key exchange requires a key codec".into())
        })?;
        let encryption = self.config.encryption_credentials.as_ref().ok_or_else(|| {
            TlsError::InternalError("no encryption identity for the export exchange".into())
        })?;
        let signing = self
            .config
            .credentials
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no server credentials".into()))?;
        let key_blob = codec.encode_rsa_public(encryption.public_key.as_ref())?;
        let signed = build_ske_signed_data(&self.client_random, &self.server_random, &key_blob);
        let digest = signed_params_digest(self.config.provider.as_ref(), &signed)?;
        let signature = self
            .config
            .provider
            .rsa_sign_raw(signing.private_key.as_ref(), &digest)?;
        let msg = wrap_handshake(
            HandshakeType::ServerKeyExchange,
            &encode_server_key_exchange(&ServerKeyExchange {
                key_blob,
                signature,
            })?,
        );
        self.transcript.update(&msg)?;
        Ok(OutboundOp::SendHandshake(msg))
    }

    fn process_client_certificate(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitClientCertificate {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        let chain = decode_certificate(&msg.body)?;
        if let Some(leaf) = chain.last() {
            verify_peer_chain(&self.config, &chain)?;
            self.client_cert_key = Some(self.config.provider.cert_public_key(leaf)?);
            self.client_chain = chain;
        } else if self.config.client_auth == ClientAuthMode::Require {
            self.fatal_alert = Some(AlertDescription::HandshakeFailure);
            return Err(TlsError::HandshakeFailed(
                "client declined the certificate request".into(),
            ));
        }
        self.state = HandshakeState::WaitClientKeyExchange;
        Ok(Vec::new())
    }

    fn process_client_key_exchange(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitClientKeyExchange {
            return self.unexpected(msg.msg_type);
        }
        self.transcript.update(&msg.raw)?;
        let version = self.current_version()?;
        let encrypted = decode_client_key_exchange(version, &msg.body)?;

        let private_key = match self.kx_identity {
            KxIdentity::Signing => self.config.credentials.as_ref(),
            KxIdentity::Encryption => self.config.encryption_credentials.as_ref(),
        }
        .map(|c| c.private_key.clone())
        .ok_or_else(|| TlsError::InternalError("key exchange identity disappeared".into()))?;

        // A garbled decryption or a rolled-back version yields a random
        // substitute; the handshake then dies at Finished without telling
        // the sender which check tripped.
        let mut pre_master = [0u8; PRE_MASTER_LEN];
        self.config.provider.random(&mut pre_master)?;
        if let Ok(mut plain) = self
            .config
            .provider
            .rsa_decrypt(private_key.as_ref(), &encrypted)
        {
            let offered = self.client_version_offered.to_be_bytes();
            if plain.len() == PRE_MASTER_LEN && plain[..2] == offered[..] {
                pre_master.copy_from_slice(&plain);
            }
            plain.zeroize();
        }

        let crypt = version_crypt(version);
        let master = crypt.master_secret(
            self.config.provider.as_ref(),
            &pre_master,
            &self.client_random,
            &self.server_random,
        )?;
        pre_master.zeroize();
        keylog::log_master_secret(&self.config, &self.client_random, &master);
        self.master_secret = Some(master);

        let ops = vec![self.install_pending()?];
        self.state = if self.client_cert_key.is_some() {
            HandshakeState::WaitCertVerify
        } else {
            HandshakeState::WaitChangeCipherSpec
        };
        Ok(ops)
    }

    fn process_certificate_verify(
        &mut self,
        msg: &HandshakeMessage,
    ) -> Result<Vec<OutboundOp>, TlsError> {
        if self.state != HandshakeState::WaitCertVerify {
            return self.unexpected(msg.msg_type);
        }
        let version = self.current_version()?;
        let crypt = version_crypt(version);
        let signature = decode_certificate_verify(&msg.body)?;
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("no master secret".into()))?;
        // The signature covers the transcript up to and including the
        // ClientKeyExchange, not itself.
        let digest =
            crypt.cert_verify_digest(self.config.provider.as_ref(), &self.transcript, master)?;
        let key = self
            .client_cert_key
            .as_ref()
            .ok_or_else(|| TlsError::InternalError("CertificateVerify without a client key".into()))?;
        let ok = self
            .config
            .provider
            .rsa_verify_raw(key.as_ref(), &digest, &signature)?;
        if !ok {
            self.fatal_alert = Some(self.versioned_alert(
                AlertDescription::DecryptError,
                AlertDescription::HandshakeFailure,
            ));
            return Err(TlsError::HandshakeFailed(
                "client CertificateVerify signature check failed".into(),
            ));
        }
        self.transcript.update(&msg.raw)?;
        self.state = HandshakeState::WaitChangeCipherSpec;
        Ok(Vec::new())
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
            TlsRole::Client,
        )?;
        if !bool::from(expected.ct_eq(msg.body.as_slice())) {
            self.fatal_alert = Some(AlertDescription::HandshakeFailure);
            return Err(TlsError::HandshakeFailed(
                "client Finished verification failed".into(),
            ));
        }
        self.peer_verify_data = msg.body.clone();
        self.transcript.update(&msg.raw)?;

        if self.resumed {
            self.state = HandshakeState::Connected;
            return Ok(Vec::new());
        }
        let mut ops = vec![OutboundOp::SendChangeCipherSpec];
        ops.push(self.build_finished(crypt, TlsRole::Server)?);
        self.state = HandshakeState::Connected;
        Ok(ops)
    }

    /// Whether this server can key-exchange under `suite`, and with which
    /// identity. Export suites need a modulus at or under the export cap
    /// on whichever key carries the exchange.
    fn can_serve(&self, suite: CipherSuite) -> Option<KxIdentity> {
        if !self.config.cipher_suites.contains(&suite) {
            return None;
        }
        let params = SuiteParams::from_suite(suite).ok()?;
        if !params.servable() {
            return None;
        }
        let signing = self.config.credentials.as_ref()?;
        if !params.exportable {
            return Some(KxIdentity::Signing);
        }
        let signing_fits = signing.public_key.modulus_size() <= EXPORT_MODULUS_MAX;
        let encryption_fits = self
            .config
            .encryption_credentials
            .as_ref()
            .is_some_and(|c| c.public_key.modulus_size() <= EXPORT_MODULUS_MAX)
            && self.config.key_codec.is_some();
        match self.config.export_key_policy {
            ExportKeyPolicy::PreferSigningKey => {
                if signing_fits {
                    Some(KxIdentity::Signing)
                } else if encryption_fits {
                    Some(KxIdentity::Encryption)
                } else {
                    None
                }
            }
            ExportKeyPolicy::PreferEncryptionKey => {
                if encryption_fits {
                    Some(KxIdentity::Encryption)
                } else if signing_fits {
                    Some(KxIdentity::Signing)
                } else {
                    None
                }
            }
        }
    }

    /// First offered suite this server can actually key under; the
    /// client's preference order wins.
    fn select_suite(&self, offered: &[CipherSuite]) -> Result<(CipherSuite, KxIdentity), TlsError> {
        for suite in offered {
            if let Some(kx) = self.can_serve(*suite) {
                return Ok((*suite, kx));
            }
        }
        Err(TlsError::NoSharedCipherSuite)
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

    /// Clear per-handshake state ahead of a renegotiated exchange. The
    /// record layer keeps running under the current cipher states.
    fn reset_for_renegotiation(&mut self) {
        self.transcript.reset();
        self.state = HandshakeState::WaitClientHello;
        self.resumed = false;
        self.session_id.clear();
        self.params = None;
        self.client_chain.clear();
        self.client_cert_key = None;
        self.sent_cert_request = false;
        self.kx_identity = KxIdentity::Signing;
        self.hello_request_pending = false;
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
    fn versioned_alert(&self, tls: AlertDescription, ssl3: AlertDescription) -> AlertDescription {
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
            peer_chain: self.client_chain.clone(),
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

    pub fn peer_chain(&self) -> &[Vec<u8>] {
        &self.client_chain
    }

    pub fn local_verify_data(&self) -> &[u8] {
        &self.local_verify_data
    }

    pub fn peer_verify_data(&self) -> &[u8] {
        &self.peer_verify_data
    }

    pub fn renegotiation_pending(&self) -> bool {
        self.hello_request_pending
    }

    pub(crate) fn take_fatal_alert(&mut self) -> Option<AlertDescription> {
        self.fatal_alert.take()
    }
}

impl Drop for ServerEngine {
    fn drop(&mut self) {
        if let Some(mut master) = self.master_secret.take() {
            master.zeroize();
        }
    }
}
