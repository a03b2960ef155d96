//! Client-side connection driver.

use std::io::{Read, Write};
use std::sync::Arc;

use super::{Channel, ConnectionState, Framing, V2_MAX_PLAINTEXT};
use crate::alert::{Alert, AlertDescription};
use crate::config::TlsConfig;
use crate::handshake::ClientEngine;
use crate::record::{ContentType, RecordPreface, MAX_PLAINTEXT};
use crate::session::TlsSession;
use crate::ssl2::engine::{
    build_compat_hello, stage_v2_resumption, Ssl2ClientEngine, Ssl2Op,
};
use crate::ssl2::CHALLENGE_LEN;
use crate::{CipherSuite, TlsConnection, TlsRole, TlsVersion};
use seclink_types::TlsError;

/// A TLS/SSL client over a blocking or non-blocking transport.
///
/// With SSL 2.0 enabled the first flight goes out in v2 framing; the
/// server's answer decides whether the connection continues as v3 or
/// falls back to the native v2 handshake.
pub struct TlsClientConnection<S> {
    channel: Channel<S>,
    engine: ClientEngine,
    v2_engine: Option<Ssl2ClientEngine>,
    compat_challenge: Option<[u8; CHALLENGE_LEN]>,
    compat_session: Option<TlsSession>,
    started: bool,
}

impl<S: Read + Write> TlsClientConnection<S> {
    pub fn new(transport: S, config: Arc<TlsConfig>) -> Result<Self, TlsError> {
        let engine = ClientEngine::new(config.clone())?;
        let mut channel = Channel::new(transport, config, TlsRole::Client);
        if !channel.config.ssl2_enabled() {
            channel.framing = Framing::V3;
        }
        Ok(TlsClientConnection {
            channel,
            engine,
            v2_engine: None,
            compat_challenge: None,
            compat_session: None,
            started: false,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state
    }

    pub fn session_resumed(&self) -> bool {
        match &self.v2_engine {
            Some(engine) => engine.session_resumed(),
            None => self.engine.session_resumed(),
        }
    }

    /// The peer's certificate chain as received, leaf first for v3
    /// handshakes, the single v2 certificate otherwise.
    pub fn peer_certificates(&self) -> Vec<Vec<u8>> {
        match &self.v2_engine {
            Some(engine) => engine
                .peer_certificate()
                .map(|cert| vec![cert.to_vec()])
                .unwrap_or_default(),
            None => self.engine.peer_chain().to_vec(),
        }
    }

    /// Verify data from the latest local Finished. Empty before a v3
    /// handshake completes and on SSL 2.0 connections.
    pub fn local_finished_verify_data(&self) -> &[u8] {
        match &self.v2_engine {
            Some(_) => &[],
            None => self.engine.local_verify_data(),
        }
    }

    pub fn peer_finished_verify_data(&self) -> &[u8] {
        match &self.v2_engine {
            Some(_) => &[],
            None => self.engine.peer_verify_data(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.channel.transport
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.channel.transport
    }

    /// Open a renegotiation with a fresh ClientHello. The request fails
    /// without killing the connection when renegotiation is disabled or
    /// the handshake has not completed.
    pub fn initiate_renegotiation(&mut self) -> Result<(), TlsError> {
        match self.channel.state {
            ConnectionState::Error => return Err(self.channel.dead_error()),
            ConnectionState::GracefulClose => return Err(TlsError::ClosedGraceful),
            ConnectionState::NoNotifyClose => return Err(TlsError::ClosedNoNotify),
            _ => {}
        }
        if self.v2_engine.is_some() {
            return Err(TlsError::ConfigError(
                "renegotiation is not part of SSL 2.0".into(),
            ));
        }
        let ops = self.engine.initiate_renegotiation()?;
        self.sync_version();
        if let Err(err) = self.channel.execute_ops(ops) {
            return Err(self.fail(err));
        }
        match self.channel.flush() {
            Ok(()) | Err(TlsError::WouldBlock) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// The first flight: a plain v3 hello, a v2-framed compatibility
    /// hello, or the native v2 opening depending on the version range.
    fn start_if_needed(&mut self) -> Result<(), TlsError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let config = self.channel.config.clone();
        if config.max_version == TlsVersion::Ssl2 {
            self.channel.framing = Framing::V2;
            self.channel.ensure_v2();
            let mut engine = Ssl2ClientEngine::new(config);
            let result = engine.start();
            self.v2_engine = Some(engine);
            return self.execute_v2(result?);
        }
        if config.ssl2_enabled() {
            let mut challenge = [0u8; CHALLENGE_LEN];
            config.provider.random(&mut challenge)?;
            let staged = stage_v2_resumption(&config);
            let session_id = staged
                .as_ref()
                .map(|session| session.id.clone())
                .unwrap_or_default();
            let hello = build_compat_hello(&config, &challenge, &session_id)?;
            self.engine.start_after_v2_hello(&hello, &challenge)?;
            self.channel.ensure_v2();
            self.channel.queue_v2_record(&hello)?;
            self.compat_challenge = Some(challenge);
            self.compat_session = staged;
            return Ok(());
        }
        let ops = self.engine.start()?;
        self.sync_version();
        self.channel.execute_ops(ops)
    }

    fn sync_version(&mut self) {
        if let Some(version) = self.engine.version() {
            self.channel.wire_version = version;
        }
    }

    fn engine_ready(&self) -> bool {
        match &self.v2_engine {
            Some(engine) => engine.is_connected(),
            None => self.engine.is_connected(),
        }
    }

    fn fail(&mut self, err: TlsError) -> TlsError {
        if err.is_would_block() {
            return err;
        }
        if let Some(engine) = &mut self.v2_engine {
            if let Some(code) = engine.take_error_code() {
                self.channel.send_v2_error(code);
            }
            self.channel.fail(err, None)
        } else {
            let alert = self.engine.take_fatal_alert();
            self.channel.fail(err, alert)
        }
    }

    fn drive(&mut self) -> Result<(), TlsError> {
        match self.drive_inner() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn drive_inner(&mut self) -> Result<(), TlsError> {
        self.start_if_needed()?;
        loop {
            self.channel.flush()?;
            if self.engine_ready() && self.channel.queue.is_empty() {
                self.channel.state = ConnectionState::Connected;
                return Ok(());
            }
            let (preface, body) = self.channel.next_record()?;
            self.dispatch(preface, body)?;
        }
    }

    fn dispatch(&mut self, preface: RecordPreface, body: Vec<u8>) -> Result<(), TlsError> {
        match preface {
            RecordPreface::V3 { content_type, .. } => {
                let payload = self.channel.open_v3(content_type, &body)?;
                match content_type {
                    ContentType::Handshake => self.handle_handshake_payload(&payload),
                    ContentType::ChangeCipherSpec => self.handle_change_cipher_spec(&payload),
                    ContentType::Alert => self.handle_alert(&payload),
                    ContentType::ApplicationData => self.handle_app_data(&payload),
                }
            }
            RecordPreface::Ssl2 { padding, escape, .. } => {
                if escape {
                    return Err(TlsError::ProtocolError(
                        "SSL 2.0 security escapes are not supported".into(),
                    ));
                }
                self.enter_v2()?;
                let payload = self.channel.open_v2(&body, padding)?;
                self.handle_v2_payload(&payload)
            }
        }
    }

    /// The server answered the compatibility hello in v2 framing; hand
    /// the handshake to the native v2 engine.
    fn enter_v2(&mut self) -> Result<(), TlsError> {
        if self.v2_engine.is_some() {
            return Ok(());
        }
        let challenge = self.compat_challenge.take().ok_or_else(|| {
            TlsError::ProtocolError("SSL 2.0 framing in answer to a v3 hello".into())
        })?;
        let mut engine = Ssl2ClientEngine::new(self.channel.config.clone());
        engine.start_after_compat_hello(&challenge, self.compat_session.take());
        self.v2_engine = Some(engine);
        self.channel.framing = Framing::V2;
        Ok(())
    }

    fn handle_handshake_payload(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        self.channel.reassembly.push(payload);
        while let Some(msg) = self.channel.reassembly.next()? {
            let was_connected = self.engine.is_connected();
            let ops = self.engine.handle_message(&msg)?;
            self.sync_version();
            self.channel.execute_ops(ops)?;
            if !was_connected && self.engine.is_connected() {
                if let Some(session) = self.engine.session_to_store() {
                    self.channel.store_session(session);
                }
            }
        }
        Ok(())
    }

    fn handle_change_cipher_spec(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        if payload.len() != 1 || payload[0] != 1 {
            return Err(TlsError::ProtocolError("malformed ChangeCipherSpec".into()));
        }
        self.engine.handle_change_cipher_spec()?;
        self.channel.activate_pending_read()
    }

    fn handle_alert(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        let alert = Alert::parse(payload)?;
        match alert.description {
            AlertDescription::CloseNotify => Err(self.channel.handle_close_notify()),
            _ if alert.is_fatal() => Err(TlsError::AlertReceived(format!(
                "{:?}",
                alert.description
            ))),
            AlertDescription::NoRenegotiation => {
                self.engine.handle_no_renegotiation();
                Ok(())
            }
            // Remaining warnings carry no client-side state change.
            _ => Ok(()),
        }
    }

    fn handle_app_data(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        if self.channel.state != ConnectionState::Connected {
            return Err(TlsError::ProtocolError(
                "application data during the handshake".into(),
            ));
        }
        self.channel.push_app_data(payload);
        Ok(())
    }

    fn handle_v2_payload(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        if self.v2_engine.as_ref().is_some_and(|e| e.is_connected()) {
            self.channel.push_app_data(payload);
            return Ok(());
        }
        let engine = self
            .v2_engine
            .as_mut()
            .ok_or_else(|| TlsError::InternalError("SSL 2.0 record without an engine".into()))?;
        let ops = engine.handle_message(payload)?;
        let became_connected = engine.is_connected();
        self.execute_v2(ops)?;
        if became_connected {
            if let Some(session) = self.v2_engine.as_ref().and_then(|e| e.session_to_store()) {
                self.channel.store_session(session);
            }
        }
        Ok(())
    }

    fn execute_v2(&mut self, ops: Vec<Ssl2Op>) -> Result<(), TlsError> {
        for op in ops {
            match op {
                Ssl2Op::Send(msg) => self.channel.queue_v2_record(&msg)?,
                Ssl2Op::InstallCiphers(keys) => self.channel.activate_v2(&keys)?,
            }
        }
        Ok(())
    }

    fn handshake_impl(&mut self) -> Result<(), TlsError> {
        match self.channel.state {
            ConnectionState::Error => Err(self.channel.dead_error()),
            ConnectionState::GracefulClose => Err(TlsError::ClosedGraceful),
            ConnectionState::NoNotifyClose => Err(TlsError::ClosedNoNotify),
            ConnectionState::Connected if self.engine_ready() => Ok(()),
            _ => self.drive(),
        }
    }

    fn read_step(&mut self) -> Result<(), TlsError> {
        self.channel.flush()?;
        let (preface, body) = self.channel.next_record()?;
        self.dispatch(preface, body)
    }

    fn read_impl(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.channel.has_app_data() {
                return Ok(self.channel.take_app_data(buf));
            }
            match self.channel.state {
                ConnectionState::Error => return Err(self.channel.dead_error()),
                ConnectionState::NoNotifyClose => return Err(TlsError::ClosedNoNotify),
                ConnectionState::GracefulClose => return Ok(0),
                ConnectionState::Handshaking => self.handshake_impl()?,
                ConnectionState::Connected => {
                    if let Err(err) = self.read_step() {
                        let err = self.fail(err);
                        return match err {
                            TlsError::ClosedGraceful => Ok(0),
                            other => Err(other),
                        };
                    }
                }
            }
        }
    }

    fn write_impl(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        match self.channel.state {
            ConnectionState::Error => return Err(self.channel.dead_error()),
            ConnectionState::GracefulClose => return Err(TlsError::ClosedGraceful),
            ConnectionState::NoNotifyClose => return Err(TlsError::ClosedNoNotify),
            ConnectionState::Handshaking => self.handshake_impl()?,
            ConnectionState::Connected => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        // Drain the backlog before committing new data, so WouldBlock
        // here still lets the caller retry with the same buffer.
        if let Err(err) = self.channel.flush() {
            return Err(self.fail(err));
        }
        let queued = if self.channel.framing == Framing::V2 {
            buf.chunks(V2_MAX_PLAINTEXT)
                .try_for_each(|chunk| self.channel.queue_v2_record(chunk))
        } else {
            buf.chunks(MAX_PLAINTEXT)
                .try_for_each(|chunk| self.channel.queue_v3_record(ContentType::ApplicationData, chunk))
        };
        if let Err(err) = queued {
            return Err(self.fail(err));
        }
        match self.channel.flush() {
            Ok(()) | Err(TlsError::WouldBlock) => Ok(buf.len()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn shutdown_impl(&mut self) -> Result<(), TlsError> {
        match self.channel.state {
            ConnectionState::Error => return Err(self.channel.dead_error()),
            ConnectionState::GracefulClose | ConnectionState::NoNotifyClose => return Ok(()),
            _ => {}
        }
        if self.channel.config.quiet_shutdown || self.channel.framing == Framing::V2 {
            self.channel.state = ConnectionState::NoNotifyClose;
            return Ok(());
        }
        if !self.channel.sent_close_notify {
            if let Err(err) = self
                .channel
                .queue_alert(Alert::warning(AlertDescription::CloseNotify))
            {
                return Err(self.fail(err));
            }
            self.channel.sent_close_notify = true;
        }
        match self.channel.flush() {
            Ok(()) => {}
            Err(TlsError::WouldBlock) => return Err(TlsError::WouldBlock),
            Err(err) => return Err(self.fail(err)),
        }
        self.channel.state = ConnectionState::GracefulClose;
        Ok(())
    }
}

impl<S: Read + Write> TlsConnection for TlsClientConnection<S> {
    fn handshake(&mut self) -> Result<(), TlsError> {
        self.handshake_impl()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.read_impl(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError> {
        self.write_impl(buf)
    }

    fn shutdown(&mut self) -> Result<(), TlsError> {
        self.shutdown_impl()
    }

    fn version(&self) -> Option<TlsVersion> {
        if self.v2_engine.is_some() {
            Some(TlsVersion::Ssl2)
        } else {
            self.engine.version()
        }
    }

    fn cipher_suite(&self) -> Option<CipherSuite> {
        match &self.v2_engine {
            Some(engine) => engine.cipher_suite(),
            None => self.engine.cipher_suite(),
        }
    }
}
