//! Blocking connection drivers over a `Read + Write` transport.
//!
//! A connection owns the transport, the record framing in both
//! directions, and one handshake engine per protocol family; the engines
//! stay pure and every byte of IO happens here. All entry points
//! tolerate non-blocking transports: `WouldBlock` surfaces to the caller
//! with the outgoing queue and reassembly state intact, and the next
//! call resumes where the transport stalled.

mod client;
mod server;
#[cfg(test)]
mod tests;

pub use client::TlsClientConnection;
pub use server::TlsServerConnection;

use std::io::{Read, Write};
use std::sync::Arc;

use crate::alert::{alert_for_error, Alert, AlertDescription};
use crate::config::TlsConfig;
use crate::handshake::{HandshakeReassembly, OutboundOp, PendingCipher};
use crate::record::{
    encode_header, parse_preface, parse_ssl2_preface, CipherContext, ContentType, RecordPreface,
    RecordQueue, MAX_PLAINTEXT, V3_HEADER_LEN,
};
use crate::session::TlsSession;
use crate::ssl2::engine::Ssl2Keys;
use crate::ssl2::{encode_error, encode_record_header, Ssl2Cipher, MAC_LEN, MAX_THREE_BYTE_RECORD};
use crate::{TlsRole, TlsVersion};
use seclink_types::{CipherDirection, TlsError};

/// Largest application chunk per SSL 2.0 record, leaving room for the
/// MAC and block padding under the 3-byte header's length field.
pub(crate) const V2_MAX_PLAINTEXT: usize = MAX_THREE_BYTE_RECORD - MAC_LEN - 8;

const READ_CHUNK: usize = 4096;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Driving the initial handshake.
    Handshaking,
    /// Application data may flow. Renegotiations run inside this state.
    Connected,
    /// Closed via close_notify, or a clean transport close under SSL 2.0.
    GracefulClose,
    /// Closed without the closure exchange.
    NoNotifyClose,
    /// A fatal error or alert ended the connection.
    Error,
}

/// Which framing incoming bytes are parsed under. A connection starts
/// undecided only while an SSL 2.0 hello may still legitimately appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    Undecided,
    V3,
    V2,
}

/// SSL 2.0 record protection, both directions.
pub(crate) struct V2Channel {
    pub read: Ssl2Cipher,
    pub write: Ssl2Cipher,
}

/// Transport, framing and cipher state shared by both roles.
pub(crate) struct Channel<S> {
    pub transport: S,
    pub config: Arc<TlsConfig>,
    pub role: TlsRole,
    pub state: ConnectionState,
    pub framing: Framing,
    read_buf: Vec<u8>,
    pub queue: RecordQueue,
    read_cipher: CipherContext,
    write_cipher: CipherContext,
    pending_read: Option<CipherContext>,
    pending_write: Option<CipherContext>,
    pub reassembly: HandshakeReassembly,
    app_data: Vec<u8>,
    pub v2: Option<V2Channel>,
    /// Version stamped on outgoing v3 record headers. The maximum
    /// enabled version until the handshake commits, then the negotiated
    /// one.
    pub wire_version: TlsVersion,
    pub sent_close_notify: bool,
    failure: Option<String>,
}

impl<S: Read + Write> Channel<S> {
    pub fn new(transport: S, config: Arc<TlsConfig>, role: TlsRole) -> Self {
        let wire_version = config.max_version.max(TlsVersion::Ssl3);
        Channel {
            transport,
            config,
            role,
            state: ConnectionState::Handshaking,
            framing: Framing::Undecided,
            read_buf: Vec::new(),
            queue: RecordQueue::new(),
            read_cipher: CipherContext::null(wire_version),
            write_cipher: CipherContext::null(wire_version),
            pending_read: None,
            pending_write: None,
            reassembly: HandshakeReassembly::new(),
            app_data: Vec::new(),
            v2: None,
            wire_version,
            sent_close_notify: false,
            failure: None,
        }
    }

    pub fn flush(&mut self) -> Result<(), TlsError> {
        self.queue.flush(&mut self.transport)
    }

    /// Read transport bytes until one whole record is buffered, then
    /// detach and return it. A v3 preface in the undecided phase commits
    /// the connection to v3 framing for good.
    pub fn next_record(&mut self) -> Result<(RecordPreface, Vec<u8>), TlsError> {
        loop {
            let preface = match self.framing {
                Framing::V3 => parse_preface(&self.read_buf, false)?,
                Framing::V2 => parse_ssl2_preface(&self.read_buf)?,
                Framing::Undecided => parse_preface(&self.read_buf, true)?,
            };
            if let Some(preface) = preface {
                let total = preface.header_len() + preface.body_len();
                if self.read_buf.len() >= total {
                    if matches!(preface, RecordPreface::V3 { .. }) {
                        self.framing = Framing::V3;
                        self.v2 = None;
                    }
                    let body = self.read_buf[preface.header_len()..total].to_vec();
                    self.read_buf.drain(..total);
                    return Ok((preface, body));
                }
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<(), TlsError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk)?;
        if n == 0 {
            return Err(self.classify_eof());
        }
        self.read_buf.extend_from_slice(&chunk[..n]);
        Ok(())
    }

    /// SSL 2.0 has no closure alert, so a transport close after its
    /// handshake is the cleanest shutdown the protocol knows. Everywhere
    /// else an unannounced close is suspect.
    fn classify_eof(&self) -> TlsError {
        match (self.state, self.framing) {
            (ConnectionState::GracefulClose, _) => TlsError::ClosedGraceful,
            (ConnectionState::Connected, Framing::V2) => TlsError::ClosedGraceful,
            _ => TlsError::ClosedNoNotify,
        }
    }

    pub fn open_v3(&mut self, content_type: ContentType, body: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.read_cipher
            .open(self.config.provider.as_ref(), content_type as u8, body)
    }

    pub fn open_v2(&mut self, body: &[u8], padding: u8) -> Result<Vec<u8>, TlsError> {
        let v2 = self
            .v2
            .as_mut()
            .ok_or_else(|| TlsError::InternalError("no SSL 2.0 record state".into()))?;
        v2.read.open(self.config.provider.as_ref(), body, padding)
    }

    pub fn queue_v3_record(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<(), TlsError> {
        let body = self
            .write_cipher
            .seal(self.config.provider.as_ref(), content_type as u8, payload)?;
        let mut record = Vec::with_capacity(V3_HEADER_LEN + body.len());
        record.extend_from_slice(&encode_header(content_type, self.wire_version, body.len()));
        record.extend_from_slice(&body);
        self.queue.push(record);
        Ok(())
    }

    pub fn queue_v2_record(&mut self, payload: &[u8]) -> Result<(), TlsError> {
        let v2 = self
            .v2
            .as_mut()
            .ok_or_else(|| TlsError::InternalError("no SSL 2.0 record state".into()))?;
        let (body, padding) = v2.write.seal(self.config.provider.as_ref(), payload)?;
        let mut record = encode_record_header(body.len(), padding)?;
        record.extend_from_slice(&body);
        self.queue.push(record);
        Ok(())
    }

    pub fn queue_alert(&mut self, alert: Alert) -> Result<(), TlsError> {
        self.queue_v3_record(ContentType::Alert, &alert.to_bytes())
    }

    /// Run one engine step's operations in order.
    pub fn execute_ops(&mut self, ops: Vec<OutboundOp>) -> Result<(), TlsError> {
        for op in ops {
            match op {
                OutboundOp::InstallPending(pending) => self.install_pending(*pending)?,
                OutboundOp::SendHandshake(msg) => {
                    for chunk in msg.chunks(MAX_PLAINTEXT) {
                        self.queue_v3_record(ContentType::Handshake, chunk)?;
                    }
                }
                OutboundOp::SendChangeCipherSpec => self.send_change_cipher_spec()?,
                OutboundOp::SendWarningAlert(alert) => self.queue_alert(alert)?,
            }
        }
        Ok(())
    }

    /// Stage both directions of the next cipher state. The split maps
    /// handshake-level client/server keys onto this endpoint's read and
    /// write sides.
    fn install_pending(&mut self, pending: PendingCipher) -> Result<(), TlsError> {
        let (write_keys, read_keys) = match self.role {
            TlsRole::Client => (&pending.keys.client, &pending.keys.server),
            TlsRole::Server => (&pending.keys.server, &pending.keys.client),
        };
        self.pending_write = Some(CipherContext::new(
            self.config.provider.as_ref(),
            pending.params,
            pending.version,
            write_keys,
            CipherDirection::Encrypt,
        )?);
        self.pending_read = Some(CipherContext::new(
            self.config.provider.as_ref(),
            pending.params,
            pending.version,
            read_keys,
            CipherDirection::Decrypt,
        )?);
        Ok(())
    }

    /// The ChangeCipherSpec record itself still travels under the old
    /// write state; everything after runs under the staged keys.
    fn send_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        self.queue_v3_record(ContentType::ChangeCipherSpec, &[1])?;
        self.write_cipher = self
            .pending_write
            .take()
            .ok_or_else(|| TlsError::InternalError("ChangeCipherSpec without staged keys".into()))?;
        Ok(())
    }

    /// The peer's ChangeCipherSpec switches the read direction.
    pub fn activate_pending_read(&mut self) -> Result<(), TlsError> {
        self.read_cipher = self.pending_read.take().ok_or_else(|| {
            TlsError::ProtocolError("ChangeCipherSpec without negotiated keys".into())
        })?;
        Ok(())
    }

    /// Activate both SSL 2.0 directions with the derived split.
    pub fn activate_v2(&mut self, keys: &Ssl2Keys) -> Result<(), TlsError> {
        let v2 = self
            .v2
            .as_mut()
            .ok_or_else(|| TlsError::InternalError("no SSL 2.0 record state".into()))?;
        v2.read.activate(
            self.config.provider.as_ref(),
            &keys.params,
            &keys.read_key,
            &keys.iv,
            CipherDirection::Decrypt,
        )?;
        v2.write.activate(
            self.config.provider.as_ref(),
            &keys.params,
            &keys.write_key,
            &keys.iv,
            CipherDirection::Encrypt,
        )?;
        Ok(())
    }

    pub fn ensure_v2(&mut self) {
        if self.v2.is_none() {
            self.v2 = Some(V2Channel {
                read: Ssl2Cipher::new(),
                write: Ssl2Cipher::new(),
            });
        }
    }

    pub fn push_app_data(&mut self, data: &[u8]) {
        self.app_data.extend_from_slice(data);
    }

    pub fn has_app_data(&self) -> bool {
        !self.app_data.is_empty()
    }

    pub fn take_app_data(&mut self, buf: &mut [u8]) -> usize {
        let n = self.app_data.len().min(buf.len());
        buf[..n].copy_from_slice(&self.app_data[..n]);
        self.app_data.drain(..n);
        n
    }

    /// Answer an incoming close_notify and mark the connection cleanly
    /// closed. Returns the closure error the caller propagates.
    pub fn handle_close_notify(&mut self) -> TlsError {
        if !self.sent_close_notify && !self.config.quiet_shutdown {
            if self
                .queue_alert(Alert::warning(AlertDescription::CloseNotify))
                .is_ok()
            {
                self.sent_close_notify = true;
                let _ = self.flush();
            }
        }
        self.state = ConnectionState::GracefulClose;
        TlsError::ClosedGraceful
    }

    /// Drop pending traffic and push one fatal alert, best effort.
    fn send_fatal_alert(&mut self, description: AlertDescription) {
        self.queue.clear();
        if self.queue_alert(Alert::fatal(description)).is_ok() {
            let _ = self.flush();
        }
    }

    /// Drop pending traffic and push one SSL 2.0 error message, best
    /// effort.
    pub fn send_v2_error(&mut self, code: u16) {
        self.queue.clear();
        if self.queue_v2_record(&encode_error(code)).is_ok() {
            let _ = self.flush();
        }
    }

    /// Settle a failed operation: classify closures, send the final alert
    /// where one belongs, poison the cached session, and latch the error
    /// state. `WouldBlock` passes through untouched.
    pub fn fail(&mut self, err: TlsError, engine_alert: Option<AlertDescription>) -> TlsError {
        if err.is_would_block() {
            return err;
        }
        match &err {
            TlsError::ClosedGraceful => {
                self.state = ConnectionState::GracefulClose;
                return err;
            }
            TlsError::ClosedNoNotify => {
                self.state = ConnectionState::NoNotifyClose;
                return err;
            }
            TlsError::AlertReceived(_) => {
                self.evict_session();
                self.failure = Some(err.to_string());
                self.state = ConnectionState::Error;
                return err;
            }
            _ => {}
        }
        if self.framing != Framing::V2 {
            let description =
                engine_alert.or_else(|| alert_for_error(&err, self.wire_version));
            if let Some(description) = description {
                self.send_fatal_alert(description);
            }
        }
        self.evict_session();
        self.failure = Some(err.to_string());
        self.state = ConnectionState::Error;
        err
    }

    /// The error handed out once the connection is dead.
    pub fn dead_error(&self) -> TlsError {
        match &self.failure {
            Some(reason) => {
                TlsError::InternalError(format!("connection already failed: {reason}"))
            }
            None => TlsError::InternalError("connection already failed".into()),
        }
    }

    pub fn store_session(&mut self, session: TlsSession) {
        if let (Some(identity), Some(cache)) =
            (&self.config.peer_identity, &self.config.session_cache)
        {
            if let Ok(mut guard) = cache.lock() {
                guard.put(identity.as_bytes(), session);
            }
        }
    }

    /// A failed or aborted exchange poisons whatever session this peer
    /// had cached.
    pub fn evict_session(&mut self) {
        if let (Some(identity), Some(cache)) =
            (&self.config.peer_identity, &self.config.session_cache)
        {
            if let Ok(mut guard) = cache.lock() {
                guard.remove(identity.as_bytes());
            }
        }
    }
}
