//! Session management and resumption.
//!
//! Servers hand out a session ID with each full handshake; clients offer a
//! cached ID back and both sides shortcut to ChangeCipherSpec when the
//! server accepts it. The cached record pins the protocol version, so a
//! session never resumes across versions.

use crate::codec::WireReader;
use crate::{CipherSuite, TlsVersion};
use seclink_types::TlsError;
use std::collections::HashMap;
use zeroize::Zeroize;

/// Maximum session ID length on the wire.
pub const MAX_SESSION_ID_LEN: usize = 32;

/// A completed handshake's resumable state.
#[derive(Debug, Clone)]
pub struct TlsSession {
    /// Session identifier the server assigned.
    pub id: Vec<u8>,
    /// Protocol version the session was established under.
    pub version: TlsVersion,
    /// The negotiated cipher suite.
    pub cipher_suite: CipherSuite,
    /// 48-byte master secret.
    pub master_secret: Vec<u8>,
    /// Peer certificate chain, root first. Empty when the peer sent none.
    pub peer_chain: Vec<Vec<u8>>,
    /// Timestamp when the session was created (seconds since UNIX epoch).
    pub created_at: u64,
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl TlsSession {
    /// Whether this cached session may be offered for a handshake pinned
    /// to `version`.
    pub fn usable_for(&self, version: TlsVersion) -> bool {
        self.version == version
    }
}

/// Session cache for storing and retrieving sessions.
pub trait SessionCache: Send + Sync {
    /// Store a session under its ID.
    fn put(&mut self, key: &[u8], session: TlsSession);
    /// Retrieve a session.
    fn get(&self, key: &[u8]) -> Option<&TlsSession>;
    /// Remove a session, e.g. after a handshake failure poisons it.
    fn remove(&mut self, key: &[u8]);
}

/// In-memory session cache with a maximum size limit and optional TTL
/// expiration.
pub struct InMemorySessionCache {
    sessions: HashMap<Vec<u8>, TlsSession>,
    max_size: usize,
    /// Session lifetime in seconds. 0 means no expiry.
    session_lifetime: u64,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl InMemorySessionCache {
    /// Create a new cache with the given maximum number of sessions and
    /// the default two-hour lifetime.
    pub fn new(max_size: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_size,
            session_lifetime: 7200,
        }
    }

    /// Create a new cache with a custom session lifetime in seconds.
    /// A lifetime of 0 means sessions never expire.
    pub fn with_lifetime(max_size: usize, lifetime_secs: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            max_size,
            session_lifetime: lifetime_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove all expired sessions from the cache.
    pub fn cleanup(&mut self) {
        if self.session_lifetime == 0 {
            return;
        }
        let now = now_secs();
        self.sessions
            .retain(|_, session| now.saturating_sub(session.created_at) <= self.session_lifetime);
    }

    fn is_expired(&self, session: &TlsSession) -> bool {
        if self.session_lifetime == 0 {
            return false;
        }
        now_secs().saturating_sub(session.created_at) > self.session_lifetime
    }
}

/// Encode a session for storage outside the process.
///
/// Format: `version(2) || suite(2) || id_len(1) || id || ms_len(2) ||
/// master_secret || chain_count(1) || (cert_len(3) || cert)* || created_at(8)`
pub fn encode_session_state(session: &TlsSession) -> Vec<u8> {
    let mut data = Vec::with_capacity(64 + session.master_secret.len());
    data.extend_from_slice(&session.version.wire().to_be_bytes());
    data.extend_from_slice(&session.cipher_suite.0.to_be_bytes());
    data.push(session.id.len() as u8);
    data.extend_from_slice(&session.id);
    data.extend_from_slice(&(session.master_secret.len() as u16).to_be_bytes());
    data.extend_from_slice(&session.master_secret);
    data.push(session.peer_chain.len() as u8);
    for cert in &session.peer_chain {
        let len = cert.len() as u32;
        data.extend_from_slice(&len.to_be_bytes()[1..]);
        data.extend_from_slice(cert);
    }
    data.extend_from_slice(&session.created_at.to_be_bytes());
    data
}

/// Decode a stored session. Truncated or malformed blobs are an error.
pub fn decode_session_state(data: &[u8]) -> Result<TlsSession, TlsError> {
    let mut r = WireReader::new(data);
    let version_wire = r.take_u16()?;
    let version = TlsVersion::from_wire(version_wire).ok_or_else(|| {
        TlsError::ProtocolError(format!("session state: version 0x{version_wire:04x}"))
    })?;
    let cipher_suite = CipherSuite(r.take_u16()?);
    let id = r.take_u8_prefixed()?.to_vec();
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(TlsError::ProtocolError("session state: id too long".into()));
    }
    let master_secret = r.take_u16_prefixed()?.to_vec();
    let chain_count = r.take_u8()?;
    let mut peer_chain = Vec::with_capacity(usize::from(chain_count));
    for _ in 0..chain_count {
        peer_chain.push(r.take_u24_prefixed()?.to_vec());
    }
    let created_at = u64::from_be_bytes(
        r.take(8)?
            .try_into()
            .map_err(|_| TlsError::InternalError("session state: created_at".into()))?,
    );
    r.expect_end()?;
    Ok(TlsSession {
        id,
        version,
        cipher_suite,
        master_secret,
        peer_chain,
        created_at,
    })
}

impl SessionCache for InMemorySessionCache {
    fn put(&mut self, key: &[u8], session: TlsSession) {
        if self.sessions.len() >= self.max_size && !self.sessions.contains_key(key) {
            // Evict an arbitrary entry; resumption is an optimization and
            // a miss only costs a full handshake.
            if let Some(first_key) = self.sessions.keys().next().cloned() {
                self.sessions.remove(&first_key);
            }
        }
        self.sessions.insert(key.to_vec(), session);
    }

    fn get(&self, key: &[u8]) -> Option<&TlsSession> {
        let session = self.sessions.get(key)?;
        // Lazy expiration: expired entries read as absent.
        if self.is_expired(session) {
            return None;
        }
        Some(session)
    }

    fn remove(&mut self, key: &[u8]) {
        self.sessions.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(id: &[u8], version: TlsVersion, suite: u16) -> TlsSession {
        TlsSession {
            id: id.to_vec(),
            version,
            cipher_suite: CipherSuite(suite),
            master_secret: vec![0xAB; 48],
            peer_chain: Vec::new(),
            created_at: now_secs(),
        }
    }

    #[test]
    fn test_cache_put_get() {
        let mut cache = InMemorySessionCache::new(10);
        cache.put(b"key1", make_session(b"key1", TlsVersion::Tls10, 0x0005));
        let s = cache.get(b"key1").unwrap();
        assert_eq!(s.cipher_suite.0, 0x0005);
        assert_eq!(s.version, TlsVersion::Tls10);
    }

    #[test]
    fn test_cache_get_missing() {
        let cache = InMemorySessionCache::new(10);
        assert!(cache.get(b"nonexistent").is_none());
    }

    #[test]
    fn test_cache_remove() {
        let mut cache = InMemorySessionCache::new(10);
        cache.put(b"key1", make_session(b"key1", TlsVersion::Ssl3, 0x000A));
        assert!(cache.get(b"key1").is_some());
        cache.remove(b"key1");
        assert!(cache.get(b"key1").is_none());
    }

    #[test]
    fn test_cache_eviction_respects_max_size() {
        let mut cache = InMemorySessionCache::new(2);
        cache.put(b"a", make_session(b"a", TlsVersion::Tls10, 1));
        cache.put(b"b", make_session(b"b", TlsVersion::Tls10, 2));
        cache.put(b"c", make_session(b"c", TlsVersion::Tls10, 3));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(b"c").is_some());
    }

    #[test]
    fn test_cache_overwrite_same_key() {
        let mut cache = InMemorySessionCache::new(10);
        cache.put(b"key1", make_session(b"key1", TlsVersion::Tls10, 0x0004));
        cache.put(b"key1", make_session(b"key1", TlsVersion::Tls10, 0x0005));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(b"key1").unwrap().cipher_suite.0, 0x0005);
    }

    #[test]
    fn test_cache_ttl_expired() {
        let mut cache = InMemorySessionCache::with_lifetime(10, 3600);
        let mut session = make_session(b"key1", TlsVersion::Tls10, 0x0005);
        session.created_at = now_secs() - 7200;
        cache.put(b"key1", session);
        assert!(cache.get(b"key1").is_none());
    }

    #[test]
    fn test_cache_ttl_zero_never_expires() {
        let mut cache = InMemorySessionCache::with_lifetime(10, 0);
        let mut session = make_session(b"key1", TlsVersion::Tls10, 0x0005);
        session.created_at = 1;
        cache.put(b"key1", session);
        assert!(cache.get(b"key1").is_some());
    }

    #[test]
    fn test_cleanup_drops_only_expired() {
        let mut cache = InMemorySessionCache::with_lifetime(10, 3600);
        cache.put(b"fresh", make_session(b"fresh", TlsVersion::Tls10, 1));
        let mut stale = make_session(b"stale", TlsVersion::Tls10, 2);
        stale.created_at = now_secs() - 7200;
        cache.put(b"stale", stale);

        assert_eq!(cache.len(), 2);
        cache.cleanup();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(b"fresh").is_some());
    }

    #[test]
    fn test_session_state_round_trip() {
        let mut session = make_session(b"abcdef", TlsVersion::Tls10, 0x000A);
        session.peer_chain = vec![vec![1, 2, 3], vec![4, 5]];
        let blob = encode_session_state(&session);
        let decoded = decode_session_state(&blob).unwrap();
        assert_eq!(decoded.id, session.id);
        assert_eq!(decoded.version, TlsVersion::Tls10);
        assert_eq!(decoded.cipher_suite, session.cipher_suite);
        assert_eq!(decoded.master_secret, session.master_secret);
        assert_eq!(decoded.peer_chain, session.peer_chain);
        assert_eq!(decoded.created_at, session.created_at);
    }

    #[test]
    fn test_session_state_truncated_rejected() {
        let session = make_session(b"abcdef", TlsVersion::Ssl3, 0x0005);
        let blob = encode_session_state(&session);
        for cut in [0, 1, 4, blob.len() - 1] {
            assert!(decode_session_state(&blob[..cut]).is_err());
        }
        let mut padded = blob.clone();
        padded.push(0);
        assert!(decode_session_state(&padded).is_err());
    }

    #[test]
    fn test_session_state_unknown_version_rejected() {
        let session = make_session(b"x", TlsVersion::Tls10, 0x0005);
        let mut blob = encode_session_state(&session);
        blob[0] = 0x07;
        blob[1] = 0x07;
        assert!(decode_session_state(&blob).is_err());
    }

    #[test]
    fn test_session_version_pinning() {
        let session = make_session(b"x", TlsVersion::Tls10, 0x0005);
        assert!(session.usable_for(TlsVersion::Tls10));
        assert!(!session.usable_for(TlsVersion::Ssl3));
    }

    #[test]
    fn test_cache_shared_via_arc_mutex() {
        use std::sync::{Arc, Mutex};
        use std::thread;

        let cache: Arc<Mutex<dyn SessionCache>> =
            Arc::new(Mutex::new(InMemorySessionCache::new(64)));
        let mut handles = Vec::new();
        for i in 0u8..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0u8..8 {
                    let key = vec![i, j];
                    cache
                        .lock()
                        .unwrap()
                        .put(&key, make_session(&key, TlsVersion::Tls10, 0x0005));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.lock().unwrap().get(&[0, 0]).is_some());
    }
}
