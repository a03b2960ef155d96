//! Running handshake transcript hashes.
//!
//! Both protocol generations hash every handshake message (HelloRequest
//! excluded) into parallel MD5 and SHA-1 contexts. Finished and
//! CertificateVerify read the transcript mid-handshake, so snapshots are
//! taken by cloning the digest state, never by finalizing the originals.

use seclink_provider::{CryptoProvider, Digest};
use seclink_types::{CryptoError, HashAlgId};

pub struct Transcript {
    md5: Box<dyn Digest>,
    sha1: Box<dyn Digest>,
}

impl Transcript {
    pub fn new(provider: &dyn CryptoProvider) -> Result<Self, CryptoError> {
        Ok(Transcript {
            md5: provider.digest(HashAlgId::Md5)?,
            sha1: provider.digest(HashAlgId::Sha1)?,
        })
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.md5.update(data)?;
        self.sha1.update(data)?;
        Ok(())
    }

    /// Snapshot the current MD5 and SHA-1 values without disturbing the
    /// running state.
    pub fn current(&self) -> Result<([u8; 16], [u8; 20]), CryptoError> {
        let mut md5 = [0u8; 16];
        let mut sha1 = [0u8; 20];
        self.md5.clone_state().finish(&mut md5)?;
        self.sha1.clone_state().finish(&mut sha1)?;
        Ok((md5, sha1))
    }

    /// Clone both running contexts. The SSL 3.0 constructions append
    /// trailer material to the transcript before finalizing.
    pub fn fork(&self) -> (Box<dyn Digest>, Box<dyn Digest>) {
        (self.md5.clone_state(), self.sha1.clone_state())
    }

    /// Restart the transcript for a renegotiation.
    pub fn reset(&mut self) {
        self.md5.reset();
        self.sha1.reset();
    }
}
