/// Hash algorithm identifiers.
///
/// The protocol generations covered here (SSL 3.0 / TLS 1.0 and the SSL 2.0
/// compatibility path) only ever use MD5 and SHA-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Md5,
    Sha1,
}

impl HashAlgId {
    /// Digest output size in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            HashAlgId::Md5 => 16,
            HashAlgId::Sha1 => 20,
        }
    }

    /// Compression function block size in bytes (64 for both MD5 and SHA-1).
    pub fn block_size(&self) -> usize {
        64
    }
}

/// MAC algorithm identifiers.
///
/// `Null` is a real algorithm here: the initial record cipher state and the
/// NULL-MAC suites use it, producing a zero-length tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgId {
    Null,
    HmacMd5,
    HmacSha1,
}

impl MacAlgId {
    /// MAC output size in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            MacAlgId::Null => 0,
            MacAlgId::HmacMd5 => 16,
            MacAlgId::HmacSha1 => 20,
        }
    }

    /// The underlying hash, if any.
    pub fn hash(&self) -> Option<HashAlgId> {
        match self {
            MacAlgId::Null => None,
            MacAlgId::HmacMd5 => Some(HashAlgId::Md5),
            MacAlgId::HmacSha1 => Some(HashAlgId::Sha1),
        }
    }
}

/// Symmetric cipher algorithm identifiers (algorithm + mode combination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    /// Identity transform (initial record state, NULL suites).
    Null,
    Rc4,
    Rc2Cbc,
    DesCbc,
    TripleDesCbc,
}

impl CipherAlgId {
    /// Block size in bytes; 1 for stream ciphers and the null transform.
    pub fn block_size(&self) -> usize {
        match self {
            CipherAlgId::Null | CipherAlgId::Rc4 => 1,
            CipherAlgId::Rc2Cbc | CipherAlgId::DesCbc | CipherAlgId::TripleDesCbc => 8,
        }
    }

    /// Returns true for block ciphers that need CBC padding and an IV.
    pub fn is_block(&self) -> bool {
        self.block_size() > 1
    }
}

/// Which way a symmetric cipher instance transforms data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherDirection {
    Encrypt,
    Decrypt,
}
