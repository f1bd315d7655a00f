//! Persisted executable container.
//!
//! ```text
//! 0      4        5      6          8              16             48
//! ┌──────┬────────┬──────┬──────────┬──────────────┬──────────────┬─────────┐
//! │ IPUX │ version│ flags│ reserved │ payload len  │ SHA3-256     │ payload │
//! └──────┴────────┴──────┴──────────┴──────────────┴──────────────┴─────────┘
//! ```
//!
//! All integers are little endian. The payload is the JSON encoded
//! [`Executable`].

use sha3::{Digest, Sha3_256};

use super::{Executable, RuntimeError};

/// Magic bytes for persisted executables.
pub const MAGIC: &[u8; 4] = b"IPUX";

/// Current format version.
pub const VERSION: u8 = 1;

/// Total header size.
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 2 + 8 + 32; // 48 bytes

pub const FLAG_INSTRUMENTED: u8 = 1 << 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub flags: u8,
    pub reserved: [u8; 2],
    pub payload_len: u64,
    pub payload_hash: [u8; 32],
}

impl ExecutableHeader {
    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RuntimeError> {
        if data.len() < HEADER_SIZE {
            return Err(RuntimeError::Malformed("data too short for header"));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[0..4]);

        let version = data[4];
        let flags = data[5];

        let mut reserved = [0u8; 2];
        reserved.copy_from_slice(&data[6..8]);

        let mut len = [0u8; 8];
        len.copy_from_slice(&data[8..16]);
        let payload_len = u64::from_le_bytes(len);

        let mut payload_hash = [0u8; 32];
        payload_hash.copy_from_slice(&data[16..48]);

        Ok(Self {
            magic,
            version,
            flags,
            reserved,
            payload_len,
            payload_hash,
        })
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];

        out[0..4].copy_from_slice(&self.magic);
        out[4] = self.version;
        out[5] = self.flags;
        out[6..8].copy_from_slice(&self.reserved);
        out[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out[16..48].copy_from_slice(&self.payload_hash);

        out
    }
}

fn digest(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// Encode an executable into a self-checking container.
pub fn encode(executable: &Executable) -> Result<Vec<u8>, RuntimeError> {
    let payload = serde_json::to_vec(executable).map_err(RuntimeError::Encode)?;

    let header = ExecutableHeader {
        magic: *MAGIC,
        version: VERSION,
        flags: if executable.instrumented {
            FLAG_INSTRUMENTED
        } else {
            0
        },
        reserved: [0; 2],
        payload_len: payload.len() as u64,
        payload_hash: digest(&payload),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode and verify a container produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Executable, RuntimeError> {
    let header = ExecutableHeader::from_bytes(data)?;

    if header.magic != *MAGIC {
        return Err(RuntimeError::Malformed("invalid magic bytes"));
    }

    if header.version != VERSION {
        return Err(RuntimeError::UnsupportedVersion {
            found: header.version,
            expected: VERSION,
        });
    }

    let payload = &data[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(RuntimeError::Malformed("payload length mismatch"));
    }

    if digest(payload) != header.payload_hash {
        return Err(RuntimeError::DigestMismatch);
    }

    let executable: Executable = serde_json::from_slice(payload).map_err(RuntimeError::Decode)?;

    if executable.instrumented != (header.flags & FLAG_INSTRUMENTED != 0) {
        return Err(RuntimeError::Malformed("header flags disagree with payload"));
    }

    Ok(executable)
}
