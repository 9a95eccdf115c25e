use std::io;

use thiserror::Error;

/// Ergonomic guard for codec and verification invariants.
#[macro_export]
macro_rules! require {
    ($expr:expr, $err:expr) => {
        if !$expr {
            return Err($err.into());
        }
    };
}

#[derive(Debug, Error)]
pub enum VaaError {
    // Payload errors
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unknown payload type: expected {expected}, found {found}")]
    UnknownPayloadType {
        expected: &'static str,
        found: String,
    },
    #[error("{field} is too long ({len} bytes); max {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    // Envelope errors
    #[error("truncated VAA: could not read {0}")]
    TruncatedVaa(&'static str),
    #[error("unsupported VAA version {0}")]
    UnsupportedVersion(u8),
    #[error("too many signatures ({0}); max 255")]
    TooManySignatures(usize),
    #[error("guardian index {0} signs more than once")]
    DuplicateGuardianIndex(u8),

    // Verification errors
    #[error("quorum not met: {valid} valid guardian signatures, {required} required")]
    QuorumNotMet { valid: usize, required: usize },
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] secp256k1::Error),
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("unknown guardian set {0}")]
    UnknownGuardianSet(u32),
    #[error("guardian set {0} has expired")]
    GuardianSetExpired(u32),

    // Interchange errors
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl VaaError {
    /// Maps a short read inside a payload to `MalformedPayload`, naming the field that ran out.
    pub(crate) fn short_payload(field: &'static str) -> impl FnOnce(io::Error) -> VaaError {
        move |_| VaaError::MalformedPayload(format!("unexpected end of input reading {field}"))
    }

    /// Maps a short read inside the envelope to `TruncatedVaa`.
    pub(crate) fn truncated(field: &'static str) -> impl FnOnce(io::Error) -> VaaError {
        move |_| VaaError::TruncatedVaa(field)
    }
}
