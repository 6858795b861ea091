//! Persisted plan state.
//!
//! The plan travels between invocations as an opaque string:
//! base64 of `[version][compression][payload]`, where the payload is the plan
//! encoded with bincode and optionally compressed with zstd.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::borrow::Cow;
use std::io;

use crate::plan::{FailoverPlan, PlanSource};

pub const FORMAT_VERSION: u8 = 1;

const TAG_NONE: u8 = 0;
const TAG_ZSTD: u8 = 1;

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("state is too short to hold a header")]
    Truncated,

    #[error("unsupported state version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown compression tag {0}")]
    UnknownCompression(u8),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    // zstd with compression level
    Zstd(i32),
}

impl Compression {
    fn tag(&self) -> u8 {
        match self {
            Compression::None => TAG_NONE,
            Compression::Zstd(_) => TAG_ZSTD,
        }
    }
}

/// Encodes plans into state strings and back.
///
/// The compression setting only affects encoding. Decoding reads the
/// compression from the header, so a codec can read state written by any other.
pub struct StateCodec {
    compression: Compression,
    config: bincode::config::Configuration,
}

impl Default for StateCodec {
    fn default() -> Self {
        StateCodec::new(Compression::None)
    }
}

impl StateCodec {
    pub fn new(compression: Compression) -> Self {
        StateCodec {
            compression,
            // standard defaults to little-endian + varint
            config: bincode::config::standard(),
        }
    }

    pub fn encode(&self, plan: &FailoverPlan) -> Result<String, StateError> {
        let payload = bincode::serde::encode_to_vec(plan, self.config)?;

        let mut bytes = vec![FORMAT_VERSION, self.compression.tag()];
        match self.compression {
            Compression::None => bytes.extend_from_slice(&payload),
            Compression::Zstd(level) => {
                bytes.extend(zstd::stream::encode_all(payload.as_slice(), level)?)
            }
        }

        Ok(STANDARD.encode(bytes))
    }

    pub fn decode(&self, state: &str) -> Result<FailoverPlan, StateError> {
        let bytes = STANDARD.decode(state.trim().as_bytes())?;

        let [version, tag, payload @ ..] = bytes.as_slice() else {
            return Err(StateError::Truncated);
        };

        if *version != FORMAT_VERSION {
            return Err(StateError::UnsupportedVersion(*version));
        }

        let payload: Cow<'_, [u8]> = match *tag {
            TAG_NONE => Cow::Borrowed(payload),
            TAG_ZSTD => Cow::Owned(zstd::stream::decode_all(payload)?),
            other => return Err(StateError::UnknownCompression(other)),
        };

        let (plan, read): (FailoverPlan, usize) =
            bincode::serde::decode_from_slice(&payload, self.config)?;
        if read != payload.len() {
            return Err(StateError::TrailingBytes(payload.len() - read));
        }

        Ok(plan)
    }

    /// Decodes state written by a previous invocation and marks its provenance.
    pub fn load(&self, state: &str) -> Result<FailoverPlan, StateError> {
        let mut plan = self.decode(state)?;
        plan.source = PlanSource::State;
        Ok(plan)
    }
}
