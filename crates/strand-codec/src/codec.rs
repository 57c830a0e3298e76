use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

pub const CODEC_VERSION: u8 = 1;
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Encoded descriptor, safe to hand to a UI layer as a plain string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opaque(String);

impl Opaque {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Opaque {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Codec for tagged descriptors.
///
/// Frame layout before hex encoding:
/// `[1 byte version][1 byte tag len][tag][4 bytes payload len][bincode payload]`
pub struct LoaderCodec;

impl LoaderCodec {
    pub fn encode<T: Serialize>(tag: &str, data: &T) -> CodecResult<Opaque> {
        let tag_bytes = tag.as_bytes();
        let tag_len = u8::try_from(tag_bytes.len())
            .map_err(|_| CodecError::TagTooLong(tag_bytes.len()))?;
        let payload =
            bincode::serialize(data).map_err(|e| CodecError::Serialization(e.to_string()))?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = Vec::with_capacity(2 + tag_bytes.len() + 4 + payload.len());
        buf.push(CODEC_VERSION);
        buf.push(tag_len);
        buf.extend_from_slice(tag_bytes);
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&payload);
        Ok(Opaque(hex::encode(buf)))
    }

    pub fn decode<T: DeserializeOwned>(tag: &str, opaque: &Opaque) -> CodecResult<T> {
        let buf = hex::decode(&opaque.0)
            .map_err(|e| CodecError::FramingError(format!("not hex: {e}")))?;
        let (&version, rest) = buf
            .split_first()
            .ok_or_else(|| CodecError::FramingError("empty".into()))?;
        if version != CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let (&tag_len, rest) = rest
            .split_first()
            .ok_or_else(|| CodecError::FramingError("missing tag length".into()))?;
        let tag_len = tag_len as usize;
        if rest.len() < tag_len + 4 {
            return Err(CodecError::FramingError(format!(
                "incomplete header: have {}, need {}",
                rest.len(),
                tag_len + 4
            )));
        }
        let (found, rest) = rest.split_at(tag_len);
        if found != tag.as_bytes() {
            return Err(CodecError::TagMismatch {
                expected: tag.to_string(),
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }
        let (len_bytes, payload) = rest.split_at(4);
        let mut len_arr = [0u8; 4];
        len_arr.copy_from_slice(len_bytes);
        let len = u32::from_be_bytes(len_arr) as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if payload.len() != len {
            return Err(CodecError::FramingError(format!(
                "payload length {} does not match header {}",
                payload.len(),
                len
            )));
        }
        bincode::deserialize(payload).map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}
