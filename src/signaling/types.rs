use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Utf8Bytes};

/// Signaling server errors
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Wire text of the `error` notification sent for a `join` on a missing room.
    #[error("Room not found")]
    RoomNotFound(RoomName),

    #[error("client {0} unreachable")]
    Unreachable(ClientId),

    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

const SALT_HEX_LEN: usize = 8;
const CLIENT_ID_LEN: usize = 24;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Client ID: up to 24 ASCII bytes, `<8 hex salt><hex sequence>` when server issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    bytes: [u8; CLIENT_ID_LEN],
    len: u8,
}

impl ClientId {
    /// Build an id from a per-process salt and a sequence number.
    ///
    /// The salt is rendered at a fixed width, so distinct sequence numbers
    /// under the same salt always yield distinct ids.
    pub fn from_parts(salt: u32, seq: u64) -> Self {
        let mut bytes = [0u8; CLIENT_ID_LEN];

        for i in 0..SALT_HEX_LEN {
            let nibble = ((salt >> (28 - i * 4)) & 0xF) as usize;
            bytes[i] = HEX_CHARS[nibble];
        }

        // at least 6 digits for the sequence, more as it grows
        let digits = (16 - seq.leading_zeros() as usize / 4).max(6);
        for i in 0..digits {
            let shift = (digits - 1 - i) * 4;
            let nibble = ((seq >> shift) & 0xF) as usize;
            bytes[SALT_HEX_LEN + i] = HEX_CHARS[nibble];
        }

        Self {
            bytes,
            len: (SALT_HEX_LEN + digits) as u8,
        }
    }

    /// Parse a client-supplied id. Empty or over-long strings can never name a
    /// live client and are rejected.
    pub fn parse(s: &str) -> Result<Self, SignalingError> {
        let src = s.as_bytes();
        if src.is_empty() || src.len() > CLIENT_ID_LEN {
            return Err(SignalingError::InvalidClientId(s.to_string()));
        }
        let mut bytes = [0u8; CLIENT_ID_LEN];
        bytes[..src.len()].copy_from_slice(src);
        Ok(Self {
            bytes,
            len: src.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ClientId::parse(&s).map_err(D::Error::custom)
    }
}

/// Room name, case-normalized to uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    pub fn new(name: &str) -> Self {
        Self(name.to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for RoomName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Accepts any JSON scalar; numbers and booleans are stringified before
/// normalization so `{"room": 1234}`, `{"room": 1234.0}` and `{"room": "1234"}`
/// are the same room.
impl<'de> Deserialize<'de> for RoomName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(RoomName::new(&s)),
            serde_json::Value::Number(n) => Ok(RoomName::new(&number_text(&n))),
            serde_json::Value::Bool(b) => Ok(RoomName::new(&b.to_string())),
            other => Err(D::Error::custom(format!(
                "room must be a string, found {}",
                other
            ))),
        }
    }
}

/// Integral values print without a fractional part, as browsers stringify them.
fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

impl From<Utf8Bytes> for OutboundMessage {
    fn from(bytes: Utf8Bytes) -> Self {
        Self(bytes)
    }
}
