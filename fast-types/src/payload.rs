//! Device-to-device sync message.
//!
//! A session travels as a flat key→value map (MessagePack with named
//! fields) wrapped in a [`DataItem`] addressed to [`FASTING_PATH`].

use serde::{Deserialize, Serialize};

use crate::{FastingSession, WireError};

/// Well-known logical path for fasting-state items.
pub const FASTING_PATH: &str = "/fasting_state";

/// Upper bound on an encoded item; a session is a few dozen bytes.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// The four session fields as they appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Whether a fast is open.
    #[serde(rename = "is_fasting")]
    pub is_fasting: bool,
    /// Start time, epoch milliseconds (-1 when unset).
    #[serde(rename = "start_time")]
    pub start_time_millis: i64,
    /// Selected goal id.
    #[serde(rename = "fasting_goal_id")]
    pub fasting_goal_id: String,
    /// Sender's last-write timestamp, epoch milliseconds.
    #[serde(rename = "last_updated")]
    pub last_updated_millis: i64,
}

impl SessionPayload {
    /// Serialize to MessagePack bytes as a named map.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    ///
    /// All four keys must be present with the right types.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// Wrap this payload in a data item addressed to [`FASTING_PATH`].
    pub fn to_data_item(&self) -> Result<DataItem, WireError> {
        Ok(DataItem {
            path: FASTING_PATH.to_string(),
            payload: self.to_bytes()?,
        })
    }

    /// Decode a data item, rejecting items addressed elsewhere.
    pub fn from_data_item(item: &DataItem) -> Result<Self, WireError> {
        if item.path != FASTING_PATH {
            return Err(WireError::UnexpectedPath(item.path.clone()));
        }
        Self::from_bytes(&item.payload)
    }
}

impl From<&FastingSession> for SessionPayload {
    fn from(session: &FastingSession) -> Self {
        Self {
            is_fasting: session.is_fasting,
            start_time_millis: session.start_time_millis,
            fasting_goal_id: session.fasting_goal_id.clone(),
            last_updated_millis: session.last_updated_millis,
        }
    }
}

impl From<SessionPayload> for FastingSession {
    fn from(payload: SessionPayload) -> Self {
        Self {
            is_fasting: payload.is_fasting,
            start_time_millis: payload.start_time_millis,
            fasting_goal_id: payload.fasting_goal_id,
            last_updated_millis: payload.last_updated_millis,
        }
    }
}

/// An addressed blob handed to the device-to-device transport.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    /// Logical path the item is published under.
    pub path: String,
    /// Encoded body.
    pub payload: Vec<u8>,
}

impl DataItem {
    /// Serialize the whole item (path + payload) for framed transports.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize an item produced by [`DataItem::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(WireError::InvalidData(format!(
                "item too large: {} > {}",
                bytes.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

impl std::fmt::Debug for DataItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataItem")
            .field("path", &self.path)
            .field("payload", &format!("[{} bytes]", self.payload.len()))
            .finish()
    }
}
