//! Order book wire payloads and message classification.
//!
//! Upstream delivers each book message as an already-decoded JSON object in
//! one of two shapes:
//!
//! - snapshot: `{"bids": [[price, volume, ...], ...], "asks": [...], ...}`
//!   (the abbreviated `bs`/`as` keys are accepted too)
//! - update: `{"b": [[price, volume, timestamp[, "r"]], ...], "a": [...], ...}`
//!   where either side key may be absent
//!
//! Records stay as raw JSON values here; decoding them into typed price levels
//! is the order book's job.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// One untyped `[price, volume, timestamp?, republish?]` record.
pub type RawRecord = Value;

/// Keys of a payload that are not price levels (checksum, sequence, ...).
pub type Metadata = Map<String, Value>;

const SNAPSHOT_BID_KEYS: [&str; 2] = ["bids", "bs"];
const SNAPSHOT_ASK_KEYS: [&str; 2] = ["asks", "as"];
const UPDATE_BID_KEYS: [&str; 1] = ["b"];
const UPDATE_ASK_KEYS: [&str; 1] = ["a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Snapshot,
    Update,
}

/// Full replacement of both sides of a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub bids: Vec<RawRecord>,
    pub asks: Vec<RawRecord>,
    pub metadata: Metadata,
}

/// Incremental change to one or both sides.
///
/// `None` means the message carried no section for that side, which is
/// different from an empty section only in that the side is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub bids: Option<Vec<RawRecord>>,
    pub asks: Option<Vec<RawRecord>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookMessage {
    Snapshot(SnapshotPayload),
    Update(UpdatePayload),
}

/// A payload that cannot be dispatched to the book.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload carries neither snapshot nor update sections")]
    Unrecognized,
}

/// Classify a payload by its keys.
///
/// Snapshot keys win when a payload carries both kinds.
pub fn classify(payload: &Value) -> Option<MessageKind> {
    let object = payload.as_object()?;
    let has_any = |keys: &[&str]| keys.iter().any(|key| object.contains_key(*key));

    if has_any(&SNAPSHOT_BID_KEYS) || has_any(&SNAPSHOT_ASK_KEYS) {
        Some(MessageKind::Snapshot)
    } else if has_any(&UPDATE_BID_KEYS) || has_any(&UPDATE_ASK_KEYS) {
        Some(MessageKind::Update)
    } else {
        None
    }
}

impl BookMessage {
    /// Build a snapshot message with no metadata.
    pub fn snapshot(bids: Vec<RawRecord>, asks: Vec<RawRecord>) -> Self {
        BookMessage::Snapshot(SnapshotPayload {
            bids,
            asks,
            metadata: Metadata::new(),
        })
    }

    /// Build an update message with no metadata.
    pub fn update(bids: Option<Vec<RawRecord>>, asks: Option<Vec<RawRecord>>) -> Self {
        BookMessage::Update(UpdatePayload {
            bids,
            asks,
            metadata: Metadata::new(),
        })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            BookMessage::Snapshot(_) => MessageKind::Snapshot,
            BookMessage::Update(_) => MessageKind::Update,
        }
    }

    /// Split a decoded JSON payload into side sections and metadata.
    ///
    /// A snapshot missing one side gets an empty list for it. A side section
    /// that is not an array is logged and treated as missing.
    pub fn from_value(payload: Value) -> Result<Self, MessageError> {
        let kind = classify(&payload);
        let Value::Object(mut object) = payload else {
            return Err(MessageError::NotAnObject);
        };

        match kind {
            Some(MessageKind::Snapshot) => {
                let bids = take_section(&mut object, &SNAPSHOT_BID_KEYS)
                    .unwrap_or_default();
                let asks = take_section(&mut object, &SNAPSHOT_ASK_KEYS)
                    .unwrap_or_default();
                Ok(BookMessage::Snapshot(SnapshotPayload {
                    bids,
                    asks,
                    metadata: object,
                }))
            }
            Some(MessageKind::Update) => {
                let bids = take_section(&mut object, &UPDATE_BID_KEYS);
                let asks = take_section(&mut object, &UPDATE_ASK_KEYS);
                Ok(BookMessage::Update(UpdatePayload {
                    bids,
                    asks,
                    metadata: object,
                }))
            }
            None => Err(MessageError::Unrecognized),
        }
    }
}

impl TryFrom<Value> for BookMessage {
    type Error = MessageError;

    fn try_from(payload: Value) -> Result<Self, Self::Error> {
        BookMessage::from_value(payload)
    }
}

/// Remove every alias of a side section, keeping the first array found.
fn take_section(object: &mut Metadata, keys: &[&str]) -> Option<Vec<RawRecord>> {
    let mut section = None;
    for key in keys {
        match object.remove(*key) {
            Some(Value::Array(records)) if section.is_none() => section = Some(records),
            Some(Value::Array(_)) => {
                warn!(key = %key, "duplicate side section ignored");
            }
            Some(other) => {
                warn!(key = %key, value = %other, "side section is not an array");
            }
            None => {}
        }
    }
    section
}
