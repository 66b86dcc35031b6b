use std::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// # CorrelationId
///
/// Opaque token pairing one dispatched item with its eventual reply.
///
/// Backed by a random v4 UUID, so ids are collision-free for any realistic
/// registry lifetime and never reused while an entry is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An item on its way to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound<X> {
    pub id: CorrelationId,
    pub item: X,
}

impl<X> Outbound<X> {
    pub fn new(id: CorrelationId, item: X) -> Self {
        Self { id, item }
    }
}

/// Description of a failed prediction, carried back in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The outcome for one item: its prediction, or the failure of its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply<Y> {
    Ok(Y),
    Failed(ErrorPayload),
}

/// A reply on its way back from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound<Y> {
    pub id: CorrelationId,
    pub reply: Reply<Y>,
}

impl<Y> Inbound<Y> {
    pub fn ok(id: CorrelationId, value: Y) -> Self {
        Self {
            id,
            reply: Reply::Ok(value),
        }
    }

    pub fn failed(id: CorrelationId, payload: ErrorPayload) -> Self {
        Self {
            id,
            reply: Reply::Failed(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_ids_are_unique() {
        let ids: HashSet<CorrelationId> = (0..1000).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 1000, "Every generated id should be distinct");
    }

    #[test]
    fn test_id_displays_as_uuid() {
        let id = CorrelationId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = CorrelationId::new();
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn test_failed_reply_keeps_message_across_json() {
        let id = CorrelationId::new();
        let message = Inbound::<String>::failed(id, ErrorPayload::new("out of memory"));

        let encoded = serde_json::to_vec(&message).unwrap();
        let decoded: Inbound<String> = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.id, id);
        match decoded.reply {
            Reply::Failed(payload) => assert_eq!(payload.to_string(), "out of memory"),
            Reply::Ok(value) => panic!("expected a failure, got {value}"),
        }
    }
}
