//! Binary snapshot encoding.
//!
//! A snapshot file is a 4-byte magic tag followed by the postcard encoding of
//! one [`RootSnapshot`].

use hindsight_types::error::SnapshotError;
use hindsight_types::snapshot::RootSnapshot;

/// File tag, bumped whenever the layout changes incompatibly.
pub const MAGIC: &[u8; 4] = b"HSN1";

pub fn encode(snapshot: &RootSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let body = postcard::to_stdvec(snapshot).map_err(|e| SnapshotError::Encode(e.to_string()))?;
    let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<RootSnapshot, SnapshotError> {
    let body = bytes.strip_prefix(MAGIC.as_slice()).ok_or_else(|| {
        SnapshotError::Format(format!(
            "expected header {:?}, got {:?}",
            MAGIC,
            &bytes[..bytes.len().min(MAGIC.len())]
        ))
    })?;
    postcard::from_bytes(body).map_err(|e| SnapshotError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use hindsight_types::contact::ContactInfo;
    use hindsight_types::snapshot::{
        AgentSnapshot, ConversationSnapshot, LineRecord, ReplyLinkRecord,
    };

    fn sample() -> RootSnapshot {
        let line = |text: &str, secs| LineRecord {
            text: text.to_string(),
            created_at_unix_secs: secs,
        };

        let mut agent = AgentSnapshot::default();
        agent
            .contacts
            .insert("ann".to_string(), ContactInfo::new(-5, "sarcastic"));
        agent.conversations.insert(
            -100,
            ConversationSnapshot {
                exclusive_queue: None,
                reply_graph: BTreeMap::from([(
                    "Luna: sure".to_string(),
                    ReplyLinkRecord {
                        prev_line: "Ann: tea?".to_string(),
                        created_at_unix_secs: 1_700_000_100,
                    },
                )]),
            },
        );
        agent.conversations.insert(
            12,
            ConversationSnapshot {
                exclusive_queue: Some(vec![line("Bob: psst", 1_700_000_050)]),
                reply_graph: BTreeMap::new(),
            },
        );

        RootSnapshot {
            shared_queues: BTreeMap::from([(
                -100,
                vec![line("Ann: tea?", 1_700_000_000), line("Luna: sure", 1_700_000_100)],
            )]),
            agents: BTreeMap::from([("luna".to_string(), agent)]),
        }
    }

    #[test]
    fn encoded_snapshot_starts_with_magic_and_decodes() {
        let snapshot = sample();
        let bytes = encode(&snapshot).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn shared_conversation_carries_no_inline_queue() {
        let decoded = decode(&encode(&sample()).unwrap()).unwrap();
        let luna = &decoded.agents["luna"];
        assert!(luna.conversations[&-100].exclusive_queue.is_none());
        assert_eq!(luna.conversations[&12].exclusive_queue.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn wrong_header_is_a_format_error() {
        let err = decode(b"JSON{}").unwrap_err();
        assert!(matches!(err, SnapshotError::Format(_)));

        let err = decode(b"").unwrap_err();
        assert!(matches!(err, SnapshotError::Format(_)));
    }

    #[test]
    fn truncated_body_is_a_decode_error() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(_)));
    }
}
