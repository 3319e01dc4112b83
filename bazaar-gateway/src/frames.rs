use bazaar_core::SenderType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A frame received from a connected chat client.
///
/// The send frame carries no discriminator on the wire; the control frames
/// are tagged. Control variants are tried first so a tagged frame is never
/// misread as a send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Control(ControlFrame),
    Send(SendFrame),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ControlFrame {
    #[serde(rename = "MARK_AS_SEEN")]
    MarkAsSeen {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFrame {
    pub from_user_id: String,
    pub to_user_id: String,
    pub conversation_id: String,
    pub message_body: String,
    pub sender_type: SenderType,
}

/// A frame pushed to a connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundFrame {
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage(NewMessagePayload),
    #[serde(rename = "UNSEEN_COUNT_UPDATE")]
    UnseenCountUpdate {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        count: i64,
    },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub conversation_id: String,
    pub content: String,
    pub sender_type: SenderType,
    pub created_at: DateTime<Utc>,
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        // The enum only contains string/number/time fields; serialization
        // cannot fail for these shapes.
        serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"ERROR\"}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_frame_parses_from_wire_format() {
        let raw = r#"{
            "fromUserId": "u-1",
            "toUserId": "s-9",
            "conversationId": "conv-3",
            "messageBody": "is this still in stock?",
            "senderType": "user"
        }"#;

        match serde_json::from_str::<InboundFrame>(raw).unwrap() {
            InboundFrame::Send(frame) => {
                assert_eq!(frame.from_user_id, "u-1");
                assert_eq!(frame.to_user_id, "s-9");
                assert_eq!(frame.conversation_id, "conv-3");
                assert_eq!(frame.sender_type, SenderType::User);
            }
            other => panic!("expected send frame, got {:?}", other),
        }
    }

    #[test]
    fn mark_as_seen_parses_as_control() {
        let raw = r#"{"type":"MARK_AS_SEEN","conversationId":"conv-3"}"#;

        match serde_json::from_str::<InboundFrame>(raw).unwrap() {
            InboundFrame::Control(ControlFrame::MarkAsSeen { conversation_id }) => {
                assert_eq!(conversation_id, "conv-3");
            }
            other => panic!("expected control frame, got {:?}", other),
        }
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(serde_json::from_str::<InboundFrame>("not json").is_err());
        assert!(serde_json::from_str::<InboundFrame>(r#"{"type":"UNKNOWN"}"#).is_err());
        assert!(serde_json::from_str::<InboundFrame>(r#"{"fromUserId":"u-1"}"#).is_err());
    }

    #[test]
    fn outbound_frames_use_tagged_payload_envelope() {
        let frame = OutboundFrame::UnseenCountUpdate {
            conversation_id: "conv-3".to_string(),
            count: 5,
        };

        let value: serde_json::Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(value["type"], "UNSEEN_COUNT_UPDATE");
        assert_eq!(value["payload"]["conversationId"], "conv-3");
        assert_eq!(value["payload"]["count"], 5);
    }

    #[test]
    fn new_message_payload_is_camel_case() {
        let frame = OutboundFrame::NewMessage(NewMessagePayload {
            conversation_id: "conv-3".to_string(),
            content: "hello".to_string(),
            sender_type: SenderType::Seller,
            created_at: Utc::now(),
        });

        let value: serde_json::Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(value["type"], "NEW_MESSAGE");
        assert_eq!(value["payload"]["conversationId"], "conv-3");
        assert_eq!(value["payload"]["senderType"], "seller");
        assert!(value["payload"]["createdAt"].is_string());
    }
}
