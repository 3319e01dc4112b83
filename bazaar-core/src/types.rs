use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of a seller<->user conversation produced (or receives) a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Seller,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::User => "user",
            SenderType::Seller => "seller",
        }
    }

    /// The other party in the conversation.
    pub fn counterpart(&self) -> SenderType {
        match self {
            SenderType::User => SenderType::Seller,
            SenderType::Seller => SenderType::User,
        }
    }

    pub fn parse(s: &str) -> Option<SenderType> {
        match s {
            "user" => Some(SenderType::User),
            "seller" => Some(SenderType::Seller),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub conversation_id: String,
    pub user_id: String,
    pub seller_id: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: String,
    pub sender_type: String,
    pub content: String,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_flips_sides() {
        assert_eq!(SenderType::User.counterpart(), SenderType::Seller);
        assert_eq!(SenderType::Seller.counterpart(), SenderType::User);
    }

    #[test]
    fn sender_type_wire_format_is_lowercase() {
        assert_eq!(serde_json::to_string(&SenderType::Seller).unwrap(), "\"seller\"");
        let parsed: SenderType = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(parsed, SenderType::User);
    }

    #[test]
    fn parse_rejects_unknown_roles() {
        assert_eq!(SenderType::parse("admin"), None);
        assert_eq!(SenderType::parse("seller"), Some(SenderType::Seller));
    }
}
