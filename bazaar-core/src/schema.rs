use diesel::{allow_tables_to_appear_in_same_query, table};

table! {
    conversations (id) {
        id -> BigInt,
        conversation_id -> Text,
        user_id -> Text,
        seller_id -> Text,
        last_message -> Nullable<Text>,
        last_message_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    messages (id) {
        id -> BigInt,
        conversation_id -> Text,
        sender_type -> Text,
        content -> Text,
        seen -> Bool,
        created_at -> Timestamptz,
    }
}

allow_tables_to_appear_in_same_query!(conversations, messages);
