use chatmem_rs_memory::{ChatMessage, Conversation, MessageRecord, Role};

/// 2024-05-01T12:00:00Z
pub const DAY_ONE_MS: i64 = 1_714_564_800_000;
/// 2024-05-02T08:00:00Z
pub const DAY_TWO_MS: i64 = 1_714_636_800_000;

pub fn message(chat_id: &str, order: usize, timestamp: i64) -> MessageRecord {
    MessageRecord {
        id: MessageRecord::identity(chat_id, order),
        chat_id: chat_id.to_string(),
        chat_title: "Untitled".to_string(),
        order,
        role: if order % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        },
        content: format!("message {order}"),
        timestamp,
    }
}

/// Conversation whose messages are one second apart starting at `start_ms`.
pub fn conversation(id: &str, count: usize, start_ms: i64) -> Conversation {
    Conversation {
        id: id.to_string(),
        title: Some(format!("Chat {id}")),
        created_at: Some(start_ms),
        messages: (0..count)
            .map(|order| ChatMessage {
                role: if order % 2 == 0 {
                    Role::User
                } else {
                    Role::Assistant
                },
                content: Some(format!("{id} says {order}")),
                timestamp: Some(start_ms + order as i64 * 1_000),
            })
            .collect(),
    }
}
