use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

/// Ordered message history of one chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_messages(messages: Vec<Message>) -> Self {
        let created_at = messages.first().map(|m| m.created_at).unwrap_or_else(Utc::now);
        Self {
            id: Uuid::new_v4().to_string(),
            messages,
            created_at,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the content of the message with `id`. Returns false if absent.
    pub fn replace_content(&mut self, id: &str, content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(msg) => {
                msg.content.clear();
                msg.content.push_str(content);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
