//! Conversation types and bounded history

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of exchanges kept as prompt context.
pub const MAX_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

}

/// One user message paired with the assistant's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(user: Message, assistant: Message) -> Self {
        Self {
            user,
            assistant,
            timestamp: Utc::now(),
        }
    }
}

/// Most recent exchanges, oldest first. Never holds more than [`MAX_HISTORY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    entries: VecDeque<Exchange>,
}

impl ConversationHistory {
    /// Append an exchange, evicting the oldest once the bound is exceeded.
    pub fn push(&mut self, exchange: Exchange) {
        self.entries.push_back(exchange);
        while self.entries.len() > MAX_HISTORY {
            self.entries.pop_front();
        }
    }

    /// The last `n` exchanges in chronological order.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Exchange> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
