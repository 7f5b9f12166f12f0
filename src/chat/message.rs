//! Chat messages — the bubbles a session appends to its transcript.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::FlowOption;

/// Who a chat bubble belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// One rendered chat bubble. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Milliseconds since Unix epoch. Set at construction.
    pub ts: i64,
    /// Choices this message presents. Empty for user and informational messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FlowOption>,
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), role, content: content.into(), ts: now_ms(), options: Vec::new() }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Role::Bot, content)
    }

    #[must_use]
    pub fn with_options(mut self, options: Vec<FlowOption>) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.role == Role::Bot
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
