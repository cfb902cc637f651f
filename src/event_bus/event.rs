use std::fmt;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::TriggerSource;

/// Chat lifecycle moments that agents can bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    /// A user message was committed to the chat.
    AfterUserMessage,
    /// A participant (character/assistant) finished its response.
    AfterParticipantMessage,
    /// The number of messages in the chat changed.
    MessageCountChanged,
}

impl ChatEventKind {
    /// Stable string tag, matching the serde encoding.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterUserMessage => "after_user_message",
            Self::AfterParticipantMessage => "after_participant_message",
            Self::MessageCountChanged => "message_count_changed",
        }
    }
}

impl fmt::Display for ChatEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transient chat lifecycle event.
///
/// Constructed by the emitter at the call site, passed synchronously to bus
/// subscribers, never persisted. The [`TriggerSource`] flag decides whether
/// the trigger manager may start agent runs for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub kind: ChatEventKind,
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    pub source: TriggerSource,
    #[serde(default = "Utc::now")]
    pub when: DateTime<Utc>,
}

impl ChatEvent {
    /// Create a user-sourced event.
    #[must_use]
    pub fn user(kind: ChatEventKind, chat_id: impl Into<String>) -> Self {
        Self::new(kind, chat_id, TriggerSource::User)
    }

    /// Create a system-sourced event. The trigger manager ignores these.
    #[must_use]
    pub fn system(kind: ChatEventKind, chat_id: impl Into<String>) -> Self {
        Self::new(kind, chat_id, TriggerSource::System)
    }

    fn new(kind: ChatEventKind, chat_id: impl Into<String>, source: TriggerSource) -> Self {
        Self {
            kind,
            chat_id: chat_id.into(),
            message: None,
            participant_id: None,
            message_count: None,
            source,
            when: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    #[must_use]
    pub fn with_message_count(mut self, count: u64) -> Self {
        self.message_count = Some(count);
        self
    }

    /// Derive the seed input map handed to root nodes of a triggered run.
    ///
    /// Only populated fields are included, plus the event kind and chat id,
    /// so scripts can read `input.message`, `input.chat_id`, and so on.
    #[must_use]
    pub fn seed_inputs(&self) -> FxHashMap<String, Value> {
        let mut seed = FxHashMap::default();
        seed.insert("event".to_string(), json!(self.kind.as_str()));
        seed.insert("chat_id".to_string(), json!(self.chat_id));
        if let Some(message) = &self.message {
            seed.insert("message".to_string(), json!(message));
        }
        if let Some(participant_id) = &self.participant_id {
            seed.insert("participant_id".to_string(), json!(participant_id));
        }
        if let Some(count) = self.message_count {
            seed.insert("message_count".to_string(), json!(count));
        }
        seed
    }
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] {}", self.kind, self.chat_id, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_inputs_skips_absent_fields() {
        let event = ChatEvent::user(ChatEventKind::AfterUserMessage, "c1").with_message("hello");
        let seed = event.seed_inputs();
        assert_eq!(seed.get("message"), Some(&json!("hello")));
        assert_eq!(seed.get("event"), Some(&json!("after_user_message")));
        assert!(!seed.contains_key("participant_id"));
        assert!(!seed.contains_key("message_count"));
    }

    #[test]
    fn kind_tags_match_serde() {
        let encoded = serde_json::to_string(&ChatEventKind::MessageCountChanged).unwrap();
        assert_eq!(encoded, format!("\"{}\"", ChatEventKind::MessageCountChanged));
    }
}
