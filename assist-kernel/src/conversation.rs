//! Persistent chat history.

use std::path::Path;

use assist_adapters::traits::{MessageRole, PromptMessage};
use assist_primitives::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KernelError, KernelResult};

/// Messages exchanged in one chat session.
///
/// Only user messages and final assistant replies are kept; tool rounds live
/// for the duration of a single turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    session_id: SessionId,
    created_at: DateTime<Utc>,
    messages: Vec<PromptMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Starts an empty conversation with a fresh session id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: SessionId::random(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Creation time of the session.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// All stored messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    /// The last `limit` user and assistant messages, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<PromptMessage> {
        let eligible: Vec<&PromptMessage> = self
            .messages
            .iter()
            .filter(|m| matches!(m.role(), MessageRole::User | MessageRole::Assistant))
            .collect();
        let start = eligible.len().saturating_sub(limit);
        eligible[start..].iter().map(|m| (*m).clone()).collect()
    }

    /// Records one completed exchange.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(PromptMessage::user(user));
        self.messages.push(PromptMessage::assistant(assistant));
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when nothing has been said yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Forgets every message and starts a new session.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.session_id = SessionId::random();
        self.created_at = Utc::now();
    }

    /// Writes the conversation as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Session`] on encode or I/O failure.
    pub async fn save(&self, path: impl AsRef<Path>) -> KernelResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|err| KernelError::session(path, err.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| KernelError::session(path, err.to_string()))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|err| KernelError::session(path, err.to_string()))?;
        debug!(session = %self.session_id, path = %path.display(), "conversation saved");
        Ok(())
    }

    /// Reads a conversation written by [`Conversation::save`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Session`] if the file is missing or malformed.
    pub async fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| KernelError::session(path, err.to_string()))?;
        let conversation: Self = serde_json::from_slice(&bytes)
            .map_err(|err| KernelError::session(path, err.to_string()))?;
        debug!(session = %conversation.session_id, path = %path.display(), "conversation loaded");
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_keeps_the_newest_messages() {
        let mut conversation = Conversation::new();
        conversation.push_exchange("one", "1");
        conversation.push_exchange("two", "2");

        let recent = conversation.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content(), "1");
        assert_eq!(recent[2].content(), "2");
        assert!(conversation.recent(0).is_empty());
        assert_eq!(conversation.recent(100).len(), 4);
    }

    #[test]
    fn clear_starts_a_new_session() {
        let mut conversation = Conversation::new();
        let before = conversation.session_id();
        conversation.push_exchange("hi", "hello");
        conversation.clear();
        assert!(conversation.is_empty());
        assert_ne!(conversation.session_id(), before);
    }

    #[tokio::test]
    async fn save_and_load_preserve_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions").join("chat.json");

        let mut conversation = Conversation::new();
        conversation.push_exchange("what time is it?", "noon");
        conversation.save(&path).await.unwrap();

        let loaded = Conversation::load(&path).await.unwrap();
        assert_eq!(loaded, conversation);
    }

    #[tokio::test]
    async fn loading_garbage_is_a_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"[1, 2").await.unwrap();

        let err = Conversation::load(&path).await.unwrap_err();
        assert!(matches!(err, KernelError::Session { .. }));
    }
}
