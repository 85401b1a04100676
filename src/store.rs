//! In-memory chat history, keyed by chat id.
//!
//! Lives for the process lifetime only. Saving replaces the whole list for an id.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::chat::UiMessage;

#[derive(Debug, Default)]
pub struct ChatStore {
    chats: RwLock<HashMap<String, Vec<UiMessage>>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored messages for `id`, or an empty list for an unknown chat.
    pub fn load(&self, id: &str) -> Vec<UiMessage> {
        let chats = self.chats.read().unwrap_or_else(|e| e.into_inner());
        chats.get(id).cloned().unwrap_or_default()
    }

    pub fn save(&self, id: &str, messages: Vec<UiMessage>) {
        let mut chats = self.chats.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(chat_id = %id, count = messages.len(), "saving chat");
        chats.insert(id.to_string(), messages);
    }

    pub fn len(&self) -> usize {
        self.chats.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
