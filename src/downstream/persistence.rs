//! Conversation persistence boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::downstream::DownstreamError;

/// One saved exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
}

/// Persists conversations. The real deployment would back this with a
/// database; the gateway only depends on the trait.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save_conversation(&self, record: ConversationRecord) -> Result<(), DownstreamError>;
}

/// In-memory store. Default backing in this build; also the test double.
pub struct MemoryStore {
    records: Mutex<Vec<ConversationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("conversation store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<ConversationRecord> {
        self.records
            .lock()
            .expect("conversation store poisoned")
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn save_conversation(&self, record: ConversationRecord) -> Result<(), DownstreamError> {
        self.records
            .lock()
            .expect("conversation store poisoned")
            .push(record);
        Ok(())
    }
}
