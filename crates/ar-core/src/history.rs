use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Default number of exchanges kept per sender.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default number of distinct senders kept before the stalest is dropped.
pub const DEFAULT_MAX_SENDERS: usize = 1024;

/// One answered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    pub body: String,
    pub reply: String,
    pub at: DateTime<Utc>,
}

/// In-memory log of answered messages, keyed by sender identifier.
///
/// Each sender keeps at most `limit` exchanges; the oldest is evicted first.
/// At most `max_senders` senders are tracked: recording for a new sender when
/// the map is full drops the sender whose latest exchange is oldest.
/// Nothing is persisted and nothing is read back into prompts.
#[derive(Debug)]
pub struct ConversationLog {
    limit: usize,
    max_senders: usize,
    inner: Mutex<HashMap<String, VecDeque<Exchange>>>,
}

impl ConversationLog {
    pub fn new(limit: usize) -> Self {
        Self::with_max_senders(limit, DEFAULT_MAX_SENDERS)
    }

    pub fn with_max_senders(limit: usize, max_senders: usize) -> Self {
        Self {
            limit,
            max_senders,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub async fn record(&self, sender: &str, body: &str, reply: &str) {
        if self.limit == 0 || self.max_senders == 0 {
            return;
        }
        let mut map = self.inner.lock().await;
        if !map.contains_key(sender) && map.len() >= self.max_senders {
            let stalest = map
                .iter()
                .min_by_key(|(_, q)| q.back().map(|e| e.at))
                .map(|(k, _)| k.clone());
            if let Some(key) = stalest {
                map.remove(&key);
            }
        }
        let entries = map.entry(sender.to_string()).or_default();
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(Exchange {
            body: body.to_string(),
            reply: reply.to_string(),
            at: Utc::now(),
        });
    }

    /// Exchanges for `sender`, oldest first.
    pub async fn recent(&self, sender: &str) -> Vec<Exchange> {
        let map = self.inner.lock().await;
        map.get(sender)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) async fn sender_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
