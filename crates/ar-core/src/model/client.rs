use async_trait::async_trait;

use crate::Result;

use super::types::{Completion, CompletionRequest};

/// Completion backend used by the reply pipeline.
///
/// Every failure (transport, API status, unreadable body) comes back as an
/// `Err`; callers decide whether to log, retry or surface it.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<Completion>;
}
