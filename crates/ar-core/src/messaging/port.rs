use async_trait::async_trait;

use crate::{domain::ReplyTarget, Result};

/// Outbound side of a messenger.
///
/// Implementations are shared by every `ReplyHandle` a connector hands out, so
/// they must be cheap to call concurrently.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Short messenger name, used in logs.
    fn name(&self) -> &'static str;

    async fn reply(&self, target: &ReplyTarget, text: &str) -> Result<()>;
}
