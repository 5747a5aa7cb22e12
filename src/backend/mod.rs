pub mod client;
pub mod retry;

pub use client::BackendClient;
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::AccountInfo;

/// Account lookup the participant poller depends on.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// Account for `name#tag`, including the live match if one is running.
    async fn account_by_riot_id(&self, name: &str, tag: &str) -> Result<AccountInfo, FetchError>;
}
