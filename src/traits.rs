use crate::types::{AuthorProfile, Result, SourceCursor, SourceId, SourcePage, UserId};
use async_trait::async_trait;
use std::collections::HashSet;

/// Paginated query primitive the backend exposes for one source.
///
/// Implementations must tolerate concurrent invocation across different
/// source ids. No ordering guarantee is given across sources; ordering the
/// merged feed is the aggregator's job.
#[async_trait]
pub trait PagedSourceClient: Send + Sync {
    /// Fetch up to `limit` posts from `source_id`, newest first, continuing
    /// after `cursor` (`None` means the start of the source). Returning
    /// fewer than `limit` posts is the signal that the source has no more
    /// data for now.
    async fn fetch(
        &self,
        source_id: &SourceId,
        cursor: Option<&SourceCursor>,
        limit: usize,
    ) -> Result<SourcePage>;
}

/// Resolves which sources a user's feed draws from.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn sources_for(&self, user_id: &UserId) -> Result<HashSet<SourceId>>;
}

/// Batch lookup of author display data, backing the session profile cache.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profiles(&self, user_ids: &[UserId]) -> Result<Vec<AuthorProfile>>;
}
