use crate::aggregator::FeedAggregator;
use crate::cache::ProfileCache;
use crate::traits::{MembershipProvider, PagedSourceClient, ProfileSource};
use crate::types::{AuthorProfile, FeedConfig, FeedPage, Post, Result, UserId};
use std::sync::Arc;
use tracing::{info, warn};

/// One feed-open to feed-close lifecycle for a user.
///
/// Wires the membership provider and the author-profile cache around the
/// aggregator core: membership is snapshotted when a load starts, and each
/// returned page warms the profile cache for its authors. Membership
/// lookup failure is the only error that propagates; per-source fetch
/// failures are absorbed by the aggregator.
pub struct FeedSession {
    membership: Arc<dyn MembershipProvider>,
    profile_source: Arc<dyn ProfileSource>,
    profiles: ProfileCache,
    aggregator: FeedAggregator,
    user_id: UserId,
}

impl FeedSession {
    pub fn open(
        membership: Arc<dyn MembershipProvider>,
        profile_source: Arc<dyn ProfileSource>,
        client: Arc<dyn PagedSourceClient>,
        user_id: UserId,
        config: FeedConfig,
    ) -> Self {
        info!("opening feed session for user {}", user_id);
        Self {
            membership,
            profile_source,
            profiles: ProfileCache::new(),
            aggregator: FeedAggregator::new(client, config),
            user_id,
        }
    }

    /// Snapshots the user's memberships and loads the first page.
    /// `Ok(None)` means the call was ignored because another operation was
    /// in flight or the session is closed.
    pub async fn initial_load(&self) -> Result<Option<FeedPage>> {
        let sources = self.membership.sources_for(&self.user_id).await?;
        let page = self.aggregator.initial_load(sources).await;
        if let Some(page) = &page {
            self.hydrate_profiles(&page.items).await;
        }
        Ok(page)
    }

    pub async fn load_more(&self) -> Option<FeedPage> {
        let page = self.aggregator.load_more().await;
        if let Some(page) = &page {
            self.hydrate_profiles(&page.items).await;
        }
        page
    }

    /// Restarts the feed with a fresh membership snapshot, so groups
    /// joined or left since the session opened are picked up here and
    /// nowhere else.
    pub async fn refresh(&self) -> Result<Option<FeedPage>> {
        let sources = self.membership.sources_for(&self.user_id).await?;
        let page = self.aggregator.initial_load(sources).await;
        if let Some(page) = &page {
            self.hydrate_profiles(&page.items).await;
        }
        Ok(page)
    }

    pub async fn author_profile(&self, user_id: &UserId) -> Option<AuthorProfile> {
        self.profiles.get(user_id).await
    }

    pub fn close(&self) {
        info!("closing feed session for user {}", self.user_id);
        self.aggregator.close();
    }

    pub fn aggregator(&self) -> &FeedAggregator {
        &self.aggregator
    }

    /// Fills the cache for any authors on this page it has not seen yet.
    /// A failing profile backend downgrades the page, it never fails it.
    async fn hydrate_profiles(&self, posts: &[Post]) {
        let authors: Vec<UserId> = posts.iter().map(|post| post.author_id.clone()).collect();
        let missing = self.profiles.missing_from(&authors).await;
        if missing.is_empty() {
            return;
        }
        match self.profile_source.profiles(&missing).await {
            Ok(found) => self.profiles.insert_all(found).await,
            Err(e) => warn!("profile lookup failed for {} authors: {}", missing.len(), e),
        }
    }
}
