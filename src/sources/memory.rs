use crate::traits::{MembershipProvider, PagedSourceClient, ProfileSource};
use crate::types::{
    AuthorProfile, FeedError, Post, Result, SourceCursor, SourceId, SourcePage, UserId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// In-memory feed backend for the demo binary and tests.
///
/// Each source is a vector of posts held newest-first; the cursor is the
/// stringified offset of the next unread post. Instrumented with a
/// per-source fetch counter, failure injection, and an optional per-fetch
/// delay so callers can observe in-flight behavior.
pub struct InMemoryFeedService {
    sources: HashMap<SourceId, Vec<Post>>,
    failing: Mutex<HashSet<SourceId>>,
    fetch_counts: Mutex<HashMap<SourceId, usize>>,
    delay: Option<Duration>,
}

impl InMemoryFeedService {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            fetch_counts: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Makes every fetch sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Registers a source; posts are sorted newest-first on the way in.
    pub fn add_source(&mut self, source_id: impl Into<SourceId>, mut posts: Vec<Post>) {
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.sources.insert(source_id.into(), posts);
    }

    /// Makes fetches for `source_id` fail until `heal_source` is called.
    pub fn fail_source(&self, source_id: impl Into<SourceId>) {
        self.failing.lock().unwrap().insert(source_id.into());
    }

    pub fn heal_source(&self, source_id: &SourceId) {
        self.failing.lock().unwrap().remove(source_id);
    }

    pub fn fetch_count(&self, source_id: &SourceId) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(source_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetch_counts.lock().unwrap().values().sum()
    }
}

impl Default for InMemoryFeedService {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_offset(source_id: &SourceId, cursor: Option<&SourceCursor>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(cursor) => cursor
            .as_str()
            .parse::<usize>()
            .map_err(|_| FeedError::SourceFetch {
                source_id: source_id.clone(),
                message: format!("malformed cursor: {}", cursor),
            }),
    }
}

#[async_trait]
impl PagedSourceClient for InMemoryFeedService {
    async fn fetch(
        &self,
        source_id: &SourceId,
        cursor: Option<&SourceCursor>,
        limit: usize,
    ) -> Result<SourcePage> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        *self
            .fetch_counts
            .lock()
            .unwrap()
            .entry(source_id.clone())
            .or_insert(0) += 1;

        if self.failing.lock().unwrap().contains(source_id) {
            return Err(FeedError::SourceFetch {
                source_id: source_id.clone(),
                message: "injected failure".to_string(),
            });
        }

        let posts = match self.sources.get(source_id) {
            Some(posts) => posts,
            None => {
                debug!("fetch for unknown source {}; returning empty page", source_id);
                return Ok(SourcePage {
                    items: Vec::new(),
                    next_cursor: None,
                });
            }
        };

        let start = decode_offset(source_id, cursor)?.min(posts.len());
        let end = (start + limit).min(posts.len());
        let items = posts[start..end].to_vec();
        let next_cursor = if end > start {
            Some(SourceCursor::new(end.to_string()))
        } else {
            None
        };

        debug!(
            "fetched {} posts from {} (offset {})",
            items.len(),
            source_id,
            start
        );
        Ok(SourcePage { items, next_cursor })
    }
}

/// Fixed user-to-sources map.
pub struct StaticMembership {
    memberships: HashMap<UserId, HashSet<SourceId>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self {
            memberships: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>, sources: &[&str]) -> Self {
        self.memberships.insert(
            user_id.into(),
            sources.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

impl Default for StaticMembership {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MembershipProvider for StaticMembership {
    async fn sources_for(&self, user_id: &UserId) -> Result<HashSet<SourceId>> {
        self.memberships
            .get(user_id)
            .cloned()
            .ok_or_else(|| FeedError::Membership(format!("unknown user: {}", user_id)))
    }
}

/// Fixed author-profile directory.
pub struct StaticProfiles {
    profiles: HashMap<UserId, AuthorProfile>,
}

impl StaticProfiles {
    pub fn new(profiles: Vec<AuthorProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.user_id.clone(), profile))
                .collect(),
        }
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn profiles(&self, user_ids: &[UserId]) -> Result<Vec<AuthorProfile>> {
        Ok(user_ids
            .iter()
            .filter_map(|user_id| self.profiles.get(user_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(id: &str, source_id: &str, ts: i64) -> Post {
        Post {
            id: id.to_string(),
            source_id: source_id.to_string(),
            author_id: "author".to_string(),
            created_at: Utc.timestamp_opt(ts, 0).unwrap(),
            content: String::new(),
        }
    }

    #[tokio::test]
    async fn fetch_pages_through_a_source() {
        let mut service = InMemoryFeedService::new();
        service.add_source(
            "club",
            vec![post("p1", "club", 10), post("p3", "club", 30), post("p2", "club", 20)],
        );
        let source = "club".to_string();

        let first = service.fetch(&source, None, 2).await.unwrap();
        let ids: Vec<&str> = first.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2"]);
        let cursor = first.next_cursor.expect("cursor after a full page");

        let second = service.fetch(&source, Some(&cursor), 2).await.unwrap();
        let ids: Vec<&str> = second.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);

        assert_eq!(service.fetch_count(&source), 2);
    }

    #[tokio::test]
    async fn injected_failure_and_heal() {
        let mut service = InMemoryFeedService::new();
        service.add_source("club", vec![post("p1", "club", 10)]);
        let source = "club".to_string();

        service.fail_source("club");
        assert!(service.fetch(&source, None, 5).await.is_err());

        service.heal_source(&source);
        let page = service.fetch(&source, None, 5).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn unknown_source_returns_empty_page() {
        let service = InMemoryFeedService::new();
        let page = service.fetch(&"ghost".to_string(), None, 5).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn unknown_user_membership_is_an_error() {
        let membership = StaticMembership::new().with_user("maya", &["club"]);
        assert!(membership.sources_for(&"maya".to_string()).await.is_ok());
        assert!(membership.sources_for(&"ghost".to_string()).await.is_err());
    }
}
