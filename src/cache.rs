use crate::types::{AuthorProfile, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Session-scoped cache of author display data.
///
/// One instance lives inside each `FeedSession` and is dropped with it;
/// nothing here is shared across sessions or process-wide.
#[derive(Debug, Default)]
pub struct ProfileCache {
    inner: RwLock<HashMap<UserId, AuthorProfile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &UserId) -> Option<AuthorProfile> {
        self.inner.read().await.get(user_id).cloned()
    }

    pub async fn insert_all(&self, profiles: Vec<AuthorProfile>) {
        let mut inner = self.inner.write().await;
        for profile in profiles {
            inner.insert(profile.user_id.clone(), profile);
        }
    }

    /// The subset of `user_ids` not yet cached, deduplicated.
    pub async fn missing_from(&self, user_ids: &[UserId]) -> Vec<UserId> {
        let inner = self.inner.read().await;
        let mut missing = Vec::new();
        for user_id in user_ids {
            if !inner.contains_key(user_id) && !missing.contains(user_id) {
                missing.push(user_id.clone());
            }
        }
        missing
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(user_id: &str, name: &str) -> AuthorProfile {
        AuthorProfile {
            user_id: user_id.to_string(),
            display_name: name.to_string(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn get_returns_inserted_profile() {
        let cache = ProfileCache::new();
        cache.insert_all(vec![profile("u1", "Maya")]).await;

        let found = cache.get(&"u1".to_string()).await;
        assert_eq!(found.map(|p| p.display_name), Some("Maya".to_string()));
        assert!(cache.get(&"u2".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn missing_from_dedupes_and_skips_cached() {
        let cache = ProfileCache::new();
        cache.insert_all(vec![profile("u1", "Maya")]).await;

        let ids = vec![
            "u1".to_string(),
            "u2".to_string(),
            "u2".to_string(),
            "u3".to_string(),
        ];
        let missing = cache.missing_from(&ids).await;
        assert_eq!(missing, vec!["u2".to_string(), "u3".to_string()]);
    }
}
