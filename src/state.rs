use crate::types::{Post, PostId, SourceCursor, SourceId};
use std::collections::{HashMap, HashSet};

/// In-memory bookkeeping for one feed session.
///
/// Tracks which post ids have been materialized, where each source's
/// pagination stands, which sources are exhausted, and the posts fetched
/// but not yet handed to the caller. Mutated only by `FeedAggregator`;
/// everything write-shaped is `pub(crate)`.
#[derive(Debug, Default)]
pub struct FeedState {
    sources: Vec<SourceId>,
    seen: HashSet<PostId>,
    cursors: HashMap<SourceId, SourceCursor>,
    exhausted: HashSet<SourceId>,
    pending: HashMap<SourceId, Vec<Post>>,
    items: Vec<Post>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all per-session bookkeeping. The source snapshot survives a
    /// reset so a refresh can re-run over the same set.
    pub(crate) fn reset(&mut self) {
        self.seen.clear();
        self.cursors.clear();
        self.exhausted.clear();
        self.pending.clear();
        self.items.clear();
    }

    pub(crate) fn set_sources(&mut self, sources: Vec<SourceId>) {
        self.sources = sources;
    }

    /// Sources worth fetching this cycle, paired with their current
    /// cursors. Exhausted sources are skipped outright; no call is issued
    /// for them.
    pub(crate) fn fetch_targets(&self) -> Vec<(SourceId, Option<SourceCursor>)> {
        self.sources
            .iter()
            .filter(|source_id| !self.exhausted.contains(*source_id))
            .map(|source_id| (source_id.clone(), self.cursors.get(source_id).cloned()))
            .collect()
    }

    pub(crate) fn set_cursor(&mut self, source_id: &SourceId, cursor: SourceCursor) {
        self.cursors.insert(source_id.clone(), cursor);
    }

    pub(crate) fn mark_exhausted(&mut self, source_id: &SourceId) {
        self.exhausted.insert(source_id.clone());
    }

    pub(crate) fn is_seen(&self, post_id: &PostId) -> bool {
        self.seen.contains(post_id)
    }

    pub(crate) fn add_seen(&mut self, post_id: PostId) {
        self.seen.insert(post_id);
    }

    /// Drains every per-source carry-over buffer into one flat list.
    pub(crate) fn take_pending(&mut self) -> Vec<Post> {
        self.pending.drain().flat_map(|(_, posts)| posts).collect()
    }

    /// Buffers a fetched post that did not make the current page so it
    /// stays reachable on the next cycle.
    pub(crate) fn push_pending(&mut self, post: Post) {
        self.pending
            .entry(post.source_id.clone())
            .or_default()
            .push(post);
    }

    pub(crate) fn append_items(&mut self, page: &[Post]) {
        self.items.extend_from_slice(page);
    }

    /// Materialized feed so far, recency descending.
    pub fn items(&self) -> &[Post] {
        &self.items
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn cursor(&self, source_id: &SourceId) -> Option<&SourceCursor> {
        self.cursors.get(source_id)
    }

    pub fn is_exhausted(&self, source_id: &SourceId) -> bool {
        self.exhausted.contains(source_id)
    }

    /// False only once every source is exhausted and no carried-over posts
    /// remain; at that point the feed is terminal.
    pub fn has_more(&self) -> bool {
        let fetchable = self
            .sources
            .iter()
            .any(|source_id| !self.exhausted.contains(source_id));
        let buffered = self.pending.values().any(|posts| !posts.is_empty());
        fetchable || buffered
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

    #[test]
    fn reset_clears_bookkeeping_but_keeps_sources() {
        let mut state = FeedState::new();
        state.set_sources(vec!["a".to_string(), "b".to_string()]);
        state.add_seen("p1".to_string());
        state.set_cursor(&"a".to_string(), SourceCursor::new("5"));
        state.mark_exhausted(&"b".to_string());
        state.push_pending(post("p2", "a", 10));
        state.append_items(&[post("p1", "a", 20)]);

        state.reset();

        assert!(!state.is_seen(&"p1".to_string()));
        assert!(state.cursor(&"a".to_string()).is_none());
        assert!(!state.is_exhausted(&"b".to_string()));
        assert!(state.take_pending().is_empty());
        assert!(state.items().is_empty());
        assert_eq!(state.sources(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn fetch_targets_skip_exhausted_sources() {
        let mut state = FeedState::new();
        state.set_sources(vec!["a".to_string(), "b".to_string()]);
        state.set_cursor(&"a".to_string(), SourceCursor::new("3"));
        state.mark_exhausted(&"b".to_string());

        let targets = state.fetch_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].0, "a");
        assert_eq!(targets[0].1, Some(SourceCursor::new("3")));
    }

    #[test]
    fn has_more_accounts_for_pending_posts() {
        let mut state = FeedState::new();
        state.set_sources(vec!["a".to_string()]);
        assert!(state.has_more());

        state.mark_exhausted(&"a".to_string());
        assert!(!state.has_more());

        state.push_pending(post("p1", "a", 10));
        assert!(state.has_more());

        let drained = state.take_pending();
        assert_eq!(drained.len(), 1);
        assert!(!state.has_more());
    }

    #[test]
    fn empty_state_has_no_more() {
        let state = FeedState::new();
        assert!(!state.has_more());
    }
}
