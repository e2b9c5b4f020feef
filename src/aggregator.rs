use crate::state::FeedState;
use crate::traits::PagedSourceClient;
use crate::types::{FeedConfig, FeedPage, Post, SourceId};
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Merges posts from independently paginated sources into one
/// reverse-chronological feed.
///
/// Every operation fans out one concurrent fetch per eligible source,
/// waits for all of them to settle, then merges under the state lock. A
/// failing source contributes nothing and keeps its cursor, so it is
/// retried on the next call; an operation itself never fails.
pub struct FeedAggregator {
    client: Arc<dyn PagedSourceClient>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    in_flight: AtomicBool,
    closed: AtomicBool,
}

/// Clears the in-flight flag when an operation leaves scope, whichever
/// path it takes out.
struct OpGuard<'a>(&'a AtomicBool);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::Release);
    }
}

impl FeedAggregator {
    pub fn new(client: Arc<dyn PagedSourceClient>, config: FeedConfig) -> Self {
        Self {
            client,
            config,
            state: Mutex::new(FeedState::new()),
            in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Resets all bookkeeping, snapshots the source set, and loads the
    /// first page. Returns `None` if another operation is in flight or the
    /// session is closed; such calls are ignored, not queued.
    pub async fn initial_load(&self, sources: HashSet<SourceId>) -> Option<FeedPage> {
        let _guard = self.begin()?;
        {
            let mut state = self.state.lock().await;
            state.reset();
            // Sorted snapshot so fan-out order is deterministic.
            let mut snapshot: Vec<SourceId> = sources.into_iter().collect();
            snapshot.sort();
            info!("initial load across {} sources", snapshot.len());
            state.set_sources(snapshot);
        }
        self.run_cycle().await
    }

    /// Fetches the next page using each source's current cursor. Once the
    /// feed is terminal (every source exhausted, nothing buffered) this
    /// returns an empty page immediately without issuing any fetch.
    pub async fn load_more(&self) -> Option<FeedPage> {
        let _guard = self.begin()?;
        {
            let state = self.state.lock().await;
            if !state.has_more() {
                debug!("feed exhausted; returning empty page without fetching");
                return Some(FeedPage::empty(false));
            }
        }
        self.run_cycle().await
    }

    /// Re-runs the initial load over the same source snapshot. State is
    /// cleared at the start of the operation; callers that want to keep
    /// stale posts visible while the new page loads hold on to the pages
    /// they were already given.
    pub async fn refresh(&self) -> Option<FeedPage> {
        let _guard = self.begin()?;
        {
            let mut state = self.state.lock().await;
            info!("refreshing feed across {} sources", state.sources().len());
            state.reset();
        }
        self.run_cycle().await
    }

    /// Marks the session disposed. Fetches already in flight are allowed
    /// to finish but their results are discarded at the join point, and
    /// all later operations are ignored.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    /// Copy of the materialized feed so far, recency descending.
    pub async fn materialized(&self) -> Vec<Post> {
        self.state.lock().await.items().to_vec()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more()
    }

    fn begin(&self) -> Option<OpGuard<'_>> {
        if self.closed.load(AtomicOrdering::Acquire) {
            debug!("session closed; ignoring call");
            return None;
        }
        if self
            .in_flight
            .compare_exchange(
                false,
                true,
                AtomicOrdering::AcqRel,
                AtomicOrdering::Acquire,
            )
            .is_err()
        {
            debug!("aggregation already in flight; ignoring call");
            return None;
        }
        Some(OpGuard(&self.in_flight))
    }

    /// One fan-out/merge cycle: fetch all eligible sources concurrently,
    /// wait for every fetch to settle, then merge, dedupe, and truncate.
    async fn run_cycle(&self) -> Option<FeedPage> {
        let targets = self.state.lock().await.fetch_targets();
        let limit = self.config.page_size_per_source;

        debug!("fanning out to {} sources (limit {})", targets.len(), limit);
        let fetches = targets.into_iter().map(|(source_id, cursor)| {
            let client = Arc::clone(&self.client);
            async move {
                let result = client.fetch(&source_id, cursor.as_ref(), limit).await;
                (source_id, result)
            }
        });
        let settled = join_all(fetches).await;

        if self.closed.load(AtomicOrdering::Acquire) {
            debug!(
                "session closed while fetching; discarding {} source results",
                settled.len()
            );
            return None;
        }

        let mut state = self.state.lock().await;

        // Posts fetched on earlier cycles but not yet consumed compete
        // with the fresh results for this page.
        let mut merged = state.take_pending();
        for (source_id, result) in settled {
            match result {
                Ok(page) => {
                    let short_page = page.items.len() < limit;
                    if let Some(cursor) = page.next_cursor {
                        state.set_cursor(&source_id, cursor);
                    }
                    if short_page {
                        debug!(
                            "source {} returned {} of {} requested; marking exhausted",
                            source_id,
                            page.items.len(),
                            limit
                        );
                        state.mark_exhausted(&source_id);
                    }
                    merged.extend(page.items);
                }
                Err(e) => {
                    // Cursor stays where it was, so the source is retried
                    // on the next operation.
                    warn!("fetch failed for source {}: {}", source_id, e);
                }
            }
        }

        merged.sort_by(feed_order);

        let mut page_items: Vec<Post> = Vec::new();
        for post in merged {
            if state.is_seen(&post.id) {
                debug!("dropping duplicate post {}", post.id);
                continue;
            }
            if page_items.len() < self.config.target_size {
                state.add_seen(post.id.clone());
                page_items.push(post);
            } else {
                state.push_pending(post);
            }
        }

        state.append_items(&page_items);
        let has_more = state.has_more();
        info!(
            "aggregation cycle produced {} posts (has_more: {})",
            page_items.len(),
            has_more
        );
        Some(FeedPage {
            items: page_items,
            has_more,
        })
    }
}

/// Feed ordering: newest first, ties broken by ascending id so merges are
/// deterministic when sources emit identical timestamps.
fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(id: &str, ts: i64) -> Post {
        Post {
            id: id.to_string(),
            source_id: "s".to_string(),
            author_id: "author".to_string(),
            created_at: Utc.timestamp_opt(ts, 0).unwrap(),
            content: String::new(),
        }
    }

    #[test]
    fn feed_order_is_newest_first() {
        let mut posts = vec![post("a", 10), post("b", 30), post("c", 20)];
        posts.sort_by(feed_order);
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn feed_order_breaks_timestamp_ties_by_id() {
        let mut posts = vec![post("z", 10), post("a", 10), post("m", 10)];
        posts.sort_by(feed_order);
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }
}
