use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one feed source (a joined group's post collection).
pub type SourceId = String;

/// Backend-issued post identifier. Unique within its source; global
/// uniqueness across sources is assumed and not defended against.
pub type PostId = String;

pub type UserId = String;

/// A single feed item as stored in one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub source_id: SourceId,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

/// Opaque, source-scoped pagination token. `None` in an
/// `Option<SourceCursor>` means "start of source"; the aggregator never
/// inspects the contents, it only hands the token back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceCursor(String);

impl SourceCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page returned by a `PagedSourceClient` fetch: posts ordered by
/// `created_at` descending plus the continuation cursor for that source.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub items: Vec<Post>,
    pub next_cursor: Option<SourceCursor>,
}

/// One page produced by an aggregation operation: posts ordered by
/// `(created_at desc, id asc)` plus whether more data may be available.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<Post>,
    pub has_more: bool,
}

impl FeedPage {
    pub fn empty(has_more: bool) -> Self {
        Self {
            items: Vec::new(),
            has_more,
        }
    }
}

/// Tuning knobs for one feed session.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// How many posts to request from each source per fetch.
    pub page_size_per_source: usize,
    /// Maximum number of posts returned by one aggregation operation.
    pub target_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size_per_source: 10,
            target_size: 20,
        }
    }
}

/// Display data for a post author, cached per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("membership lookup failed: {0}")]
    Membership(String),

    #[error("fetch failed for source {source_id}: {message}")]
    SourceFetch {
        source_id: SourceId,
        message: String,
    },

    #[error("profile lookup failed: {0}")]
    Profile(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
