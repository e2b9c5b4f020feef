pub mod types;
pub mod traits;
pub mod state;
pub mod aggregator;
pub mod cache;
pub mod session;
pub mod sources;

pub use types::*;
pub use traits::{MembershipProvider, PagedSourceClient, ProfileSource};
pub use state::FeedState;
pub use aggregator::FeedAggregator;
pub use cache::ProfileCache;
pub use session::FeedSession;
pub use sources::{InMemoryFeedService, StaticMembership, StaticProfiles};
