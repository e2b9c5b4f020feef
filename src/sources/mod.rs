pub mod memory;

pub use memory::{InMemoryFeedService, StaticMembership, StaticProfiles};
