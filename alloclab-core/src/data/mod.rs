//! Data boundary: the feed trait, the in-memory feed, and synthetic series.

pub mod feed;
pub mod synthetic;

pub use feed::{DataFeed, FeedError, InMemoryFeed};
pub use synthetic::{business_days, random_walk};
