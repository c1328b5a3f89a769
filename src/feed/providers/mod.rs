pub mod status_feed;

pub use status_feed::StatusFeedProvider;
