//! Realtime change feed: typed events and the in-process hub.

pub mod event;
pub mod hub;

pub use event::ChangeEvent;
pub use hub::{FeedHub, FeedSubscription};
