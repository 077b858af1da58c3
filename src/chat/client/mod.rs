//! Client-side chat state shared by the end-user widget and the admin console.

pub mod links;
pub mod timeline;
pub mod view;

pub use links::{LinkExtractor, MessageSegment};
pub use timeline::{EntryId, FeedOutcome, Timeline, TimelineEntry};
pub use view::ChatView;
