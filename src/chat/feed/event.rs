//! Typed change-feed payloads.

use serde::{Deserialize, Serialize};

/// A row change pushed by the realtime feed.
///
/// One variant per event type, instead of the transport's untyped bag of
/// optional fields. `old` is only delivered for updates, and only when the
/// transport captured the previous row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum ChangeEvent<T> {
    /// A new row was inserted.
    #[serde(rename = "INSERT")]
    Inserted {
        /// The inserted row.
        new: T,
    },
    /// An existing row changed.
    #[serde(rename = "UPDATE")]
    Updated {
        /// The row after the change.
        new: T,
        /// The row before the change, when available.
        old: Option<T>,
    },
}

impl<T> ChangeEvent<T> {
    /// The row carried by the event (post-change for updates).
    pub const fn new_row(&self) -> &T {
        match self {
            Self::Inserted { new } | Self::Updated { new, .. } => new,
        }
    }
}
