//! Identifier types for the chat subsystem.
//!
//! Strongly-typed ID newtypes over UUIDs for everything the store persists,
//! plus [`TempId`], the client-local identifier carried by an optimistic
//! message between send-initiation and reconciliation. Temp identifiers use a
//! recognizable `temp-` prefix so they can never be mistaken for a
//! server-assigned UUID.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation for session/message IDs, which
//!   gives good DB insert locality.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID intended to have good DB insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Generate a random UUID (v4).
#[inline]
#[must_use]
fn uuid_random() -> Uuid {
    Uuid::new_v4()
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        generator = $gen:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self($gen())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// End-user (or admin) account identifier.
    ///
    /// Random (`UUIDv4`) to reduce timestamp leakage when exposed to clients.
    UserId,
    generator = uuid_random
);

define_uuid_id!(
    /// Identifier for one conversation between an end-user and support.
    SessionId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Server-assigned identifier for a persisted chat message.
    MessageId,
    generator = uuid_time_ordered
);

// ===== Client-local temp IDs ===============================================

/// Client-local identifier for an optimistic (not yet acknowledged) message.
///
/// Rendered as `temp-<n>`. The numeric part is monotonically increasing
/// within one client, so temp entries compare in send order, which is what
/// the FIFO tie-break in the reconciler relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct TempId(u64);

impl TempId {
    /// String prefix distinguishing temp IDs from server UUIDs.
    pub const PREFIX: &'static str = "temp-";

    /// Wrap a raw sequence number.
    #[inline]
    #[must_use]
    pub const fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// Sequence number within the issuing client.
    #[inline]
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

/// Monotonic generator for [`TempId`] values, one per client instance.
#[derive(Debug, Default)]
pub struct TempIdGenerator {
    next: AtomicU64,
}

impl TempIdGenerator {
    /// Create a generator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next temp ID.
    #[must_use]
    pub fn next_id(&self) -> TempId {
        TempId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::{MessageId, SessionId, UserId};

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

    fn uuid_from_text(t: &[u8]) -> FromSqlResult<uuid::Uuid> {
        let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        uuid::Uuid::parse_str(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }

    macro_rules! impl_rusqlite_uuid_newtype {
        ($t:ty) => {
            impl ToSql for $t {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    // UUIDs are stored as TEXT for readability in the portal DB
                    Ok(ToSqlOutput::Owned(Value::Text(self.0.to_string())))
                }
            }

            impl FromSql for $t {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    match value {
                        ValueRef::Text(t) => uuid_from_text(t).map(Self),
                        _ => Err(FromSqlError::InvalidType),
                    }
                }
            }
        };
    }

    impl_rusqlite_uuid_newtype!(UserId);
    impl_rusqlite_uuid_newtype!(SessionId);
    impl_rusqlite_uuid_newtype!(MessageId);
}
