//! Newtype IDs for type-safe identification of catalog rows.
//!
//! Row ids come straight from SQLite (`INTEGER PRIMARY KEY`), so they wrap
//! `i64`. Class ids are different: they are scoped to one version and are
//! rendered into label files, so they get their own `u32` type.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Creates a new id from a raw row id.
            #[inline]
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying row id.
            #[inline]
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Identity of the dataset owner, supplied by the caller.
    UserId
);
row_id!(
    /// A dataset row.
    DatasetId
);
row_id!(
    /// A dataset version row.
    VersionId
);
row_id!(
    /// An asset (image) row.
    AssetId
);
row_id!(
    /// An annotation row.
    AnnotationId
);
row_id!(
    /// A training job row.
    JobId
);

/// Per-version class index written as the first column of every label line.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    /// The first id allocated in a version with no classes.
    pub const FIRST: ClassId = ClassId(0);

    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// The id allocated after this one.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
