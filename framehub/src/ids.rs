//! Strongly typed identifiers for every entity kind.
//!
//! Datasets, compound analyses and analyses are keyed by client-chosen UUIDs.
//! Job ids are generated by the server. Each kind gets its own newtype so a
//! dataset id can never be passed where an analysis id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
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

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered dataset.
    DatasetId
);

entity_id!(
    /// Identifier of a compound analysis.
    CompoundAnalysisId
);

entity_id!(
    /// Identifier of a single analysis.
    AnalysisId
);

entity_id!(
    /// Identifier of one job run. Always generated server-side.
    JobId
);

impl JobId {
    /// Generates a fresh random job id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}
