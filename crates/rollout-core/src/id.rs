//! Resource identifiers.
//!
//! Every identifier in the system is a UUIDv7 wrapped in a distinct newtype
//! so that, say, an `ExecutionId` can never be passed where a `NodeId` is
//! expected. `macro_rules!` generates the boilerplate once.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! resource_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
        #[display("{_0}")]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new unique id using UUIDv7 (time-ordered, sortable).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

resource_id!(ExecutionId);
resource_id!(NodeId);
resource_id!(ApprovalId);
resource_id!(RollbackId);
