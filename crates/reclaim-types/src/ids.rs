//! Type-safe identifier wrappers around the game database's integer keys.
//!
//! Characters and guilds share one id space in the game database (both can
//! own buildings), so they are both addressed by [`OwnerId`]. Placed objects,
//! building pieces and thralls are addressed by [`ObjectId`].

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `i64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the raw database key.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a character or a guild (the `owner_id` of a building).
    OwnerId
}

define_id! {
    /// Identifier of a placed object, building root piece or thrall.
    ObjectId
}

impl OwnerId {
    /// The value the game writes into `owner_id` when an object has no owner.
    pub const UNOWNED: Self = Self(0);

    /// Whether this is the unowned placeholder value.
    pub const fn is_unowned(self) -> bool {
        self.0 == Self::UNOWNED.0
    }
}
