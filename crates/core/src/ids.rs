//! Identifiers
//!
//! Strongly-typed UUID identifiers for every entity the compiler reads. They
//! order by their UUID bytes, so id sets serialize as sorted lists and two
//! compilations of the same snapshot produce byte-identical documents.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Build an id from a 128-bit value. Mostly useful in fixtures and tests.
            #[must_use]
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Promotion identifier
    PromotionId
);

uuid_id!(
    /// Company (tenant) identifier
    CompanyId
);

uuid_id!(
    /// Brand identifier
    BrandId
);

uuid_id!(
    /// Store identifier
    StoreId
);

uuid_id!(
    /// Product identifier
    ProductId
);

uuid_id!(
    /// Category identifier
    CategoryId
);

uuid_id!(
    /// Member (loyalty customer) identifier
    MemberId
);
