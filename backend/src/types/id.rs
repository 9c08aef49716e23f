//! Typed ID wrappers for compile-time type safety.
//!
//! These types wrap UUIDs to prevent accidental mixing of different entity IDs.
//! They are stored as native Postgres `UUID` columns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Macro to generate typed ID wrappers with common trait implementations.
macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            sqlx::Type,
            ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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
                Ok(Self(Uuid::parse_str(s)?))
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
    };
}

typed_id!(UserId, "Unique identifier for a staff member or admin.");
typed_id!(BranchId, "Unique identifier for a branch (shop).");
typed_id!(AttendanceId, "Unique identifier for an attendance record.");
typed_id!(ActivityPeriodId, "Unique identifier for an activity period.");
typed_id!(OvertimeRequestId, "Unique identifier for an overtime request.");
typed_id!(GeofenceViolationId, "Unique identifier for a geofence violation.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_id_round_trips_through_string() {
        let id = AttendanceId::new();
        let parsed: AttendanceId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn typed_id_serializes_as_plain_uuid_string() {
        let uuid = Uuid::parse_str("6f1d8f6e-3d2a-4c1b-9f59-2a4f1b0c9d11").unwrap();
        let id = BranchId::from_uuid(uuid);
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!("6f1d8f6e-3d2a-4c1b-9f59-2a4f1b0c9d11"));
    }

    #[test]
    fn typed_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn typed_ids_order_by_uuid() {
        let low = BranchId::from_uuid(Uuid::from_u128(1));
        let high = BranchId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }
}
