//! Identity of the caller as seen by this service.
//!
//! Accounts live in the identity service; requests carry a signed bearer token
//! from which the [`CurrentUser`] is rebuilt.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToSchema, Default)]
/// Roles relevant to presence tracking.
pub enum UserRole {
    /// Staff member who clocks in and out.
    #[default]
    Staff,
    /// Branch administrator who decides overtime and force-closes records.
    Admin,
}

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Staff => "staff",
            UserRole::Admin => "admin",
        }
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "staff" => Ok(UserRole::Staff),
            "admin" => Ok(UserRole::Admin),
            // tolerate common legacy casings
            "Staff" | "STAFF" | "employee" => Ok(UserRole::Staff),
            "Admin" | "ADMIN" => Ok(UserRole::Admin),
            other => Err(serde::de::Error::unknown_variant(other, &["staff", "admin"])),
        }
    }
}

/// Authenticated caller attached to the request by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn staff(id: UserId) -> Self {
        Self {
            id,
            role: UserRole::Staff,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Self {
            id,
            role: UserRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}
