use derive_more::Display as DeriveDisplay;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Manager = 2,
    Employee = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Manager),
            3 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Managers and admins review other users' entries.
    pub fn can_review(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// A `role_id` outside the known roles.
#[derive(Debug, DeriveDisplay)]
#[display(fmt = "unknown role id {}", _0)]
pub struct UnknownRole(pub u8);

impl std::error::Error for UnknownRole {}

impl TryFrom<u8> for Role {
    type Error = UnknownRole;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Role::from_id(id).ok_or(UnknownRole(id))
    }
}
