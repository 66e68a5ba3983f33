use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

/// Full `users` row, including the password hash. Never serialized.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub is_active: bool,
}

/// Public view of an account.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserProfile {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "jdoe")]
    pub username: String,
    #[schema(example = "jdoe@company.com")]
    pub email: String,
    #[sqlx(rename = "role_id", try_from = "u8")]
    pub role: Role,
    pub is_active: bool,
    #[schema(example = "2026-10-19T08:00:00", format = "date-time", value_type = Option<String>)]
    pub last_login_at: Option<NaiveDateTime>,
}
