use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::status::ApprovalStatus;
use crate::utils::calendar::TimeRange;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 3,
    "user_id": 7,
    "date": "2026-10-20",
    "start_time": "09:00:00",
    "end_time": "10:30:00",
    "reason": "Doctor appointment",
    "status": "approved",
    "created_at": "2026-10-19T08:00:00Z"
}))]
pub struct PermissionEntry {
    pub id: u64,
    pub user_id: u64,
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = String)]
    pub end_time: NaiveTime,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PermissionEntry {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn minutes(&self) -> i64 {
        self.time_range().minutes().unwrap_or(0)
    }
}
