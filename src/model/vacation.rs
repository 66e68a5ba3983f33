use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::status::ApprovalStatus;
use crate::utils::calendar::DateRange;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "user_id": 7,
    "start_date": "2026-12-21",
    "end_date": "2026-12-24",
    "duration": 4,
    "reason": "Family trip",
    "status": "pending",
    "created_at": "2026-10-19T08:00:00Z"
}))]
pub struct VacationEntry {
    pub id: u64,
    pub user_id: u64,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Business days covered by the range
    pub duration: u32,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl VacationEntry {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
