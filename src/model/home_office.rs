use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::status::ApprovalStatus;
use crate::utils::calendar::DateRange;

/// A registered home-office location and the period it is valid for.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 2,
    "user_id": 7,
    "address": "Via Roma 1, Milano",
    "start_date": "2026-01-01",
    "end_date": "2026-12-31",
    "status": "approved",
    "created_at": "2025-12-15T10:00:00Z"
}))]
pub struct HomeOfficeEntry {
    pub id: u64,
    pub user_id: u64,
    pub address: String,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HomeOfficeEntry {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// A request to work from home on a range of days.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 5,
    "user_id": 7,
    "address": "Via Roma 1, Milano",
    "start_date": "2026-10-26",
    "end_date": "2026-10-27",
    "duration": 2,
    "status": "pending",
    "created_at": "2026-10-19T08:00:00Z"
}))]
pub struct HomeOfficeRequestEntry {
    pub id: u64,
    pub user_id: u64,
    pub address: String,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub duration: u32,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl HomeOfficeRequestEntry {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
