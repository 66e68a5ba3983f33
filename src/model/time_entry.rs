use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::calendar::{self, TimeRange};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimeEntry {
    pub id: u64,
    pub user_id: u64,
    pub date: NaiveDate,
    pub clock_in: NaiveTime,
    pub clock_out: Option<NaiveTime>,
    pub note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Interval occupied by the entry. An open entry runs to the end of the day.
    pub fn occupied(&self) -> TimeRange {
        TimeRange::new(self.clock_in, self.clock_out.unwrap_or_else(calendar::end_of_day))
    }
}

/// Time entry as returned to clients, with the derived hours worked.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 11,
    "user_id": 7,
    "date": "2026-10-20",
    "clock_in": "08:00:00",
    "clock_out": "17:00:00",
    "note": null,
    "permission_minutes": 90,
    "worked_minutes": 450,
    "created_at": "2026-10-20T06:00:00Z"
}))]
pub struct TimeEntryResponse {
    pub id: u64,
    pub user_id: u64,
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(value_type = Option<String>)]
    pub clock_out: Option<NaiveTime>,
    pub note: Option<String>,
    /// Share of the day's approved permission time netted from this entry
    pub permission_minutes: i64,
    /// `None` while the timer is still running
    pub worked_minutes: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TimeEntryResponse {
    pub fn from_entry(entry: TimeEntry, permission_minutes: i64) -> Self {
        let worked_minutes = entry
            .clock_out
            .map(|out| calendar::worked_minutes(entry.clock_in, out, permission_minutes));

        Self {
            id: entry.id,
            user_id: entry.user_id,
            date: entry.date,
            clock_in: entry.clock_in,
            clock_out: entry.clock_out,
            note: entry.note,
            permission_minutes,
            worked_minutes,
            created_at: entry.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(clock_in: (u32, u32), clock_out: Option<(u32, u32)>) -> TimeEntry {
        TimeEntry {
            id: 1,
            user_id: 7,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            clock_in: NaiveTime::from_hms_opt(clock_in.0, clock_in.1, 0).unwrap(),
            clock_out: clock_out.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            note: None,
            created_at: None,
        }
    }

    #[test]
    fn closed_entry_reports_worked_minutes_net_of_permission() {
        let resp = TimeEntryResponse::from_entry(entry((8, 0), Some((17, 0))), 90);
        assert_eq!(resp.worked_minutes, Some(450));
        assert_eq!(resp.permission_minutes, 90);
    }

    #[test]
    fn open_entry_has_no_worked_minutes() {
        let open = entry((8, 0), None);
        assert!(open.is_open());
        assert_eq!(TimeEntryResponse::from_entry(open, 0).worked_minutes, None);
    }

    #[test]
    fn open_entry_occupies_rest_of_day() {
        let open = entry((13, 0), None);
        let later = TimeRange::new(
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        );
        assert!(calendar::time_ranges_overlap(open.occupied(), later));
    }
}
