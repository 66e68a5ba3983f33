use crate::{
    api::{
        common::{self, DateWindow, EntryFilter, Filter, Page},
        permission, vacation,
    },
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{
        time_entry::{TimeEntry, TimeEntryResponse},
        vacation::VacationEntry,
    },
    utils::calendar::{self, DateRange, TimeRange},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use utoipa::{IntoParams, ToSchema};

const TABLE: &str = "time_entries";
const SELECT: &str = r#"
    SELECT id, user_id, date, clock_in, clock_out, note, created_at
    FROM time_entries"#;

const MAX_SUMMARY_DAYS: i64 = 366;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TimeEntryInput {
    #[schema(example = "2026-10-20", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "08:00:00", value_type = String)]
    pub clock_in: NaiveTime,
    #[schema(example = "17:00:00", value_type = String)]
    pub clock_out: NaiveTime,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ClockInput {
    pub note: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TimeEntryListResponse {
    pub data: Vec<TimeEntryResponse>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// First day of the period
    #[param(value_type = String, example = "2026-10-01")]
    pub from: NaiveDate,
    /// Last day of the period
    #[param(value_type = String, example = "2026-10-31")]
    pub to: NaiveDate,
    /// Whose summary (managers/admins only)
    pub user_id: Option<u64>,
}

#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayTotal {
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    pub worked_minutes: i64,
    pub permission_minutes: i64,
}

#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct WorkSummary {
    #[schema(format = "date", value_type = String)]
    pub from: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub to: NaiveDate,
    pub worked_minutes: i64,
    /// Business days outside approved vacations times the daily target
    pub expected_minutes: i64,
    pub balance_minutes: i64,
    pub vacation_days: u32,
    pub permission_minutes: i64,
    pub days: Vec<DayTotal>,
}

/// Checks a closed interval against the other entries of that day.
pub fn plan_time_entry(range: TimeRange, same_day: &[TimeEntry]) -> Result<i64, ApiError> {
    let minutes = range
        .minutes()
        .ok_or_else(|| ApiError::bad_request("clock_out must be after clock_in"))?;

    if !range.is_whole_minutes() {
        return Err(ApiError::bad_request("Clock times must be whole minutes"));
    }

    if let Some(e) = same_day
        .iter()
        .find(|e| calendar::time_ranges_overlap(e.occupied(), range))
    {
        return Err(ApiError::conflict(format!(
            "Overlaps time entry {} starting at {}",
            e.id, e.clock_in
        )));
    }

    Ok(minutes)
}

/// A timer starts only when none is running and nothing recorded that day
/// covers `now`.
pub fn plan_clock_in(open: Option<&TimeEntry>, now: NaiveTime, same_day: &[TimeEntry]) -> Result<(), ApiError> {
    if let Some(open) = open {
        return Err(ApiError::conflict(format!(
            "Already clocked in since {} {}",
            open.date, open.clock_in
        )));
    }

    let rest_of_day = TimeRange::new(now, calendar::end_of_day());
    if let Some(e) = same_day
        .iter()
        .find(|e| calendar::time_ranges_overlap(e.occupied(), rest_of_day))
    {
        return Err(ApiError::conflict(format!("Time entry {} already covers {}", e.id, now)));
    }

    Ok(())
}

/// Stops a running timer on the day it was started. Returns the minutes
/// between clock-in and `now`.
pub fn plan_clock_out(open: &TimeEntry, today: NaiveDate, now: NaiveTime) -> Result<i64, ApiError> {
    if !open.is_open() {
        return Err(ApiError::conflict(format!("Time entry {} is already closed", open.id)));
    }
    if open.date != today {
        return Err(ApiError::conflict(format!(
            "Clock-in of {} was never closed; correct entry {} manually",
            open.date, open.id
        )));
    }

    calendar::minutes_between(open.clock_in, now)
        .ok_or_else(|| ApiError::bad_request("Clock-out must be after clock-in"))
}

/// Validates a summary period: `from <= to` and at most
/// `MAX_SUMMARY_DAYS` days, both ends included.
pub fn summary_period(from: NaiveDate, to: NaiveDate) -> Result<DateRange, ApiError> {
    let range = DateRange::new(from, to);
    if !range.is_valid() {
        return Err(ApiError::bad_request("from cannot be after to"));
    }
    if (range.end - range.start).num_days() + 1 > MAX_SUMMARY_DAYS {
        return Err(ApiError::bad_request(format!("Period is limited to {MAX_SUMMARY_DAYS} days")));
    }
    Ok(range)
}

/// Shares each day's approved permission minutes out over that day's closed
/// entries, earliest clock-in first, each taking at most its own span. Keyed
/// by entry id. A day's rows then net the same total as its summary line.
pub fn spread_permission(
    day_entries: &[TimeEntry],
    minutes_by_day: &HashMap<(u64, NaiveDate), i64>,
) -> HashMap<u64, i64> {
    let mut closed: Vec<&TimeEntry> = day_entries.iter().filter(|e| !e.is_open()).collect();
    closed.sort_by_key(|e| (e.user_id, e.date, e.clock_in));

    let mut left = minutes_by_day.clone();
    let mut shares = HashMap::new();
    for e in closed {
        let Some(remaining) = left.get_mut(&(e.user_id, e.date)) else {
            continue;
        };
        let span = e
            .clock_out
            .and_then(|out| calendar::minutes_between(e.clock_in, out))
            .unwrap_or(0);
        let share = (*remaining).min(span);
        *remaining -= share;
        shares.insert(e.id, share);
    }
    shares
}

/// Aggregates closed entries, approved permissions and approved vacations
/// over `range`.
pub fn summarize(
    range: DateRange,
    entries: &[TimeEntry],
    permission_by_day: &HashMap<NaiveDate, i64>,
    vacations: &[VacationEntry],
    daily_work_minutes: i64,
) -> WorkSummary {
    let mut spans: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for e in entries.iter().filter(|e| range.contains(e.date)) {
        if let Some(out) = e.clock_out {
            *spans.entry(e.date).or_insert(0) += calendar::minutes_between(e.clock_in, out).unwrap_or(0);
        }
    }

    // permission time is subtracted once per day, not once per entry
    let days: Vec<DayTotal> = spans
        .into_iter()
        .map(|(date, span)| {
            let permission_minutes = permission_by_day.get(&date).copied().unwrap_or(0);
            DayTotal {
                date,
                worked_minutes: (span - permission_minutes).max(0),
                permission_minutes,
            }
        })
        .collect();

    let vacation_day_set: BTreeSet<NaiveDate> = vacations
        .iter()
        .filter_map(|v| v.range().intersect(&range))
        .flat_map(|r| r.start.iter_days().take_while(move |d| *d <= r.end))
        .filter(|d| !calendar::is_weekend(*d))
        .collect();
    let vacation_days = vacation_day_set.len() as u32;

    let working_days = calendar::business_days(range.start, range.end).saturating_sub(vacation_days);
    let worked_minutes: i64 = days.iter().map(|d| d.worked_minutes).sum();
    let expected_minutes = working_days as i64 * daily_work_minutes;

    WorkSummary {
        from: range.start,
        to: range.end,
        worked_minutes,
        expected_minutes,
        balance_minutes: worked_minutes - expected_minutes,
        vacation_days,
        permission_minutes: permission_by_day
            .iter()
            .filter(|(d, _)| range.contains(**d))
            .map(|(_, m)| *m)
            .sum(),
        days,
    }
}

fn now_local() -> (NaiveDate, NaiveTime) {
    let now = Local::now().naive_local();
    (now.date(), calendar::truncate_to_minute(now.time()))
}

fn clean_note(note: Option<&str>) -> Option<String> {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

async fn same_day_entries<'e, E>(
    executor: E,
    user_id: u64,
    date: NaiveDate,
    exclude_id: Option<u64>,
) -> Result<Vec<TimeEntry>, ApiError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!("{} WHERE user_id = ? AND date = ? AND id <> ?", SELECT);

    Ok(sqlx::query_as::<_, TimeEntry>(&sql)
        .bind(user_id)
        .bind(date)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(executor)
        .await?)
}

async fn open_entry<'e, E>(executor: E, user_id: u64) -> Result<Option<TimeEntry>, ApiError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!(
        "{} WHERE user_id = ? AND clock_out IS NULL ORDER BY date DESC, clock_in DESC LIMIT 1",
        SELECT
    );

    Ok(sqlx::query_as::<_, TimeEntry>(&sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?)
}

async fn closed_entries(
    pool: &MySqlPool,
    user_id: u64,
    range: DateRange,
) -> Result<Vec<TimeEntry>, ApiError> {
    let sql = format!(
        "{} WHERE user_id = ? AND date BETWEEN ? AND ? AND clock_out IS NOT NULL",
        SELECT
    );

    Ok(sqlx::query_as::<_, TimeEntry>(&sql)
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(pool)
        .await?)
}

/// Nets approved permission time out of each entry of the page.
async fn with_worked_minutes(
    pool: &MySqlPool,
    entries: Vec<TimeEntry>,
) -> Result<Vec<TimeEntryResponse>, ApiError> {
    let mut windows: HashMap<u64, DateRange> = HashMap::new();
    for e in &entries {
        windows
            .entry(e.user_id)
            .and_modify(|r| {
                r.start = r.start.min(e.date);
                r.end = r.end.max(e.date);
            })
            .or_insert_with(|| DateRange::single(e.date));
    }

    let mut minutes: HashMap<(u64, NaiveDate), i64> = HashMap::new();
    let mut day_entries = Vec::new();
    for (user_id, range) in windows {
        let by_day = permission::approved_minutes_by_day(pool, user_id, range).await?;
        if by_day.is_empty() {
            continue;
        }
        // the share of an entry depends on the other entries of its day,
        // including those outside the page
        day_entries.extend(closed_entries(pool, user_id, range).await?);
        minutes.extend(by_day.into_iter().map(|(date, m)| ((user_id, date), m)));
    }

    let shares = spread_permission(&day_entries, &minutes);
    Ok(entries
        .into_iter()
        .map(|e| {
            let m = shares.get(&e.id).copied().unwrap_or(0);
            TimeEntryResponse::from_entry(e, m)
        })
        .collect())
}

async fn respond_with(pool: &MySqlPool, entry: TimeEntry) -> Result<TimeEntryResponse, ApiError> {
    let mut rows = with_worked_minutes(pool, vec![entry]).await?;
    rows.pop().ok_or(ApiError::Internal)
}

#[utoipa::path(
    post,
    path = "/api/time-entry/clock-in",
    request_body(content = ClockInput, description = "Optional note"),
    responses(
        (status = 201, description = "Timer started", body = TimeEntryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A timer is already running")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: Option<web::Json<ClockInput>>,
) -> actix_web::Result<impl Responder> {
    let (today, now) = now_local();

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let open = open_entry(&mut *tx, auth.user_id).await?;
    let others = same_day_entries(&mut *tx, auth.user_id, today, None).await?;
    plan_clock_in(open.as_ref(), now, &others)?;

    let note = payload.and_then(|p| clean_note(p.note.as_deref()));
    let result = sqlx::query(
        "INSERT INTO time_entries (user_id, date, clock_in, note) VALUES (?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(today)
    .bind(now)
    .bind(note)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let id = result.last_insert_id();
    tracing::info!(id, user_id = auth.user_id, at = %now, "Clocked in");

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &TimeEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(respond_with(pool.get_ref(), entry).await?))
}

#[utoipa::path(
    put,
    path = "/api/time-entry/clock-out",
    responses(
        (status = 200, description = "Timer stopped", body = TimeEntryResponse),
        (status = 400, description = "Clock-out is not after clock-in"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No running timer for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let open = open_entry(pool.get_ref(), auth.user_id)
        .await?
        .ok_or_else(|| ApiError::conflict("No active clock-in found"))?;

    let (today, now) = now_local();
    let minutes = plan_clock_out(&open, today, now)?;

    let result = sqlx::query("UPDATE time_entries SET clock_out = ? WHERE id = ? AND clock_out IS NULL")
        .bind(now)
        .bind(open.id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("No active clock-in found").into());
    }

    tracing::info!(id = open.id, user_id = auth.user_id, at = %now, minutes, "Clocked out");

    let entry = common::fetch_visible(pool.get_ref(), SELECT, open.id, &auth, |e: &TimeEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), entry).await?))
}

#[utoipa::path(
    post,
    path = "/api/time-entry",
    request_body = TimeEntryInput,
    responses(
        (status = 201, description = "Time entry recorded", body = TimeEntryResponse),
        (status = 400, description = "Clock-out is not after clock-in"),
        (status = 409, description = "Overlaps another time entry")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn create_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<TimeEntryInput>,
) -> actix_web::Result<impl Responder> {
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let others = same_day_entries(&mut *tx, auth.user_id, payload.date, None).await?;
    plan_time_entry(TimeRange::new(payload.clock_in, payload.clock_out), &others)?;

    let result = sqlx::query(
        "INSERT INTO time_entries (user_id, date, clock_in, clock_out, note) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(payload.date)
    .bind(payload.clock_in)
    .bind(payload.clock_out)
    .bind(clean_note(payload.note.as_deref()))
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let entry = common::fetch_visible(pool.get_ref(), SELECT, result.last_insert_id(), &auth, |e: &TimeEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(respond_with(pool.get_ref(), entry).await?))
}

#[utoipa::path(
    get,
    path = "/api/time-entry",
    params(EntryFilter),
    responses(
        (status = 200, description = "Paginated time entries with hours worked", body = TimeEntryListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn list_time_entries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EntryFilter>,
) -> actix_web::Result<impl Responder> {
    if query.status.is_some() {
        return Err(ApiError::bad_request("Time entries have no approval status").into());
    }

    let owner = auth.list_scope(query.user_id)?;
    let page = Page::new(query.page, query.per_page);
    let filter = Filter::for_entries(owner, &query, DateWindow::Day);

    let total = filter.count(pool.get_ref(), TABLE).await?;
    let entries = filter
        .fetch_page::<TimeEntry>(pool.get_ref(), SELECT, "date DESC, clock_in DESC", page)
        .await?;

    Ok(HttpResponse::Ok().json(TimeEntryListResponse {
        data: with_worked_minutes(pool.get_ref(), entries).await?,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/time-entry/{id}",
    params(("id" = u64, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "Time entry", body = TimeEntryResponse),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn get_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = common::fetch_visible(pool.get_ref(), SELECT, path.into_inner(), &auth, |e: &TimeEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), entry).await?))
}

#[utoipa::path(
    put,
    path = "/api/time-entry/{id}",
    params(("id" = u64, Path, description = "Time entry ID")),
    request_body = TimeEntryInput,
    responses(
        (status = 200, description = "Time entry updated", body = TimeEntryResponse),
        (status = 400, description = "Clock-out is not after clock-in"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Overlaps another time entry")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn update_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<TimeEntryInput>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    // owners fix their own entries, reviewers correct anyone's
    let current = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &TimeEntry| e.user_id).await?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, current.user_id).await?;
    let others = same_day_entries(&mut *tx, current.user_id, payload.date, Some(id)).await?;
    plan_time_entry(TimeRange::new(payload.clock_in, payload.clock_out), &others)?;

    sqlx::query(
        "UPDATE time_entries SET date = ?, clock_in = ?, clock_out = ?, note = ? WHERE id = ?",
    )
    .bind(payload.date)
    .bind(payload.clock_in)
    .bind(payload.clock_out)
    .bind(clean_note(payload.note.as_deref()))
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    tracing::info!(id, owner = current.user_id, by = auth.user_id, "Time entry updated");

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &TimeEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(respond_with(pool.get_ref(), entry).await?))
}

#[utoipa::path(
    delete,
    path = "/api/time-entry/{id}",
    params(("id" = u64, Path, description = "Time entry ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn delete_time_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &TimeEntry| e.user_id).await?;

    sqlx::query("DELETE FROM time_entries WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    tracing::info!(id, by = auth.user_id, "Time entry deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/time-entry/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Worked vs expected time over the period", body = WorkSummary),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Time entry"
)]
pub async fn time_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    let user_id = auth.scope_user(query.user_id)?;
    let range = summary_period(query.from, query.to)?;

    let entries = closed_entries(pool.get_ref(), user_id, range).await?;

    let permissions = permission::approved_minutes_by_day(pool.get_ref(), user_id, range).await?;
    let vacations = vacation::approved_overlapping(pool.get_ref(), user_id, range).await?;

    Ok(HttpResponse::Ok().json(summarize(
        range,
        &entries,
        &permissions,
        &vacations,
        config.daily_work_minutes,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::status::ApprovalStatus;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(id: u64, date: NaiveDate, clock_in: NaiveTime, clock_out: Option<NaiveTime>) -> TimeEntry {
        TimeEntry {
            id,
            user_id: 7,
            date,
            clock_in,
            clock_out,
            note: None,
            created_at: None,
        }
    }

    #[test]
    fn manual_entry_needs_forward_interval() {
        assert_eq!(plan_time_entry(TimeRange::new(t(8, 0), t(12, 0)), &[]), Ok(240));
        assert!(matches!(
            plan_time_entry(TimeRange::new(t(12, 0), t(8, 0)), &[]),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn manual_entry_may_not_overlap_others() {
        let others = [entry(1, d(20), t(8, 0), Some(t(12, 0)))];

        assert!(matches!(
            plan_time_entry(TimeRange::new(t(11, 0), t(13, 0)), &others),
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(plan_time_entry(TimeRange::new(t(12, 0), t(13, 0)), &others), Ok(60));
    }

    #[test]
    fn running_timer_blocks_later_entries() {
        let others = [entry(1, d(20), t(13, 0), None)];
        assert!(plan_time_entry(TimeRange::new(t(15, 0), t(16, 0)), &others).is_err());
        assert!(plan_time_entry(TimeRange::new(t(8, 0), t(12, 0)), &others).is_ok());
    }

    #[test]
    fn manual_entry_times_are_whole_minutes() {
        let with_seconds = NaiveTime::from_hms_opt(12, 0, 30).unwrap();
        assert!(matches!(
            plan_time_entry(TimeRange::new(t(8, 0), with_seconds), &[]),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn clock_in_refused_while_a_timer_runs() {
        let open = entry(1, d(19), t(8, 0), None);
        assert!(matches!(
            plan_clock_in(Some(&open), t(9, 0), &[]),
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(plan_clock_in(None, t(9, 0), &[]), Ok(()));
    }

    #[test]
    fn clock_in_refused_inside_a_recorded_entry() {
        let others = [entry(1, d(20), t(8, 0), Some(t(12, 0)))];
        assert!(plan_clock_in(None, t(11, 0), &others).is_err());
        // a later manual entry is still ahead of now
        let later = [entry(2, d(20), t(15, 0), Some(t(16, 0)))];
        assert!(plan_clock_in(None, t(13, 0), &later).is_err());
        assert_eq!(plan_clock_in(None, t(12, 0), &others), Ok(()));
    }

    #[test]
    fn clock_out_after_clock_in_on_the_same_day() {
        let open = entry(1, d(20), t(8, 0), None);
        assert_eq!(plan_clock_out(&open, d(20), t(12, 30)), Ok(270));
    }

    #[test]
    fn clock_out_not_after_clock_in_is_refused() {
        let open = entry(1, d(20), t(8, 0), None);
        assert!(matches!(plan_clock_out(&open, d(20), t(8, 0)), Err(ApiError::BadRequest(_))));
        assert!(matches!(plan_clock_out(&open, d(20), t(7, 59)), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn clock_out_refused_for_a_timer_left_open_on_an_earlier_day() {
        let open = entry(1, d(19), t(8, 0), None);
        assert!(matches!(plan_clock_out(&open, d(20), t(17, 0)), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn closed_entry_cannot_be_clocked_out_again() {
        let closed = entry(1, d(20), t(8, 0), Some(t(12, 0)));
        assert!(matches!(plan_clock_out(&closed, d(20), t(13, 0)), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn summary_period_allows_at_most_366_days() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        let full = summary_period(day(2026, 1, 1), day(2027, 1, 1)).unwrap();
        assert_eq!((full.end - full.start).num_days() + 1, 366);

        assert!(matches!(
            summary_period(day(2026, 1, 1), day(2027, 1, 2)),
            Err(ApiError::BadRequest(_))
        ));
        assert_eq!(summary_period(d(20), d(20)), Ok(DateRange::single(d(20))));
    }

    #[test]
    fn summary_period_must_not_be_reversed() {
        assert!(matches!(summary_period(d(21), d(20)), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn permission_is_netted_once_across_a_day() {
        let day_entries = [
            entry(2, d(20), t(13, 0), Some(t(17, 0))),
            entry(1, d(20), t(8, 0), Some(t(8, 30))),
            entry(3, d(21), t(8, 0), Some(t(16, 0))),
        ];
        let minutes = HashMap::from([((7, d(20)), 90)]);

        let shares = spread_permission(&day_entries, &minutes);
        // earliest entry is used up first, the rest lands on the afternoon
        assert_eq!(shares.get(&1), Some(&30));
        assert_eq!(shares.get(&2), Some(&60));
        assert_eq!(shares.get(&3), None);

        let rows: i64 = day_entries[..2]
            .iter()
            .cloned()
            .map(|e| {
                let m = shares.get(&e.id).copied().unwrap_or(0);
                TimeEntryResponse::from_entry(e, m).worked_minutes.unwrap_or(0)
            })
            .sum();
        let summary = summarize(
            DateRange::single(d(20)),
            &day_entries,
            &HashMap::from([(d(20), 90)]),
            &[],
            480,
        );
        assert_eq!(rows, summary.worked_minutes);
    }

    #[test]
    fn summary_nets_permissions_and_excludes_vacation_days() {
        // Mon 19 .. Fri 23 October
        let range = DateRange::new(d(19), d(23));
        let entries = [
            entry(1, d(19), t(8, 0), Some(t(12, 0))),
            entry(2, d(19), t(13, 0), Some(t(17, 0))),
            entry(3, d(20), t(8, 0), Some(t(17, 0))),
            entry(4, d(21), t(8, 0), None),
        ];
        let permissions = HashMap::from([(d(20), 60)]);
        let vacations = [VacationEntry {
            id: 1,
            user_id: 7,
            start_date: d(22),
            end_date: d(25),
            duration: 2,
            reason: None,
            status: ApprovalStatus::Approved,
            created_at: None,
        }];

        let summary = summarize(range, &entries, &permissions, &vacations, 480);

        assert_eq!(
            summary.days,
            vec![
                DayTotal { date: d(19), worked_minutes: 480, permission_minutes: 0 },
                DayTotal { date: d(20), worked_minutes: 480, permission_minutes: 60 },
            ]
        );
        assert_eq!(summary.worked_minutes, 960);
        assert_eq!(summary.vacation_days, 2);
        // Mon-Wed are working days
        assert_eq!(summary.expected_minutes, 3 * 480);
        assert_eq!(summary.balance_minutes, 960 - 1440);
        assert_eq!(summary.permission_minutes, 60);
    }

    #[test]
    fn overlapping_vacations_count_days_once() {
        let range = DateRange::new(d(19), d(23));
        let v = |id, start, end| VacationEntry {
            id,
            user_id: 7,
            start_date: start,
            end_date: end,
            duration: 0,
            reason: None,
            status: ApprovalStatus::Approved,
            created_at: None,
        };
        let vacations = [v(1, d(19), d(21)), v(2, d(20), d(22))];

        let summary = summarize(range, &[], &HashMap::new(), &vacations, 480);
        assert_eq!(summary.vacation_days, 4);
        assert_eq!(summary.expected_minutes, 480);
    }
}
