use crate::{
    api::{
        common::{self, Action, DateWindow, EntryFilter, Filter, Page},
        vacation,
    },
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{permission::PermissionEntry, status::ApprovalStatus, vacation::VacationEntry},
    utils::calendar::{self, DateRange, TimeRange},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlConnection, MySqlPool};
use std::collections::HashMap;
use utoipa::ToSchema;

const TABLE: &str = "permission_entries";
const SELECT: &str = r#"
    SELECT id, user_id, date, start_time, end_time, reason, status, created_at
    FROM permission_entries"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionInput {
    #[schema(example = "2026-10-20", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "10:30:00", value_type = String)]
    pub end_time: NaiveTime,
    #[schema(example = "Doctor appointment")]
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PermissionListResponse {
    pub data: Vec<PermissionEntry>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

/// Checks a permission request against the other permissions of that day,
/// the user's approved vacations and the daily cap. Returns its length in
/// minutes.
pub fn plan_permission(
    date: NaiveDate,
    range: TimeRange,
    same_day: &[PermissionEntry],
    approved_vacations: &[VacationEntry],
    cap_minutes: i64,
) -> Result<i64, ApiError> {
    let minutes = range
        .minutes()
        .ok_or_else(|| ApiError::bad_request("end_time must be after start_time"))?;

    if !range.is_whole_minutes() {
        return Err(ApiError::bad_request("Permission times must be whole minutes"));
    }

    if calendar::is_weekend(date) {
        return Err(ApiError::bad_request("Permissions can only be taken on business days"));
    }

    if let Some(v) = approved_vacations
        .iter()
        .find(|v| v.status == ApprovalStatus::Approved && v.range().contains(date))
    {
        return Err(ApiError::conflict(format!(
            "{} is inside approved vacation {} ({} to {})",
            date, v.id, v.start_date, v.end_date
        )));
    }

    let active: Vec<&PermissionEntry> = same_day
        .iter()
        .filter(|p| p.date == date && p.status.is_active())
        .collect();

    if let Some(p) = active
        .iter()
        .find(|p| calendar::time_ranges_overlap(p.time_range(), range))
    {
        return Err(ApiError::conflict(format!(
            "Overlaps permission {} ({} to {})",
            p.id, p.start_time, p.end_time
        )));
    }

    let existing: i64 = active.iter().map(|p| p.minutes()).sum();
    if !calendar::fits_daily_cap(existing, minutes, cap_minutes) {
        return Err(ApiError::bad_request(format!(
            "Daily permission limit of {cap_minutes} minutes exceeded: {existing} already taken, {minutes} requested"
        )));
    }

    Ok(minutes)
}

/// Approved permission minutes per day for `user_id` inside `range`.
pub async fn approved_minutes_by_day<'e, E>(
    executor: E,
    user_id: u64,
    range: DateRange,
) -> Result<HashMap<NaiveDate, i64>, ApiError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!(
        "{} WHERE user_id = ? AND status = 'approved' AND date BETWEEN ? AND ?",
        SELECT
    );

    let rows = sqlx::query_as::<_, PermissionEntry>(&sql)
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(executor)
        .await?;

    let mut by_day = HashMap::new();
    for p in rows {
        *by_day.entry(p.date).or_insert(0) += p.minutes();
    }
    Ok(by_day)
}

async fn validate(
    conn: &mut MySqlConnection,
    config: &Config,
    user_id: u64,
    input: &PermissionInput,
    exclude_id: Option<u64>,
) -> Result<i64, ApiError> {
    let sql = format!(
        "{} WHERE user_id = ? AND date = ? AND status IN ('pending', 'approved') AND id <> ?",
        SELECT
    );
    let same_day = sqlx::query_as::<_, PermissionEntry>(&sql)
        .bind(user_id)
        .bind(input.date)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(&mut *conn)
        .await?;

    let vacations =
        vacation::approved_overlapping(&mut *conn, user_id, DateRange::single(input.date)).await?;

    plan_permission(
        input.date,
        TimeRange::new(input.start_time, input.end_time),
        &same_day,
        &vacations,
        config.permission_daily_cap_minutes,
    )
}

fn clean_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

#[utoipa::path(
    post,
    path = "/api/permission",
    request_body = PermissionInput,
    responses(
        (status = 201, description = "Permission requested", body = PermissionEntry),
        (status = 400, description = "Invalid times or daily limit exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps a vacation or another permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn create_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<PermissionInput>,
) -> actix_web::Result<impl Responder> {
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let minutes = validate(&mut tx, &config, auth.user_id, &payload, None).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO permission_entries (user_id, date, start_time, end_time, reason, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(clean_reason(payload.reason.as_deref()))
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let id = result.last_insert_id();
    tracing::info!(id, user_id = auth.user_id, date = %payload.date, minutes, "Permission requested");

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &PermissionEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/permission",
    params(EntryFilter),
    responses(
        (status = 200, description = "Paginated permission list", body = PermissionListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn list_permissions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EntryFilter>,
) -> actix_web::Result<impl Responder> {
    let owner = auth.list_scope(query.user_id)?;
    let page = Page::new(query.page, query.per_page);
    let filter = Filter::for_entries(owner, &query, DateWindow::Day);

    let total = filter.count(pool.get_ref(), TABLE).await?;
    let data = filter
        .fetch_page::<PermissionEntry>(pool.get_ref(), SELECT, "date DESC, start_time DESC", page)
        .await?;

    Ok(HttpResponse::Ok().json(PermissionListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/permission/{id}",
    params(("id" = u64, Path, description = "Permission entry ID")),
    responses(
        (status = 200, description = "Permission entry", body = PermissionEntry),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn get_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = common::fetch_visible(pool.get_ref(), SELECT, path.into_inner(), &auth, |e: &PermissionEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    put,
    path = "/api/permission/{id}",
    params(("id" = u64, Path, description = "Permission entry ID")),
    request_body = PermissionInput,
    responses(
        (status = 200, description = "Permission updated", body = PermissionEntry),
        (status = 400, description = "Invalid times or daily limit exceeded"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending, or overlaps a vacation or another permission")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn update_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<PermissionInput>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let current = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &PermissionEntry| e.user_id).await?;
    common::ensure_editable(&auth, current.user_id, current.status)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, current.user_id).await?;
    validate(&mut tx, &config, current.user_id, &payload, Some(id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE permission_entries
        SET date = ?, start_time = ?, end_time = ?, reason = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(payload.date)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(clean_reason(payload.reason.as_deref()))
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Only pending entries can be edited").into());
    }
    tx.commit().await.map_err(ApiError::from)?;

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &PermissionEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/permission/{id}",
    params(("id" = u64, Path, description = "Permission entry ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn delete_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    common::delete_entry(pool.get_ref(), TABLE, path.into_inner(), &auth).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn transition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    action: Action,
) -> actix_web::Result<HttpResponse> {
    let status = common::apply_action(pool.get_ref(), TABLE, path.into_inner(), &auth, action).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}

#[utoipa::path(
    put,
    path = "/api/permission/{id}/approve",
    params(("id" = u64, Path, description = "Permission entry ID")),
    responses(
        (status = 200, description = "Permission approved", body = Object, example = json!({"status": "approved"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn approve_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Approve).await
}

#[utoipa::path(
    put,
    path = "/api/permission/{id}/reject",
    params(("id" = u64, Path, description = "Permission entry ID")),
    responses(
        (status = 200, description = "Permission rejected", body = Object, example = json!({"status": "rejected"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn reject_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Reject).await
}

#[utoipa::path(
    put,
    path = "/api/permission/{id}/cancel",
    params(("id" = u64, Path, description = "Permission entry ID")),
    responses(
        (status = 200, description = "Permission cancelled", body = Object, example = json!({"status": "cancelled"})),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already rejected or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Permission"
)]
pub async fn cancel_permission(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: i64 = 120;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn permission(id: u64, start: NaiveTime, end: NaiveTime, status: ApprovalStatus) -> PermissionEntry {
        PermissionEntry {
            id,
            user_id: 7,
            date: d(20),
            start_time: start,
            end_time: end,
            reason: None,
            status,
            created_at: None,
        }
    }

    fn vacation(start: NaiveDate, end: NaiveDate, status: ApprovalStatus) -> VacationEntry {
        VacationEntry {
            id: 9,
            user_id: 7,
            start_date: start,
            end_date: end,
            duration: calendar::business_days(start, end),
            reason: None,
            status,
            created_at: None,
        }
    }

    #[test]
    fn accepts_permission_within_cap() {
        let range = TimeRange::new(t(9, 0), t(10, 30));
        assert_eq!(plan_permission(d(20), range, &[], &[], CAP), Ok(90));
    }

    #[test]
    fn rejects_inverted_or_empty_times() {
        let inverted = TimeRange::new(t(10, 0), t(9, 0));
        let empty = TimeRange::new(t(10, 0), t(10, 0));
        assert!(matches!(plan_permission(d(20), inverted, &[], &[], CAP), Err(ApiError::BadRequest(_))));
        assert!(matches!(plan_permission(d(20), empty, &[], &[], CAP), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn rejects_weekend_days() {
        // 2026-10-24 is a Saturday
        let range = TimeRange::new(t(9, 0), t(10, 0));
        assert!(plan_permission(d(24), range, &[], &[], CAP).is_err());
    }

    #[test]
    fn daily_total_may_not_exceed_cap() {
        let existing = [permission(1, t(9, 0), t(10, 0), ApprovalStatus::Approved)];

        let exactly_cap = TimeRange::new(t(14, 0), t(15, 0));
        assert_eq!(plan_permission(d(20), exactly_cap, &existing, &[], CAP), Ok(60));

        let over_cap = TimeRange::new(t(14, 0), t(15, 1));
        assert!(matches!(
            plan_permission(d(20), over_cap, &existing, &[], CAP),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn seconds_cannot_stretch_the_cap() {
        let t_s = |h, m, s| NaiveTime::from_hms_opt(h, m, s).unwrap();

        let just_over = TimeRange::new(t(9, 0), t_s(11, 0, 59));
        assert!(matches!(
            plan_permission(d(20), just_over, &[], &[], CAP),
            Err(ApiError::BadRequest(_))
        ));

        let under_a_minute = TimeRange::new(t(14, 0), t_s(14, 0, 59));
        assert!(matches!(
            plan_permission(d(20), under_a_minute, &[], &[], CAP),
            Err(ApiError::BadRequest(_))
        ));

        let full_day = [permission(1, t(9, 0), t(11, 0), ApprovalStatus::Approved)];
        assert!(matches!(
            plan_permission(d(20), under_a_minute, &full_day, &[], CAP),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn single_request_longer_than_cap_is_rejected() {
        let range = TimeRange::new(t(9, 0), t(11, 30));
        assert!(plan_permission(d(20), range, &[], &[], CAP).is_err());
    }

    #[test]
    fn cancelled_permissions_free_up_the_day() {
        let existing = [permission(1, t(9, 0), t(11, 0), ApprovalStatus::Cancelled)];
        let range = TimeRange::new(t(9, 0), t(11, 0));
        assert_eq!(plan_permission(d(20), range, &existing, &[], CAP), Ok(120));
    }

    #[test]
    fn overlapping_permissions_conflict() {
        let existing = [permission(1, t(9, 0), t(10, 0), ApprovalStatus::Pending)];
        let range = TimeRange::new(t(9, 30), t(10, 15));
        assert!(matches!(
            plan_permission(d(20), range, &existing, &[], CAP),
            Err(ApiError::Conflict(_))
        ));

        let adjacent = TimeRange::new(t(10, 0), t(10, 15));
        assert_eq!(plan_permission(d(20), adjacent, &existing, &[], CAP), Ok(15));
    }

    #[test]
    fn approved_vacation_blocks_the_day() {
        let vacations = [vacation(d(19), d(23), ApprovalStatus::Approved)];
        let range = TimeRange::new(t(9, 0), t(10, 0));
        assert!(matches!(
            plan_permission(d(20), range, &[], &vacations, CAP),
            Err(ApiError::Conflict(_))
        ));

        let pending = [vacation(d(19), d(23), ApprovalStatus::Pending)];
        assert_eq!(plan_permission(d(20), range, &[], &pending, CAP), Ok(60));
    }
}
