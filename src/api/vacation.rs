use crate::{
    api::common::{self, Action, DateWindow, EntryFilter, Filter, Page},
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::{status::ApprovalStatus, vacation::VacationEntry},
    utils::calendar::{self, DateRange},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlConnection, MySqlPool};
use utoipa::{IntoParams, ToSchema};

const TABLE: &str = "vacation_entries";
const SELECT: &str = r#"
    SELECT id, user_id, start_date, end_date, duration, reason, status, created_at
    FROM vacation_entries"#;

const MAX_REASON_LEN: usize = 1000;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VacationInput {
    #[schema(example = "2026-12-21", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-12-24", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct VacationListResponse {
    pub data: Vec<VacationEntry>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct VacationBalance {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 25)]
    pub allowance: u32,
    #[schema(example = 10)]
    pub approved_days: u32,
    #[schema(example = 4)]
    pub pending_days: u32,
    /// allowance minus approved and pending days
    #[schema(example = 11)]
    pub remaining_days: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
    /// Whose balance (managers/admins only)
    pub user_id: Option<u64>,
}

fn clean_reason(reason: Option<&str>) -> Result<Option<String>, ApiError> {
    match reason.map(str::trim) {
        None | Some("") => Ok(None),
        Some(r) if r.chars().count() > MAX_REASON_LEN => {
            Err(ApiError::bad_request("reason is too long"))
        }
        Some(r) => Ok(Some(r.to_string())),
    }
}

/// Validates a vacation against the user's other active vacations and the
/// yearly allowance. Returns the business-day duration.
pub fn plan_vacation(
    range: DateRange,
    others: &[VacationEntry],
    allowance: u32,
) -> Result<u32, ApiError> {
    if !range.is_valid() {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let duration = calendar::business_days(range.start, range.end);
    if duration == 0 {
        return Err(ApiError::bad_request("Vacation must include at least one business day"));
    }

    let active = || others.iter().filter(|e| e.status.is_active());

    if let Some(clash) = active().find(|e| calendar::date_ranges_overlap(e.range(), range)) {
        return Err(ApiError::conflict(format!(
            "Overlaps vacation {} ({} to {})",
            clash.id, clash.start_date, clash.end_date
        )));
    }

    for year in calendar::years_spanned(range) {
        let used: u32 = active()
            .map(|e| calendar::business_days_in_year(e.range(), year))
            .sum();
        let requested = calendar::business_days_in_year(range, year);

        if used + requested > allowance {
            return Err(ApiError::bad_request(format!(
                "Vacation allowance for {year} exceeded: {used} of {allowance} days used, {requested} requested"
            )));
        }
    }

    Ok(duration)
}

pub fn balance_for(year: i32, allowance: u32, entries: &[VacationEntry]) -> VacationBalance {
    let days_with = |status: ApprovalStatus| -> u32 {
        entries
            .iter()
            .filter(|e| e.status == status)
            .map(|e| calendar::business_days_in_year(e.range(), year))
            .sum()
    };

    let approved_days = days_with(ApprovalStatus::Approved);
    let pending_days = days_with(ApprovalStatus::Pending);

    VacationBalance {
        year,
        allowance,
        approved_days,
        pending_days,
        remaining_days: allowance as i64 - approved_days as i64 - pending_days as i64,
    }
}

/// Active vacations of `user_id` touching the years `[first, last]`, minus `exclude_id`.
async fn active_in_years<'e, E>(
    executor: E,
    user_id: u64,
    first: i32,
    last: i32,
    exclude_id: Option<u64>,
) -> Result<Vec<VacationEntry>, ApiError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let (Some(window_start), Some(window_end)) = (
        NaiveDate::from_ymd_opt(first, 1, 1),
        NaiveDate::from_ymd_opt(last, 12, 31),
    ) else {
        return Err(ApiError::bad_request("Date out of range"));
    };

    let sql = format!(
        "{} WHERE user_id = ? AND status IN ('pending', 'approved') AND end_date >= ? AND start_date <= ? AND id <> ?",
        SELECT
    );

    Ok(sqlx::query_as::<_, VacationEntry>(&sql)
        .bind(user_id)
        .bind(window_start)
        .bind(window_end)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(executor)
        .await?)
}

/// Approved vacations of `user_id` overlapping `range`. Used by the
/// permission, home-office and time-entry checks.
pub async fn approved_overlapping<'e, E>(
    executor: E,
    user_id: u64,
    range: DateRange,
) -> Result<Vec<VacationEntry>, ApiError>
where
    E: sqlx::Executor<'e, Database = MySql>,
{
    let sql = format!(
        "{} WHERE user_id = ? AND status = 'approved' AND end_date >= ? AND start_date <= ?",
        SELECT
    );

    Ok(sqlx::query_as::<_, VacationEntry>(&sql)
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(executor)
        .await?)
}

async fn validate(
    conn: &mut MySqlConnection,
    config: &Config,
    user_id: u64,
    input: &VacationInput,
    exclude_id: Option<u64>,
) -> Result<u32, ApiError> {
    let range = DateRange::new(input.start_date, input.end_date);
    if !range.is_valid() {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let others = active_in_years(
        conn,
        user_id,
        range.start.year(),
        range.end.year(),
        exclude_id,
    )
    .await?;

    plan_vacation(range, &others, config.annual_vacation_days)
}

/* =========================
Create vacation
========================= */
#[utoipa::path(
    post,
    path = "/api/vacation",
    request_body = VacationInput,
    responses(
        (status = 201, description = "Vacation requested", body = VacationEntry),
        (status = 400, description = "Invalid range or allowance exceeded"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Overlaps another vacation")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn create_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<VacationInput>,
) -> actix_web::Result<impl Responder> {
    let reason = clean_reason(payload.reason.as_deref())?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let duration = validate(&mut tx, &config, auth.user_id, &payload, None).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO vacation_entries (user_id, start_date, end_date, duration, reason, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(duration)
    .bind(&reason)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let id = result.last_insert_id();
    tracing::info!(id, user_id = auth.user_id, duration, "Vacation requested");

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &VacationEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/vacation",
    params(EntryFilter),
    responses(
        (status = 200, description = "Paginated vacation list", body = VacationListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn list_vacations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EntryFilter>,
) -> actix_web::Result<impl Responder> {
    let owner = auth.list_scope(query.user_id)?;
    let page = Page::new(query.page, query.per_page);
    let filter = Filter::for_entries(owner, &query, DateWindow::Range);

    let total = filter.count(pool.get_ref(), TABLE).await?;
    let data = filter
        .fetch_page::<VacationEntry>(pool.get_ref(), SELECT, "start_date DESC, id DESC", page)
        .await?;

    Ok(HttpResponse::Ok().json(VacationListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/vacation/{id}",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    responses(
        (status = 200, description = "Vacation entry", body = VacationEntry),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn get_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = common::fetch_visible(pool.get_ref(), SELECT, path.into_inner(), &auth, |e: &VacationEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    put,
    path = "/api/vacation/{id}",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    request_body = VacationInput,
    responses(
        (status = 200, description = "Vacation updated", body = VacationEntry),
        (status = 400, description = "Invalid range or allowance exceeded"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending, or overlaps another vacation")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn update_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<VacationInput>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let current = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &VacationEntry| e.user_id).await?;
    common::ensure_editable(&auth, current.user_id, current.status)?;

    let reason = clean_reason(payload.reason.as_deref())?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, current.user_id).await?;
    let duration = validate(&mut tx, &config, current.user_id, &payload, Some(id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE vacation_entries
        SET start_date = ?, end_date = ?, duration = ?, reason = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(duration)
    .bind(&reason)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Only pending entries can be edited").into());
    }
    tx.commit().await.map_err(ApiError::from)?;

    let entry = common::fetch_visible(pool.get_ref(), SELECT, id, &auth, |e: &VacationEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/vacation/{id}",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn delete_vacation(
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
    path = "/api/vacation/{id}/approve",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    responses(
        (status = 200, description = "Vacation approved", body = Object, example = json!({"status": "approved"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn approve_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Approve).await
}

#[utoipa::path(
    put,
    path = "/api/vacation/{id}/reject",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    responses(
        (status = 200, description = "Vacation rejected", body = Object, example = json!({"status": "rejected"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn reject_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Reject).await
}

#[utoipa::path(
    put,
    path = "/api/vacation/{id}/cancel",
    params(("id" = u64, Path, description = "Vacation entry ID")),
    responses(
        (status = 200, description = "Vacation cancelled", body = Object, example = json!({"status": "cancelled"})),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Already rejected or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn cancel_vacation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, path, Action::Cancel).await
}

#[utoipa::path(
    get,
    path = "/api/vacation/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Vacation balance for the year", body = VacationBalance),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Vacation"
)]
pub async fn vacation_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let user_id = auth.scope_user(query.user_id)?;
    let year = query.year.unwrap_or_else(|| Local::now().year());

    let entries = active_in_years(pool.get_ref(), user_id, year, year, None).await?;
    Ok(HttpResponse::Ok().json(balance_for(year, config.annual_vacation_days, &entries)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(id: u64, start: NaiveDate, end: NaiveDate, status: ApprovalStatus) -> VacationEntry {
        VacationEntry {
            id,
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
    fn duration_counts_business_days_only() {
        // Mon 2026-10-19 .. Sun 2026-10-25
        let range = DateRange::new(d(2026, 10, 19), d(2026, 10, 25));
        assert_eq!(plan_vacation(range, &[], 25), Ok(5));
    }

    #[test]
    fn weekend_only_range_is_rejected() {
        let range = DateRange::new(d(2026, 10, 24), d(2026, 10, 25));
        assert!(matches!(plan_vacation(range, &[], 25), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let range = DateRange::new(d(2026, 10, 25), d(2026, 10, 19));
        assert!(matches!(plan_vacation(range, &[], 25), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn overlapping_active_vacation_conflicts() {
        let existing = [entry(1, d(2026, 10, 22), d(2026, 10, 28), ApprovalStatus::Pending)];
        let range = DateRange::new(d(2026, 10, 19), d(2026, 10, 22));
        assert!(matches!(plan_vacation(range, &existing, 25), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn cancelled_or_rejected_vacations_do_not_block() {
        let existing = [
            entry(1, d(2026, 10, 19), d(2026, 10, 23), ApprovalStatus::Cancelled),
            entry(2, d(2026, 10, 19), d(2026, 10, 23), ApprovalStatus::Rejected),
        ];
        let range = DateRange::new(d(2026, 10, 19), d(2026, 10, 23));
        assert_eq!(plan_vacation(range, &existing, 25), Ok(5));
    }

    #[test]
    fn allowance_is_checked_per_year() {
        // 20 days already used in 2026
        let existing = [entry(1, d(2026, 3, 2), d(2026, 3, 27), ApprovalStatus::Approved)];
        // Mon 2026-12-28 .. Fri 2027-01-08: 4 days in 2026, 6 in 2027
        let range = DateRange::new(d(2026, 12, 28), d(2027, 1, 8));

        assert_eq!(plan_vacation(range, &existing, 25), Ok(10));
        assert!(matches!(plan_vacation(range, &existing, 23), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn balance_splits_approved_and_pending() {
        let entries = [
            entry(1, d(2026, 3, 2), d(2026, 3, 6), ApprovalStatus::Approved),
            entry(2, d(2026, 12, 28), d(2027, 1, 8), ApprovalStatus::Pending),
            entry(3, d(2026, 5, 4), d(2026, 5, 8), ApprovalStatus::Cancelled),
        ];

        assert_eq!(
            balance_for(2026, 25, &entries),
            VacationBalance {
                year: 2026,
                allowance: 25,
                approved_days: 5,
                pending_days: 4,
                remaining_days: 16,
            }
        );
    }

    #[test]
    fn reasons_are_trimmed_and_bounded() {
        assert_eq!(clean_reason(Some("  trip ")), Ok(Some("trip".into())));
        assert_eq!(clean_reason(Some("   ")), Ok(None));
        assert!(clean_reason(Some(&"x".repeat(MAX_REASON_LEN + 1))).is_err());
    }
}
