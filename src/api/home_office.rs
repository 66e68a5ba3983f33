use crate::{
    api::{
        common::{self, Action, DateWindow, EntryFilter, Filter, Page},
        vacation,
    },
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        home_office::{HomeOfficeEntry, HomeOfficeRequestEntry},
        status::ApprovalStatus,
        vacation::VacationEntry,
    },
    utils::calendar::{self, DateRange},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use utoipa::ToSchema;

const ENTRY_TABLE: &str = "home_office_entries";
const ENTRY_SELECT: &str = r#"
    SELECT id, user_id, address, start_date, end_date, status, created_at
    FROM home_office_entries"#;

const REQUEST_TABLE: &str = "home_office_requests";
const REQUEST_SELECT: &str = r#"
    SELECT id, user_id, address, start_date, end_date, duration, status, created_at
    FROM home_office_requests"#;

const MAX_ADDRESS_LEN: usize = 255;

#[derive(Debug, Deserialize, ToSchema)]
pub struct HomeOfficeInput {
    #[schema(example = "Via Roma 1, Milano")]
    pub address: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-12-31", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HomeOfficeRequestInput {
    /// Defaults to the approved home-office address covering `start_date`
    #[schema(example = "Via Roma 1, Milano")]
    pub address: Option<String>,
    #[schema(example = "2026-10-26", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-10-27", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct HomeOfficeListResponse {
    pub data: Vec<HomeOfficeEntry>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct HomeOfficeRequestListResponse {
    pub data: Vec<HomeOfficeRequestEntry>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

fn clean_address(address: &str) -> Result<String, ApiError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ApiError::bad_request("address is required"));
    }
    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(ApiError::bad_request("address is too long"));
    }
    Ok(address.to_string())
}

/// Validates a home-office registration and returns the cleaned address.
pub fn plan_home_office(
    range: DateRange,
    address: &str,
    others: &[HomeOfficeEntry],
) -> Result<String, ApiError> {
    let address = clean_address(address)?;
    if !range.is_valid() {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    if let Some(clash) = others
        .iter()
        .filter(|e| e.status.is_active())
        .find(|e| calendar::date_ranges_overlap(e.range(), range))
    {
        return Err(ApiError::conflict(format!(
            "Overlaps home-office entry {} ({} to {})",
            clash.id, clash.start_date, clash.end_date
        )));
    }

    Ok(address)
}

/// Explicit address wins; otherwise the approved registration covering `start`.
pub fn resolve_address(
    explicit: Option<&str>,
    start: NaiveDate,
    registered: &[HomeOfficeEntry],
) -> Result<String, ApiError> {
    match explicit.map(str::trim).filter(|a| !a.is_empty()) {
        Some(address) => clean_address(address),
        None => registered
            .iter()
            .find(|e| e.status == ApprovalStatus::Approved && e.range().contains(start))
            .map(|e| e.address.clone())
            .ok_or_else(|| {
                ApiError::bad_request(format!("No approved home-office address covers {start}"))
            }),
    }
}

/// Validates a home-office request. Returns its business-day duration.
pub fn plan_request(
    range: DateRange,
    approved_vacations: &[VacationEntry],
    others: &[HomeOfficeRequestEntry],
) -> Result<u32, ApiError> {
    if !range.is_valid() {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let duration = calendar::business_days(range.start, range.end);
    if duration == 0 {
        return Err(ApiError::bad_request("Request must include at least one business day"));
    }

    if let Some(v) = approved_vacations
        .iter()
        .find(|v| calendar::date_ranges_overlap(v.range(), range))
    {
        return Err(ApiError::conflict(format!(
            "Overlaps approved vacation {} ({} to {})",
            v.id, v.start_date, v.end_date
        )));
    }

    if let Some(clash) = others
        .iter()
        .filter(|e| e.status.is_active())
        .find(|e| calendar::date_ranges_overlap(e.range(), range))
    {
        return Err(ApiError::conflict(format!(
            "Overlaps home-office request {} ({} to {})",
            clash.id, clash.start_date, clash.end_date
        )));
    }

    Ok(duration)
}

async fn active_entries(
    conn: &mut MySqlConnection,
    user_id: u64,
    range: DateRange,
    exclude_id: Option<u64>,
) -> Result<Vec<HomeOfficeEntry>, ApiError> {
    let sql = format!(
        "{} WHERE user_id = ? AND status IN ('pending', 'approved') AND end_date >= ? AND start_date <= ? AND id <> ?",
        ENTRY_SELECT
    );

    Ok(sqlx::query_as::<_, HomeOfficeEntry>(&sql)
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(conn)
        .await?)
}

async fn active_requests(
    conn: &mut MySqlConnection,
    user_id: u64,
    range: DateRange,
    exclude_id: Option<u64>,
) -> Result<Vec<HomeOfficeRequestEntry>, ApiError> {
    let sql = format!(
        "{} WHERE user_id = ? AND status IN ('pending', 'approved') AND end_date >= ? AND start_date <= ? AND id <> ?",
        REQUEST_SELECT
    );

    Ok(sqlx::query_as::<_, HomeOfficeRequestEntry>(&sql)
        .bind(user_id)
        .bind(range.start)
        .bind(range.end)
        .bind(exclude_id.unwrap_or(0))
        .fetch_all(conn)
        .await?)
}

/// Address and duration for a request of `user_id`.
async fn validate_request(
    conn: &mut MySqlConnection,
    user_id: u64,
    input: &HomeOfficeRequestInput,
    exclude_id: Option<u64>,
) -> Result<(String, u32), ApiError> {
    let range = DateRange::new(input.start_date, input.end_date);
    if !range.is_valid() {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let registered = active_entries(&mut *conn, user_id, DateRange::single(range.start), None).await?;
    let address = resolve_address(input.address.as_deref(), range.start, &registered)?;

    let vacations = vacation::approved_overlapping(&mut *conn, user_id, range).await?;
    let others = active_requests(&mut *conn, user_id, range, exclude_id).await?;
    let duration = plan_request(range, &vacations, &others)?;

    Ok((address, duration))
}

async fn transition(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    table: &str,
    id: u64,
    action: Action,
) -> actix_web::Result<HttpResponse> {
    let status = common::apply_action(pool.get_ref(), table, id, &auth, action).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}

/* =========================
Home-office entries
========================= */
#[utoipa::path(
    post,
    path = "/api/home-office",
    request_body = HomeOfficeInput,
    responses(
        (status = 201, description = "Home-office address registered", body = HomeOfficeEntry),
        (status = 400, description = "Missing address or invalid range"),
        (status = 409, description = "Overlaps another registration")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn create_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HomeOfficeInput>,
) -> actix_web::Result<impl Responder> {
    let range = DateRange::new(payload.start_date, payload.end_date);

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let others = if range.is_valid() {
        active_entries(&mut tx, auth.user_id, range, None).await?
    } else {
        Vec::new()
    };
    let address = plan_home_office(range, &payload.address, &others)?;

    let result = sqlx::query(
        r#"
        INSERT INTO home_office_entries (user_id, address, start_date, end_date, status)
        VALUES (?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(&address)
    .bind(range.start)
    .bind(range.end)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let id = result.last_insert_id();
    tracing::info!(id, user_id = auth.user_id, "Home-office address registered");

    let entry = common::fetch_visible(pool.get_ref(), ENTRY_SELECT, id, &auth, |e: &HomeOfficeEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/home-office",
    params(EntryFilter),
    responses(
        (status = 200, description = "Paginated home-office registrations", body = HomeOfficeListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn list_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EntryFilter>,
) -> actix_web::Result<impl Responder> {
    let owner = auth.list_scope(query.user_id)?;
    let page = Page::new(query.page, query.per_page);
    let filter = Filter::for_entries(owner, &query, DateWindow::Range);

    let total = filter.count(pool.get_ref(), ENTRY_TABLE).await?;
    let data = filter
        .fetch_page::<HomeOfficeEntry>(pool.get_ref(), ENTRY_SELECT, "start_date DESC, id DESC", page)
        .await?;

    Ok(HttpResponse::Ok().json(HomeOfficeListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/home-office/{id}",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    responses(
        (status = 200, description = "Home-office entry", body = HomeOfficeEntry),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn get_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = common::fetch_visible(pool.get_ref(), ENTRY_SELECT, path.into_inner(), &auth, |e: &HomeOfficeEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    put,
    path = "/api/home-office/{id}",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    request_body = HomeOfficeInput,
    responses(
        (status = 200, description = "Home-office entry updated", body = HomeOfficeEntry),
        (status = 400, description = "Missing address or invalid range"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending, or overlaps another registration")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn update_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HomeOfficeInput>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let current = common::fetch_visible(pool.get_ref(), ENTRY_SELECT, id, &auth, |e: &HomeOfficeEntry| e.user_id).await?;
    common::ensure_editable(&auth, current.user_id, current.status)?;

    let range = DateRange::new(payload.start_date, payload.end_date);

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, current.user_id).await?;
    let others = if range.is_valid() {
        active_entries(&mut tx, current.user_id, range, Some(id)).await?
    } else {
        Vec::new()
    };
    let address = plan_home_office(range, &payload.address, &others)?;

    let result = sqlx::query(
        r#"
        UPDATE home_office_entries
        SET address = ?, start_date = ?, end_date = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(&address)
    .bind(range.start)
    .bind(range.end)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Only pending entries can be edited").into());
    }
    tx.commit().await.map_err(ApiError::from)?;

    let entry = common::fetch_visible(pool.get_ref(), ENTRY_SELECT, id, &auth, |e: &HomeOfficeEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/home-office/{id}",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn delete_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    common::delete_entry(pool.get_ref(), ENTRY_TABLE, path.into_inner(), &auth).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/home-office/{id}/approve",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    responses(
        (status = 200, description = "Approved", body = Object, example = json!({"status": "approved"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn approve_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, ENTRY_TABLE, path.into_inner(), Action::Approve).await
}

#[utoipa::path(
    put,
    path = "/api/home-office/{id}/reject",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    responses(
        (status = 200, description = "Rejected", body = Object, example = json!({"status": "rejected"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn reject_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, ENTRY_TABLE, path.into_inner(), Action::Reject).await
}

#[utoipa::path(
    put,
    path = "/api/home-office/{id}/cancel",
    params(("id" = u64, Path, description = "Home-office entry ID")),
    responses(
        (status = 200, description = "Cancelled", body = Object, example = json!({"status": "cancelled"})),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Already rejected or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn cancel_home_office(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, ENTRY_TABLE, path.into_inner(), Action::Cancel).await
}

/* =========================
Home-office requests
========================= */
#[utoipa::path(
    post,
    path = "/api/home-office-request",
    request_body = HomeOfficeRequestInput,
    responses(
        (status = 201, description = "Home-office day(s) requested", body = HomeOfficeRequestEntry),
        (status = 400, description = "Invalid range or no address available"),
        (status = 409, description = "Overlaps a vacation or another request")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn create_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HomeOfficeRequestInput>,
) -> actix_web::Result<impl Responder> {
    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, auth.user_id).await?;
    let (address, duration) = validate_request(&mut tx, auth.user_id, &payload, None).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO home_office_requests (user_id, address, start_date, end_date, duration, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(auth.user_id)
    .bind(&address)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(duration)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;
    tx.commit().await.map_err(ApiError::from)?;

    let id = result.last_insert_id();
    tracing::info!(id, user_id = auth.user_id, duration, "Home office requested");

    let entry = common::fetch_visible(pool.get_ref(), REQUEST_SELECT, id, &auth, |e: &HomeOfficeRequestEntry| e.user_id).await?;
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    get,
    path = "/api/home-office-request",
    params(EntryFilter),
    responses(
        (status = 200, description = "Paginated home-office requests", body = HomeOfficeRequestListResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn list_home_office_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EntryFilter>,
) -> actix_web::Result<impl Responder> {
    let owner = auth.list_scope(query.user_id)?;
    let page = Page::new(query.page, query.per_page);
    let filter = Filter::for_entries(owner, &query, DateWindow::Range);

    let total = filter.count(pool.get_ref(), REQUEST_TABLE).await?;
    let data = filter
        .fetch_page::<HomeOfficeRequestEntry>(pool.get_ref(), REQUEST_SELECT, "start_date DESC, id DESC", page)
        .await?;

    Ok(HttpResponse::Ok().json(HomeOfficeRequestListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/home-office-request/{id}",
    params(("id" = u64, Path, description = "Home-office request ID")),
    responses(
        (status = 200, description = "Home-office request", body = HomeOfficeRequestEntry),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn get_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = common::fetch_visible(pool.get_ref(), REQUEST_SELECT, path.into_inner(), &auth, |e: &HomeOfficeRequestEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    put,
    path = "/api/home-office-request/{id}",
    params(("id" = u64, Path, description = "Home-office request ID")),
    request_body = HomeOfficeRequestInput,
    responses(
        (status = 200, description = "Request updated", body = HomeOfficeRequestEntry),
        (status = 400, description = "Invalid range or no address available"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending, or overlaps a vacation or another request")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn update_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HomeOfficeRequestInput>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let current = common::fetch_visible(pool.get_ref(), REQUEST_SELECT, id, &auth, |e: &HomeOfficeRequestEntry| e.user_id).await?;
    common::ensure_editable(&auth, current.user_id, current.status)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;
    common::lock_user(&mut tx, current.user_id).await?;
    let (address, duration) = validate_request(&mut tx, current.user_id, &payload, Some(id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE home_office_requests
        SET address = ?, start_date = ?, end_date = ?, duration = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(&address)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(duration)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Only pending entries can be edited").into());
    }
    tx.commit().await.map_err(ApiError::from)?;

    let entry = common::fetch_visible(pool.get_ref(), REQUEST_SELECT, id, &auth, |e: &HomeOfficeRequestEntry| e.user_id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/home-office-request/{id}",
    params(("id" = u64, Path, description = "Home-office request ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn delete_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    common::delete_entry(pool.get_ref(), REQUEST_TABLE, path.into_inner(), &auth).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    put,
    path = "/api/home-office-request/{id}/approve",
    params(("id" = u64, Path, description = "Home-office request ID")),
    responses(
        (status = 200, description = "Approved", body = Object, example = json!({"status": "approved"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn approve_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, REQUEST_TABLE, path.into_inner(), Action::Approve).await
}

#[utoipa::path(
    put,
    path = "/api/home-office-request/{id}/reject",
    params(("id" = u64, Path, description = "Home-office request ID")),
    responses(
        (status = 200, description = "Rejected", body = Object, example = json!({"status": "rejected"})),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "Not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn reject_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, REQUEST_TABLE, path.into_inner(), Action::Reject).await
}

#[utoipa::path(
    put,
    path = "/api/home-office-request/{id}/cancel",
    params(("id" = u64, Path, description = "Home-office request ID")),
    responses(
        (status = 200, description = "Cancelled", body = Object, example = json!({"status": "cancelled"})),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Already rejected or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Home office"
)]
pub async fn cancel_home_office_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    transition(auth, pool, REQUEST_TABLE, path.into_inner(), Action::Cancel).await
}
