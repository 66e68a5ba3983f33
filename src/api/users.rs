use crate::{
    api::common::{Filter, FilterValue, Page},
    auth::{auth::AuthUser, handlers::validate_email},
    error::{ApiError, is_duplicate_key},
    model::{role::Role, user::UserProfile},
    utils::db_utils::{self, ColumnKind, UpdatableTable},
};
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const SELECT: &str = r#"
    SELECT id, username, email, role_id, is_active, last_login_at
    FROM users"#;

const USERS: UpdatableTable = UpdatableTable {
    table: "users",
    id_column: "id",
    columns: &[
        ("email", ColumnKind::Text),
        ("role_id", ColumnKind::UInt),
        ("is_active", ColumnKind::Bool),
    ],
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Only users with this role
    #[param(example = "employee", value_type = Option<String>)]
    pub role: Option<Role>,
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 10)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserProfile>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 10)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}

/// Stores emails the way registration does: trimmed and lowercased.
pub fn normalize_user_patch(patch: &mut Value) {
    if let Some(Value::String(email)) = patch.get_mut("email") {
        *email = email.trim().to_lowercase();
    }
}

/// Field-level checks the column whitelist cannot express.
pub fn check_user_patch(auth: &AuthUser, target_id: u64, patch: &Value) -> Result<(), ApiError> {
    if let Some(email) = patch.get("email") {
        let email = email
            .as_str()
            .ok_or_else(|| ApiError::bad_request("A valid email is required"))?;
        validate_email(email)?;
    }

    if let Some(role) = patch.get("role_id") {
        let role = role
            .as_u64()
            .and_then(|id| u8::try_from(id).ok())
            .and_then(Role::from_id)
            .ok_or_else(|| ApiError::bad_request("role_id must be 1, 2 or 3"))?;

        if target_id == auth.user_id && role != Role::Admin {
            return Err(ApiError::forbidden("Admins cannot demote themselves"));
        }
    }

    if let Some(active) = patch.get("is_active") {
        if active.is_null() {
            return Err(ApiError::bad_request("is_active cannot be null"));
        }
        if target_id == auth.user_id && active == &Value::Bool(false) {
            return Err(ApiError::forbidden("Admins cannot deactivate themselves"));
        }
    }

    Ok(())
}

async fn fetch_profile(pool: &MySqlPool, id: u64) -> Result<UserProfile, ApiError> {
    let sql = format!("{} WHERE id = ?", SELECT);

    sqlx::query_as::<_, UserProfile>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Paginated user list", body = UserListResponse),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let page = Page::new(query.page, query.per_page);
    let mut filter = Filter::default();
    if let Some(role) = query.role {
        filter.push("role_id = ?", FilterValue::U64(role.id() as u64));
    }

    let total = filter.count(pool.get_ref(), "users").await?;
    let data = filter
        .fetch_page::<UserProfile>(pool.get_ref(), SELECT, "username ASC", page)
        .await?;

    Ok(HttpResponse::Ok().json(UserListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 403, description = "Manager/Admin only"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    Ok(HttpResponse::Ok().json(fetch_profile(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User ID")),
    request_body(
        content = Object,
        description = "Any of email, role_id, is_active",
        example = json!({"role_id": 2, "is_active": true})
    ),
    responses(
        (status = 200, description = "User updated", body = UserProfile),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut payload = payload.into_inner();
    normalize_user_patch(&mut payload);
    check_user_patch(&auth, id, &payload)?;
    let update = USERS.build_update(&payload, id)?;
    fetch_profile(pool.get_ref(), id).await?;

    db_utils::execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::conflict("Email already in use")
            } else {
                ApiError::from(e)
            }
        })?;

    // role or access changes must not survive in long-lived sessions
    if payload.get("role_id").is_some() || payload.get("is_active").is_some() {
        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
            .bind(id)
            .execute(pool.get_ref())
            .await
            .map_err(ApiError::from)?;
    }

    tracing::info!(id, by = auth.user_id, fields = %payload, "User updated");
    Ok(HttpResponse::Ok().json(fetch_profile(pool.get_ref(), id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn admin() -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "root".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn role_ids_must_be_known() {
        assert!(check_user_patch(&admin(), 5, &json!({"role_id": 2})).is_ok());
        assert!(check_user_patch(&admin(), 5, &json!({"role_id": 4})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"role_id": 300})).is_err());
    }

    #[test]
    fn admins_cannot_lock_themselves_out() {
        assert!(matches!(
            check_user_patch(&admin(), 1, &json!({"role_id": 3})),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            check_user_patch(&admin(), 1, &json!({"is_active": false})),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check_user_patch(&admin(), 1, &json!({"email": "me@corp.io"})).is_ok());
    }

    #[test]
    fn email_and_active_flag_are_validated() {
        assert!(check_user_patch(&admin(), 5, &json!({"email": "nope"})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"email": null})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"is_active": null})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"is_active": false})).is_ok());
    }

    #[test]
    fn email_follows_registration_rules() {
        assert!(check_user_patch(&admin(), 5, &json!({"email": "@corp.io"})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"email": "jdoe@"})).is_err());
        assert!(check_user_patch(&admin(), 5, &json!({"email": 42})).is_err());

        let too_long = format!("{}@corp.io", "a".repeat(250));
        assert!(check_user_patch(&admin(), 5, &json!({ "email": too_long })).is_err());
    }

    #[test]
    fn patched_email_is_trimmed_and_lowercased() {
        let mut patch = json!({"email": "  JDoe@Corp.IO ", "role_id": 2});
        normalize_user_patch(&mut patch);
        assert_eq!(patch, json!({"email": "jdoe@corp.io", "role_id": 2}));
        assert!(check_user_patch(&admin(), 5, &patch).is_ok());
    }
}
