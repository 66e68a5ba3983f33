use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{MIN_PASSWORD_LEN, hash_password, is_strong_enough, verify_password},
    },
    config::Config,
    error::{ApiError, is_duplicate_key},
    model::{
        role::Role,
        user::{UserProfile, UserRecord},
    },
    models::{
        ChangePasswordReq, Claims, ForgotPasswordReq, LoginReqDto, RegisterReq, ResetPasswordReq,
        TokenPair, TokenType,
    },
    utils::username_index,
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const MAX_USERNAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 255;

const USER_SELECT: &str = "SELECT id, username, password, role_id, is_active FROM users";
const PROFILE_SELECT: &str =
    "SELECT id, username, email, role_id, is_active, last_login_at FROM users";

#[derive(sqlx::FromRow)]
struct StoredRefresh {
    id: u64,
    revoked: bool,
}

#[derive(sqlx::FromRow)]
struct PendingReset {
    id: u64,
    user_id: u64,
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request("Username is too long"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.len() <= MAX_EMAIL_LEN
        && matches!(email.split_once('@'), Some((local, domain)) if !local.is_empty() && !domain.is_empty());

    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("A valid email is required"))
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if is_strong_enough(password) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )))
    }
}

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })
}

/// Decodes a bearer refresh token. Access tokens are refused.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Result<Claims, ApiError> {
    let token = bearer_token(req).ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }
    Ok(claims)
}

/// Issues an access/refresh pair and stores the refresh `jti`.
async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    username: &str,
    role: Role,
) -> Result<TokenPair, ApiError> {
    let jwt_failed = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, "Token generation failed");
        ApiError::Internal
    };

    let access_token = generate_access_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(jwt_failed)?;

    let (refresh_token, claims) = generate_refresh_token(
        user_id,
        username,
        role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(jwt_failed)?;

    debug!(user_id, jti = %claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

async fn fetch_profile(pool: &MySqlPool, user_id: u64) -> Result<UserProfile, ApiError> {
    let sql = format!("{} WHERE id = ?", PROFILE_SELECT);

    sqlx::query_as::<_, UserProfile>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn revoke_all(pool: &MySqlPool, user_id: u64) -> Result<(), ApiError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid username, email or password"),
        (status = 409, description = "Username or email already taken")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, payload), fields(username = %payload.username))]
pub async fn register(
    payload: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();

    validate_username(username)?;
    validate_email(&email)?;
    validate_password(&payload.password)?;

    if !username_index::is_available(username, pool.get_ref()).await {
        info!("Username already taken");
        return Err(ApiError::conflict("Username already taken").into());
    }

    let hashed = hash(&payload.password)?;

    let result = sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
        .bind(username)
        .bind(&email)
        .bind(&hashed)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::conflict("Username or email already registered")
            } else {
                ApiError::from(e)
            }
        })?;

    username_index::remember(username).await;

    let user_id = result.last_insert_id();
    info!(user_id, "User registered");

    Ok(HttpResponse::Created().json(fetch_profile(pool.get_ref(), user_id).await?))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(identifier = %payload.identifier)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    let identifier = payload.identifier.trim();
    if identifier.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty identifier or password");
        return Err(ApiError::bad_request("Username or password required").into());
    }

    let sql = format!("{} WHERE username = ? OR email = ? LIMIT 1", USER_SELECT);
    let user = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(identifier)
        .bind(identifier.to_lowercase())
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    let Some(user) = user else {
        info!("Invalid credentials: user not found");
        return Err(ApiError::Unauthorized("Invalid credentials".into()).into());
    };

    if let Err(e) = verify_password(&payload.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()).into());
    }

    if !user.is_active {
        info!(user_id = user.id, "Login refused: account disabled");
        return Err(ApiError::forbidden("Account is disabled").into());
    }

    let role = Role::from_id(user.role_id).ok_or_else(|| {
        error!(user_id = user.id, role_id = user.role_id, "Unknown role in users table");
        ApiError::Internal
    })?;

    let tokens = issue_tokens(pool.get_ref(), &config, user.id, &user.username, role).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Invalid, revoked or non-refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let claims = refresh_claims(&req, &config)?;

    let record = sqlx::query_as::<_, StoredRefresh>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ? AND user_id = ?",
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    let record = match record {
        Some(r) if !r.revoked => r,
        _ => return Err(ApiError::Unauthorized("Refresh token revoked".into()).into()),
    };

    // guarded update so two concurrent refreshes cannot both rotate
    let revoked = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ? AND revoked = 0")
        .bind(record.id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;
    if revoked.rows_affected() == 0 {
        return Err(ApiError::Unauthorized("Refresh token revoked".into()).into());
    }

    // role and status are re-read, not trusted from the old token
    let sql = format!("{} WHERE id = ?", USER_SELECT);
    let user = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("Account unavailable".into()))?;

    let role = Role::from_id(user.role_id).ok_or(ApiError::Internal)?;
    let tokens = issue_tokens(pool.get_ref(), &config, user.id, &user.username, role).await?;

    debug!(user_id = user.id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (or was never valid)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    // idempotent: anything but a valid refresh token is a no-op
    let Ok(claims) = refresh_claims(&req, &config) else {
        return Ok(HttpResponse::NoContent().finish());
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    debug!(user_id = claims.user_id, "Logged out");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordReq,
    responses((status = 204, description = "Reset token issued if the account exists")),
    tag = "Auth"
)]
#[instrument(name = "auth_forgot_password", skip(pool, payload))]
pub async fn forgot_password(
    payload: web::Json<ForgotPasswordReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let email = payload.email.trim().to_lowercase();

    let user_id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM users WHERE email = ? AND is_active = 1",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    // same answer whether or not the account exists
    let Some(user_id) = user_id else {
        info!("Password reset requested for unknown email");
        return Ok(HttpResponse::NoContent().finish());
    };

    let token = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO password_resets (user_id, token, expires_at)
        VALUES (?, ?, NOW() + INTERVAL 1 HOUR)
        "#,
    )
    .bind(user_id)
    .bind(&token)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::from)?;

    // no mail transport: the token only reaches the operator log
    debug!(user_id, token = %token, "Password reset token issued");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordReq,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Weak password, or invalid/expired token")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_reset_password", skip(pool, payload))]
pub async fn reset_password(
    payload: web::Json<ResetPasswordReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    validate_password(&payload.password)?;

    let reset = sqlx::query_as::<_, PendingReset>(
        "SELECT id, user_id FROM password_resets WHERE token = ? AND used = 0 AND expires_at > NOW()",
    )
    .bind(payload.token.trim())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?
    .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    let hashed = hash(&payload.password)?;

    let mut tx = pool.begin().await.map_err(ApiError::from)?;

    let claimed = sqlx::query("UPDATE password_resets SET used = 1 WHERE id = ? AND used = 0")
        .bind(reset.id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;
    if claimed.rows_affected() == 0 {
        return Err(ApiError::bad_request("Invalid or expired reset token").into());
    }

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(reset.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(reset.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::from)?;

    tx.commit().await.map_err(ApiError::from)?;

    info!(user_id = reset.user_id, "Password reset");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller's profile", body = UserProfile),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(fetch_profile(pool.get_ref(), auth.user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/me/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 204, description = "Password changed, other sessions signed out"),
        (status = 400, description = "Weak password"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_change_password", skip(auth, pool, payload), fields(user_id = auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> actix_web::Result<impl Responder> {
    validate_password(&payload.new_password)?;

    let sql = format!("{} WHERE id = ?", USER_SELECT);
    let user = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(auth.user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if verify_password(&payload.current_password, &user.password).is_err() {
        info!("Password change refused: current password mismatch");
        return Err(ApiError::Unauthorized("Current password is incorrect".into()).into());
    }

    let hashed = hash(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user.id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::from)?;

    revoke_all(pool.get_ref(), user.id).await?;

    info!("Password changed");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_restricted_to_a_safe_charset() {
        assert!(validate_username("j.doe_42-x").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("john doe").is_err());
        assert!(validate_username("jöhn").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }

    #[test]
    fn emails_need_both_sides_of_the_at() {
        assert!(validate_email("jdoe@company.com").is_ok());
        assert!(validate_email("jdoe").is_err());
        assert!(validate_email("@company.com").is_err());
        assert!(validate_email("jdoe@").is_err());
    }

    #[test]
    fn short_passwords_are_refused() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn refresh_endpoints_refuse_access_tokens() {
        let config = Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap();

        let access = generate_access_token(7, "jdoe", Role::Employee, &config.jwt_secret, 60).unwrap();
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_http_request();
        assert!(matches!(refresh_claims(&req, &config), Err(ApiError::Unauthorized(_))));

        let (refresh, _) = generate_refresh_token(7, "jdoe", Role::Employee, &config.jwt_secret, 60).unwrap();
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert_eq!(refresh_claims(&req, &config).unwrap().user_id, 7);
    }
}
