use crate::{config::Config, error::ApiError, model::role::Role, models::TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use super::jwt::verify_token;

/// Caller identity, resolved from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Decodes a bearer access token. Refresh tokens are refused.
    pub fn from_token(token: &str, config: &Config) -> Result<Self, ApiError> {
        let claims = verify_token(token, &config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

        if claims.token_type != TokenType::Access {
            return Err(ApiError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req) {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(ApiError::Internal)),
        };

        ready(AuthUser::from_token(token, config))
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    pub fn require_manager_or_admin(&self) -> Result<(), ApiError> {
        if self.role.can_review() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Manager/Admin only"))
        }
    }

    pub fn is_reviewer(&self) -> bool {
        self.role.can_review()
    }

    /// Resolves whose entries a list/summary call targets. Employees are
    /// pinned to themselves; reviewers may pick any user.
    pub fn scope_user(&self, requested: Option<u64>) -> Result<u64, ApiError> {
        match requested {
            Some(id) if id != self.user_id && !self.is_reviewer() => {
                Err(ApiError::forbidden("Cannot access other users' entries"))
            }
            Some(id) => Ok(id),
            None => Ok(self.user_id),
        }
    }

    /// Like [`scope_user`](Self::scope_user) but reviewers see every user
    /// when no filter is given.
    pub fn list_scope(&self, requested: Option<u64>) -> Result<Option<u64>, ApiError> {
        if self.is_reviewer() {
            Ok(requested)
        } else {
            self.scope_user(requested).map(Some)
        }
    }

    /// Owner or reviewer may read an entry.
    pub fn can_view(&self, owner_id: u64) -> bool {
        owner_id == self.user_id || self.is_reviewer()
    }

    pub fn require_owner(&self, owner_id: u64) -> Result<(), ApiError> {
        if owner_id == self.user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only the owner can modify this entry"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 7,
            username: "jdoe".into(),
            role,
        }
    }

    #[test]
    fn employees_are_pinned_to_their_own_entries() {
        let emp = user(Role::Employee);
        assert_eq!(emp.scope_user(None), Ok(7));
        assert_eq!(emp.scope_user(Some(7)), Ok(7));
        assert!(emp.scope_user(Some(8)).is_err());
        assert_eq!(emp.list_scope(None), Ok(Some(7)));
    }

    #[test]
    fn reviewers_may_target_any_user() {
        let mgr = user(Role::Manager);
        assert_eq!(mgr.scope_user(Some(8)), Ok(8));
        assert_eq!(mgr.list_scope(None), Ok(None));
        assert!(mgr.can_view(8));
        assert!(mgr.require_owner(8).is_err());
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin).require_admin().is_ok());
        assert!(user(Role::Manager).require_admin().is_err());
        assert!(user(Role::Manager).require_manager_or_admin().is_ok());
        assert!(user(Role::Employee).require_manager_or_admin().is_err());
    }
}
