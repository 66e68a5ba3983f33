use crate::{
    api::{home_office, permission, time_entry, users, vacation},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route rate limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    pub login: Limiter,
    pub register: Limiter,
    pub refresh: Limiter,
    pub protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            register: build_limiter(config.rate_register_per_min)?,
            refresh: build_limiter(config.rate_refresh_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

/// `/{id}` resources plus the approve/reject/cancel transitions, shared by
/// every approval-tracked entry type.
macro_rules! approval_routes {
    ($scope:expr, $module:ident :: { $get:ident, $update:ident, $delete:ident, $approve:ident, $reject:ident, $cancel:ident }) => {
        $scope
            .service(
                web::resource("/{id}")
                    .route(web::get().to($module::$get))
                    .route(web::put().to($module::$update))
                    .route(web::delete().to($module::$delete)),
            )
            .service(web::resource("/{id}/approve").route(web::put().to($module::$approve)))
            .service(web::resource("/{id}/reject").route(web::put().to($module::$reject)))
            .service(web::resource("/{id}/cancel").route(web::put().to($module::$cancel)))
    };
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            )
            .service(
                web::resource("/forgot-password")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::forgot_password)),
            )
            .service(
                web::resource("/reset-password")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::reset_password)),
            ),
    );

    // Protected routes: rate limit first, then authentication
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(web::resource("/me/password").route(web::put().to(handlers::change_password)))
            .service(
                web::scope("/users")
                    .service(web::resource("").route(web::get().to(users::list_users)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::patch().to(users::update_user)),
                    ),
            )
            .service(approval_routes!(
                web::scope("/vacation")
                    .service(
                        web::resource("")
                            .route(web::post().to(vacation::create_vacation))
                            .route(web::get().to(vacation::list_vacations)),
                    )
                    // before /{id}
                    .service(web::resource("/balance").route(web::get().to(vacation::vacation_balance))),
                vacation::{
                    get_vacation,
                    update_vacation,
                    delete_vacation,
                    approve_vacation,
                    reject_vacation,
                    cancel_vacation
                }
            ))
            .service(approval_routes!(
                web::scope("/permission").service(
                    web::resource("")
                        .route(web::post().to(permission::create_permission))
                        .route(web::get().to(permission::list_permissions)),
                ),
                permission::{
                    get_permission,
                    update_permission,
                    delete_permission,
                    approve_permission,
                    reject_permission,
                    cancel_permission
                }
            ))
            .service(
                web::scope("/time-entry")
                    .service(
                        web::resource("")
                            .route(web::post().to(time_entry::create_time_entry))
                            .route(web::get().to(time_entry::list_time_entries)),
                    )
                    .service(web::resource("/clock-in").route(web::post().to(time_entry::clock_in)))
                    .service(web::resource("/clock-out").route(web::put().to(time_entry::clock_out)))
                    .service(web::resource("/summary").route(web::get().to(time_entry::time_summary)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(time_entry::get_time_entry))
                            .route(web::put().to(time_entry::update_time_entry))
                            .route(web::delete().to(time_entry::delete_time_entry)),
                    ),
            )
            // longer prefix first
            .service(approval_routes!(
                web::scope("/home-office-request").service(
                    web::resource("")
                        .route(web::post().to(home_office::create_home_office_request))
                        .route(web::get().to(home_office::list_home_office_requests)),
                ),
                home_office::{
                    get_home_office_request,
                    update_home_office_request,
                    delete_home_office_request,
                    approve_home_office_request,
                    reject_home_office_request,
                    cancel_home_office_request
                }
            ))
            .service(approval_routes!(
                web::scope("/home-office").service(
                    web::resource("")
                        .route(web::post().to(home_office::create_home_office))
                        .route(web::get().to(home_office::list_home_office)),
                ),
                home_office::{
                    get_home_office,
                    update_home_office,
                    delete_home_office,
                    approve_home_office,
                    reject_home_office,
                    cancel_home_office
                }
            )),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair, the old refresh token is revoked
