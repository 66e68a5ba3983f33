use crate::api::home_office::{
    HomeOfficeInput, HomeOfficeListResponse, HomeOfficeRequestInput, HomeOfficeRequestListResponse,
};
use crate::api::permission::{PermissionInput, PermissionListResponse};
use crate::api::time_entry::{
    ClockInput, DayTotal, TimeEntryInput, TimeEntryListResponse, WorkSummary,
};
use crate::api::users::UserListResponse;
use crate::api::vacation::{VacationBalance, VacationInput, VacationListResponse};
use crate::model::home_office::{HomeOfficeEntry, HomeOfficeRequestEntry};
use crate::model::permission::PermissionEntry;
use crate::model::role::Role;
use crate::model::status::ApprovalStatus;
use crate::model::time_entry::TimeEntryResponse;
use crate::model::user::UserProfile;
use crate::model::vacation::VacationEntry;
use crate::models::{
    ChangePasswordReq, ForgotPasswordReq, LoginReqDto, RegisterReq, ResetPasswordReq, TokenPair,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timetrack API",
        version = "1.0.0",
        description = r#"
## Employee time and leave tracking

### Key Features
- **Vacation**
  - Request leave by date range, sized in business days, with a yearly allowance
- **Permissions**
  - Short absences inside a working day, capped per day
- **Time entries**
  - Clock-in/clock-out timer, manual entries, hours worked net of permissions
- **Home office**
  - Registered home-office addresses and home-office day requests

Leave-related entries carry an approval status
(`pending`, `approved`, `rejected`, `cancelled`) changed by managers and admins.

### Security
Endpoints under `/api` require a **JWT Bearer** access token from `/auth/login`.

### Response Format
- JSON bodies, errors as `{"message": "..."}`
- Pagination via `page` and `per_page` on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::forgot_password,
        crate::auth::handlers::reset_password,
        crate::auth::handlers::me,
        crate::auth::handlers::change_password,

        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,

        crate::api::vacation::create_vacation,
        crate::api::vacation::list_vacations,
        crate::api::vacation::vacation_balance,
        crate::api::vacation::get_vacation,
        crate::api::vacation::update_vacation,
        crate::api::vacation::delete_vacation,
        crate::api::vacation::approve_vacation,
        crate::api::vacation::reject_vacation,
        crate::api::vacation::cancel_vacation,

        crate::api::permission::create_permission,
        crate::api::permission::list_permissions,
        crate::api::permission::get_permission,
        crate::api::permission::update_permission,
        crate::api::permission::delete_permission,
        crate::api::permission::approve_permission,
        crate::api::permission::reject_permission,
        crate::api::permission::cancel_permission,

        crate::api::time_entry::clock_in,
        crate::api::time_entry::clock_out,
        crate::api::time_entry::create_time_entry,
        crate::api::time_entry::list_time_entries,
        crate::api::time_entry::time_summary,
        crate::api::time_entry::get_time_entry,
        crate::api::time_entry::update_time_entry,
        crate::api::time_entry::delete_time_entry,

        crate::api::home_office::create_home_office,
        crate::api::home_office::list_home_office,
        crate::api::home_office::get_home_office,
        crate::api::home_office::update_home_office,
        crate::api::home_office::delete_home_office,
        crate::api::home_office::approve_home_office,
        crate::api::home_office::reject_home_office,
        crate::api::home_office::cancel_home_office,
        crate::api::home_office::create_home_office_request,
        crate::api::home_office::list_home_office_requests,
        crate::api::home_office::get_home_office_request,
        crate::api::home_office::update_home_office_request,
        crate::api::home_office::delete_home_office_request,
        crate::api::home_office::approve_home_office_request,
        crate::api::home_office::reject_home_office_request,
        crate::api::home_office::cancel_home_office_request
    ),
    components(
        schemas(
            Role,
            ApprovalStatus,
            RegisterReq,
            LoginReqDto,
            TokenPair,
            ForgotPasswordReq,
            ResetPasswordReq,
            ChangePasswordReq,
            UserProfile,
            UserListResponse,
            VacationEntry,
            VacationInput,
            VacationListResponse,
            VacationBalance,
            PermissionEntry,
            PermissionInput,
            PermissionListResponse,
            TimeEntryResponse,
            TimeEntryInput,
            ClockInput,
            TimeEntryListResponse,
            DayTotal,
            WorkSummary,
            HomeOfficeEntry,
            HomeOfficeInput,
            HomeOfficeListResponse,
            HomeOfficeRequestEntry,
            HomeOfficeRequestInput,
            HomeOfficeRequestListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and session management"),
        (name = "Users", description = "User administration"),
        (name = "Vacation", description = "Vacation requests and yearly balance"),
        (name = "Permission", description = "Short in-day leaves"),
        (name = "Time entry", description = "Clock-in/out and worked time"),
        (name = "Home office", description = "Home-office addresses and requests"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/auth/login",
            "/api/vacation/balance",
            "/api/permission/{id}/approve",
            "/api/time-entry/summary",
            "/api/home-office-request/{id}/cancel",
            "/api/users/{id}",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
