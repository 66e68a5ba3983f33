use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{role::Role, status::ApprovalStatus},
};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{FromRow, MySqlConnection, MySqlPool, mysql::MySqlRow};
use utoipa::IntoParams;

/// Query parameters shared by the entry list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EntryFilter {
    /// Filter by owner (managers/admins only)
    #[param(example = 7)]
    pub user_id: Option<u64>,
    /// Filter by approval status
    #[param(example = "pending", value_type = Option<String>)]
    pub status: Option<ApprovalStatus>,
    /// Only entries ending on or after this date
    #[param(example = "2026-01-01", value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    /// Only entries starting on or before this date
    #[param(example = "2026-12-31", value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (max 100)
    #[param(example = 10)]
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Page {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(10).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }
}

// Helper enum for typed SQLx binding
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    U64(u64),
    Str(&'static str),
    Date(NaiveDate),
}

/// Date columns an entry list is windowed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// `start_date`/`end_date` range entries
    Range,
    /// single `date` entries
    Day,
}

impl DateWindow {
    fn ends_on_or_after(self) -> &'static str {
        match self {
            DateWindow::Range => "end_date >= ?",
            DateWindow::Day => "date >= ?",
        }
    }

    fn starts_on_or_before(self) -> &'static str {
        match self {
            DateWindow::Range => "start_date <= ?",
            DateWindow::Day => "date <= ?",
        }
    }
}

/// Incrementally built `WHERE` clause with positional binds.
#[derive(Debug, Default)]
pub struct Filter {
    conditions: Vec<&'static str>,
    args: Vec<FilterValue>,
}

impl Filter {
    pub fn push(&mut self, condition: &'static str, value: FilterValue) -> &mut Self {
        self.conditions.push(condition);
        self.args.push(value);
        self
    }

    /// Standard entry filter: owner scope, status and a date window.
    pub fn for_entries(owner: Option<u64>, query: &EntryFilter, window: DateWindow) -> Self {
        let mut filter = Filter::default();

        if let Some(user_id) = owner {
            filter.push("user_id = ?", FilterValue::U64(user_id));
        }
        if let Some(status) = query.status {
            filter.push("status = ?", FilterValue::Str(status.as_str()));
        }
        if let Some(from) = query.from {
            filter.push(window.ends_on_or_after(), FilterValue::Date(from));
        }
        if let Some(to) = query.to {
            filter.push(window.starts_on_or_before(), FilterValue::Date(to));
        }

        filter
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub async fn count(&self, pool: &MySqlPool, table: &str) -> Result<i64, ApiError> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, self.where_clause());

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in &self.args {
            query = match arg {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(s) => query.bind(*s),
                FilterValue::Date(d) => query.bind(*d),
            };
        }

        Ok(query.fetch_one(pool).await?)
    }

    pub async fn fetch_page<T>(
        &self,
        pool: &MySqlPool,
        select: &str,
        order_by: &str,
        page: Page,
    ) -> Result<Vec<T>, ApiError>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let sql = format!(
            "{} {} ORDER BY {} LIMIT ? OFFSET ?",
            select,
            self.where_clause(),
            order_by
        );
        tracing::debug!(sql = %sql, args = ?self.args, "Fetching page");

        let mut query = sqlx::query_as::<_, T>(&sql);
        for arg in &self.args {
            query = match arg {
                FilterValue::U64(v) => query.bind(*v),
                FilterValue::Str(s) => query.bind(*s),
                FilterValue::Date(d) => query.bind(*d),
            };
        }

        Ok(query
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(pool)
            .await?)
    }
}

/// Status change requested through the `/approve`, `/reject` and `/cancel`
/// endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    Reject,
    Cancel,
}

impl Action {
    pub fn target(self) -> ApprovalStatus {
        match self {
            Action::Approve => ApprovalStatus::Approved,
            Action::Reject => ApprovalStatus::Rejected,
            Action::Cancel => ApprovalStatus::Cancelled,
        }
    }

    /// Who may perform the action on an entry owned by `owner_id`.
    pub fn authorize(self, auth: &AuthUser, owner_id: u64) -> Result<(), ApiError> {
        match self {
            Action::Approve | Action::Reject => {
                auth.require_manager_or_admin()?;
                if owner_id == auth.user_id && auth.role != Role::Admin {
                    return Err(ApiError::forbidden("Cannot review your own entry"));
                }
                Ok(())
            }
            Action::Cancel if auth.can_view(owner_id) => Ok(()),
            Action::Cancel => Err(ApiError::forbidden("Cannot cancel other users' entries")),
        }
    }
}

const LOCK_USER: &str = "SELECT id FROM users WHERE id = ? FOR UPDATE";

/// Takes the row lock on `user_id` for the rest of the transaction running on
/// `conn`. Every create and update of a user's entries holds it while it
/// checks caps and overlaps and writes, so those run one at a time per user.
pub async fn lock_user(conn: &mut MySqlConnection, user_id: u64) -> Result<(), ApiError> {
    sqlx::query_scalar::<_, u64>(LOCK_USER)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(())
}

#[derive(FromRow)]
struct OwnerStatus {
    user_id: u64,
    #[sqlx(try_from = "String")]
    status: ApprovalStatus,
}

async fn owner_status(pool: &MySqlPool, table: &str, id: u64) -> Result<OwnerStatus, ApiError> {
    let sql = format!("SELECT user_id, status FROM {} WHERE id = ?", table);

    sqlx::query_as::<_, OwnerStatus>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Entry not found"))
}

pub fn check_transition(current: ApprovalStatus, next: ApprovalStatus) -> Result<(), ApiError> {
    if current.is_terminal() {
        return Err(ApiError::conflict(format!("Entry is already {current}")));
    }
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Entry is {current} and cannot become {next}"
        )));
    }
    Ok(())
}

/// Applies `action` to the entry `id` of `table`, returning the new status.
pub async fn apply_action(
    pool: &MySqlPool,
    table: &str,
    id: u64,
    auth: &AuthUser,
    action: Action,
) -> Result<ApprovalStatus, ApiError> {
    let current = owner_status(pool, table, id).await?;
    action.authorize(auth, current.user_id)?;

    let next = action.target();
    check_transition(current.status, next)?;

    // status guard catches a concurrent change between read and write
    let sql = format!("UPDATE {} SET status = ? WHERE id = ? AND status = ?", table);
    let result = sqlx::query(&sql)
        .bind(next.as_str())
        .bind(id)
        .bind(current.status.as_str())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Entry was modified concurrently"));
    }

    tracing::info!(table, id, by = auth.user_id, from = %current.status, to = %next, "Entry status changed");
    Ok(next)
}

/// Owners delete their own pending entries; admins delete anything.
pub async fn delete_entry(
    pool: &MySqlPool,
    table: &str,
    id: u64,
    auth: &AuthUser,
) -> Result<(), ApiError> {
    let current = owner_status(pool, table, id).await?;

    if auth.role != Role::Admin {
        auth.require_owner(current.user_id)?;
        if current.status != ApprovalStatus::Pending {
            return Err(ApiError::conflict("Only pending entries can be deleted"));
        }
    }

    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    sqlx::query(&sql).bind(id).execute(pool).await?;

    tracing::info!(table, id, by = auth.user_id, "Entry deleted");
    Ok(())
}

/// Fetches one row by id and checks the caller may see it.
pub async fn fetch_visible<T>(
    pool: &MySqlPool,
    select: &str,
    id: u64,
    auth: &AuthUser,
    owner_of: impl Fn(&T) -> u64,
) -> Result<T, ApiError>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let sql = format!("{} WHERE id = ?", select);
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Entry not found"))?;

    if !auth.can_view(owner_of(&row)) {
        // same answer as a missing row
        return Err(ApiError::not_found("Entry not found"));
    }

    Ok(row)
}

/// Entry must belong to the caller and still be pending to be edited.
pub fn ensure_editable(auth: &AuthUser, owner_id: u64, status: ApprovalStatus) -> Result<(), ApiError> {
    auth.require_owner(owner_id)?;
    if status != ApprovalStatus::Pending {
        return Err(ApiError::conflict("Only pending entries can be edited"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("user{id}"),
            role,
        }
    }

    #[test]
    fn page_defaults_and_bounds() {
        assert_eq!(Page::new(None, None), Page { page: 1, per_page: 10 });
        assert_eq!(Page::new(Some(0), Some(1000)), Page { page: 1, per_page: 100 });
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn builds_entry_where_clause() {
        let query = EntryFilter {
            status: Some(ApprovalStatus::Approved),
            from: NaiveDate::from_ymd_opt(2026, 1, 1),
            to: NaiveDate::from_ymd_opt(2026, 1, 31),
            ..Default::default()
        };

        let filter = Filter::for_entries(Some(7), &query, DateWindow::Range);
        assert_eq!(
            filter.where_clause(),
            " WHERE user_id = ? AND status = ? AND end_date >= ? AND start_date <= ?"
        );
        assert_eq!(filter.args[1], FilterValue::Str("approved"));

        let by_day = Filter::for_entries(None, &query, DateWindow::Day);
        assert_eq!(by_day.where_clause(), " WHERE status = ? AND date >= ? AND date <= ?");
    }

    #[test]
    fn user_lock_is_a_locking_read_on_one_row() {
        assert!(LOCK_USER.starts_with("SELECT"));
        assert!(LOCK_USER.ends_with("WHERE id = ? FOR UPDATE"));
        assert!(LOCK_USER.contains("FROM users"));
    }

    #[test]
    fn empty_filter_has_no_where() {
        assert_eq!(Filter::default().where_clause(), "");
    }

    #[test]
    fn reviewers_approve_but_not_their_own_entries() {
        let manager = user(1, Role::Manager);
        assert!(Action::Approve.authorize(&manager, 2).is_ok());
        assert!(Action::Reject.authorize(&manager, 1).is_err());
        assert!(Action::Approve.authorize(&user(3, Role::Admin), 3).is_ok());
        assert!(Action::Approve.authorize(&user(2, Role::Employee), 2).is_err());
    }

    #[test]
    fn owners_and_reviewers_cancel() {
        assert!(Action::Cancel.authorize(&user(2, Role::Employee), 2).is_ok());
        assert!(Action::Cancel.authorize(&user(2, Role::Employee), 5).is_err());
        assert!(Action::Cancel.authorize(&user(1, Role::Manager), 5).is_ok());
    }

    #[test]
    fn closed_entries_cannot_change_status() {
        use ApprovalStatus::*;
        assert!(check_transition(Pending, Approved).is_ok());
        assert!(check_transition(Approved, Cancelled).is_ok());
        assert_eq!(
            check_transition(Rejected, Cancelled),
            Err(ApiError::conflict("Entry is already rejected"))
        );
        assert_eq!(
            check_transition(Approved, Rejected),
            Err(ApiError::conflict("Entry is approved and cannot become rejected"))
        );
    }

    #[test]
    fn only_pending_own_entries_are_editable() {
        let emp = user(2, Role::Employee);
        assert!(ensure_editable(&emp, 2, ApprovalStatus::Pending).is_ok());
        assert!(ensure_editable(&emp, 2, ApprovalStatus::Approved).is_err());
        assert!(ensure_editable(&emp, 3, ApprovalStatus::Pending).is_err());
    }
}
