use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::ApiError;

/// Expected type of an updatable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    UInt,
    Bool,
}

/// Columns a partial update may touch. Keys outside the list are refused,
/// so column names in the generated SQL never come from the client.
#[derive(Debug)]
pub struct UpdatableTable {
    pub table: &'static str,
    pub id_column: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
}

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Bool(bool),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl UpdatableTable {
    /// Builds `UPDATE <table> SET a = ?, b = ? WHERE <id> = ?` from a JSON object.
    pub fn build_update(&self, payload: &Value, id_value: u64) -> Result<SqlUpdate, ApiError> {
        let obj: &Map<String, Value> = payload
            .as_object()
            .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

        if obj.is_empty() {
            return Err(ApiError::bad_request("No fields provided for update"));
        }

        let mut assignments = Vec::with_capacity(obj.len());
        let mut values = Vec::with_capacity(obj.len() + 1);

        for (key, value) in obj {
            let (column, kind) = self
                .columns
                .iter()
                .find(|(name, _)| *name == key.as_str())
                .copied()
                .ok_or_else(|| ApiError::bad_request(format!("Field '{key}' cannot be updated")))?;

            values.push(convert(column, kind, value)?);
            assignments.push(format!("{column} = ?"));
        }

        values.push(SqlValue::U64(id_value));

        Ok(SqlUpdate {
            sql: format!(
                "UPDATE {} SET {} WHERE {} = ?",
                self.table,
                assignments.join(", "),
                self.id_column
            ),
            values,
        })
    }
}

fn convert(column: &str, kind: ColumnKind, value: &Value) -> Result<SqlValue, ApiError> {
    let mismatch = || ApiError::bad_request(format!("Invalid value for '{column}'"));

    Ok(match (kind, value) {
        (_, Value::Null) => SqlValue::Null,
        (ColumnKind::Text, Value::String(s)) => SqlValue::String(s.trim().to_string()),
        (ColumnKind::UInt, Value::Number(n)) => SqlValue::U64(n.as_u64().ok_or_else(mismatch)?),
        (ColumnKind::Bool, Value::Bool(b)) => SqlValue::Bool(*b),
        _ => return Err(mismatch()),
    })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USERS: UpdatableTable = UpdatableTable {
        table: "users",
        id_column: "id",
        columns: &[
            ("email", ColumnKind::Text),
            ("role_id", ColumnKind::UInt),
            ("is_active", ColumnKind::Bool),
        ],
    };

    #[test]
    fn builds_statement_for_whitelisted_columns() {
        let update = USERS
            .build_update(&json!({"email": " a@b.c ", "is_active": false}), 9)
            .unwrap();

        assert_eq!(update.sql, "UPDATE users SET email = ?, is_active = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("a@b.c".into()),
                SqlValue::Bool(false),
                SqlValue::U64(9)
            ]
        );
    }

    #[test]
    fn refuses_unknown_columns() {
        let err = USERS
            .build_update(&json!({"password": "x"}), 1)
            .unwrap_err();
        assert_eq!(err, ApiError::bad_request("Field 'password' cannot be updated"));
    }

    #[test]
    fn refuses_type_mismatch_and_empty_payloads() {
        assert!(USERS.build_update(&json!({"role_id": "admin"}), 1).is_err());
        assert!(USERS.build_update(&json!({"role_id": -1}), 1).is_err());
        assert!(USERS.build_update(&json!({}), 1).is_err());
        assert!(USERS.build_update(&json!([1, 2]), 1).is_err());
    }
}
