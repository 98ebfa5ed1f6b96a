//! Maps control-plane result rows back into resource models.
//!
//! SHOW/DESCRIBE statements return JSON rows keyed by column name. The
//! mapping here is the inverse of what the query layer writes: observed
//! rows become the same model types the desired state is parsed into, so
//! the diff layer compares like with like.

use serde_json::{Map, Value};

use super::errors::WarehouseError;
use super::model::{
    Column, Database, Grant, Role, SecurableKind, SecurableRef, Table, User, Warehouse,
};

/// A decoded result row.
pub type Row = Map<String, Value>;

fn get_str<'a>(
    row: &'a Row,
    column: &'static str,
    statement: &'static str,
) -> Result<&'a str, WarehouseError> {
    row.get(column)
        .and_then(Value::as_str)
        .ok_or(WarehouseError::MissingColumn { column, statement })
}

fn opt_str(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn opt_i64(row: &Row, column: &str) -> Option<i64> {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

fn opt_bool(row: &Row, column: &str) -> Option<bool> {
    match row.get(column) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "y" | "yes" => Some(true),
            "false" | "n" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn warehouse_from_row(row: &Row) -> Result<Warehouse, WarehouseError> {
    Ok(Warehouse {
        name: get_str(row, "name", "SHOW WAREHOUSES")?.to_string(),
        size: get_str(row, "size", "SHOW WAREHOUSES")?.to_string(),
        auto_suspend: opt_i64(row, "auto_suspend"),
        auto_resume: opt_bool(row, "auto_resume"),
        comment: opt_str(row, "comment"),
    })
}

pub fn database_from_row(row: &Row) -> Result<Database, WarehouseError> {
    Ok(Database {
        name: get_str(row, "name", "SHOW DATABASES")?.to_string(),
        data_retention_days: opt_i64(row, "retention_time"),
        comment: opt_str(row, "comment"),
    })
}

pub fn role_from_row(row: &Row) -> Result<Role, WarehouseError> {
    Ok(Role {
        name: get_str(row, "name", "SHOW ROLES")?.to_string(),
        comment: opt_str(row, "comment"),
    })
}

pub fn user_from_row(row: &Row) -> Result<User, WarehouseError> {
    Ok(User {
        name: get_str(row, "name", "SHOW USERS")?.to_string(),
        login_name: opt_str(row, "login_name"),
        default_role: opt_str(row, "default_role"),
        disabled: opt_bool(row, "disabled"),
        comment: opt_str(row, "comment"),
    })
}

fn securable_kind(keyword: &str) -> Option<SecurableKind> {
    match keyword.to_ascii_uppercase().as_str() {
        "ACCOUNT" => Some(SecurableKind::Account),
        "WAREHOUSE" => Some(SecurableKind::Warehouse),
        "DATABASE" => Some(SecurableKind::Database),
        "SCHEMA" => Some(SecurableKind::Schema),
        "TABLE" => Some(SecurableKind::Table),
        _ => None,
    }
}

/// Maps one SHOW GRANTS row. Rows for securable kinds this tool does not
/// manage yield `None` so they are ignored rather than failing the fetch.
pub fn grant_from_row(row: &Row) -> Result<Option<Grant>, WarehouseError> {
    let granted_on = get_str(row, "granted_on", "SHOW GRANTS")?;
    let kind = match securable_kind(granted_on) {
        Some(kind) => kind,
        None => return Ok(None),
    };
    Ok(Some(Grant {
        privilege: get_str(row, "privilege", "SHOW GRANTS")?.to_string(),
        on: SecurableRef {
            kind,
            name: opt_str(row, "name").unwrap_or_default(),
        },
        to_role: get_str(row, "grantee_name", "SHOW GRANTS")?.to_string(),
    }))
}

/// Maps one SHOW TABLES row to a table shell; columns are filled in from a
/// separate DESCRIBE TABLE call.
pub fn table_from_row(row: &Row) -> Result<Table, WarehouseError> {
    Ok(Table {
        name: get_str(row, "name", "SHOW TABLES")?.to_string(),
        database: get_str(row, "database_name", "SHOW TABLES")?.to_string(),
        schema: get_str(row, "schema_name", "SHOW TABLES")?.to_string(),
        columns: Vec::new(),
        comment: opt_str(row, "comment"),
    })
}

pub fn column_from_row(row: &Row) -> Result<Column, WarehouseError> {
    Ok(Column {
        name: get_str(row, "name", "DESCRIBE TABLE")?.to_string(),
        data_type: get_str(row, "type", "DESCRIBE TABLE")?.to_string(),
        nullable: opt_bool(row, "null?").unwrap_or(true),
        default: opt_str(row, "default"),
        comment: opt_str(row, "comment"),
    })
}
