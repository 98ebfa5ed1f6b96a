//! SQL statement rendering for the warehouse control plane.
//!
//! Statements are built from handlebars templates with identifier quoting
//! and keyword validation applied before interpolation. String literals are
//! escaped by doubling single quotes; identifiers go through
//! [`quote_identifier`] so arbitrary names cannot break out of their
//! position.

use handlebars::{no_escape, Handlebars};
use serde_json::json;

use super::errors::{validate_keyword, WarehouseError};
use super::model::{Column, Database, Grant, Role, SecurableKind, Table, User, Warehouse};
use crate::utilities::identifiers::quote_identifier;

/// Doubles single quotes so a value can sit inside a `'...'` literal.
fn escape_string_literal(value: &str) -> String {
    value.replace('\'', "''")
}

fn renderer() -> Handlebars<'static> {
    let mut reg = Handlebars::new();
    reg.register_escape_fn(no_escape);
    reg
}

static CREATE_WAREHOUSE_TEMPLATE: &str = r#"CREATE WAREHOUSE IF NOT EXISTS {{name}} WAREHOUSE_SIZE = '{{size}}'{{#if auto_suspend}} AUTO_SUSPEND = {{auto_suspend}}{{/if}}{{#if auto_resume}} AUTO_RESUME = {{auto_resume}}{{/if}}{{#if comment}} COMMENT = '{{comment}}'{{/if}}"#;

pub fn create_warehouse_query(warehouse: &Warehouse) -> Result<String, WarehouseError> {
    validate_keyword(&warehouse.size, "warehouse size")?;

    let context = json!({
        "name": quote_identifier(&warehouse.name),
        "size": warehouse.size.to_ascii_uppercase(),
        // pre-rendered so `0` and `false` survive handlebars truthiness
        "auto_suspend": warehouse.auto_suspend.map(|v| v.to_string()),
        "auto_resume": warehouse.auto_resume.map(|v| v.to_string().to_ascii_uppercase()),
        "comment": warehouse.comment.as_deref().map(escape_string_literal),
    });

    Ok(renderer().render_template(CREATE_WAREHOUSE_TEMPLATE, &context)?)
}

static CREATE_DATABASE_TEMPLATE: &str = r#"CREATE DATABASE IF NOT EXISTS {{name}}{{#if retention}} DATA_RETENTION_TIME_IN_DAYS = {{retention}}{{/if}}{{#if comment}} COMMENT = '{{comment}}'{{/if}}"#;

pub fn create_database_query(database: &Database) -> Result<String, WarehouseError> {
    let context = json!({
        "name": quote_identifier(&database.name),
        "retention": database.data_retention_days.map(|v| v.to_string()),
        "comment": database.comment.as_deref().map(escape_string_literal),
    });
    Ok(renderer().render_template(CREATE_DATABASE_TEMPLATE, &context)?)
}

static CREATE_ROLE_TEMPLATE: &str =
    r#"CREATE ROLE IF NOT EXISTS {{name}}{{#if comment}} COMMENT = '{{comment}}'{{/if}}"#;

pub fn create_role_query(role: &Role) -> Result<String, WarehouseError> {
    let context = json!({
        "name": quote_identifier(&role.name),
        "comment": role.comment.as_deref().map(escape_string_literal),
    });
    Ok(renderer().render_template(CREATE_ROLE_TEMPLATE, &context)?)
}

static CREATE_USER_TEMPLATE: &str = r#"CREATE USER IF NOT EXISTS {{name}}{{#if login_name}} LOGIN_NAME = '{{login_name}}'{{/if}}{{#if default_role}} DEFAULT_ROLE = {{default_role}}{{/if}}{{#if disabled}} DISABLED = {{disabled}}{{/if}}{{#if comment}} COMMENT = '{{comment}}'{{/if}}"#;

pub fn create_user_query(user: &User) -> Result<String, WarehouseError> {
    let context = json!({
        "name": quote_identifier(&user.name),
        "login_name": user.login_name.as_deref().map(escape_string_literal),
        "default_role": user.default_role.as_deref().map(quote_identifier),
        "disabled": user.disabled.map(|v| v.to_string().to_ascii_uppercase()),
        "comment": user.comment.as_deref().map(escape_string_literal),
    });
    Ok(renderer().render_template(CREATE_USER_TEMPLATE, &context)?)
}

static CREATE_TABLE_TEMPLATE: &str = r#"CREATE TABLE IF NOT EXISTS {{qualified_name}}
(
{{#each columns}} {{name}} {{data_type}}{{#unless nullable}} NOT NULL{{/unless}}{{#if default}} DEFAULT {{default}}{{/if}}{{#if comment}} COMMENT '{{comment}}'{{/if}}{{#unless @last}},{{/unless}}
{{/each}}){{#if comment}}
COMMENT = '{{comment}}'{{/if}}"#;

pub fn create_table_query(table: &Table) -> Result<String, WarehouseError> {
    let columns: Vec<serde_json::Value> = table
        .columns
        .iter()
        .map(|column| {
            json!({
                "name": quote_identifier(&column.name),
                "data_type": column.data_type,
                "nullable": column.nullable,
                "default": column.default,
                "comment": column.comment.as_deref().map(escape_string_literal),
            })
        })
        .collect();

    let context = json!({
        "qualified_name": qualified_table_name(table),
        "columns": columns,
        "comment": table.comment.as_deref().map(escape_string_literal),
    });

    Ok(renderer().render_template(CREATE_TABLE_TEMPLATE, &context)?)
}

pub fn qualified_table_name(table: &Table) -> String {
    format!(
        "{}.{}.{}",
        quote_identifier(&table.database),
        quote_identifier(&table.schema),
        quote_identifier(&table.name)
    )
}

/// `ALTER <kind> <name> SET K = V ...` / `ALTER <kind> <name> UNSET K, ...`.
///
/// SET and UNSET cannot be combined in one statement, so both forms are
/// returned separately; either list may be empty.
pub fn alter_object_queries(
    kind_keyword: &str,
    name: &str,
    set: &[(String, String)],
    unset: &[String],
) -> Result<Vec<String>, WarehouseError> {
    let mut statements = Vec::new();
    let quoted = quote_identifier(name);

    if !set.is_empty() {
        let clauses = set
            .iter()
            .map(|(key, value)| {
                validate_keyword(key, "property name").map(|()| format!("{key} = {value}"))
            })
            .collect::<Result<Vec<String>, WarehouseError>>()?
            .join(" ");
        statements.push(format!("ALTER {kind_keyword} {quoted} SET {clauses}"));
    }

    if !unset.is_empty() {
        for key in unset {
            validate_keyword(key, "property name")?;
        }
        statements.push(format!(
            "ALTER {kind_keyword} {quoted} UNSET {}",
            unset.join(", ")
        ));
    }

    Ok(statements)
}

/// Renders a property value as a SQL literal for a SET clause.
pub fn sql_literal(value: &str) -> String {
    // numeric and boolean keywords pass through bare, everything else quotes
    if value.parse::<i64>().is_ok()
        || value.parse::<f64>().is_ok()
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("false")
    {
        value.to_ascii_uppercase()
    } else {
        format!("'{}'", escape_string_literal(value))
    }
}

pub fn drop_object_query(kind_keyword: &str, name: &str) -> String {
    format!("DROP {kind_keyword} IF EXISTS {}", quote_identifier(name))
}

pub fn drop_table_query(table: &Table) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table_name(table))
}

pub fn alter_table_add_column_query(table: &Table, column: &Column) -> String {
    let mut clause = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        qualified_table_name(table),
        quote_identifier(&column.name),
        column.data_type
    );
    if !column.nullable {
        clause.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        clause.push_str(&format!(" DEFAULT {default}"));
    }
    clause
}

pub fn alter_table_drop_column_query(table: &Table, column_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        qualified_table_name(table),
        quote_identifier(column_name)
    )
}

pub fn alter_table_set_comment_query(table: &Table, comment: Option<&str>) -> String {
    match comment {
        Some(comment) => format!(
            "ALTER TABLE {} SET COMMENT = '{}'",
            qualified_table_name(table),
            escape_string_literal(comment)
        ),
        None => format!("ALTER TABLE {} UNSET COMMENT", qualified_table_name(table)),
    }
}

pub fn alter_table_modify_column_query(table: &Table, column: &Column) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {} SET DATA TYPE {}",
        qualified_table_name(table),
        quote_identifier(&column.name),
        column.data_type
    )
}

fn securable_clause(grant: &Grant) -> String {
    match grant.on.kind {
        SecurableKind::Account => "ACCOUNT".to_string(),
        kind => format!("{kind} {}", quote_identifier(&grant.on.name)),
    }
}

pub fn grant_query(grant: &Grant) -> Result<String, WarehouseError> {
    validate_keyword(&grant.privilege, "privilege")?;
    Ok(format!(
        "GRANT {} ON {} TO ROLE {}",
        grant.privilege.to_ascii_uppercase(),
        securable_clause(grant),
        quote_identifier(&grant.to_role)
    ))
}

pub fn revoke_query(grant: &Grant) -> Result<String, WarehouseError> {
    validate_keyword(&grant.privilege, "privilege")?;
    Ok(format!(
        "REVOKE {} ON {} FROM ROLE {}",
        grant.privilege.to_ascii_uppercase(),
        securable_clause(grant),
        quote_identifier(&grant.to_role)
    ))
}

pub const SHOW_WAREHOUSES: &str = "SHOW WAREHOUSES";
pub const SHOW_DATABASES: &str = "SHOW DATABASES";
pub const SHOW_ROLES: &str = "SHOW ROLES";
pub const SHOW_USERS: &str = "SHOW USERS";

pub fn show_grants_to_role_query(role: &str) -> String {
    format!("SHOW GRANTS TO ROLE {}", quote_identifier(role))
}

pub fn show_tables_query(database: &str) -> String {
    format!("SHOW TABLES IN DATABASE {}", quote_identifier(database))
}

pub fn describe_table_query(table: &Table) -> String {
    format!("DESCRIBE TABLE {}", qualified_table_name(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::warehouse::model::SecurableRef;

    fn sample_warehouse() -> Warehouse {
        Warehouse {
            name: "loader".to_string(),
            size: "XSMALL".to_string(),
            auto_suspend: Some(600),
            auto_resume: Some(false),
            comment: Some("nightly load".to_string()),
        }
    }

    #[test]
    fn test_create_warehouse_renders_all_options() {
        let sql = create_warehouse_query(&sample_warehouse()).unwrap();
        assert_eq!(
            sql,
            "CREATE WAREHOUSE IF NOT EXISTS LOADER WAREHOUSE_SIZE = 'XSMALL' \
             AUTO_SUSPEND = 600 AUTO_RESUME = FALSE COMMENT = 'nightly load'"
        );
    }

    #[test]
    fn test_create_warehouse_omits_unset_options() {
        let warehouse = Warehouse {
            auto_suspend: None,
            auto_resume: None,
            comment: None,
            ..sample_warehouse()
        };
        let sql = create_warehouse_query(&warehouse).unwrap();
        assert_eq!(
            sql,
            "CREATE WAREHOUSE IF NOT EXISTS LOADER WAREHOUSE_SIZE = 'XSMALL'"
        );
    }

    #[test]
    fn test_create_warehouse_rejects_bad_size_keyword() {
        let warehouse = Warehouse {
            size: "XSMALL'; DROP WAREHOUSE LOADER".to_string(),
            ..sample_warehouse()
        };
        assert!(matches!(
            create_warehouse_query(&warehouse),
            Err(WarehouseError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_string_literals_are_escaped() {
        let database = Database {
            name: "analytics".to_string(),
            data_retention_days: Some(7),
            comment: Some("it's ours".to_string()),
        };
        let sql = create_database_query(&database).unwrap();
        assert!(sql.contains("COMMENT = 'it''s ours'"));
        assert!(sql.contains("DATA_RETENTION_TIME_IN_DAYS = 7"));
    }

    #[test]
    fn test_create_role_minimal() {
        let role = Role {
            name: "analyst".to_string(),
            comment: None,
        };
        assert_eq!(
            create_role_query(&role).unwrap(),
            "CREATE ROLE IF NOT EXISTS ANALYST"
        );
    }

    #[test]
    fn test_create_table_lists_columns() {
        let table = Table {
            name: "events".to_string(),
            database: "analytics".to_string(),
            schema: "public".to_string(),
            columns: vec![
                Column {
                    name: "id".to_string(),
                    data_type: "NUMBER(38,0)".to_string(),
                    nullable: false,
                    default: None,
                    comment: None,
                },
                Column {
                    name: "payload".to_string(),
                    data_type: "VARCHAR".to_string(),
                    nullable: true,
                    default: None,
                    comment: Some("raw body".to_string()),
                },
            ],
            comment: None,
        };
        let sql = create_table_query(&table).unwrap();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS ANALYTICS.PUBLIC.EVENTS"));
        assert!(sql.contains(" ID NUMBER(38,0) NOT NULL,"));
        assert!(sql.contains(" PAYLOAD VARCHAR COMMENT 'raw body'"));
    }

    #[test]
    fn test_alter_object_queries_split_set_and_unset() {
        let statements = alter_object_queries(
            "WAREHOUSE",
            "loader",
            &[
                ("WAREHOUSE_SIZE".to_string(), "'SMALL'".to_string()),
                ("AUTO_SUSPEND".to_string(), "0".to_string()),
            ],
            &["COMMENT".to_string()],
        )
        .unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER WAREHOUSE LOADER SET WAREHOUSE_SIZE = 'SMALL' AUTO_SUSPEND = 0",
                "ALTER WAREHOUSE LOADER UNSET COMMENT",
            ]
        );
    }

    #[test]
    fn test_sql_literal_forms() {
        assert_eq!(sql_literal("600"), "600");
        assert_eq!(sql_literal("true"), "TRUE");
        assert_eq!(sql_literal("nightly 'load'"), "'nightly ''load'''");
    }

    #[test]
    fn test_grant_and_revoke_rendering() {
        let grant = Grant {
            privilege: "usage".to_string(),
            on: SecurableRef {
                kind: SecurableKind::Warehouse,
                name: "loader".to_string(),
            },
            to_role: "analyst".to_string(),
        };
        assert_eq!(
            grant_query(&grant).unwrap(),
            "GRANT USAGE ON WAREHOUSE LOADER TO ROLE ANALYST"
        );
        assert_eq!(
            revoke_query(&grant).unwrap(),
            "REVOKE USAGE ON WAREHOUSE LOADER FROM ROLE ANALYST"
        );

        let account_grant = Grant {
            on: SecurableRef {
                kind: SecurableKind::Account,
                name: String::new(),
            },
            ..grant
        };
        assert_eq!(
            grant_query(&account_grant).unwrap(),
            "GRANT USAGE ON ACCOUNT TO ROLE ANALYST"
        );
    }

    #[test]
    fn test_show_and_describe_queries() {
        assert_eq!(
            show_grants_to_role_query("analyst"),
            "SHOW GRANTS TO ROLE ANALYST"
        );
        assert_eq!(
            show_tables_query("analytics"),
            "SHOW TABLES IN DATABASE ANALYTICS"
        );
    }
}
