//! HTTP client for the warehouse SQL API.
//!
//! Statements are POSTed to `/api/v2/statements` with basic authentication;
//! results come back as JSON objects with a `rows` array of column-keyed
//! objects. Each request carries a fresh UUID so retried statements can be
//! correlated server-side.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::config::WarehouseConfig;
use super::errors::WarehouseError;
use super::mapper::{self, Row};
use super::model::{Database, Grant, Role, Table, User, Warehouse};
use super::queries;
use super::ControlPlaneOperations;

/// Response body of a successful statement submission.
#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

/// Error body returned by the control plane for failed statements.
#[derive(Debug, Deserialize)]
struct StatementError {
    #[serde(default)]
    message: String,
}

pub struct HttpControlPlaneClient {
    config: WarehouseConfig,
    http: reqwest::Client,
}

impl HttpControlPlaneClient {
    pub fn new(config: WarehouseConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Submits one statement and decodes the result rows.
    async fn run_statement(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        let request_id = Uuid::new_v4();
        debug!(request_id = %request_id, sql, "submitting statement");

        let body = json!({
            "statement": sql,
            "account": self.config.account,
            "role": self.config.role,
            "requestId": request_id.to_string(),
        });

        let response = self
            .http
            .post(format!("{}/api/v2/statements", self.config.base_url()))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StatementError>()
                .await
                .map(|e| e.message)
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(WarehouseError::StatementFailed {
                status: status.as_u16(),
                message,
            });
        }

        let decoded: StatementResponse = response.json().await?;
        debug!(
            request_id = %request_id,
            row_count = decoded.rows.len(),
            "statement complete"
        );
        Ok(decoded.rows)
    }
}

#[async_trait]
impl ControlPlaneOperations for HttpControlPlaneClient {
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, WarehouseError> {
        self.run_statement(queries::SHOW_WAREHOUSES)
            .await?
            .iter()
            .map(mapper::warehouse_from_row)
            .collect()
    }

    async fn list_databases(&self) -> Result<Vec<Database>, WarehouseError> {
        self.run_statement(queries::SHOW_DATABASES)
            .await?
            .iter()
            .map(mapper::database_from_row)
            .collect()
    }

    async fn list_roles(&self) -> Result<Vec<Role>, WarehouseError> {
        self.run_statement(queries::SHOW_ROLES)
            .await?
            .iter()
            .map(mapper::role_from_row)
            .collect()
    }

    async fn list_users(&self) -> Result<Vec<User>, WarehouseError> {
        self.run_statement(queries::SHOW_USERS)
            .await?
            .iter()
            .map(mapper::user_from_row)
            .collect()
    }

    async fn list_grants_to_role(&self, role: &str) -> Result<Vec<Grant>, WarehouseError> {
        let rows = self
            .run_statement(&queries::show_grants_to_role_query(role))
            .await?;
        let mut grants = Vec::new();
        for row in &rows {
            if let Some(grant) = mapper::grant_from_row(row)? {
                grants.push(grant);
            }
        }
        Ok(grants)
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<Table>, WarehouseError> {
        let rows = self
            .run_statement(&queries::show_tables_query(database))
            .await?;
        let mut tables = Vec::new();
        for row in &rows {
            let mut table = mapper::table_from_row(row)?;
            let column_rows = self
                .run_statement(&queries::describe_table_query(&table))
                .await?;
            table.columns = column_rows
                .iter()
                .map(mapper::column_from_row)
                .collect::<Result<Vec<_>, WarehouseError>>()?;
            tables.push(table);
        }
        Ok(tables)
    }

    async fn execute(&self, sql: &str) -> Result<(), WarehouseError> {
        self.run_statement(sql).await.map(|_| ())
    }
}
