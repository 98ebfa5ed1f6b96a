//! Warehouse control-plane integration.
//!
//! Everything that talks SQL to the remote warehouse lives under this
//! module: connection configuration, the statement-issuing client, the
//! queries it issues, and the mapping between result rows and resource
//! models. The rest of the crate only sees [`ControlPlaneOperations`].

pub mod client;
pub mod config;
pub mod data_types;
pub mod errors;
pub mod mapper;
pub mod model;
pub mod queries;

use async_trait::async_trait;

use errors::WarehouseError;
use model::{Database, Grant, Role, Table, User, Warehouse};

/// Operations the planner and verifier need from the control plane.
///
/// Implemented by the HTTP client for real use and by in-memory mocks in
/// tests. Fetching is read-only; `execute` is the single mutation path.
#[async_trait]
pub trait ControlPlaneOperations {
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>, WarehouseError>;

    async fn list_databases(&self) -> Result<Vec<Database>, WarehouseError>;

    async fn list_roles(&self) -> Result<Vec<Role>, WarehouseError>;

    async fn list_users(&self) -> Result<Vec<User>, WarehouseError>;

    /// Grants currently held by `role`, restricted to securable kinds this
    /// tool manages.
    async fn list_grants_to_role(&self, role: &str) -> Result<Vec<Grant>, WarehouseError>;

    /// Tables in `database`, with columns populated from DESCRIBE output.
    async fn list_tables(&self, database: &str) -> Result<Vec<Table>, WarehouseError>;

    /// Runs one DDL statement.
    async fn execute(&self, sql: &str) -> Result<(), WarehouseError>;
}
