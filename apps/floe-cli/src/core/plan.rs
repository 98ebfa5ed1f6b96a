//! Change planning.
//!
//! Planning turns a (desired, actual) pair of [`ResourceMap`]s into an
//! ordered list of DDL statements:
//!
//! 1. Validate the desired state against the [`ParameterCatalog`].
//! 2. Fetch the actual state for the resources under management.
//! 3. Diff the two maps.
//! 4. Render statements in dependency order: creates top-down, alters in
//!    place, revokes before drops, drops bottom-up.
//!
//! Only declared account-level objects are considered: a warehouse or role
//! that exists remotely but was never declared is left alone rather than
//! dropped. Tables are the exception — a declared database is fully
//! managed, so undeclared tables inside it are dropped.

use std::collections::BTreeSet;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::resource_map::{
    Change, ColumnChange, GrantChange, ResourceChange, ResourceMap, TableChange,
};
use crate::infrastructure::warehouse::errors::WarehouseError;
use crate::infrastructure::warehouse::model::{NamedResource, ParameterCatalog, Table};
use crate::infrastructure::warehouse::queries;
use crate::infrastructure::warehouse::ControlPlaneOperations;
use crate::utilities::identifiers::normalize_identifier;

/// Errors that can occur while planning changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlanningError {
    #[error("Warehouse '{warehouse}' declares unknown size '{size}' (allowed: {allowed})")]
    InvalidWarehouseSize {
        warehouse: String,
        size: String,
        allowed: String,
    },

    #[error("Grant on {on} declares unknown privilege '{privilege}'")]
    InvalidPrivilege { privilege: String, on: String },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// The computed plan: the structural changes and the statements that apply
/// them, already ordered for execution.
#[derive(Debug, Serialize)]
pub struct InfraPlan {
    pub changes: Vec<ResourceChange>,
    pub statements: Vec<String>,
}

impl InfraPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Validates enum-valued parameters of the desired state against the
/// catalog. The catalog is passed by reference so tests can supply their
/// own allow-lists.
pub fn validate_desired(
    desired: &ResourceMap,
    catalog: &ParameterCatalog,
) -> Result<(), PlanningError> {
    for warehouse in desired.warehouses.values() {
        if !catalog.is_valid_warehouse_size(&warehouse.size) {
            return Err(PlanningError::InvalidWarehouseSize {
                warehouse: warehouse.name.clone(),
                size: warehouse.size.clone(),
                allowed: catalog.warehouse_sizes().join(", "),
            });
        }
    }
    for grant in &desired.grants {
        if !catalog.is_valid_privilege(&grant.privilege) {
            return Err(PlanningError::InvalidPrivilege {
                privilege: grant.privilege.clone(),
                on: format!("{} {}", grant.on.kind, grant.on.name),
            });
        }
    }
    Ok(())
}

/// Fetches the observed state of everything the desired map declares.
///
/// Account-level listings are filtered to declared identifiers; grants are
/// fetched for every role the desired state mentions; tables are fetched
/// for every declared database (all of them, so undeclared tables in a
/// managed database surface as removals).
pub async fn fetch_actual_state<T: ControlPlaneOperations>(
    client: &T,
    desired: &ResourceMap,
) -> Result<ResourceMap, WarehouseError> {
    let mut actual = ResourceMap::default();

    debug!("fetching warehouses");
    for warehouse in client.list_warehouses().await? {
        if desired.warehouses.contains_key(&warehouse.id()) {
            actual.insert_warehouse(warehouse);
        }
    }

    debug!("fetching databases");
    for database in client.list_databases().await? {
        if desired.databases.contains_key(&database.id()) {
            actual.insert_database(database);
        }
    }

    debug!("fetching roles");
    for role in client.list_roles().await? {
        if desired.roles.contains_key(&role.id()) {
            actual.insert_role(role);
        }
    }

    debug!("fetching users");
    for user in client.list_users().await? {
        if desired.users.contains_key(&user.id()) {
            actual.insert_user(user);
        }
    }

    // every role the desired state mentions, declared or grant-target
    let mut grant_roles: BTreeSet<String> = desired.roles.keys().cloned().collect();
    grant_roles.extend(
        desired
            .grants
            .iter()
            .map(|grant| normalize_identifier(&grant.to_role)),
    );
    for role in &grant_roles {
        debug!(role = %role, "fetching grants");
        actual
            .grants
            .extend(client.list_grants_to_role(role).await?);
    }

    let mut table_databases: BTreeSet<String> = desired.databases.keys().cloned().collect();
    table_databases.extend(
        desired
            .tables
            .values()
            .map(|table| normalize_identifier(&table.database)),
    );
    for database in &table_databases {
        debug!(database = %database, "fetching tables");
        for table in client.list_tables(database).await? {
            actual.insert_table(table);
        }
    }

    info!(
        warehouses = actual.warehouses.len(),
        databases = actual.databases.len(),
        roles = actual.roles.len(),
        users = actual.users.len(),
        tables = actual.tables.len(),
        grants = actual.grants.len(),
        "fetched actual state"
    );

    Ok(actual)
}

/// Builds the full plan from an already-fetched actual state.
pub fn plan_changes(
    actual: &ResourceMap,
    desired: &ResourceMap,
    catalog: &ParameterCatalog,
) -> Result<InfraPlan, PlanningError> {
    validate_desired(desired, catalog)?;

    let changes = ResourceMap::diff(actual, desired);
    debug!(change_count = changes.len(), "computed resource diff");

    let statements = render_statements(&changes)?;
    Ok(InfraPlan {
        changes,
        statements,
    })
}

/// Field changes → SET clauses (value present) and UNSET keys (absent).
fn split_set_unset(
    field_changes: &[crate::core::resource_map::FieldChange],
) -> (Vec<(String, String)>, Vec<String>) {
    let mut set = Vec::new();
    let mut unset = Vec::new();
    for change in field_changes {
        match &change.after {
            Some(value) => set.push((change.field.clone(), queries::sql_literal(value))),
            None => unset.push(change.field.clone()),
        }
    }
    (set, unset)
}

fn table_update_statements(
    before: &Table,
    after: &Table,
    column_changes: &[ColumnChange],
    field_changes: &[crate::core::resource_map::FieldChange],
) -> Vec<String> {
    let mut statements = Vec::new();
    for change in column_changes {
        match change {
            ColumnChange::Added(column) => {
                statements.push(queries::alter_table_add_column_query(after, column));
            }
            ColumnChange::Removed(column) => {
                statements.push(queries::alter_table_drop_column_query(before, &column.name));
            }
            ColumnChange::Updated { after: column, .. } => {
                statements.push(queries::alter_table_modify_column_query(after, column));
            }
        }
    }
    for change in field_changes {
        if change.field == "COMMENT" {
            statements.push(queries::alter_table_set_comment_query(
                after,
                change.after.as_deref(),
            ));
        }
    }
    statements
}

/// Orders and renders the statements for a set of changes.
///
/// Creation order is databases, warehouses, roles, users, tables, grants;
/// alters follow; revokes run before any drop; drops run in reverse
/// creation order so dependents go first.
fn render_statements(changes: &[ResourceChange]) -> Result<Vec<String>, PlanningError> {
    let mut creates = Vec::new();
    let mut alters = Vec::new();
    let mut grants = Vec::new();
    let mut revokes = Vec::new();
    let mut drops = Vec::new();

    // buckets for drop ordering: tables first, databases last
    let mut drop_tables = Vec::new();
    let mut drop_users = Vec::new();
    let mut drop_roles = Vec::new();
    let mut drop_warehouses = Vec::new();
    let mut drop_databases = Vec::new();

    // creation ordering mirrors the diff output (databases first already),
    // but is re-bucketed here so a future reordering of the diff cannot
    // silently break execution order
    let mut create_databases = Vec::new();
    let mut create_warehouses = Vec::new();
    let mut create_roles = Vec::new();
    let mut create_users = Vec::new();
    let mut create_tables = Vec::new();

    for change in changes {
        match change {
            ResourceChange::Database(Change::Added(database)) => {
                create_databases.push(queries::create_database_query(database)?);
            }
            ResourceChange::Database(Change::Removed(database)) => {
                drop_databases.push(queries::drop_object_query("DATABASE", &database.name));
            }
            ResourceChange::Database(Change::Updated {
                after,
                field_changes,
                ..
            }) => {
                let (set, unset) = split_set_unset(field_changes);
                alters.extend(queries::alter_object_queries(
                    "DATABASE",
                    &after.name,
                    &set,
                    &unset,
                )?);
            }
            ResourceChange::Warehouse(Change::Added(warehouse)) => {
                create_warehouses.push(queries::create_warehouse_query(warehouse)?);
            }
            ResourceChange::Warehouse(Change::Removed(warehouse)) => {
                drop_warehouses.push(queries::drop_object_query("WAREHOUSE", &warehouse.name));
            }
            ResourceChange::Warehouse(Change::Updated {
                after,
                field_changes,
                ..
            }) => {
                let (set, unset) = split_set_unset(field_changes);
                alters.extend(queries::alter_object_queries(
                    "WAREHOUSE",
                    &after.name,
                    &set,
                    &unset,
                )?);
            }
            ResourceChange::Role(Change::Added(role)) => {
                create_roles.push(queries::create_role_query(role)?);
            }
            ResourceChange::Role(Change::Removed(role)) => {
                drop_roles.push(queries::drop_object_query("ROLE", &role.name));
            }
            ResourceChange::Role(Change::Updated {
                after,
                field_changes,
                ..
            }) => {
                let (set, unset) = split_set_unset(field_changes);
                alters.extend(queries::alter_object_queries(
                    "ROLE",
                    &after.name,
                    &set,
                    &unset,
                )?);
            }
            ResourceChange::User(Change::Added(user)) => {
                create_users.push(queries::create_user_query(user)?);
            }
            ResourceChange::User(Change::Removed(user)) => {
                drop_users.push(queries::drop_object_query("USER", &user.name));
            }
            ResourceChange::User(Change::Updated {
                after,
                field_changes,
                ..
            }) => {
                let (set, unset) = split_set_unset(field_changes);
                alters.extend(queries::alter_object_queries(
                    "USER",
                    &after.name,
                    &set,
                    &unset,
                )?);
            }
            ResourceChange::Table(TableChange::Added(table)) => {
                create_tables.push(queries::create_table_query(table)?);
            }
            ResourceChange::Table(TableChange::Removed(table)) => {
                drop_tables.push(queries::drop_table_query(table));
            }
            ResourceChange::Table(TableChange::Updated {
                before,
                after,
                column_changes,
                field_changes,
                ..
            }) => {
                alters.extend(table_update_statements(
                    before,
                    after,
                    column_changes,
                    field_changes,
                ));
            }
            ResourceChange::Grant(GrantChange::Granted(grant)) => {
                grants.push(queries::grant_query(grant)?);
            }
            ResourceChange::Grant(GrantChange::Revoked(grant)) => {
                revokes.push(queries::revoke_query(grant)?);
            }
        }
    }

    creates.extend(create_databases);
    creates.extend(create_warehouses);
    creates.extend(create_roles);
    creates.extend(create_users);
    creates.extend(create_tables);

    drops.extend(drop_tables);
    drops.extend(drop_users);
    drops.extend(drop_roles);
    drops.extend(drop_warehouses);
    drops.extend(drop_databases);

    let mut statements = creates;
    statements.append(&mut alters);
    statements.append(&mut grants);
    statements.append(&mut revokes);
    statements.append(&mut drops);
    Ok(statements)
}

/// Executes a plan's statements in order, stopping at the first failure.
pub async fn execute_plan<T: ControlPlaneOperations>(
    client: &T,
    plan: &InfraPlan,
) -> Result<usize, WarehouseError> {
    for (index, statement) in plan.statements.iter().enumerate() {
        info!(
            statement = %statement,
            "executing ({}/{})",
            index + 1,
            plan.statements.len()
        );
        client.execute(statement).await?;
    }
    Ok(plan.statements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::warehouse::model::{
        Column, Database, Grant, Role, SecurableKind, SecurableRef, User, Warehouse,
    };
    use async_trait::async_trait;

    // Mock control plane for planning tests
    #[derive(Default)]
    struct MockControlPlane {
        warehouses: Vec<Warehouse>,
        databases: Vec<Database>,
        roles: Vec<Role>,
        users: Vec<User>,
        grants: Vec<Grant>,
        tables: Vec<Table>,
    }

    #[async_trait]
    impl ControlPlaneOperations for MockControlPlane {
        async fn list_warehouses(&self) -> Result<Vec<Warehouse>, WarehouseError> {
            Ok(self.warehouses.clone())
        }

        async fn list_databases(&self) -> Result<Vec<Database>, WarehouseError> {
            Ok(self.databases.clone())
        }

        async fn list_roles(&self) -> Result<Vec<Role>, WarehouseError> {
            Ok(self.roles.clone())
        }

        async fn list_users(&self) -> Result<Vec<User>, WarehouseError> {
            Ok(self.users.clone())
        }

        async fn list_grants_to_role(&self, role: &str) -> Result<Vec<Grant>, WarehouseError> {
            Ok(self
                .grants
                .iter()
                .filter(|grant| {
                    crate::utilities::identifiers::identifiers_equal(&grant.to_role, role)
                })
                .cloned()
                .collect())
        }

        async fn list_tables(&self, database: &str) -> Result<Vec<Table>, WarehouseError> {
            Ok(self
                .tables
                .iter()
                .filter(|table| {
                    crate::utilities::identifiers::identifiers_equal(&table.database, database)
                })
                .cloned()
                .collect())
        }

        async fn execute(&self, _sql: &str) -> Result<(), WarehouseError> {
            Ok(())
        }
    }

    fn desired_fixture() -> ResourceMap {
        let mut desired = ResourceMap::default();
        desired.insert_database(Database {
            name: "ANALYTICS".to_string(),
            data_retention_days: None,
            comment: None,
        });
        desired.insert_warehouse(Warehouse {
            name: "LOADER".to_string(),
            size: "XSMALL".to_string(),
            auto_suspend: Some(600),
            auto_resume: Some(true),
            comment: None,
        });
        desired.insert_role(Role {
            name: "ANALYST".to_string(),
            comment: None,
        });
        desired.insert_table(Table {
            name: "EVENTS".to_string(),
            database: "ANALYTICS".to_string(),
            schema: "PUBLIC".to_string(),
            columns: vec![Column {
                name: "ID".to_string(),
                data_type: "NUMBER".to_string(),
                nullable: false,
                default: None,
                comment: None,
            }],
            comment: None,
        });
        desired.grants.push(Grant {
            privilege: "USAGE".to_string(),
            on: SecurableRef {
                kind: SecurableKind::Warehouse,
                name: "LOADER".to_string(),
            },
            to_role: "ANALYST".to_string(),
        });
        desired
    }

    #[test]
    fn test_validation_rejects_unknown_size() {
        let catalog = ParameterCatalog::builtin();
        let mut desired = ResourceMap::default();
        desired.insert_warehouse(Warehouse {
            name: "LOADER".to_string(),
            size: "GIGANTIC".to_string(),
            auto_suspend: None,
            auto_resume: None,
            comment: None,
        });
        assert!(matches!(
            validate_desired(&desired, &catalog),
            Err(PlanningError::InvalidWarehouseSize { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_unknown_privilege() {
        let catalog = ParameterCatalog::builtin();
        let mut desired = ResourceMap::default();
        desired.grants.push(Grant {
            privilege: "FLY".to_string(),
            on: SecurableRef {
                kind: SecurableKind::Account,
                name: String::new(),
            },
            to_role: "ANALYST".to_string(),
        });
        assert!(matches!(
            validate_desired(&desired, &catalog),
            Err(PlanningError::InvalidPrivilege { .. })
        ));
    }

    #[test]
    fn test_empty_diff_produces_empty_plan() {
        let catalog = ParameterCatalog::builtin();
        let desired = desired_fixture();
        let plan = plan_changes(&desired, &desired, &catalog).unwrap();
        assert!(plan.is_empty());
        assert!(plan.statements.is_empty());
    }

    #[test]
    fn test_statement_ordering_creates_before_grants() {
        let catalog = ParameterCatalog::builtin();
        let actual = ResourceMap::default();
        let desired = desired_fixture();

        let plan = plan_changes(&actual, &desired, &catalog).unwrap();
        let statements = &plan.statements;

        let position = |needle: &str| {
            statements
                .iter()
                .position(|s| s.starts_with(needle))
                .unwrap_or_else(|| panic!("no statement starting with {needle:?}"))
        };

        assert!(position("CREATE DATABASE") < position("CREATE WAREHOUSE"));
        assert!(position("CREATE WAREHOUSE") < position("CREATE ROLE"));
        assert!(position("CREATE ROLE") < position("CREATE TABLE"));
        assert!(position("CREATE TABLE") < position("GRANT USAGE"));
    }

    #[test]
    fn test_revokes_run_before_drops() {
        let catalog = ParameterCatalog::builtin();
        let mut actual = desired_fixture();
        actual.grants.push(Grant {
            privilege: "OPERATE".to_string(),
            on: SecurableRef {
                kind: SecurableKind::Warehouse,
                name: "LOADER".to_string(),
            },
            to_role: "ANALYST".to_string(),
        });
        // an extra table in the managed database must be dropped
        actual.insert_table(Table {
            name: "SCRATCH".to_string(),
            database: "ANALYTICS".to_string(),
            schema: "PUBLIC".to_string(),
            columns: vec![],
            comment: None,
        });
        let desired = desired_fixture();

        let plan = plan_changes(&actual, &desired, &catalog).unwrap();
        let statements = &plan.statements;
        let revoke = statements
            .iter()
            .position(|s| s.starts_with("REVOKE"))
            .expect("revoke present");
        let drop = statements
            .iter()
            .position(|s| s.starts_with("DROP TABLE"))
            .expect("drop present");
        assert!(revoke < drop);
    }

    #[tokio::test]
    async fn test_fetch_actual_state_is_scoped_to_declared_resources() {
        let desired = desired_fixture();
        let client = MockControlPlane {
            warehouses: vec![
                Warehouse {
                    name: "LOADER".to_string(),
                    size: "XSMALL".to_string(),
                    auto_suspend: Some(600),
                    auto_resume: Some(true),
                    comment: None,
                },
                // not declared: must not be considered for dropping
                Warehouse {
                    name: "SOMEONE_ELSES".to_string(),
                    size: "LARGE".to_string(),
                    auto_suspend: None,
                    auto_resume: None,
                    comment: None,
                },
            ],
            ..MockControlPlane::default()
        };

        let actual = fetch_actual_state(&client, &desired).await.unwrap();
        assert_eq!(actual.warehouses.len(), 1);
        assert!(actual.warehouses.contains_key("LOADER"));
    }

    #[tokio::test]
    async fn test_fetch_collects_grants_for_mentioned_roles() {
        let mut desired = ResourceMap::default();
        desired.grants.push(Grant {
            privilege: "USAGE".to_string(),
            on: SecurableRef {
                kind: SecurableKind::Warehouse,
                name: "LOADER".to_string(),
            },
            // role referenced by a grant but not declared
            to_role: "REPORTING".to_string(),
        });

        let client = MockControlPlane {
            grants: vec![Grant {
                privilege: "OPERATE".to_string(),
                on: SecurableRef {
                    kind: SecurableKind::Warehouse,
                    name: "LOADER".to_string(),
                },
                to_role: "REPORTING".to_string(),
            }],
            ..MockControlPlane::default()
        };

        let actual = fetch_actual_state(&client, &desired).await.unwrap();
        assert_eq!(actual.grants.len(), 1);
        assert_eq!(actual.grants[0].privilege, "OPERATE");
    }

    #[tokio::test]
    async fn test_execute_plan_runs_every_statement() {
        let plan = InfraPlan {
            changes: vec![],
            statements: vec![
                "CREATE ROLE IF NOT EXISTS ANALYST".to_string(),
                "GRANT USAGE ON WAREHOUSE LOADER TO ROLE ANALYST".to_string(),
            ],
        };
        let client = MockControlPlane::default();
        let executed = execute_plan(&client, &plan).await.unwrap();
        assert_eq!(executed, 2);
    }
}
