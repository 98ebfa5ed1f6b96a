//! Declarative resource diffing.
//!
//! A [`ResourceMap`] holds one side of the comparison: either the desired
//! state parsed from configuration or the observed state mapped back from
//! the control plane. [`ResourceMap::diff`] computes the changes needed to
//! converge observed onto desired.
//!
//! Comparisons are normalization-aware: identifiers match under quoting and
//! case-folding rules, column types match under data-type synonym
//! resolution, and grants are compared as multisets so duplicates and
//! removals produce exactly the grant/revoke pairs required.

use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;

use crate::core::diff::diff;
use crate::infrastructure::warehouse::data_types::are_equivalent;
use crate::infrastructure::warehouse::model::{
    Column, Database, Grant, NamedResource, Role, Table, User, Warehouse,
};
use crate::utilities::identifiers::{identifiers_equal, normalize_identifier};

/// A scalar property transition. `after == None` means the property is
/// unset; the field name is the control plane's property keyword so the
/// query layer can render SET/UNSET clauses directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl FieldChange {
    fn new(field: &str, before: Option<String>, after: Option<String>) -> Self {
        Self {
            field: field.to_string(),
            before,
            after,
        }
    }
}

/// Generic representation of a change to one keyed resource.
#[derive(Debug, Clone, Serialize)]
pub enum Change<T: Serialize> {
    Added(Box<T>),
    Removed(Box<T>),
    Updated {
        before: Box<T>,
        after: Box<T>,
        field_changes: Vec<FieldChange>,
    },
}

/// Column-level change within a table update.
#[derive(Debug, Clone, Serialize)]
pub enum ColumnChange {
    Added(Column),
    Removed(Column),
    Updated { before: Column, after: Column },
}

/// Table changes carry column detail separately from scalar properties.
#[derive(Debug, Clone, Serialize)]
pub enum TableChange {
    Added(Table),
    Removed(Table),
    Updated {
        id: String,
        column_changes: Vec<ColumnChange>,
        field_changes: Vec<FieldChange>,
        before: Table,
        after: Table,
    },
}

/// Grants are set-valued: a change is a single grant or revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GrantChange {
    Granted(Grant),
    Revoked(Grant),
}

/// Any change the planner can produce.
#[derive(Debug, Clone, Serialize)]
pub enum ResourceChange {
    Warehouse(Change<Warehouse>),
    Database(Change<Database>),
    Role(Change<Role>),
    User(Change<User>),
    Table(TableChange),
    Grant(GrantChange),
}

impl ResourceChange {
    /// (action, kind, name, detail) tuple for tabular display.
    pub fn describe(&self) -> (&'static str, &'static str, String, String) {
        fn keyed<T: Serialize + NamedResource>(
            change: &Change<T>,
        ) -> (&'static str, &'static str, String, String) {
            match change {
                Change::Added(resource) => ("create", T::KIND, resource.id(), String::new()),
                Change::Removed(resource) => ("drop", T::KIND, resource.id(), String::new()),
                Change::Updated {
                    after,
                    field_changes,
                    ..
                } => (
                    "alter",
                    T::KIND,
                    after.id(),
                    field_changes
                        .iter()
                        .map(|fc| fc.field.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            }
        }

        match self {
            ResourceChange::Warehouse(change) => keyed(change),
            ResourceChange::Database(change) => keyed(change),
            ResourceChange::Role(change) => keyed(change),
            ResourceChange::User(change) => keyed(change),
            ResourceChange::Table(change) => match change {
                TableChange::Added(table) => {
                    ("create", "TABLE", NamedResource::id(table), String::new())
                }
                TableChange::Removed(table) => {
                    ("drop", "TABLE", NamedResource::id(table), String::new())
                }
                TableChange::Updated {
                    id,
                    column_changes,
                    field_changes,
                    ..
                } => (
                    "alter",
                    "TABLE",
                    id.clone(),
                    format!(
                        "{} column change(s){}",
                        column_changes.len(),
                        if field_changes.is_empty() {
                            String::new()
                        } else {
                            format!(
                                ", {}",
                                field_changes
                                    .iter()
                                    .map(|fc| fc.field.as_str())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )
                        }
                    ),
                ),
            },
            ResourceChange::Grant(change) => match change {
                GrantChange::Granted(grant) => ("grant", "PRIVILEGE", grant.to_string(), String::new()),
                GrantChange::Revoked(grant) => ("revoke", "PRIVILEGE", grant.to_string(), String::new()),
            },
        }
    }
}

/// One side of a comparison: resources keyed by normalized identifier, plus
/// the grant multiset.
#[derive(Debug, Clone, Default)]
pub struct ResourceMap {
    pub warehouses: HashMap<String, Warehouse>,
    pub databases: HashMap<String, Database>,
    pub roles: HashMap<String, Role>,
    pub users: HashMap<String, User>,
    pub tables: HashMap<String, Table>,
    pub grants: Vec<Grant>,
}

impl ResourceMap {
    pub fn insert_warehouse(&mut self, warehouse: Warehouse) {
        self.warehouses.insert(warehouse.id(), warehouse);
    }

    pub fn insert_database(&mut self, database: Database) {
        self.databases.insert(database.id(), database);
    }

    pub fn insert_role(&mut self, role: Role) {
        self.roles.insert(role.id(), role);
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id(), user);
    }

    pub fn insert_table(&mut self, table: Table) {
        self.tables.insert(NamedResource::id(&table), table);
    }

    pub fn is_empty(&self) -> bool {
        self.warehouses.is_empty()
            && self.databases.is_empty()
            && self.roles.is_empty()
            && self.users.is_empty()
            && self.tables.is_empty()
            && self.grants.is_empty()
    }

    /// Computes the changes needed to converge `actual` onto `desired`.
    pub fn diff(actual: &ResourceMap, desired: &ResourceMap) -> Vec<ResourceChange> {
        let mut changes = Vec::new();

        changes.extend(
            diff_keyed(&actual.databases, &desired.databases, database_field_changes)
                .into_iter()
                .map(ResourceChange::Database),
        );
        changes.extend(
            diff_keyed(
                &actual.warehouses,
                &desired.warehouses,
                warehouse_field_changes,
            )
            .into_iter()
            .map(ResourceChange::Warehouse),
        );
        changes.extend(
            diff_keyed(&actual.roles, &desired.roles, role_field_changes)
                .into_iter()
                .map(ResourceChange::Role),
        );
        changes.extend(
            diff_keyed(&actual.users, &desired.users, user_field_changes)
                .into_iter()
                .map(ResourceChange::User),
        );
        diff_tables(&actual.tables, &desired.tables, &mut changes);
        diff_grants(&actual.grants, &desired.grants, &mut changes);

        changes
    }
}

/// Shared shape of the keyed diffs: additions and updates in desired-key
/// order, removals in actual-key order, so output is deterministic.
fn diff_keyed<T, F>(
    actual: &HashMap<String, T>,
    desired: &HashMap<String, T>,
    field_changes: F,
) -> Vec<Change<T>>
where
    T: Clone + Serialize,
    F: Fn(&T, &T) -> Vec<FieldChange>,
{
    let mut changes = Vec::new();

    for id in desired.keys().sorted() {
        let want = &desired[id];
        match actual.get(id) {
            None => changes.push(Change::Added(Box::new(want.clone()))),
            Some(have) => {
                let fields = field_changes(have, want);
                if !fields.is_empty() {
                    changes.push(Change::Updated {
                        before: Box::new(have.clone()),
                        after: Box::new(want.clone()),
                        field_changes: fields,
                    });
                }
            }
        }
    }

    for id in actual.keys().sorted() {
        if !desired.contains_key(id) {
            changes.push(Change::Removed(Box::new(actual[id].clone())));
        }
    }

    changes
}

fn scalar_change<T: PartialEq + ToString>(
    field: &str,
    before: &Option<T>,
    after: &Option<T>,
) -> Option<FieldChange> {
    if before == after {
        return None;
    }
    Some(FieldChange::new(
        field,
        before.as_ref().map(T::to_string),
        after.as_ref().map(T::to_string),
    ))
}

fn warehouse_field_changes(before: &Warehouse, after: &Warehouse) -> Vec<FieldChange> {
    let mut fields = Vec::new();
    if !before.size.eq_ignore_ascii_case(&after.size) {
        fields.push(FieldChange::new(
            "WAREHOUSE_SIZE",
            Some(before.size.clone()),
            Some(after.size.to_ascii_uppercase()),
        ));
    }
    fields.extend(scalar_change(
        "AUTO_SUSPEND",
        &before.auto_suspend,
        &after.auto_suspend,
    ));
    fields.extend(scalar_change(
        "AUTO_RESUME",
        &before.auto_resume,
        &after.auto_resume,
    ));
    fields.extend(scalar_change("COMMENT", &before.comment, &after.comment));
    fields
}

fn database_field_changes(before: &Database, after: &Database) -> Vec<FieldChange> {
    let mut fields = Vec::new();
    fields.extend(scalar_change(
        "DATA_RETENTION_TIME_IN_DAYS",
        &before.data_retention_days,
        &after.data_retention_days,
    ));
    fields.extend(scalar_change("COMMENT", &before.comment, &after.comment));
    fields
}

fn role_field_changes(before: &Role, after: &Role) -> Vec<FieldChange> {
    scalar_change("COMMENT", &before.comment, &after.comment)
        .into_iter()
        .collect()
}

fn user_field_changes(before: &User, after: &User) -> Vec<FieldChange> {
    let mut fields = Vec::new();
    fields.extend(scalar_change(
        "LOGIN_NAME",
        &before.login_name,
        &after.login_name,
    ));
    let default_role_differs = match (&before.default_role, &after.default_role) {
        (Some(a), Some(b)) => !identifiers_equal(a, b),
        (None, None) => false,
        _ => true,
    };
    if default_role_differs {
        fields.push(FieldChange::new(
            "DEFAULT_ROLE",
            before.default_role.clone(),
            after.default_role.clone(),
        ));
    }
    fields.extend(scalar_change("DISABLED", &before.disabled, &after.disabled));
    fields.extend(scalar_change("COMMENT", &before.comment, &after.comment));
    fields
}

/// Column equality under normalization: names match by identifier rules and
/// types by synonym-aware equivalence, so `NUMBER(38,0)` observed never
/// fights `DECIMAL` declared.
fn columns_equivalent(before: &Column, after: &Column) -> bool {
    identifiers_equal(&before.name, &after.name)
        && are_equivalent(&before.data_type, &after.data_type)
        && before.nullable == after.nullable
        && before.default == after.default
        && before.comment == after.comment
}

fn table_column_changes(before: &Table, after: &Table) -> Vec<ColumnChange> {
    let mut changes = Vec::new();

    let actual_by_name: HashMap<String, &Column> = before
        .columns
        .iter()
        .map(|column| (normalize_identifier(&column.name), column))
        .collect();
    let desired_by_name: HashMap<String, &Column> = after
        .columns
        .iter()
        .map(|column| (normalize_identifier(&column.name), column))
        .collect();

    for column in &after.columns {
        match actual_by_name.get(&normalize_identifier(&column.name)) {
            None => changes.push(ColumnChange::Added(column.clone())),
            Some(existing) => {
                if !columns_equivalent(existing, column) {
                    changes.push(ColumnChange::Updated {
                        before: (*existing).clone(),
                        after: column.clone(),
                    });
                }
            }
        }
    }

    for column in &before.columns {
        if !desired_by_name.contains_key(&normalize_identifier(&column.name)) {
            changes.push(ColumnChange::Removed(column.clone()));
        }
    }

    changes
}

fn diff_tables(
    actual: &HashMap<String, Table>,
    desired: &HashMap<String, Table>,
    changes: &mut Vec<ResourceChange>,
) {
    for id in desired.keys().sorted() {
        let want = &desired[id];
        match actual.get(id) {
            None => changes.push(ResourceChange::Table(TableChange::Added(want.clone()))),
            Some(have) => {
                let column_changes = table_column_changes(have, want);
                let field_changes: Vec<FieldChange> =
                    scalar_change("COMMENT", &have.comment, &want.comment)
                        .into_iter()
                        .collect();
                if !column_changes.is_empty() || !field_changes.is_empty() {
                    changes.push(ResourceChange::Table(TableChange::Updated {
                        id: id.clone(),
                        column_changes,
                        field_changes,
                        before: have.clone(),
                        after: want.clone(),
                    }));
                }
            }
        }
    }

    for id in actual.keys().sorted() {
        if !desired.contains_key(id) {
            changes.push(ResourceChange::Table(TableChange::Removed(
                actual[id].clone(),
            )));
        }
    }
}

fn diff_grants(actual: &[Grant], desired: &[Grant], changes: &mut Vec<ResourceChange>) {
    let actual_normalized: Vec<Grant> = actual.iter().map(Grant::normalized).collect();
    let desired_normalized: Vec<Grant> = desired.iter().map(Grant::normalized).collect();

    let result = diff(&actual_normalized, &desired_normalized);
    changes.extend(
        result
            .removed
            .into_iter()
            .map(|grant| ResourceChange::Grant(GrantChange::Revoked(grant))),
    );
    changes.extend(
        result
            .added
            .into_iter()
            .map(|grant| ResourceChange::Grant(GrantChange::Granted(grant))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::warehouse::model::{SecurableKind, SecurableRef};

    fn warehouse(name: &str, size: &str) -> Warehouse {
        Warehouse {
            name: name.to_string(),
            size: size.to_string(),
            auto_suspend: Some(600),
            auto_resume: Some(true),
            comment: None,
        }
    }

    fn grant(privilege: &str, name: &str, role: &str) -> Grant {
        Grant {
            privilege: privilege.to_string(),
            on: SecurableRef {
                kind: SecurableKind::Warehouse,
                name: name.to_string(),
            },
            to_role: role.to_string(),
        }
    }

    fn table_with_types(types: &[(&str, &str)]) -> Table {
        Table {
            name: "events".to_string(),
            database: "analytics".to_string(),
            schema: "public".to_string(),
            columns: types
                .iter()
                .map(|(name, data_type)| Column {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    nullable: true,
                    default: None,
                    comment: None,
                })
                .collect(),
            comment: None,
        }
    }

    #[test]
    fn test_identical_maps_produce_no_changes() {
        let mut actual = ResourceMap::default();
        actual.insert_warehouse(warehouse("LOADER", "XSMALL"));
        let desired = actual.clone();
        assert!(ResourceMap::diff(&actual, &desired).is_empty());
    }

    #[test]
    fn test_missing_resource_is_added_extra_is_removed() {
        let mut actual = ResourceMap::default();
        actual.insert_warehouse(warehouse("OLD", "XSMALL"));
        let mut desired = ResourceMap::default();
        desired.insert_warehouse(warehouse("NEW", "XSMALL"));

        let changes = ResourceMap::diff(&actual, &desired);
        assert_eq!(changes.len(), 2);
        assert!(matches!(
            &changes[0],
            ResourceChange::Warehouse(Change::Added(w)) if w.name == "NEW"
        ));
        assert!(matches!(
            &changes[1],
            ResourceChange::Warehouse(Change::Removed(w)) if w.name == "OLD"
        ));
    }

    #[test]
    fn test_case_folded_names_match() {
        let mut actual = ResourceMap::default();
        actual.insert_warehouse(warehouse("LOADER", "XSMALL"));
        let mut desired = ResourceMap::default();
        desired.insert_warehouse(warehouse("loader", "XSMALL"));
        assert!(ResourceMap::diff(&actual, &desired).is_empty());
    }

    #[test]
    fn test_scalar_field_changes_carry_set_and_unset() {
        let mut actual = ResourceMap::default();
        actual.insert_warehouse(Warehouse {
            comment: Some("old".to_string()),
            ..warehouse("LOADER", "XSMALL")
        });
        let mut desired = ResourceMap::default();
        desired.insert_warehouse(Warehouse {
            auto_suspend: Some(300),
            comment: None,
            ..warehouse("LOADER", "SMALL")
        });

        let changes = ResourceMap::diff(&actual, &desired);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            ResourceChange::Warehouse(Change::Updated { field_changes, .. }) => {
                assert_eq!(field_changes.len(), 3);
                assert_eq!(field_changes[0].field, "WAREHOUSE_SIZE");
                assert_eq!(field_changes[1].field, "AUTO_SUSPEND");
                assert_eq!(field_changes[1].after.as_deref(), Some("300"));
                assert_eq!(field_changes[2].field, "COMMENT");
                assert_eq!(field_changes[2].after, None);
            }
            other => panic!("expected warehouse update, got {other:?}"),
        }
    }

    #[test]
    fn test_type_synonyms_do_not_produce_column_changes() {
        let mut actual = ResourceMap::default();
        actual.insert_table(table_with_types(&[("id", "NUMBER(38,0)"), ("body", "TEXT")]));
        let mut desired = ResourceMap::default();
        desired.insert_table(table_with_types(&[
            ("id", "DECIMAL"),
            ("body", "VARCHAR(16777216)"),
        ]));
        assert!(ResourceMap::diff(&actual, &desired).is_empty());
    }

    #[test]
    fn test_real_type_change_is_reported() {
        let mut actual = ResourceMap::default();
        actual.insert_table(table_with_types(&[("id", "NUMBER(38,0)")]));
        let mut desired = ResourceMap::default();
        desired.insert_table(table_with_types(&[("id", "NUMBER(30,2)")]));

        let changes = ResourceMap::diff(&actual, &desired);
        assert_eq!(changes.len(), 1);
        match &changes[0] {
            ResourceChange::Table(TableChange::Updated { column_changes, .. }) => {
                assert_eq!(column_changes.len(), 1);
                assert!(matches!(&column_changes[0], ColumnChange::Updated { .. }));
            }
            other => panic!("expected table update, got {other:?}"),
        }
    }

    #[test]
    fn test_column_addition_and_removal() {
        let mut actual = ResourceMap::default();
        actual.insert_table(table_with_types(&[("id", "NUMBER"), ("legacy", "VARCHAR")]));
        let mut desired = ResourceMap::default();
        desired.insert_table(table_with_types(&[("id", "NUMBER"), ("added", "DATE")]));

        let changes = ResourceMap::diff(&actual, &desired);
        match &changes[0] {
            ResourceChange::Table(TableChange::Updated { column_changes, .. }) => {
                assert_eq!(column_changes.len(), 2);
                assert!(matches!(&column_changes[0], ColumnChange::Added(c) if c.name == "added"));
                assert!(
                    matches!(&column_changes[1], ColumnChange::Removed(c) if c.name == "legacy")
                );
            }
            other => panic!("expected table update, got {other:?}"),
        }
    }

    #[test]
    fn test_grants_diff_as_multisets() {
        let actual = ResourceMap {
            grants: vec![grant("USAGE", "LOADER", "ANALYST")],
            ..ResourceMap::default()
        };
        let desired = ResourceMap {
            grants: vec![
                grant("usage", "loader", "analyst"), // same grant, different spelling
                grant("OPERATE", "LOADER", "ANALYST"),
            ],
            ..ResourceMap::default()
        };

        let changes = ResourceMap::diff(&actual, &desired);
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            &changes[0],
            ResourceChange::Grant(GrantChange::Granted(g)) if g.privilege == "OPERATE"
        ));
    }

    #[test]
    fn test_undeclared_grant_is_revoked() {
        let actual = ResourceMap {
            grants: vec![
                grant("USAGE", "LOADER", "ANALYST"),
                grant("OPERATE", "LOADER", "ANALYST"),
            ],
            ..ResourceMap::default()
        };
        let desired = ResourceMap {
            grants: vec![grant("USAGE", "LOADER", "ANALYST")],
            ..ResourceMap::default()
        };

        let changes = ResourceMap::diff(&actual, &desired);
        assert_eq!(changes.len(), 1);
        assert!(matches!(
            &changes[0],
            ResourceChange::Grant(GrantChange::Revoked(g)) if g.privilege == "OPERATE"
        ));
    }
}
