//! Verify routine.
//!
//! Verification builds one deferred assertion set per declared resource,
//! flattens the matching observed object into an attribute snapshot, and
//! evaluates everything in one pass. All violations across all objects are
//! reported together; the routine fails only after the full report is
//! printed.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cli::commands::ProjectArgs;
use crate::cli::display::{render_verification_table, Message};
use crate::cli::routines::plan::load_project;
use crate::cli::routines::{RoutineFailure, RoutineSuccess};
use crate::core::assertions::{AssertionSet, EvaluationReport, ObjectReference};
use crate::core::plan::fetch_actual_state;
use crate::core::resource_map::ResourceMap;
use crate::core::snapshot::AttributeSnapshot;
use crate::infrastructure::warehouse::client::HttpControlPlaneClient;
use crate::infrastructure::warehouse::model::{
    Database, Grant, NamedResource, Role, Table, User, Warehouse,
};
use crate::utilities::identifiers::normalize_identifier;

/// Flattens an observed object into a snapshot; objects that were not
/// observed at all evaluate against an empty snapshot, so every expectation
/// on them reports "found absent".
fn snapshot_of<T: Serialize>(observed: Option<&T>) -> AttributeSnapshot {
    match observed {
        Some(object) => {
            let value = serde_json::to_value(object).unwrap_or(Value::Null);
            AttributeSnapshot::from_json(&value)
        }
        None => AttributeSnapshot::empty(),
    }
}

fn optional_string(set: &mut AssertionSet, path: &str, value: &Option<String>) {
    match value {
        Some(value) => set.value_set(path, value.as_str()),
        None => set.value_not_set(path),
    };
}

fn warehouse_assertions(warehouse: &Warehouse) -> AssertionSet {
    let mut set = AssertionSet::new(warehouse.object_ref());
    set.value_set("name", normalize_identifier(&warehouse.name));
    set.value_set("size", warehouse.size.to_ascii_uppercase());
    match warehouse.auto_suspend {
        Some(seconds) => set.int_value_set("auto_suspend", seconds),
        None => set.value_not_set("auto_suspend"),
    };
    match warehouse.auto_resume {
        Some(enabled) => set.bool_value_set("auto_resume", enabled),
        None => set.value_not_set("auto_resume"),
    };
    optional_string(&mut set, "comment", &warehouse.comment);
    set
}

fn database_assertions(database: &Database) -> AssertionSet {
    let mut set = AssertionSet::new(database.object_ref());
    set.value_set("name", normalize_identifier(&database.name));
    match database.data_retention_days {
        Some(days) => set.int_value_set("data_retention_days", days),
        None => set.value_not_set("data_retention_days"),
    };
    optional_string(&mut set, "comment", &database.comment);
    set
}

fn role_assertions(role: &Role) -> AssertionSet {
    let mut set = AssertionSet::new(role.object_ref());
    set.value_set("name", normalize_identifier(&role.name));
    optional_string(&mut set, "comment", &role.comment);
    set
}

fn user_assertions(user: &User) -> AssertionSet {
    let mut set = AssertionSet::new(user.object_ref());
    set.value_set("name", normalize_identifier(&user.name));
    optional_string(&mut set, "login_name", &user.login_name);
    match &user.default_role {
        Some(role) => set.value_set("default_role", normalize_identifier(role)),
        None => set.value_not_set("default_role"),
    };
    match user.disabled {
        Some(disabled) => set.bool_value_set("disabled", disabled),
        None => set.value_not_set("disabled"),
    };
    optional_string(&mut set, "comment", &user.comment);
    set
}

fn table_assertions(table: &Table) -> AssertionSet {
    let mut set = AssertionSet::new(table.object_ref());
    set.value_set("name", normalize_identifier(&table.name));
    set.int_value_set("columns.#", table.columns.len() as i64);
    for (index, column) in table.columns.iter().enumerate() {
        set.value_set(
            format!("columns.{index}.name"),
            normalize_identifier(&column.name),
        );
        set.data_type_value_set(format!("columns.{index}.data_type"), column.data_type.as_str());
        set.bool_value_set(format!("columns.{index}.nullable"), column.nullable);
    }
    set
}

/// Renders a grant in its normalized one-line form for list comparison.
fn grant_line(grant: &Grant) -> String {
    grant.normalized().to_string()
}

/// Groups grants by normalized grantee role, each group sorted for
/// order-independent comparison.
fn grants_by_role(grants: &[Grant]) -> BTreeMap<String, Vec<String>> {
    let mut by_role: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for grant in grants {
        by_role
            .entry(normalize_identifier(&grant.to_role))
            .or_default()
            .push(grant_line(grant));
    }
    for lines in by_role.values_mut() {
        lines.sort();
    }
    by_role
}

/// Builds all assertion sets for the desired state and evaluates them
/// against the observed state. Pure: both maps are inputs, the full report
/// list is the output, and re-running is idempotent.
pub fn verify_state(actual: &ResourceMap, desired: &ResourceMap) -> Vec<EvaluationReport> {
    let mut reports = Vec::new();

    for id in desired.warehouses.keys().sorted() {
        let set = warehouse_assertions(&desired.warehouses[id]);
        reports.push(set.evaluate(&snapshot_of(actual.warehouses.get(id))));
    }

    for id in desired.databases.keys().sorted() {
        let set = database_assertions(&desired.databases[id]);
        reports.push(set.evaluate(&snapshot_of(actual.databases.get(id))));
    }

    for id in desired.roles.keys().sorted() {
        let set = role_assertions(&desired.roles[id]);
        reports.push(set.evaluate(&snapshot_of(actual.roles.get(id))));
    }

    for id in desired.users.keys().sorted() {
        let set = user_assertions(&desired.users[id]);
        reports.push(set.evaluate(&snapshot_of(actual.users.get(id))));
    }

    for id in desired.tables.keys().sorted() {
        let set = table_assertions(&desired.tables[id]);
        reports.push(set.evaluate(&snapshot_of(actual.tables.get(id))));
    }

    let actual_grants = grants_by_role(&actual.grants);
    for (role, expected_lines) in grants_by_role(&desired.grants) {
        let mut set = AssertionSet::new(ObjectReference::new("GRANTS", role.clone()));
        set.string_list_set("grants", &expected_lines);

        let observed = actual_grants.get(&role).cloned().unwrap_or_default();
        debug!(
            role = %role,
            expected = expected_lines.len(),
            observed = observed.len(),
            "verifying grants"
        );
        let snapshot = AttributeSnapshot::from_json(&serde_json::json!({ "grants": observed }));
        reports.push(set.evaluate(&snapshot));
    }

    reports
}

pub async fn verify(args: &ProjectArgs) -> Result<RoutineSuccess, RoutineFailure> {
    let project = load_project(args)?;
    let client = HttpControlPlaneClient::new(project.connection.clone());

    let actual = fetch_actual_state(&client, &project.desired)
        .await
        .map_err(|e| {
            RoutineFailure::new(
                Message::new(
                    "Fetching".to_string(),
                    "could not read warehouse state".to_string(),
                ),
                e,
            )
        })?;

    let reports = verify_state(&actual, &project.desired);
    let failing: Vec<&EvaluationReport> = reports.iter().filter(|r| !r.is_passing()).collect();

    if args.json {
        let summary: Vec<serde_json::Value> = reports
            .iter()
            .map(|report| {
                serde_json::json!({
                    "object": report.object().to_string(),
                    "checks": report.checks_run(),
                    "violations": report
                        .violations()
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<String>>(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "[]".to_string())
        );
    } else {
        println!("{}", render_verification_table(&reports));
        for report in &failing {
            println!("{report}");
        }
    }

    if failing.is_empty() {
        Ok(RoutineSuccess::success(Message::new(
            "Verify".to_string(),
            format!("{} object(s) match the declared state", reports.len()),
        )))
    } else {
        let violation_count: usize = failing.iter().map(|r| r.violations().len()).sum();
        Err(RoutineFailure::error(Message::new(
            "Verify".to_string(),
            format!(
                "{} violation(s) across {} object(s)",
                violation_count,
                failing.len()
            ),
        )))
    }
}
