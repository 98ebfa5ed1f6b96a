//! Plan and apply routines.

use std::path::PathBuf;

use tracing::info;

use crate::cli::commands::ProjectArgs;
use crate::cli::display::{render_change_table, Message};
use crate::cli::routines::{RoutineFailure, RoutineSuccess};
use crate::core::plan::{execute_plan, fetch_actual_state, plan_changes, InfraPlan};
use crate::infrastructure::warehouse::client::HttpControlPlaneClient;
use crate::infrastructure::warehouse::model::ParameterCatalog;
use crate::project::{Project, PROJECT_FILE_NAME};

pub fn project_path(args: &ProjectArgs) -> PathBuf {
    args.file
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_FILE_NAME))
}

pub fn load_project(args: &ProjectArgs) -> Result<Project, RoutineFailure> {
    Project::load(&project_path(args)).map_err(|e| {
        RoutineFailure::new(
            Message::new(
                "Loading".to_string(),
                format!("could not load {}", project_path(args).display()),
            ),
            e,
        )
    })
}

async fn compute_plan(project: &Project) -> Result<InfraPlan, RoutineFailure> {
    let client = HttpControlPlaneClient::new(project.connection.clone());
    info!(
        connection = %project.connection.display_connection(),
        "fetching actual state"
    );

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

    plan_changes(&actual, &project.desired, &ParameterCatalog::builtin()).map_err(|e| {
        RoutineFailure::new(
            Message::new("Planning".to_string(), "could not compute plan".to_string()),
            e,
        )
    })
}

fn print_plan(plan: &InfraPlan, json: bool) -> Result<(), RoutineFailure> {
    if json {
        let rendered = serde_json::to_string_pretty(plan).map_err(|e| {
            RoutineFailure::new(
                Message::new("Planning".to_string(), "could not encode plan".to_string()),
                e,
            )
        })?;
        println!("{rendered}");
        return Ok(());
    }

    println!("{}", render_change_table(&plan.changes));
    println!();
    for statement in &plan.statements {
        println!("{statement};");
    }
    Ok(())
}

pub async fn plan(args: &ProjectArgs) -> Result<RoutineSuccess, RoutineFailure> {
    let project = load_project(args)?;
    let plan = compute_plan(&project).await?;

    if plan.is_empty() {
        return Ok(RoutineSuccess::success(Message::new(
            "Plan".to_string(),
            "no changes; warehouse matches the declared state".to_string(),
        )));
    }

    print_plan(&plan, args.json)?;
    Ok(RoutineSuccess::highlight(Message::new(
        "Plan".to_string(),
        format!(
            "{} change(s), {} statement(s)",
            plan.changes.len(),
            plan.statements.len()
        ),
    )))
}

pub async fn apply(args: &ProjectArgs) -> Result<RoutineSuccess, RoutineFailure> {
    let project = load_project(args)?;
    let plan = compute_plan(&project).await?;

    if plan.is_empty() {
        return Ok(RoutineSuccess::success(Message::new(
            "Apply".to_string(),
            "no changes to apply".to_string(),
        )));
    }

    print_plan(&plan, args.json)?;

    let client = HttpControlPlaneClient::new(project.connection.clone());
    let executed = execute_plan(&client, &plan).await.map_err(|e| {
        RoutineFailure::new(
            Message::new(
                "Applying".to_string(),
                "statement execution failed; the warehouse may be partially converged".to_string(),
            ),
            e,
        )
    })?;

    Ok(RoutineSuccess::success(Message::new(
        "Apply".to_string(),
        format!("executed {executed} statement(s)"),
    )))
}
