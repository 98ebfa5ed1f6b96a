//! Project loading.
//!
//! A project is one `floe.toml`: the warehouse connection plus the declared
//! resources. Loading goes through the `config` crate so values can be
//! overridden from the environment (`FLOE_CONNECTION__PASSWORD=...`), which
//! keeps credentials out of the checked-in file.

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::core::resource_map::ResourceMap;
use crate::infrastructure::warehouse::config::WarehouseConfig;
use crate::infrastructure::warehouse::model::{
    Database, Grant, NamedResource, Role, Table, User, Warehouse,
};

pub const PROJECT_FILE_NAME: &str = "floe.toml";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProjectLoadError {
    #[error("Failed to read project configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{kind} '{name}' is declared more than once")]
    DuplicateResource { kind: &'static str, name: String },

    #[error("{kind} declared with an empty name")]
    EmptyName { kind: &'static str },
}

/// Raw shape of `floe.toml`.
#[derive(Debug, Deserialize)]
struct ProjectFile {
    connection: WarehouseConfig,
    #[serde(default)]
    warehouses: Vec<Warehouse>,
    #[serde(default)]
    databases: Vec<Database>,
    #[serde(default)]
    roles: Vec<Role>,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    tables: Vec<Table>,
    #[serde(default)]
    grants: Vec<Grant>,
}

/// A loaded project: connection settings plus the desired resource map.
#[derive(Debug)]
pub struct Project {
    pub connection: WarehouseConfig,
    pub desired: ResourceMap,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProjectLoadError> {
        debug!(path = %path.display(), "loading project");
        let file: ProjectFile = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("FLOE").separator("__"))
            .build()?
            .try_deserialize()?;
        Self::from_file(file)
    }

    fn from_file(file: ProjectFile) -> Result<Self, ProjectLoadError> {
        let mut desired = ResourceMap::default();

        insert_all(file.warehouses, &mut desired, |map, w| {
            map.insert_warehouse(w)
        })?;
        insert_all(file.databases, &mut desired, |map, d| {
            map.insert_database(d)
        })?;
        insert_all(file.roles, &mut desired, |map, r| map.insert_role(r))?;
        insert_all(file.users, &mut desired, |map, u| map.insert_user(u))?;
        insert_all(file.tables, &mut desired, |map, t| map.insert_table(t))?;
        desired.grants = file.grants;

        Ok(Self {
            connection: file.connection,
            desired,
        })
    }
}

fn insert_all<T, F>(
    resources: Vec<T>,
    map: &mut ResourceMap,
    insert: F,
) -> Result<(), ProjectLoadError>
where
    T: NamedResource,
    F: Fn(&mut ResourceMap, T),
{
    let mut seen = std::collections::HashSet::new();
    for resource in resources {
        if resource.name().trim().is_empty() {
            return Err(ProjectLoadError::EmptyName { kind: T::KIND });
        }
        if !seen.insert(resource.id()) {
            return Err(ProjectLoadError::DuplicateResource {
                kind: T::KIND,
                name: resource.name().to_string(),
            });
        }
        insert(map, resource);
    }
    Ok(())
}
