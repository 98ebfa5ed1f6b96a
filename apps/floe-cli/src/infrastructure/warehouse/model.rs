//! Warehouse resource models.
//!
//! These are the typed representations shared by the desired state (parsed
//! from `floe.toml`) and the observed state (mapped back from SHOW/DESCRIBE
//! output). Identifier-valued fields keep the user's spelling; comparisons
//! normalize through [`crate::utilities::identifiers`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::assertions::ObjectReference;
use crate::utilities::identifiers::normalize_identifier;

/// A virtual warehouse (compute cluster).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub name: String,
    /// Size keyword, validated against [`ParameterCatalog::warehouse_sizes`].
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_suspend: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_resume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_retention_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An account-level role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A user login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Kinds of securable objects a privilege can be granted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurableKind {
    Account,
    Warehouse,
    Database,
    Schema,
    Table,
}

impl fmt::Display for SecurableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            SecurableKind::Account => "ACCOUNT",
            SecurableKind::Warehouse => "WAREHOUSE",
            SecurableKind::Database => "DATABASE",
            SecurableKind::Schema => "SCHEMA",
            SecurableKind::Table => "TABLE",
        };
        f.write_str(keyword)
    }
}

/// The object side of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurableRef {
    pub kind: SecurableKind,
    pub name: String,
}

/// A privilege granted on an object to a role. Grants are set-valued remote
/// state: converging them is a multiset diff producing GRANT/REVOKE pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub privilege: String,
    pub on: SecurableRef,
    pub to_role: String,
}

impl Grant {
    /// Normal form used for diffing: privilege keywords upper-cased,
    /// identifiers resolved through quoting/case-folding rules.
    pub fn normalized(&self) -> Grant {
        Grant {
            privilege: self.privilege.trim().to_ascii_uppercase(),
            on: SecurableRef {
                kind: self.on.kind,
                name: normalize_identifier(&self.on.name),
            },
            to_role: normalize_identifier(&self.to_role),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ON {} {} TO ROLE {}",
            self.privilege, self.on.kind, self.on.name, self.to_role
        )
    }
}

/// A table column. The data type is kept as the textual expression; the
/// equivalence engine decides whether two spellings denote the same type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

/// A table under management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_schema() -> String {
    "PUBLIC".to_string()
}

impl Table {
    /// Normalized `DATABASE.SCHEMA.NAME` identifier used as the diff key.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}",
            normalize_identifier(&self.database),
            normalize_identifier(&self.schema),
            normalize_identifier(&self.name)
        )
    }
}

/// Reference half of the reporting contract: which remote object a snapshot
/// or a set of assertions belongs to.
pub trait NamedResource {
    const KIND: &'static str;

    fn name(&self) -> &str;

    /// Normalized identity used as the diff key.
    fn id(&self) -> String {
        normalize_identifier(self.name())
    }

    fn object_ref(&self) -> ObjectReference {
        ObjectReference::new(Self::KIND, self.name())
    }
}

impl NamedResource for Warehouse {
    const KIND: &'static str = "WAREHOUSE";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for Database {
    const KIND: &'static str = "DATABASE";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for Role {
    const KIND: &'static str = "ROLE";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for User {
    const KIND: &'static str = "USER";
    fn name(&self) -> &str {
        &self.name
    }
}

impl NamedResource for Table {
    const KIND: &'static str = "TABLE";
    fn name(&self) -> &str {
        &self.name
    }
    fn id(&self) -> String {
        Table::id(self)
    }
    fn object_ref(&self) -> ObjectReference {
        ObjectReference::new(Self::KIND, Table::id(self))
    }
}

/// Immutable allow-lists for enum-valued parameters, constructed once at
/// startup and passed by reference to validation. Keeping this explicit
/// (rather than a process-global registry) lets tests build their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterCatalog {
    warehouse_sizes: BTreeSet<String>,
    privileges: BTreeSet<String>,
}

impl ParameterCatalog {
    pub fn new<S, P>(warehouse_sizes: S, privileges: P) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            warehouse_sizes: warehouse_sizes
                .into_iter()
                .map(|s| s.into().to_ascii_uppercase())
                .collect(),
            privileges: privileges
                .into_iter()
                .map(|p| p.into().to_ascii_uppercase())
                .collect(),
        }
    }

    /// The sizes and privileges the control plane accepts today.
    pub fn builtin() -> Self {
        Self::new(
            [
                "XSMALL", "SMALL", "MEDIUM", "LARGE", "XLARGE", "XXLARGE", "XXXLARGE",
            ],
            [
                "USAGE",
                "OPERATE",
                "MONITOR",
                "MODIFY",
                "SELECT",
                "INSERT",
                "UPDATE",
                "DELETE",
                "TRUNCATE",
                "REFERENCES",
                "OWNERSHIP",
                "CREATE SCHEMA",
                "CREATE TABLE",
            ],
        )
    }

    pub fn is_valid_warehouse_size(&self, size: &str) -> bool {
        self.warehouse_sizes.contains(&size.trim().to_ascii_uppercase())
    }

    pub fn is_valid_privilege(&self, privilege: &str) -> bool {
        self.privileges
            .contains(&privilege.trim().to_ascii_uppercase())
    }

    pub fn warehouse_sizes(&self) -> impl Iterator<Item = &str> {
        self.warehouse_sizes.iter().map(String::as_str)
    }
}
