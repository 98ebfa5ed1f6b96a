//! Core engines: multiset diffing, attribute snapshots, deferred
//! assertions, resource diffing and planning. Everything here is pure and
//! synchronous except [`plan`]'s fetch/execute helpers, which drive the
//! control-plane client.

pub mod assertions;
pub mod diff;
pub mod plan;
pub mod resource_map;
pub mod snapshot;
