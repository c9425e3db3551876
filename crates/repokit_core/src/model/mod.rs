//! Entity capability model shared by repositories and sessions.
//!
//! # Responsibility
//! - Define the declarative per-type column descriptor contract.
//! - Provide value-level primitives (`FieldValue`) for staging and hydration.
//!
//! # Invariants
//! - Descriptor tables are static data; no runtime type introspection.
//! - `FieldValue::Null` is the only representation of "unset".
//!
//! # See also
//! - docs/architecture/data-access.md

pub mod entity;

pub use entity::{
    normalize_defaults, snapshot, ColumnKind, ColumnSpec, Entity, FieldValue, SoftDeleteSpec,
};
