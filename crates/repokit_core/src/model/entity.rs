//! Declarative entity descriptors and column values.
//!
//! # Responsibility
//! - Describe one storage table per entity type as static column metadata.
//! - Move values between entities, staged change sets and SQLite rows.
//! - Resolve the soft-delete capability of a type once, from its descriptor.
//!
//! # Invariants
//! - `Entity::columns()` lists every persisted column exactly once and
//!   includes `Entity::PRIMARY_KEY`.
//! - `field()` returns `FieldValue::Null` for an unset column, `None` only
//!   for a column name missing from the descriptor table.
//! - Soft-delete resolution order is fixed: `ACTIVE` before `PRST`.
//!
//! # See also
//! - docs/architecture/data-access.md

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Column holding the primary liveness marker. Cleared to `""` on soft delete.
pub const ACTIVE_COLUMN: &str = "ACTIVE";

/// Alternate liveness marker convention. Set to `"D"` on soft delete.
pub const PRST_COLUMN: &str = "PRST";

const PRST_DELETED_SENTINEL: &str = "D";

/// Storage type of one declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Blob,
    /// Stored as SQLite INTEGER 0/1.
    Boolean,
}

/// One entry of an entity's static descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// A single column value in transit between entity, change set and storage.
///
/// `Null` doubles as the "unset" marker that pre-write normalization fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl FieldValue {
    /// Returns the zero-equivalent default for a column kind.
    ///
    /// Matches the write-path guarantee: every column reaches storage with a
    /// populated value, never an accidental NULL.
    pub fn default_for(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Integer => Self::Integer(0),
            ColumnKind::Real => Self::Real(0.0),
            ColumnKind::Text => Self::Text(String::new()),
            ColumnKind::Blob => Self::Blob(Vec::new()),
            ColumnKind::Boolean => Self::Boolean(false),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts into the SQLite parameter representation.
    pub fn to_sql_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
            Self::Blob(value) => Value::Blob(value.clone()),
            Self::Boolean(value) => Value::Integer(i64::from(*value)),
        }
    }

    /// Reads a SQLite value back under the declared column kind.
    ///
    /// Returns `None` when the stored value cannot represent the kind, so
    /// hydration can reject corrupt rows instead of masking them.
    pub fn from_sql_value(value: Value, kind: ColumnKind) -> Option<Self> {
        match (value, kind) {
            (Value::Null, _) => Some(Self::Null),
            (Value::Integer(raw), ColumnKind::Integer) => Some(Self::Integer(raw)),
            (Value::Integer(0), ColumnKind::Boolean) => Some(Self::Boolean(false)),
            (Value::Integer(1), ColumnKind::Boolean) => Some(Self::Boolean(true)),
            (Value::Integer(raw), ColumnKind::Real) => Some(Self::Real(raw as f64)),
            (Value::Real(raw), ColumnKind::Real) => Some(Self::Real(raw)),
            (Value::Text(raw), ColumnKind::Text) => Some(Self::Text(raw)),
            (Value::Blob(raw), ColumnKind::Blob) => Some(Self::Blob(raw)),
            _ => None,
        }
    }
}

/// Capability contract every persistable entity type implements.
///
/// The descriptor table replaces runtime field reflection: repositories and
/// sessions only ever address columns by the names declared here.
pub trait Entity: Clone + Default {
    /// Storage table name.
    const TABLE: &'static str;

    /// Primary-key column; must appear in `columns()`.
    const PRIMARY_KEY: &'static str;

    /// Static descriptor table for every persisted column.
    fn columns() -> &'static [ColumnSpec];

    /// Reads one column. `Null` means unset; `None` means unknown column.
    fn field(&self, column: &str) -> Option<FieldValue>;

    /// Writes one column. Returns `false` for an unknown column or a value
    /// the field cannot hold.
    fn set_field(&mut self, column: &str, value: FieldValue) -> bool;
}

/// Soft-delete capability of an entity type, resolved once per repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDeleteSpec {
    /// Liveness column toggled instead of issuing a DELETE.
    pub column: &'static str,
    /// Value written into the liveness column to tombstone a row.
    pub sentinel: &'static str,
}

impl SoftDeleteSpec {
    /// Scans a descriptor table for a liveness column.
    ///
    /// `ACTIVE` (cleared to `""`) takes priority over `PRST` (set to `"D"`).
    /// Only TEXT columns qualify; a same-named column of another kind does
    /// not activate the policy.
    pub fn resolve(columns: &[ColumnSpec]) -> Option<Self> {
        let text_column = |name: &str| {
            columns
                .iter()
                .any(|spec| spec.name == name && spec.kind == ColumnKind::Text)
        };

        if text_column(ACTIVE_COLUMN) {
            return Some(Self {
                column: ACTIVE_COLUMN,
                sentinel: "",
            });
        }
        if text_column(PRST_COLUMN) {
            return Some(Self {
                column: PRST_COLUMN,
                sentinel: PRST_DELETED_SENTINEL,
            });
        }
        None
    }
}

/// Fills every unset column of an entity with its kind default.
///
/// # Contract
/// - Columns already holding a value are never altered.
/// - Normalization never rejects an entity; it only fills gaps.
pub fn normalize_defaults<T: Entity>(entity: &mut T) {
    for spec in T::columns() {
        let unset = matches!(entity.field(spec.name), Some(FieldValue::Null));
        if unset {
            entity.set_field(spec.name, FieldValue::default_for(spec.kind));
        }
    }
}

/// Captures the full column/value snapshot of an entity in declaration order.
///
/// Unknown reads degrade to `Null`; staged writes are always complete rows.
pub fn snapshot<T: Entity>(entity: &T) -> Vec<(&'static str, FieldValue)> {
    T::columns()
        .iter()
        .map(|spec| {
            (
                spec.name,
                entity.field(spec.name).unwrap_or(FieldValue::Null),
            )
        })
        .collect()
}
