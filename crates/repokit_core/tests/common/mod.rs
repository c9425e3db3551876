//! Shared fixtures: three entity shapes covering every delete policy.
#![allow(dead_code)]

use repokit_core::{ColumnKind, ColumnSpec, Entity, FieldValue, UnitOfWork};
use rusqlite::Connection;

pub const SCHEMA: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    score REAL NOT NULL CHECK (score >= 0.0),
    vip INTEGER NOT NULL,
    avatar BLOB NOT NULL,
    ACTIVE TEXT NOT NULL
);
CREATE TABLE documents (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    PRST TEXT NOT NULL
);
CREATE TABLE audit_entries (
    id INTEGER PRIMARY KEY,
    message TEXT NOT NULL UNIQUE
);
";

/// Opens an in-memory unit of work with the fixture schema applied.
pub fn setup_uow() -> UnitOfWork {
    let conn = Connection::open_in_memory().expect("in-memory db should open");
    conn.execute_batch(SCHEMA).expect("fixture schema should apply");
    UnitOfWork::from_connection(conn)
}

/// Entity with an `ACTIVE` liveness column (primary soft-delete convention).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub score: Option<f64>,
    pub vip: Option<bool>,
    pub avatar: Option<Vec<u8>>,
    pub active: Option<String>,
}

impl Customer {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            active: Some("Y".to_string()),
            ..Self::default()
        }
    }
}

const CUSTOMER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("id", ColumnKind::Integer),
    ColumnSpec::new("name", ColumnKind::Text),
    ColumnSpec::new("email", ColumnKind::Text),
    ColumnSpec::new("score", ColumnKind::Real),
    ColumnSpec::new("vip", ColumnKind::Boolean),
    ColumnSpec::new("avatar", ColumnKind::Blob),
    ColumnSpec::new("ACTIVE", ColumnKind::Text),
];

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const PRIMARY_KEY: &'static str = "id";

    fn columns() -> &'static [ColumnSpec] {
        CUSTOMER_COLUMNS
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "id" => Some(FieldValue::Integer(self.id)),
            "name" => Some(text_or_null(&self.name)),
            "email" => Some(text_or_null(&self.email)),
            "score" => Some(self.score.map_or(FieldValue::Null, FieldValue::Real)),
            "vip" => Some(self.vip.map_or(FieldValue::Null, FieldValue::Boolean)),
            "avatar" => Some(
                self.avatar
                    .clone()
                    .map_or(FieldValue::Null, FieldValue::Blob),
            ),
            "ACTIVE" => Some(text_or_null(&self.active)),
            _ => None,
        }
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> bool {
        match (column, value) {
            ("id", FieldValue::Integer(raw)) => self.id = raw,
            ("name", FieldValue::Text(raw)) => self.name = Some(raw),
            ("email", FieldValue::Text(raw)) => self.email = Some(raw),
            ("score", FieldValue::Real(raw)) => self.score = Some(raw),
            ("vip", FieldValue::Boolean(raw)) => self.vip = Some(raw),
            ("avatar", FieldValue::Blob(raw)) => self.avatar = Some(raw),
            ("ACTIVE", FieldValue::Text(raw)) => self.active = Some(raw),
            _ => return false,
        }
        true
    }
}

/// Entity with the alternate `PRST` liveness convention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub id: i64,
    pub title: Option<String>,
    pub prst: Option<String>,
}

impl Document {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: Some(title.to_string()),
            prst: Some("A".to_string()),
        }
    }
}

const DOCUMENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("id", ColumnKind::Integer),
    ColumnSpec::new("title", ColumnKind::Text),
    ColumnSpec::new("PRST", ColumnKind::Text),
];

impl Entity for Document {
    const TABLE: &'static str = "documents";
    const PRIMARY_KEY: &'static str = "id";

    fn columns() -> &'static [ColumnSpec] {
        DOCUMENT_COLUMNS
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "id" => Some(FieldValue::Integer(self.id)),
            "title" => Some(text_or_null(&self.title)),
            "PRST" => Some(text_or_null(&self.prst)),
            _ => None,
        }
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> bool {
        match (column, value) {
            ("id", FieldValue::Integer(raw)) => self.id = raw,
            ("title", FieldValue::Text(raw)) => self.title = Some(raw),
            ("PRST", FieldValue::Text(raw)) => self.prst = Some(raw),
            _ => return false,
        }
        true
    }
}

/// Entity with no liveness column; deletes are always physical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub message: Option<String>,
}

impl AuditEntry {
    pub fn new(id: i64, message: &str) -> Self {
        Self {
            id,
            message: Some(message.to_string()),
        }
    }
}

const AUDIT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::new("id", ColumnKind::Integer),
    ColumnSpec::new("message", ColumnKind::Text),
];

impl Entity for AuditEntry {
    const TABLE: &'static str = "audit_entries";
    const PRIMARY_KEY: &'static str = "id";

    fn columns() -> &'static [ColumnSpec] {
        AUDIT_COLUMNS
    }

    fn field(&self, column: &str) -> Option<FieldValue> {
        match column {
            "id" => Some(FieldValue::Integer(self.id)),
            "message" => Some(text_or_null(&self.message)),
            _ => None,
        }
    }

    fn set_field(&mut self, column: &str, value: FieldValue) -> bool {
        match (column, value) {
            ("id", FieldValue::Integer(raw)) => self.id = raw,
            ("message", FieldValue::Text(raw)) => self.message = Some(raw),
            _ => return false,
        }
        true
    }
}

fn text_or_null(value: &Option<String>) -> FieldValue {
    value.clone().map_or(FieldValue::Null, FieldValue::Text)
}
