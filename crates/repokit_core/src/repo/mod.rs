//! Repository layer: generic, entity-scoped data access over one session.
//!
//! # Responsibility
//! - Define the repository error taxonomy shared by all query paths.
//! - Isolate SQL rendering and row hydration from callers.
//!
//! # Invariants
//! - Repository writes run default-value normalization before staging.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Query expressions failing translation surface at call time, never at
//!   commit.
//!
//! # See also
//! - docs/architecture/data-access.md

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::db::DbError;
use crate::query::QueryError;

mod entity_repo;

pub use entity_repo::{ProjectedRow, Repository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level error for query, staging and hydration operations.
#[derive(Debug)]
pub enum RepoError {
    /// A predicate, projection or sort expression could not be translated.
    Untranslatable(QueryError),
    /// A persisted row does not match the entity descriptor.
    InvalidData(String),
    /// Raw query rejected because it is not a read statement.
    RawQueryNotReadOnly(String),
    /// The owning unit of work has been closed.
    SessionClosed,
    Db(DbError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Untranslatable(err) => write!(f, "untranslatable query expression: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::RawQueryNotReadOnly(sql) => {
                write!(f, "raw query must be a SELECT/WITH statement: {sql}")
            }
            Self::SessionClosed => write!(f, "session is closed"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Untranslatable(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Untranslatable(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
