//! Storage-agnostic repository and unit-of-work layer over SQLite.
//!
//! Callers open one [`UnitOfWork`] per business transaction, obtain typed
//! repositories from it, stage reads and writes against the shared session,
//! then persist everything with a single [`UnitOfWork::save_changes`] call.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod session;
pub mod uow;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    normalize_defaults, ColumnKind, ColumnSpec, Entity, FieldValue, SoftDeleteSpec,
};
pub use query::{CompareOp, Predicate, Projection, QueryError, SortDirection};
pub use repo::{ProjectedRow, RepoError, RepoResult, Repository};
pub use session::EntityState;
pub use uow::{UnitOfWork, SAVE_FAILED};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
