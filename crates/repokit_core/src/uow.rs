//! Unit of work: session ownership, repository factory and the single
//! commit point.
//!
//! # Responsibility
//! - Acquire one session per transactional scope and release it on every
//!   exit path.
//! - Manufacture repositories bound to that session.
//! - Commit all pending changes once, classifying known failure categories
//!   instead of letting them escape.
//!
//! # Invariants
//! - Exactly one session per unit of work; all repositories share it.
//! - The error log is append-only and survives until the unit of work is
//!   dropped; it is never auto-cleared.
//! - A closed unit of work rejects every further operation; the session is
//!   never silently resurrected.
//!
//! # See also
//! - docs/architecture/data-access.md

use log::{error, info};
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use uuid::Uuid;

use crate::db;
use crate::model::Entity;
use crate::repo::{RepoError, RepoResult, Repository};
use crate::session::{CommitError, Session};

/// Sentinel returned by `save_changes` for every recovered commit failure.
pub const SAVE_FAILED: i64 = -1;

/// Transactional scope owning one session and the commit error log.
///
/// Intended for sequential use by a single logical caller; concurrent use
/// requires one unit of work per concurrent scope.
pub struct UnitOfWork {
    session: Rc<RefCell<Session>>,
    error_log: Vec<String>,
    uow_id: Uuid,
}

impl UnitOfWork {
    /// Opens a unit of work over a SQLite database file.
    ///
    /// The session is acquired here, at construction; release is guaranteed
    /// by `close` or drop.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let conn = db::open_db(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Opens a unit of work over an in-memory SQLite database.
    pub fn open_in_memory() -> RepoResult<Self> {
        let conn = db::open_db_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already configured connection.
    ///
    /// The unit of work takes exclusive ownership; schema setup is the
    /// caller's business and must have happened before.
    pub fn from_connection(conn: Connection) -> Self {
        let uow_id = Uuid::new_v4();
        info!("event=uow_open module=uow status=ok uow_id={uow_id}");
        Self {
            session: Rc::new(RefCell::new(Session::new(conn))),
            error_log: Vec::new(),
            uow_id,
        }
    }

    /// Correlation id carried by this unit of work's log events.
    pub fn id(&self) -> Uuid {
        self.uow_id
    }

    /// Manufactures a repository for `T` bound to this unit of work's
    /// session. Every repository created here shares one pending change
    /// set.
    pub fn repository<T: Entity>(&self) -> RepoResult<Repository<T>> {
        if self.session.borrow().is_closed() {
            return Err(RepoError::SessionClosed);
        }
        Ok(Repository::new(Rc::clone(&self.session)))
    }

    /// Commits everything staged across all repositories of this unit of
    /// work in one atomic operation.
    ///
    /// Returns the affected-row count on success. The three known commit
    /// failure categories are recovered locally and reported as
    /// [`SAVE_FAILED`]:
    /// - validation failures are logged only
    /// - storage-update failures log a composite message of the top-level
    ///   failure plus up to two nested causes, and append the innermost
    ///   cause to the error log list
    /// - any other commit failure is logged and appended to the error list
    ///
    /// Failures outside commit classification, such as a closed session,
    /// propagate as `Err`.
    pub fn save_changes(&mut self) -> RepoResult<i64> {
        let mut session = self.session.borrow_mut();
        if session.is_closed() {
            return Err(RepoError::SessionClosed);
        }

        let counts = session.pending_counts();
        info!(
            "event=save_changes module=uow status=start uow_id={} added={} modified={} deleted={}",
            self.uow_id, counts.added, counts.modified, counts.deleted
        );

        match session.commit() {
            Ok(affected) => {
                info!(
                    "event=save_changes module=uow status=ok uow_id={} affected={affected}",
                    self.uow_id
                );
                Ok(affected as i64)
            }
            Err(CommitError::Validation(message)) => {
                // Log-only category: the structured error list stays as-is.
                error!(
                    "event=save_changes module=uow status=error uow_id={} kind=validation error={}",
                    self.uow_id, message
                );
                Ok(SAVE_FAILED)
            }
            Err(err @ CommitError::StorageUpdate { .. }) => {
                self.error_log.push(err.innermost_message().to_string());
                error!(
                    "event=save_changes module=uow status=error uow_id={} kind=storage_update error={}",
                    self.uow_id,
                    err.composite_message()
                );
                Ok(SAVE_FAILED)
            }
            Err(CommitError::Other(message)) => {
                self.error_log.push(message.clone());
                error!(
                    "event=save_changes module=uow status=error uow_id={} kind=other error={}",
                    self.uow_id, message
                );
                Ok(SAVE_FAILED)
            }
        }
    }

    /// Messages collected from failed commits, oldest first.
    pub fn error_log(&self) -> &[String] {
        &self.error_log
    }

    /// Closes the session. Every repository obtained from this unit of
    /// work, and the unit of work itself, rejects further operations.
    pub fn close(&mut self) {
        let mut session = self.session.borrow_mut();
        if session.is_closed() {
            return;
        }
        session.close();
        info!("event=uow_close module=uow status=ok uow_id={}", self.uow_id);
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.close();
    }
}
