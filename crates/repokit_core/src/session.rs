//! Session: one connection plus the pending change set shared by every
//! repository of a unit of work.
//!
//! # Responsibility
//! - Track staged entity state transitions keyed by (table, primary key).
//! - Replay the change set atomically inside one SQLite transaction.
//! - Classify commit failures into the validation / storage-update / other
//!   taxonomy consumed by the unit of work.
//!
//! # Invariants
//! - Commit is all-or-nothing for everything staged at call time.
//! - Staged snapshots are complete rows; normalization has already run.
//! - A closed session never accepts reads, staging or commits again.
//!
//! # See also
//! - docs/architecture/data-access.md

use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};

use crate::model::FieldValue;

/// Tracked lifecycle state of one staged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

/// Per-state totals of the pending change set, used for commit telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
}

impl PendingCounts {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.deleted
    }
}

/// Commit-time failure taxonomy.
///
/// These three categories are recovered by `UnitOfWork::save_changes`;
/// anything else is fatal to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// Row rejected before the storage write (NOT NULL / CHECK rules).
    Validation(String),
    /// Write rejected by the storage engine (uniqueness, foreign keys,
    /// connectivity). Carries up to two nested cause messages.
    StorageUpdate {
        message: String,
        causes: Vec<String>,
    },
    /// Any other commit failure.
    Other(String),
}

impl CommitError {
    /// Top-level message concatenated with every captured nested cause.
    pub fn composite_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Other(message) => message.clone(),
            Self::StorageUpdate { message, causes } => {
                let mut composite = message.clone();
                for cause in causes {
                    let _ = write!(composite, " {cause}");
                }
                composite
            }
        }
    }

    /// Innermost available message; the top-level one when no cause exists.
    pub fn innermost_message(&self) -> &str {
        match self {
            Self::Validation(message) | Self::Other(message) => message,
            Self::StorageUpdate { message, causes } => {
                causes.last().map(String::as_str).unwrap_or(message)
            }
        }
    }
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failure: {message}"),
            Self::StorageUpdate { .. } => {
                write!(f, "storage update failure: {}", self.composite_message())
            }
            Self::Other(message) => write!(f, "commit failure: {message}"),
        }
    }
}

impl Error for CommitError {}

#[derive(Debug, Clone)]
struct PendingChange {
    table: &'static str,
    primary_key: &'static str,
    key: FieldValue,
    state: EntityState,
    values: Vec<(&'static str, FieldValue)>,
}

/// One live connection and its accumulated change set.
pub struct Session {
    conn: Connection,
    pending: Vec<PendingChange>,
    closed: bool,
}

impl Session {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn,
            pending: Vec::new(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the session closed. There is no transition back.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Stages a new row. Repeated adds of the same key stage repeated
    /// inserts; uniqueness is the storage engine's call at commit time.
    pub(crate) fn stage_added(
        &mut self,
        table: &'static str,
        primary_key: &'static str,
        key: FieldValue,
        values: Vec<(&'static str, FieldValue)>,
    ) {
        self.pending.push(PendingChange {
            table,
            primary_key,
            key,
            state: EntityState::Added,
            values,
        });
    }

    /// Attaches the row if untracked and marks it modified.
    ///
    /// A row staged as Added keeps that state; its snapshot is refreshed so
    /// the eventual INSERT carries the latest values.
    pub(crate) fn stage_modified(
        &mut self,
        table: &'static str,
        primary_key: &'static str,
        key: FieldValue,
        values: Vec<(&'static str, FieldValue)>,
    ) {
        let position = self
            .pending
            .iter()
            .position(|entry| entry.table == table && entry.key == key);

        match position {
            Some(index) => {
                let entry = &mut self.pending[index];
                entry.values = values;
                if entry.state != EntityState::Added {
                    entry.state = EntityState::Modified;
                }
            }
            None => self.pending.push(PendingChange {
                table,
                primary_key,
                key,
                state: EntityState::Modified,
                values,
            }),
        }
    }

    /// Transitions a row to Deleted.
    ///
    /// - untracked row: staged as Deleted
    /// - staged Added row: detached entirely; the insert never happens
    /// - already Deleted: re-attached with a refreshed snapshot and removed
    ///   again, covering rows handed in from outside the session
    pub(crate) fn stage_deleted(
        &mut self,
        table: &'static str,
        primary_key: &'static str,
        key: FieldValue,
        values: Vec<(&'static str, FieldValue)>,
    ) {
        let position = self
            .pending
            .iter()
            .position(|entry| entry.table == table && entry.key == key);

        match position {
            Some(index) if self.pending[index].state == EntityState::Added => {
                self.pending.remove(index);
            }
            Some(index) => {
                let entry = &mut self.pending[index];
                entry.values = values;
                entry.state = EntityState::Deleted;
            }
            None => self.pending.push(PendingChange {
                table,
                primary_key,
                key,
                state: EntityState::Deleted,
                values,
            }),
        }
    }

    pub(crate) fn tracked_state(&self, table: &str, key: &FieldValue) -> Option<EntityState> {
        self.pending
            .iter()
            .find(|entry| entry.table == table && entry.key == *key)
            .map(|entry| entry.state)
    }

    pub(crate) fn pending_counts(&self) -> PendingCounts {
        let mut counts = PendingCounts::default();
        for entry in &self.pending {
            match entry.state {
                EntityState::Added => counts.added += 1,
                EntityState::Modified => counts.modified += 1,
                EntityState::Deleted => counts.deleted += 1,
                EntityState::Unchanged => {}
            }
        }
        counts
    }

    /// Replays the change set in staging order inside one transaction.
    ///
    /// On success the change set is cleared and the summed affected-row
    /// count returned. On failure the transaction is rolled back and the
    /// change set left as it was, so the caller can inspect or retry.
    pub(crate) fn commit(&mut self) -> Result<usize, CommitError> {
        let tx = self
            .conn
            .transaction()
            .map_err(classify_commit_error)?;

        let mut affected = 0usize;
        for change in &self.pending {
            let (sql, binds) = render_change(change);
            let params = params_from_iter(binds.iter().map(FieldValue::to_sql_value));
            affected += tx.execute(&sql, params).map_err(classify_commit_error)?;
        }

        tx.commit().map_err(classify_commit_error)?;
        self.pending.clear();
        Ok(affected)
    }
}

fn render_change(change: &PendingChange) -> (String, Vec<FieldValue>) {
    match change.state {
        EntityState::Added => {
            let columns: Vec<&str> = change.values.iter().map(|(name, _)| *name).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({});",
                change.table,
                columns.join(", "),
                placeholders
            );
            let binds = change.values.iter().map(|(_, value)| value.clone()).collect();
            (sql, binds)
        }
        EntityState::Modified => {
            let mut assignments = Vec::new();
            let mut binds = Vec::new();
            for (name, value) in &change.values {
                if *name == change.primary_key {
                    continue;
                }
                assignments.push(format!("{name} = ?"));
                binds.push(value.clone());
            }
            binds.push(change.key.clone());
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?;",
                change.table,
                assignments.join(", "),
                change.primary_key
            );
            (sql, binds)
        }
        EntityState::Deleted => (
            format!(
                "DELETE FROM {} WHERE {} = ?;",
                change.table, change.primary_key
            ),
            vec![change.key.clone()],
        ),
        // Unchanged rows are never staged; render a no-op defensively.
        EntityState::Unchanged => ("SELECT 1 WHERE 0;".to_string(), Vec::new()),
    }
}

/// Maps a SQLite failure onto the commit taxonomy.
///
/// NOT NULL and CHECK violations fire before the row is written and count
/// as validation; the remaining engine failures are storage updates with
/// their nested causes flattened to at most two levels.
fn classify_commit_error(err: rusqlite::Error) -> CommitError {
    match &err {
        rusqlite::Error::SqliteFailure(_, message) => {
            let text = message.clone().unwrap_or_else(|| err.to_string());
            if text.contains("NOT NULL constraint failed")
                || text.contains("CHECK constraint failed")
            {
                return CommitError::Validation(text);
            }

            let mut causes = Vec::new();
            let mut source = Error::source(&err);
            while let Some(cause) = source {
                if causes.len() == 2 {
                    break;
                }
                causes.push(cause.to_string());
                source = cause.source();
            }
            CommitError::StorageUpdate {
                message: err.to_string(),
                causes,
            }
        }
        _ => CommitError::Other(err.to_string()),
    }
}
