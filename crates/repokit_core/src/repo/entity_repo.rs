//! Generic repository over one entity type.
//!
//! # Responsibility
//! - Translate declarative query expressions into parameterized SELECTs.
//! - Stage add/update/delete transitions on the shared session, applying
//!   default-value normalization and the soft-delete policy first.
//!
//! # Invariants
//! - The repository never owns the session; it holds a shared handle and
//!   never closes it.
//! - Projected reads (`select_list`) and raw reads (`send_sql`) never enter
//!   the change set.
//! - The soft-delete capability is resolved once, at construction.
//!
//! # See also
//! - docs/architecture/data-access.md

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Row};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::model::{
    normalize_defaults, snapshot, ColumnSpec, Entity, FieldValue, SoftDeleteSpec,
};
use crate::query::{
    translate_predicate, translate_projection, translate_sort_column, Predicate, Projection,
    SortDirection, SqlFragment,
};
use crate::repo::{RepoError, RepoResult};
use crate::session::{EntityState, Session};

static RAW_READ_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(select|with)\b").expect("raw query guard regex is valid"));

/// One row of a projected, read-only query.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    values: Vec<(&'static str, FieldValue)>,
}

impl ProjectedRow {
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.iter().map(|(name, _)| *name)
    }
}

/// Entity-scoped facade over the unit of work's session.
pub struct Repository<T: Entity> {
    session: Rc<RefCell<Session>>,
    soft_delete: Option<SoftDeleteSpec>,
    _entity: PhantomData<T>,
}

impl<T: Entity> Repository<T> {
    pub(crate) fn new(session: Rc<RefCell<Session>>) -> Self {
        Self {
            session,
            soft_delete: SoftDeleteSpec::resolve(T::columns()),
            _entity: PhantomData,
        }
    }

    /// Soft-delete capability resolved for this entity type, if any.
    pub fn soft_delete_spec(&self) -> Option<SoftDeleteSpec> {
        self.soft_delete
    }

    /// Returns every row of the entity table.
    pub fn get_all(&self) -> RepoResult<Vec<T>> {
        self.get_all_where(&Predicate::All)
    }

    /// Returns all rows matching the predicate.
    pub fn get_all_where(&self, predicate: &Predicate) -> RepoResult<Vec<T>> {
        let fragment = translate_predicate(predicate, T::columns())?;
        let sql = compose(select_base::<T>(), &fragment, "");
        self.query_entities(&sql, binds_of(&fragment))
    }

    /// Counts every row of the entity table.
    pub fn count(&self) -> RepoResult<i64> {
        self.count_where(&Predicate::All)
    }

    /// Counts rows matching the predicate.
    pub fn count_where(&self, predicate: &Predicate) -> RepoResult<i64> {
        let fragment = translate_predicate(predicate, T::columns())?;
        let sql = compose(format!("SELECT COUNT(*) FROM {}", T::TABLE), &fragment, "");
        self.with_session(|session| {
            let count = session.conn().query_row(
                &sql,
                params_from_iter(binds_of(&fragment).iter().map(FieldValue::to_sql_value)),
                |row| row.get::<_, i64>(0),
            )?;
            Ok(count)
        })
    }

    /// Returns the first match under the storage engine's default ordering,
    /// or `None` when nothing matches. No explicit order is requested.
    pub fn get(&self, predicate: &Predicate) -> RepoResult<Option<T>> {
        let fragment = translate_predicate(predicate, T::columns())?;
        let sql = compose(select_base::<T>(), &fragment, " LIMIT 1");
        let mut rows = self.query_entities(&sql, binds_of(&fragment))?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// Returns whether at least one row matches the predicate.
    pub fn any(&self, predicate: &Predicate) -> RepoResult<bool> {
        let fragment = translate_predicate(predicate, T::columns())?;
        let inner = compose(format!("SELECT 1 FROM {}", T::TABLE), &fragment, " LIMIT 1");
        let sql = format!("SELECT EXISTS ({inner})");
        self.with_session(|session| {
            let exists = session.conn().query_row(
                &sql,
                params_from_iter(binds_of(&fragment).iter().map(FieldValue::to_sql_value)),
                |row| row.get::<_, bool>(0),
            )?;
            Ok(exists)
        })
    }

    /// Filtered, projected, read-only view. Results never participate in
    /// change tracking; there is no update path for them.
    pub fn select_list(
        &self,
        predicate: &Predicate,
        projection: &Projection,
    ) -> RepoResult<Vec<ProjectedRow>> {
        let column_list = translate_projection(projection, T::columns())?;
        let fragment = translate_predicate(predicate, T::columns())?;
        let sql = compose(
            format!("SELECT {column_list} FROM {}", T::TABLE),
            &fragment,
            "",
        );

        let specs = projection
            .column_names()
            .iter()
            .map(|name| {
                T::columns()
                    .iter()
                    .find(|spec| spec.name == *name)
                    .ok_or_else(|| {
                        RepoError::InvalidData(format!(
                            "projected column `{}` is not declared on table `{}`",
                            name,
                            T::TABLE
                        ))
                    })
            })
            .collect::<RepoResult<Vec<&ColumnSpec>>>()?;

        self.with_session(|session| {
            let mut stmt = session.conn().prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(
                binds_of(&fragment).iter().map(FieldValue::to_sql_value),
            ))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(specs.len());
                for (index, spec) in specs.iter().enumerate() {
                    let raw: Value = row.get(index)?;
                    let value = FieldValue::from_sql_value(raw, spec.kind).ok_or_else(|| {
                        RepoError::InvalidData(format!(
                            "column `{}` of table `{}` does not match its declared kind",
                            spec.name,
                            T::TABLE
                        ))
                    })?;
                    values.push((spec.name, value));
                }
                out.push(ProjectedRow { values });
            }
            Ok(out)
        })
    }

    /// Paged read.
    ///
    /// # Contract and known limitation
    /// - The result size is capped at `take + skip`, not `take`.
    /// - A server-side OFFSET is never issued in either branch; callers must
    ///   drop the first `skip` rows of the returned sequence themselves.
    /// - With `SortDirection::Descending` no ORDER BY is emitted at all: the
    ///   engine-side translation of descending order combined with a
    ///   server-side skip is not supported by this contract, so ordering is
    ///   bypassed entirely and only the row cap applies.
    pub fn get_data_part(
        &self,
        predicate: &Predicate,
        sort_column: &'static str,
        direction: SortDirection,
        skip: u32,
        take: u32,
    ) -> RepoResult<Vec<T>> {
        let fragment = translate_predicate(predicate, T::columns())?;
        let cap = i64::from(take) + i64::from(skip);

        let sql = match direction {
            SortDirection::Descending => {
                compose(select_base::<T>(), &fragment, &format!(" LIMIT {cap}"))
            }
            SortDirection::Ascending => {
                let sort = translate_sort_column(sort_column, T::columns())?;
                compose(
                    select_base::<T>(),
                    &fragment,
                    &format!(" ORDER BY {sort} ASC LIMIT {cap}"),
                )
            }
        };

        self.query_entities(&sql, binds_of(&fragment))
    }

    /// Executes a raw SELECT in the storage dialect and maps rows to `T`.
    ///
    /// Read-only: non-SELECT statements are rejected up front, and results
    /// never enter the change set. Every declared column must be present in
    /// the result shape.
    pub fn send_sql(&self, sql: &str) -> RepoResult<Vec<T>> {
        if !RAW_READ_ONLY.is_match(sql) {
            return Err(RepoError::RawQueryNotReadOnly(sql.to_string()));
        }

        self.with_session(|session| {
            let mut stmt = session.conn().prepare(sql)?;
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();

            let mut indices = Vec::with_capacity(T::columns().len());
            for spec in T::columns() {
                let index = names.iter().position(|name| name == spec.name).ok_or_else(
                    || {
                        RepoError::InvalidData(format!(
                            "raw query result is missing column `{}` required by `{}`",
                            spec.name,
                            T::TABLE
                        ))
                    },
                )?;
                indices.push((index, spec));
            }

            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(hydrate_indexed::<T>(row, &indices)?);
            }
            Ok(out)
        })
    }

    /// Normalizes the entity and stages it as Added.
    pub fn add(&self, entity: &mut T) -> RepoResult<()> {
        normalize_defaults(entity);
        let key = primary_key_value(entity)?;
        let values = snapshot(entity);
        self.with_session_mut(|session| {
            session.stage_added(T::TABLE, T::PRIMARY_KEY, key, values);
            Ok(())
        })
    }

    /// Normalizes the entity, attaches it if untracked, and marks it
    /// Modified.
    pub fn update(&self, entity: &mut T) -> RepoResult<()> {
        normalize_defaults(entity);
        self.stage_modified(entity)
    }

    /// Deletes an entity under the soft-delete policy.
    ///
    /// With `force_delete = false` and a resolved liveness column, the
    /// column is set to its tombstone sentinel and the row staged as
    /// Modified. Otherwise the row is staged as Deleted; a row already
    /// staged Deleted is re-attached with a fresh snapshot and removed
    /// again.
    pub fn delete(&self, entity: &mut T, force_delete: bool) -> RepoResult<()> {
        normalize_defaults(entity);

        if !force_delete {
            if let Some(spec) = self.soft_delete {
                entity.set_field(spec.column, FieldValue::Text(spec.sentinel.to_string()));
                return self.stage_modified(entity);
            }
        }

        let key = primary_key_value(entity)?;
        let values = snapshot(entity);
        self.with_session_mut(|session| {
            session.stage_deleted(T::TABLE, T::PRIMARY_KEY, key, values);
            Ok(())
        })
    }

    /// Tracked state of the entity in the shared change set, if any.
    pub fn tracked_state(&self, entity: &T) -> RepoResult<Option<EntityState>> {
        let key = primary_key_value(entity)?;
        self.with_session(|session| Ok(session.tracked_state(T::TABLE, &key)))
    }

    fn stage_modified(&self, entity: &T) -> RepoResult<()> {
        let key = primary_key_value(entity)?;
        let values = snapshot(entity);
        self.with_session_mut(|session| {
            session.stage_modified(T::TABLE, T::PRIMARY_KEY, key, values);
            Ok(())
        })
    }

    fn query_entities(&self, sql: &str, binds: &[FieldValue]) -> RepoResult<Vec<T>> {
        let indexed: Vec<(usize, &ColumnSpec)> =
            T::columns().iter().enumerate().collect();
        self.with_session(|session| {
            let mut stmt = session.conn().prepare(sql)?;
            let mut rows = stmt.query(params_from_iter(
                binds.iter().map(FieldValue::to_sql_value),
            ))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(hydrate_indexed::<T>(row, &indexed)?);
            }
            Ok(out)
        })
    }

    fn with_session<R>(&self, body: impl FnOnce(&Session) -> RepoResult<R>) -> RepoResult<R> {
        let session = self.session.borrow();
        if session.is_closed() {
            return Err(RepoError::SessionClosed);
        }
        body(&session)
    }

    fn with_session_mut<R>(
        &self,
        body: impl FnOnce(&mut Session) -> RepoResult<R>,
    ) -> RepoResult<R> {
        let mut session = self.session.borrow_mut();
        if session.is_closed() {
            return Err(RepoError::SessionClosed);
        }
        body(&mut session)
    }
}

fn select_base<T: Entity>() -> String {
    let columns: Vec<&str> = T::columns().iter().map(|spec| spec.name).collect();
    format!("SELECT {} FROM {}", columns.join(", "), T::TABLE)
}

fn compose(base: String, fragment: &Option<SqlFragment>, suffix: &str) -> String {
    match fragment {
        Some(fragment) => format!("{base} WHERE {}{suffix}", fragment.text),
        None => format!("{base}{suffix}"),
    }
}

fn binds_of(fragment: &Option<SqlFragment>) -> &[FieldValue] {
    fragment.as_ref().map_or(&[], |fragment| &fragment.binds)
}

fn primary_key_value<T: Entity>(entity: &T) -> RepoResult<FieldValue> {
    entity.field(T::PRIMARY_KEY).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "entity for table `{}` does not expose its primary key column `{}`",
            T::TABLE,
            T::PRIMARY_KEY
        ))
    })
}

fn hydrate_indexed<T: Entity>(
    row: &Row<'_>,
    indices: &[(usize, &ColumnSpec)],
) -> RepoResult<T> {
    let mut entity = T::default();
    for (index, spec) in indices {
        let raw: Value = row.get(*index)?;
        let value = FieldValue::from_sql_value(raw, spec.kind).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "column `{}` of table `{}` does not match its declared kind",
                spec.name,
                T::TABLE
            ))
        })?;
        if value.is_null() {
            continue;
        }
        if !entity.set_field(spec.name, value) {
            return Err(RepoError::InvalidData(format!(
                "entity for table `{}` rejected value for column `{}`",
                T::TABLE,
                spec.name
            )));
        }
    }
    Ok(entity)
}
