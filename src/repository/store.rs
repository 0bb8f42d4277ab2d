//! Rank Store
//!
//! Parameterized table/column access used by the normalizer and the ranked
//! repositories. Table and column names are validated identifiers; values
//! always travel as bound parameters.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::DomainError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern compiles"));

/// Store-level failures, kept distinct so callers can tell a lost race apart
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("parent row missing: {0}")]
    MissingParent(String),
    #[error("row not found: {0}")]
    NotFound(String),
    #[error("scope changed while it was being rewritten: {0}")]
    Stale(String),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("database error: {0}")]
    Sqlite(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &e {
            let detail = message.clone().unwrap_or_else(|| e.to_string());
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => return StoreError::UniqueViolation(detail),
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::MissingParent(detail),
                _ => {}
            }
        }
        StoreError::Sqlite(e.to_string())
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(msg) => DomainError::RankCollision(msg),
            StoreError::MissingParent(msg) => DomainError::NotFound(format!("scope: {}", msg)),
            StoreError::NotFound(msg) => DomainError::NotFound(msg),
            StoreError::Stale(msg) => DomainError::NormalizationFailure(msg),
            StoreError::InvalidIdentifier(name) => {
                DomainError::InvalidInput(format!("invalid identifier {:?}", name))
            }
            StoreError::Sqlite(msg) => DomainError::Internal(msg),
        }
    }
}

/// A table or column name that is safe to splice into SQL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlIdent(String);

impl SqlIdent {
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        if IDENTIFIER.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(StoreError::InvalidIdentifier(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ordered list: the rows of `table` whose `scope_column` equals `scope_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeRef {
    pub table: SqlIdent,
    pub rank_column: SqlIdent,
    pub scope_column: SqlIdent,
    /// Secondary sort key for rows that somehow share a rank
    pub tiebreak_column: SqlIdent,
    pub scope_id: i64,
}

impl ScopeRef {
    pub fn new(
        table: &str,
        rank_column: &str,
        scope_column: &str,
        scope_id: i64,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            table: SqlIdent::parse(table)?,
            rank_column: SqlIdent::parse(rank_column)?,
            scope_column: SqlIdent::parse(scope_column)?,
            tiebreak_column: SqlIdent::parse("id")?,
            scope_id,
        })
    }

    pub fn with_tiebreak(mut self, column: &str) -> Result<Self, StoreError> {
        self.tiebreak_column = SqlIdent::parse(column)?;
        Ok(self)
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}={}", self.table, self.scope_column, self.scope_id)
    }
}

/// An item's id and current rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRow {
    pub id: i64,
    pub rank: f64,
}

/// One row of an atomic rank rewrite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankWrite {
    pub id: i64,
    /// Rank observed when the scope was read; the write fails if it moved
    pub expected: f64,
    pub value: f64,
}

/// Store-query capability consumed by the normalizer and repositories
#[async_trait]
pub trait RankStore: Send + Sync {
    /// All rows of the scope, ascending by rank, then tiebreak, then id
    async fn read_ordered(&self, scope: &ScopeRef) -> Result<Vec<RankedRow>, StoreError>;

    /// Set a single row's rank column
    async fn write_rank(
        &self,
        table: &SqlIdent,
        id: i64,
        column: &SqlIdent,
        value: f64,
    ) -> Result<(), StoreError>;

    /// Rewrite every listed row of the scope in one transaction.
    ///
    /// Fails with `Stale` if any row's rank differs from `expected` or the
    /// scope's row count differs from `writes.len()`. Nothing is applied on
    /// failure.
    async fn write_ranks_atomic(
        &self,
        scope: &ScopeRef,
        writes: &[RankWrite],
    ) -> Result<(), StoreError>;
}

/// SQLite implementation over the shared connection
#[derive(Clone)]
pub struct SqliteRankStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRankStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RankStore for SqliteRankStore {
    async fn read_ordered(&self, scope: &ScopeRef) -> Result<Vec<RankedRow>, StoreError> {
        let conn = self.conn.lock().await;
        read_ordered_in(&conn, scope)
    }

    async fn write_rank(
        &self,
        table: &SqlIdent,
        id: i64,
        column: &SqlIdent,
        value: f64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            &format!("UPDATE {} SET {} = ?1 WHERE id = ?2", table, column),
            params![value, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }

    async fn write_ranks_atomic(
        &self,
        scope: &ScopeRef,
        writes: &[RankWrite],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        write_ranks_atomic_in(&mut conn, scope, writes)
    }
}

pub(crate) fn read_ordered_in(
    conn: &Connection,
    scope: &ScopeRef,
) -> Result<Vec<RankedRow>, StoreError> {
    let sql = format!(
        "SELECT id, {rank} FROM {table} WHERE {scope} = ?1 ORDER BY {rank} ASC, {tiebreak} ASC, id ASC",
        rank = scope.rank_column,
        table = scope.table,
        scope = scope.scope_column,
        tiebreak = scope.tiebreak_column,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![scope.scope_id], |row| {
        Ok(RankedRow {
            id: row.get(0)?,
            rank: row.get(1)?,
        })
    })?;

    let mut ordered = Vec::new();
    for row in rows {
        ordered.push(row?);
    }
    Ok(ordered)
}

fn write_ranks_atomic_in(
    conn: &mut Connection,
    scope: &ScopeRef,
    writes: &[RankWrite],
) -> Result<(), StoreError> {
    let tx = conn.transaction()?;
    {
        // Stage every row to a distinct negative placeholder first so the
        // final values never collide with not-yet-rewritten ranks.
        let mut stage = tx.prepare(&format!(
            "UPDATE {table} SET {rank} = ?1 WHERE id = ?2 AND {scope} = ?3 AND {rank} = ?4",
            table = scope.table,
            rank = scope.rank_column,
            scope = scope.scope_column,
        ))?;
        for (index, write) in writes.iter().enumerate() {
            let placeholder = -((index + 1) as f64);
            let changed = stage.execute(params![placeholder, write.id, scope.scope_id, write.expected])?;
            if changed != 1 {
                return Err(StoreError::Stale(format!(
                    "{} row {} no longer holds rank {}",
                    scope, write.id, write.expected
                )));
            }
        }

        let mut apply = tx.prepare(&format!(
            "UPDATE {} SET {} = ?1 WHERE id = ?2",
            scope.table, scope.rank_column
        ))?;
        for write in writes {
            apply.execute(params![write.value, write.id])?;
        }

        let count: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", scope.table, scope.scope_column),
            params![scope.scope_id],
            |row| row.get(0),
        )?;
        if count != writes.len() as i64 {
            return Err(StoreError::Stale(format!(
                "{} holds {} rows, expected {}",
                scope,
                count,
                writes.len()
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(SqlIdent::parse("kanban_cards").is_ok());
        assert!(SqlIdent::parse("_rank2").is_ok());
        assert!(SqlIdent::parse("2fast").is_err());
        assert!(SqlIdent::parse("cards; DROP TABLE cards").is_err());
        assert!(SqlIdent::parse("").is_err());
        assert!(SqlIdent::parse(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_scope_ref_rejects_bad_column() {
        let err = ScopeRef::new("cards", "rank", "list id", 1).unwrap_err();
        assert_eq!(err, StoreError::InvalidIdentifier("list id".to_string()));
    }

    #[test]
    fn test_store_error_maps_to_domain() {
        assert!(matches!(
            DomainError::from(StoreError::UniqueViolation("x".into())),
            DomainError::RankCollision(_)
        ));
        assert!(matches!(
            DomainError::from(StoreError::MissingParent("x".into())),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            DomainError::from(StoreError::Stale("x".into())),
            DomainError::NormalizationFailure(_)
        ));
    }

    fn scratch_store() -> SqliteRankStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE rows (
                id INTEGER PRIMARY KEY,
                scope INTEGER NOT NULL,
                rank REAL NOT NULL,
                UNIQUE(scope, rank)
            );
            INSERT INTO rows (id, scope, rank) VALUES (1, 1, 10.0), (2, 1, 20.0), (3, 1, 30.0), (4, 2, 10.0);",
        )
        .unwrap();
        SqliteRankStore::new(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_read_ordered_is_scoped() {
        let store = scratch_store();
        let scope = ScopeRef::new("rows", "rank", "scope", 1).unwrap();

        let rows = store.read_ordered(&scope).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_write_rank_signals_unique_violation() {
        let store = scratch_store();
        let table = SqlIdent::parse("rows").unwrap();
        let column = SqlIdent::parse("rank").unwrap();

        store.write_rank(&table, 1, &column, 15.0).await.unwrap();
        let err = store.write_rank(&table, 3, &column, 15.0).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let missing = store.write_rank(&table, 99, &column, 1.0).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_atomic_write_swaps_without_collision() {
        let store = scratch_store();
        let scope = ScopeRef::new("rows", "rank", "scope", 1).unwrap();

        // reverse the order: each target value is currently held by another row
        let writes = [
            RankWrite { id: 1, expected: 10.0, value: 30.0 },
            RankWrite { id: 2, expected: 20.0, value: 20.0 },
            RankWrite { id: 3, expected: 30.0, value: 10.0 },
        ];
        store.write_ranks_atomic(&scope, &writes).await.unwrap();

        let ids: Vec<i64> = store.read_ordered(&scope).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_atomic_write_rejects_stale_rank() {
        let store = scratch_store();
        let scope = ScopeRef::new("rows", "rank", "scope", 1).unwrap();

        let writes = [
            RankWrite { id: 1, expected: 10.0, value: 100.0 },
            RankWrite { id: 2, expected: 21.0, value: 200.0 },
            RankWrite { id: 3, expected: 30.0, value: 300.0 },
        ];
        let err = store.write_ranks_atomic(&scope, &writes).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        let ranks: Vec<f64> = store.read_ordered(&scope).await.unwrap().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![10.0, 20.0, 30.0]);
    }

    #[tokio::test]
    async fn test_atomic_write_rejects_missing_rows() {
        let store = scratch_store();
        let scope = ScopeRef::new("rows", "rank", "scope", 1).unwrap();

        // row 3 exists in the scope but was not part of the snapshot
        let writes = [
            RankWrite { id: 1, expected: 10.0, value: 100.0 },
            RankWrite { id: 2, expected: 20.0, value: 200.0 },
        ];
        let err = store.write_ranks_atomic(&scope, &writes).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale(_)));

        let ranks: Vec<f64> = store.read_ordered(&scope).await.unwrap().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![10.0, 20.0, 30.0]);
    }
}
