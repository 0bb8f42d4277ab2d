//! Ranked Repository
//!
//! One SQLite-backed repository for every ranked entity type. Table, scope
//! column and entity columns come from the `RankedEntity` contract; the
//! positioning logic is shared:
//! - rank allocation from the caller's neighbor ranks
//! - one automatic retry when a concurrent writer took the same rank
//! - normalization before allocation when no distinct rank is left
//! - normalization (inline or queued) after the write when the gap forecast fails

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{NormalizationMode, RankingConfig};
use crate::domain::{
    DomainError, DomainResult, ItemFilter, Normalization, PositionUpdate, Ranked,
};
use crate::rank::{
    gap_acceptable_with, get_insert_rank, normalize_scope, NormalizationQueue, RankError,
};

use super::contract::RankedEntity;
use super::db::DbState;
use super::store::{RankStore, RankedRow, ScopeRef, SqliteRankStore, StoreError};
use super::traits::{PositionedRepository, Repository};

/// id, scope, rank, created_at, updated_at
const BASE_COLUMNS: usize = 5;

/// SQLite repository for one ranked entity type
pub struct RankedRepository<D> {
    conn: Arc<Mutex<Connection>>,
    store: Arc<SqliteRankStore>,
    config: RankingConfig,
    queue: Option<Arc<NormalizationQueue>>,
    _entity: PhantomData<fn() -> D>,
}

/// Row a positioned write goes to
enum Target<'a, D> {
    Insert { scope_id: i64, data: &'a D },
    Update { item: &'a Ranked<D> },
}

/// Rank chosen for a write and the neighbors it was computed from
#[derive(Debug, Clone, Copy)]
struct Placement {
    rank: f64,
    prev: Option<f64>,
    next: Option<f64>,
    /// The scope was normalized to make room for this rank
    normalized: bool,
}

impl<D: RankedEntity> RankedRepository<D> {
    pub fn new(db: &DbState, config: RankingConfig) -> Self {
        Self {
            conn: db.connection(),
            store: Arc::new(db.rank_store()),
            config,
            queue: None,
            _entity: PhantomData,
        }
    }

    /// Hand failed gap forecasts to a background queue (deferred mode)
    pub fn with_queue(mut self, queue: Arc<NormalizationQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Scope reference for this entity's table
    pub fn scope(&self, scope_id: i64) -> DomainResult<ScopeRef> {
        let scope = ScopeRef::new(D::TABLE, D::RANK_COLUMN, D::SCOPE_COLUMN, scope_id)?
            .with_tiebreak(D::TIEBREAK_COLUMN)?;
        Ok(scope)
    }

    async fn siblings(&self, scope: &ScopeRef, exclude: Option<i64>) -> DomainResult<Vec<RankedRow>> {
        let rows = self.store.read_ordered(scope).await?;
        Ok(rows.into_iter().filter(|r| Some(r.id) != exclude).collect())
    }

    /// First sibling rank strictly above `prev`, read fresh from the store
    async fn next_after(
        &self,
        scope: &ScopeRef,
        exclude: Option<i64>,
        prev: Option<f64>,
    ) -> DomainResult<Option<f64>> {
        let siblings = self.siblings(scope, exclude).await?;
        Ok(siblings
            .iter()
            .map(|r| r.rank)
            .find(|rank| prev.map_or(true, |p| *rank > p)))
    }

    async fn allocate(
        &self,
        scope: &ScopeRef,
        exclude: Option<i64>,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<Placement> {
        match get_insert_rank(prev, next) {
            Ok(rank) => Ok(Placement {
                rank,
                prev,
                next,
                normalized: false,
            }),
            Err(RankError::Exhausted { .. }) => {
                log::warn!(
                    "no distinct rank between {:?} and {:?} in {}, normalizing first",
                    prev,
                    next,
                    scope
                );
                // Remember the slot by position; the rank values are about to change.
                let before = self.siblings(scope, exclude).await?;
                let slot = match prev {
                    Some(p) => before.iter().filter(|r| r.rank <= p).count(),
                    None => 0,
                };

                normalize_scope(self.store.as_ref(), scope).await?;

                let after = self.siblings(scope, exclude).await?;
                let prev = slot.checked_sub(1).and_then(|i| after.get(i)).map(|r| r.rank);
                let next = after.get(slot).map(|r| r.rank);
                let rank = get_insert_rank(prev, next)?;
                Ok(Placement {
                    rank,
                    prev,
                    next,
                    normalized: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, target: &Target<'_, D>, rank: f64) -> DomainResult<i64> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().await;
        match target {
            Target::Insert { scope_id, data } => {
                Ok(insert_row(&conn, *scope_id, *data, rank, now)?)
            }
            Target::Update { item } => {
                update_row(&conn, item.id, &item.data, Some(rank), now)?;
                Ok(item.id)
            }
        }
    }

    /// Run the gap forecast for a completed write
    async fn settle(&self, scope: &ScopeRef, placement: &Placement) -> DomainResult<Normalization> {
        if gap_acceptable_with(placement.prev, placement.next, self.config.min_gap) {
            return Ok(if placement.normalized {
                Normalization::Applied
            } else {
                Normalization::NotNeeded
            });
        }

        if self.config.normalization == NormalizationMode::Deferred {
            if let Some(queue) = &self.queue {
                queue.enqueue(scope.clone()).await?;
                return Ok(Normalization::Scheduled);
            }
            log::warn!("deferred normalization configured without a queue, normalizing {} inline", scope);
        }

        normalize_scope(self.store.as_ref(), scope).await?;
        Ok(Normalization::Applied)
    }

    async fn position(
        &self,
        scope: &ScopeRef,
        target: Target<'_, D>,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<PositionUpdate<D>> {
        let exclude = match &target {
            Target::Update { item } => Some(item.id),
            Target::Insert { .. } => None,
        };

        let mut placement = self.allocate(scope, exclude, prev, next).await?;
        let mut retries = 0;
        let id = loop {
            match self.write(&target, placement.rank).await {
                Ok(id) => break id,
                Err(DomainError::RankCollision(reason)) if retries < self.config.collision_retries => {
                    retries += 1;
                    log::warn!(
                        "rank {} already taken in {} ({}), retrying with fresh neighbors",
                        placement.rank,
                        scope,
                        reason
                    );
                    let next = self.next_after(scope, exclude, placement.prev).await?;
                    placement = self.allocate(scope, exclude, placement.prev, next).await?;
                }
                Err(e) => return Err(e),
            }
        };

        let normalization = self.settle(scope, &placement).await?;
        let item = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("{} {}", D::TABLE, id)))?;

        log::debug!("{} {} placed at {} ({:?})", D::TABLE, id, item.rank, normalization);
        Ok(PositionUpdate { item, normalization })
    }
}

#[async_trait]
impl<D: RankedEntity> Repository<Ranked<D>> for RankedRepository<D> {
    /// Appends after the current last item of the entity's scope
    async fn create(&self, entity: &Ranked<D>) -> DomainResult<Ranked<D>> {
        let scope = self.scope(entity.scope_id)?;
        let last = self.siblings(&scope, None).await?.last().map(|r| r.rank);
        let created = self
            .create_at(entity.scope_id, entity.data.clone(), last, None)
            .await?;
        Ok(created.item)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<Ranked<D>>> {
        let conn = self.conn.lock().await;
        let items = query_rows::<D>(
            &conn,
            &format!("{} WHERE id = ?", select_sql::<D>()),
            vec![Value::Integer(id)],
        )?;
        Ok(items.into_iter().next())
    }

    async fn list(&self) -> DomainResult<Vec<Ranked<D>>> {
        self.list_filtered(&ItemFilter::default()).await
    }

    /// Updates entity columns only; the rank is left alone
    async fn update(&self, entity: &Ranked<D>) -> DomainResult<Ranked<D>> {
        entity.data.validate()?;
        {
            let conn = self.conn.lock().await;
            let now = chrono::Utc::now().timestamp_millis();
            update_row(&conn, entity.id, &entity.data, None, now)?;
        }
        self.find_by_id(entity.id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("{} {}", D::TABLE, entity.id)))
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1", D::TABLE), params![id])
            .map_err(StoreError::from)?;
        if changed == 0 {
            return Err(DomainError::NotFound(format!("{} {}", D::TABLE, id)));
        }
        Ok(())
    }
}

#[async_trait]
impl<D: RankedEntity> PositionedRepository<D> for RankedRepository<D> {
    async fn create_at(
        &self,
        scope_id: i64,
        data: D,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<PositionUpdate<D>> {
        data.validate()?;
        let scope = self.scope(scope_id)?;
        let created = self
            .position(&scope, Target::Insert { scope_id, data: &data }, prev, next)
            .await?;
        log::info!("created {} {} in {}", D::TABLE, created.item.id, scope);
        Ok(created)
    }

    async fn update_with_position(
        &self,
        id: i64,
        changes: D::Changes,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<PositionUpdate<D>> {
        let mut item = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("{} {}", D::TABLE, id)))?;

        item.data.apply(changes);
        item.data.validate()?;

        let scope = self.scope(item.scope_id)?;
        let moved = self
            .position(&scope, Target::Update { item: &item }, prev, next)
            .await?;
        log::info!(
            "moved {} {} to {} between {:?} and {:?}",
            D::TABLE,
            id,
            moved.item.rank,
            prev,
            next
        );
        Ok(moved)
    }

    async fn list_scope(&self, scope_id: i64) -> DomainResult<Vec<Ranked<D>>> {
        self.list_filtered(&ItemFilter::for_scope(scope_id)).await
    }

    async fn list_filtered(&self, filter: &ItemFilter) -> DomainResult<Vec<Ranked<D>>> {
        filter.validate()?;
        let (sql, values) = filter_sql::<D>(filter);
        let conn = self.conn.lock().await;
        Ok(query_rows::<D>(&conn, &sql, values)?)
    }

    async fn normalize(&self, scope_id: i64) -> DomainResult<usize> {
        let scope = self.scope(scope_id)?;
        normalize_scope(self.store.as_ref(), &scope).await
    }
}

fn select_sql<D: RankedEntity>() -> String {
    let mut columns = vec!["id", D::SCOPE_COLUMN, D::RANK_COLUMN, "created_at", "updated_at"];
    columns.extend_from_slice(D::COLUMNS);
    format!("SELECT {} FROM {}", columns.join(", "), D::TABLE)
}

fn filter_sql<D: RankedEntity>(filter: &ItemFilter) -> (String, Vec<Value>) {
    let mut sql = select_sql::<D>();
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if !filter.ids.is_empty() {
        clauses.push(format!("id IN ({})", vec!["?"; filter.ids.len()].join(", ")));
        values.extend(filter.ids.iter().map(|id| Value::Integer(*id)));
    }
    if let Some(scope_id) = filter.scope_id {
        clauses.push(format!("{} = ?", D::SCOPE_COLUMN));
        values.push(Value::Integer(scope_id));
    }
    if let Some(after) = filter.created_after {
        clauses.push("created_at >= ?".to_string());
        values.push(Value::Integer(after.timestamp_millis()));
    }
    if let Some(before) = filter.created_before {
        clauses.push("created_at <= ?".to_string());
        values.push(Value::Integer(before.timestamp_millis()));
    }
    if let Some(pattern) = filter.title_pattern() {
        clauses.push(format!("{} LIKE ? ESCAPE '\\'", D::TITLE_COLUMN));
        values.push(Value::Text(pattern));
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {}, {}, id", D::SCOPE_COLUMN, D::RANK_COLUMN));
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(i64::from(limit)));
    }

    (sql, values)
}

fn row_to_ranked<D: RankedEntity>(row: &Row<'_>) -> rusqlite::Result<Ranked<D>> {
    Ok(Ranked {
        id: row.get(0)?,
        scope_id: row.get(1)?,
        rank: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        data: D::from_row(row, BASE_COLUMNS)?,
    })
}

fn query_rows<D: RankedEntity>(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> Result<Vec<Ranked<D>>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| row_to_ranked::<D>(row))?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn insert_row<D: RankedEntity>(
    conn: &Connection,
    scope_id: i64,
    data: &D,
    rank: f64,
    now: i64,
) -> Result<i64, StoreError> {
    let mut columns = vec![D::SCOPE_COLUMN, D::RANK_COLUMN, "created_at", "updated_at"];
    columns.extend_from_slice(D::COLUMNS);

    let mut values = vec![
        Value::Integer(scope_id),
        Value::Real(rank),
        Value::Integer(now),
        Value::Integer(now),
    ];
    values.extend(data.to_values());

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES ({})",
            D::TABLE,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        ),
        params_from_iter(values),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write entity columns, and the rank when given
fn update_row<D: RankedEntity>(
    conn: &Connection,
    id: i64,
    data: &D,
    rank: Option<f64>,
    now: i64,
) -> Result<(), StoreError> {
    let mut assignments = vec!["updated_at = ?".to_string()];
    let mut values = vec![Value::Integer(now)];

    if let Some(rank) = rank {
        assignments.push(format!("{} = ?", D::RANK_COLUMN));
        values.push(Value::Real(rank));
    }
    assignments.extend(D::COLUMNS.iter().map(|column| format!("{} = ?", column)));
    values.extend(data.to_values());
    values.push(Value::Integer(id));

    let changed = conn.execute(
        &format!("UPDATE {} SET {} WHERE id = ?", D::TABLE, assignments.join(", ")),
        params_from_iter(values),
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("{} {}", D::TABLE, id)));
    }
    Ok(())
}
