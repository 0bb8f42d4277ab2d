//! List Normalization
//!
//! Rewrites every rank in a scope to an evenly spaced sequence, restoring
//! headroom before, after and between all items.

use crate::domain::{DomainError, DomainResult};
use crate::repository::{RankStore, RankWrite, ScopeRef, StoreError};

use super::allocator::UPPER_BOUND;

/// How many times a rewrite rejected as stale is recomputed from a fresh read
const STALE_RETRIES: u32 = 1;

/// `n` distinct ranks spread evenly across `(0, UPPER_BOUND)`
pub fn evenly_spaced(n: usize) -> Vec<f64> {
    let slots = (n + 1) as f64;
    (0..n)
        .map(|i| UPPER_BOUND * (i + 1) as f64 / slots)
        .collect()
}

/// Normalize one scope identified by table, rank column, scope column and id.
///
/// Returns the number of rows rewritten (0 for an empty scope).
pub async fn normalize_list_order<S: RankStore + ?Sized>(
    store: &S,
    table: &str,
    rank_column: &str,
    scope_column: &str,
    scope_id: i64,
) -> DomainResult<usize> {
    let scope = ScopeRef::new(table, rank_column, scope_column, scope_id)?;
    normalize_scope(store, &scope).await
}

/// Normalize a scope. The rewrite is all-or-nothing; on any failure the
/// scope keeps its previous ranks and `NormalizationFailure` is returned.
pub async fn normalize_scope<S: RankStore + ?Sized>(
    store: &S,
    scope: &ScopeRef,
) -> DomainResult<usize> {
    let mut attempt = 0;
    loop {
        let rows = store
            .read_ordered(scope)
            .await
            .map_err(|e| DomainError::NormalizationFailure(e.to_string()))?;

        if rows.is_empty() {
            log::debug!("normalize {}: empty scope", scope);
            return Ok(0);
        }

        let writes: Vec<RankWrite> = rows
            .iter()
            .zip(evenly_spaced(rows.len()))
            .map(|(row, value)| RankWrite {
                id: row.id,
                expected: row.rank,
                value,
            })
            .collect();

        match store.write_ranks_atomic(scope, &writes).await {
            Ok(()) => {
                log::info!("normalized {} ({} rows)", scope, writes.len());
                return Ok(writes.len());
            }
            Err(StoreError::Stale(reason)) if attempt < STALE_RETRIES => {
                attempt += 1;
                log::warn!("normalize {} raced a writer ({}), rereading", scope, reason);
            }
            Err(e) => {
                log::error!("normalize {} failed: {}", scope, e);
                return Err(DomainError::NormalizationFailure(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{RankedRow, SqlIdent};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_evenly_spaced_three() {
        assert_eq!(evenly_spaced(3), vec![25_000_000.0, 50_000_000.0, 75_000_000.0]);
        assert!(evenly_spaced(0).is_empty());
        assert_eq!(evenly_spaced(1), vec![50_000_000.0]);
    }

    #[test]
    fn test_evenly_spaced_constant_step() {
        let ranks = evenly_spaced(1000);
        let step = UPPER_BOUND / 1001.0;
        for pair in ranks.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!((pair[1] - pair[0] - step).abs() < 1e-6);
        }
        assert!(ranks[0] > 0.0 && ranks[999] < UPPER_BOUND);
    }

    /// In-memory store whose first `stale_writes` atomic writes are rejected
    struct FlakyStore {
        rows: Mutex<Vec<RankedRow>>,
        stale_writes: Mutex<u32>,
    }

    impl FlakyStore {
        fn new(ranks: &[f64], stale_writes: u32) -> Self {
            let rows = ranks
                .iter()
                .enumerate()
                .map(|(i, rank)| RankedRow { id: i as i64 + 1, rank: *rank })
                .collect();
            Self {
                rows: Mutex::new(rows),
                stale_writes: Mutex::new(stale_writes),
            }
        }

        fn ranks(&self) -> Vec<f64> {
            self.rows.lock().unwrap().iter().map(|r| r.rank).collect()
        }
    }

    #[async_trait]
    impl RankStore for FlakyStore {
        async fn read_ordered(&self, _scope: &ScopeRef) -> Result<Vec<RankedRow>, StoreError> {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by(|a, b| a.rank.total_cmp(&b.rank).then(a.id.cmp(&b.id)));
            Ok(rows)
        }

        async fn write_rank(
            &self,
            _table: &SqlIdent,
            _id: i64,
            _column: &SqlIdent,
            _value: f64,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn write_ranks_atomic(
            &self,
            _scope: &ScopeRef,
            writes: &[RankWrite],
        ) -> Result<(), StoreError> {
            let mut stale = self.stale_writes.lock().unwrap();
            if *stale > 0 {
                *stale -= 1;
                return Err(StoreError::Stale("concurrent insert".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            for write in writes {
                if let Some(row) = rows.iter_mut().find(|r| r.id == write.id) {
                    row.rank = write.value;
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_retries_once_after_stale_write() {
        let store = FlakyStore::new(&[10.0, 10.5, 11.0], 1);
        let rewritten = normalize_list_order(&store, "cards", "rank", "list_id", 1)
            .await
            .unwrap();

        assert_eq!(rewritten, 3);
        assert_eq!(store.ranks(), vec![25_000_000.0, 50_000_000.0, 75_000_000.0]);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_stale_write() {
        let store = FlakyStore::new(&[10.0, 10.5, 11.0], 2);
        let err = normalize_list_order(&store, "cards", "rank", "list_id", 1)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NormalizationFailure(_)));
        assert_eq!(store.ranks(), vec![10.0, 10.5, 11.0]);
    }

    #[tokio::test]
    async fn test_rejects_unsafe_identifiers() {
        let store = FlakyStore::new(&[], 0);
        let err = normalize_list_order(&store, "cards", "rank); --", "list_id", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
