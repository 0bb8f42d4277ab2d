//! Deferred Normalization
//!
//! Scopes whose gap forecast failed are handed to a background task instead
//! of being normalized inside the request. The worker runs the same
//! all-or-nothing `normalize_scope`, so the atomicity guarantees are
//! unchanged; only the timing moves.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::domain::{DomainError, DomainResult};
use crate::repository::{RankStore, ScopeRef};

use super::normalizer::normalize_scope;

/// Handle to the background normalization worker
pub struct NormalizationQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<ScopeRef>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<StdMutex<HashSet<ScopeRef>>>,
}

impl NormalizationQueue {
    /// Start the worker on the current tokio runtime
    pub fn spawn(store: Arc<dyn RankStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ScopeRef>();
        let pending: Arc<StdMutex<HashSet<ScopeRef>>> = Arc::new(StdMutex::new(HashSet::new()));
        let worker_pending = Arc::clone(&pending);

        let worker = tokio::spawn(async move {
            while let Some(scope) = rx.recv().await {
                if let Ok(mut pending) = worker_pending.lock() {
                    pending.remove(&scope);
                }
                match normalize_scope(store.as_ref(), &scope).await {
                    Ok(rows) => log::info!("deferred normalization of {} done ({} rows)", scope, rows),
                    Err(e) => log::error!("deferred normalization of {} failed: {}", scope, e),
                }
            }
            log::debug!("normalization worker stopped");
        });

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            pending,
        }
    }

    /// Queue a scope. Returns false when the scope is already waiting.
    pub async fn enqueue(&self, scope: ScopeRef) -> DomainResult<bool> {
        let guard = self.tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| DomainError::Internal("normalization queue is shut down".into()))?;

        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| DomainError::Internal("normalization queue state poisoned".into()))?;
            if !pending.insert(scope.clone()) {
                log::debug!("{} already queued for normalization", scope);
                return Ok(false);
            }
        }

        log::info!("queued {} for normalization", scope);
        tx.send(scope)
            .map_err(|e| DomainError::Internal(format!("normalization worker gone: {}", e)))?;
        Ok(true)
    }

    /// Number of scopes queued but not yet picked up
    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Close the queue and wait for already queued scopes to finish
    pub async fn shutdown(&self) -> DomainResult<()> {
        self.tx.lock().await.take();
        if let Some(worker) = self.worker.lock().await.take() {
            worker
                .await
                .map_err(|e| DomainError::Internal(format!("normalization worker panicked: {}", e)))?;
        }
        Ok(())
    }
}
