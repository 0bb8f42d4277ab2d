//! Commands Layer
//!
//! Request handlers that bridge callers (CLI, IPC) to the repositories.
//! Handlers return `Result<T, String>` so any transport can forward them.

mod position_cmd;

pub use position_cmd::*;

use std::sync::Arc;

use crate::config::{AppConfig, NormalizationMode};
use crate::domain::{CardTodo, DomainError, DomainResult, KanbanCard, KanbanList, SubList};
use crate::rank::NormalizationQueue;
use crate::repository::{init_db, DbState, RankedEntity, RankedRepository};

/// Application state shared across commands
pub struct AppState {
    pub db_state: DbState,
    pub config: AppConfig,
    pub kanban_lists: RankedRepository<KanbanList>,
    pub kanban_cards: RankedRepository<KanbanCard>,
    pub sub_lists: RankedRepository<SubList>,
    pub card_todos: RankedRepository<CardTodo>,
    /// Present in deferred normalization mode
    pub queue: Option<Arc<NormalizationQueue>>,
}

impl AppState {
    /// Open the configured database and build every repository
    pub async fn open(config: AppConfig) -> DomainResult<Self> {
        let db_state = init_db(&config.db_path).await?;
        Ok(Self::with_db(db_state, config))
    }

    /// Must be called inside a tokio runtime when the config asks for
    /// deferred normalization.
    pub fn with_db(db_state: DbState, config: AppConfig) -> Self {
        let queue = match config.ranking.normalization {
            NormalizationMode::Deferred => Some(Arc::new(NormalizationQueue::spawn(Arc::new(
                db_state.rank_store(),
            )))),
            NormalizationMode::Inline => None,
        };

        Self {
            kanban_lists: repository(&db_state, &config, &queue),
            kanban_cards: repository(&db_state, &config, &queue),
            sub_lists: repository(&db_state, &config, &queue),
            card_todos: repository(&db_state, &config, &queue),
            db_state,
            config,
            queue,
        }
    }

    /// Drain the normalization queue, if any
    pub async fn shutdown(&self) -> DomainResult<()> {
        if let Some(queue) = &self.queue {
            queue.shutdown().await?;
        }
        Ok(())
    }
}

fn repository<D: RankedEntity>(
    db_state: &DbState,
    config: &AppConfig,
    queue: &Option<Arc<NormalizationQueue>>,
) -> RankedRepository<D> {
    let repo = RankedRepository::new(db_state, config.ranking.clone());
    match queue {
        Some(queue) => repo.with_queue(Arc::clone(queue)),
        None => repo,
    }
}

/// Caller-facing message for a domain error
pub fn error_message(e: DomainError) -> String {
    match e {
        DomainError::NormalizationFailure(detail) => {
            log::error!("normalization failed: {}", detail);
            "Could not complete the reorder, please try again".to_string()
        }
        DomainError::RankCollision(detail) => {
            log::warn!("rank collision surfaced to caller: {}", detail);
            "The list changed while this item was being placed, please retry".to_string()
        }
        DomainError::Internal(detail) => {
            log::error!("internal error: {}", detail);
            format!("Internal error: {}", detail)
        }
        other => other.to_string(),
    }
}
