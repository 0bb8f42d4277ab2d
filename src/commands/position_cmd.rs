//! Commands for Ranked Item CRUD + Positioning
//!
//! Every ranked entity type goes through the same handlers; the caller picks
//! the repository.

use serde::Deserialize;

use crate::domain::{ItemFilter, PositionUpdate, Ranked};
use crate::repository::{PositionedRepository, RankedEntity, RankedRepository, Repository};

use super::error_message;

/// Reposition request as forwarded by a client: `{id, data, prev_rank, next_rank}`
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest<C> {
    pub id: i64,
    #[serde(default)]
    pub data: C,
    pub prev_rank: Option<f64>,
    pub next_rank: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest<D> {
    pub scope_id: i64,
    pub data: D,
    pub prev_rank: Option<f64>,
    pub next_rank: Option<f64>,
}

/// Create an item between two neighbors (both absent = empty scope)
pub async fn create_item<D: RankedEntity>(
    repo: &RankedRepository<D>,
    request: CreateRequest<D>,
) -> Result<PositionUpdate<D>, String> {
    repo.create_at(request.scope_id, request.data, request.prev_rank, request.next_rank)
        .await
        .map_err(error_message)
}

/// Move item between two neighbors, merging any field changes
pub async fn move_item<D: RankedEntity>(
    repo: &RankedRepository<D>,
    request: MoveRequest<D::Changes>,
) -> Result<PositionUpdate<D>, String> {
    repo.update_with_position(request.id, request.data, request.prev_rank, request.next_rank)
        .await
        .map_err(error_message)
}

/// Get item by ID
pub async fn get_item<D: RankedEntity>(
    repo: &RankedRepository<D>,
    id: i64,
) -> Result<Option<Ranked<D>>, String> {
    repo.find_by_id(id).await.map_err(error_message)
}

/// List items matching a filter
pub async fn list_items<D: RankedEntity>(
    repo: &RankedRepository<D>,
    filter: ItemFilter,
) -> Result<Vec<Ranked<D>>, String> {
    repo.list_filtered(&filter).await.map_err(error_message)
}

pub async fn delete_item<D: RankedEntity>(repo: &RankedRepository<D>, id: i64) -> Result<(), String> {
    repo.delete(id).await.map_err(error_message)
}

/// Re-space a scope on demand, returns the number of rows rewritten
pub async fn normalize_items<D: RankedEntity>(
    repo: &RankedRepository<D>,
    scope_id: i64,
) -> Result<usize, String> {
    repo.normalize(scope_id).await.map_err(error_message)
}
