//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.

use async_trait::async_trait;

use crate::domain::{DomainResult, Entity, ItemFilter, PositionUpdate, Ranked};

use super::contract::RankedEntity;

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async to support various backends.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// List all entities
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete entity by ID
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}

/// Ordering operations for ranked items
#[async_trait]
pub trait PositionedRepository<D: RankedEntity>: Repository<Ranked<D>> {
    /// Insert a new item between two neighbor ranks
    async fn create_at(
        &self,
        scope_id: i64,
        data: D,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<PositionUpdate<D>>;

    /// Merge `changes` into an item and move it between two neighbor ranks
    async fn update_with_position(
        &self,
        id: i64,
        changes: D::Changes,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> DomainResult<PositionUpdate<D>>;

    /// Items of one scope in rank order
    async fn list_scope(&self, scope_id: i64) -> DomainResult<Vec<Ranked<D>>>;

    /// Items matching a validated filter, ordered by scope then rank
    async fn list_filtered(&self, filter: &ItemFilter) -> DomainResult<Vec<Ranked<D>>>;

    /// Re-space every rank of one scope
    async fn normalize(&self, scope_id: i64) -> DomainResult<usize>;
}
