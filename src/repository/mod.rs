//! Repository Layer
//!
//! Data access abstractions and implementations.

mod contract;
mod db;
mod ranked_repo;
mod store;
mod traits;


pub use contract::RankedEntity;
pub use db::{init_db, init_in_memory, DbState};
pub use ranked_repo::RankedRepository;
pub use store::{RankStore, RankWrite, RankedRow, ScopeRef, SqlIdent, SqliteRankStore, StoreError};
pub use traits::{PositionedRepository, Repository};
