//! List-Rank Backend
//!
//! Keeps items of ordered lists (kanban lists, cards, sub-lists, todos) in a
//! stable user-defined order using fractional ranks, so a reorder rewrites a
//! single row. When repeated inserts squeeze two neighbors too close
//! together, the whole list is re-spaced in one transaction.
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - rank: Rank allocation, gap forecasting and normalization
//! - repository: Data access abstractions and implementations
//! - commands: Request handlers
//! - config: Application configuration

pub mod commands;
pub mod config;
pub mod domain;
pub mod rank;
pub mod repository;

pub use commands::{error_message, AppState};
pub use config::{AppConfig, NormalizationMode, RankingConfig};
pub use domain::{DomainError, DomainResult, Normalization, PositionUpdate, Ranked};
pub use rank::{gap_acceptable, get_insert_rank, normalize_list_order, UPPER_BOUND};
pub use repository::{PositionedRepository, RankedRepository, Repository};
