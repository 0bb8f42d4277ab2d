//! Ranking Layer
//!
//! Rank allocation, gap forecasting and scope normalization.

mod allocator;
mod normalizer;
mod queue;

pub use allocator::{
    gap_acceptable, gap_acceptable_with, get_insert_rank, RankError, DEFAULT_RANK, MIN_GAP,
    UPPER_BOUND,
};
pub use normalizer::{evenly_spaced, normalize_list_order, normalize_scope};
pub use queue::NormalizationQueue;
