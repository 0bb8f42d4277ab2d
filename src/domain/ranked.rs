//! Ranked Record
//!
//! Every ordered list item (kanban list, card, sub-list, todo) shares the same
//! positional envelope; the entity-specific payload rides in `data`.

use serde::{Deserialize, Serialize};

use super::entity::Entity;

/// A list item positioned among its siblings by a fractional rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranked<D> {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// Parent container; ordering only holds among items with the same scope
    pub scope_id: i64,
    /// Sort key, unique within the scope and inside `(0, UPPER_BOUND)`
    pub rank: f64,
    /// Unix millis
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(flatten)]
    pub data: D,
}

impl<D: Clone + Send + Sync> Entity for Ranked<D> {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// What happened to the scope while an item was positioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Enough headroom remained, no other row was touched
    NotNeeded,
    /// The whole scope was re-spaced before returning
    Applied,
    /// Re-spacing was handed to the background queue
    Scheduled,
}

impl Normalization {
    pub fn occurred(&self) -> bool {
        matches!(self, Normalization::Applied)
    }
}

/// Result of a create or reposition request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate<D> {
    /// The item as re-read after all writes
    pub item: Ranked<D>,
    pub normalization: Normalization,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        title: String,
    }

    #[test]
    fn test_ranked_serializes_flat() {
        let item = Ranked {
            id: 7,
            scope_id: 3,
            rank: 15.0,
            created_at: 1,
            updated_at: 2,
            data: Payload { title: "Groceries".to_string() },
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["title"], "Groceries");
        assert_eq!(json["rank"], 15.0);
        assert_eq!(item.id(), 7);
    }

    #[test]
    fn test_normalization_flag() {
        assert!(Normalization::Applied.occurred());
        assert!(!Normalization::Scheduled.occurred());
        assert_eq!(
            serde_json::to_string(&Normalization::NotNeeded).unwrap(),
            "\"not_needed\""
        );
    }
}
