//! Kanban Entities
//!
//! Lists are ordered within a board, cards within a list.

use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult};

/// Longest title accepted for any ranked item
pub const MAX_TITLE_LEN: usize = 255;

/// Shared title rule for every ranked entity
pub fn validate_title(title: &str) -> DomainResult<()> {
    if title.trim().is_empty() {
        return Err(DomainError::InvalidInput("title must not be blank".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::InvalidInput(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

/// A column on a kanban board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KanbanList {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KanbanListChanges {
    pub title: Option<String>,
}

impl KanbanList {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)
    }

    pub fn apply(&mut self, changes: KanbanListChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
    }
}

/// A card inside a kanban list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KanbanCard {
    pub title: String,
    pub description: Option<String>,
    /// Due date as unix millis
    pub due_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KanbanCardChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<i64>,
}

impl KanbanCard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_at: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)?;
        if let Some(due_at) = self.due_at {
            if due_at < 0 {
                return Err(DomainError::InvalidInput("due date must not be before 1970".into()));
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, changes: KanbanCardChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if changes.description.is_some() {
            self.description = changes.description;
        }
        if changes.due_at.is_some() {
            self.due_at = changes.due_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_title_rejected() {
        assert!(KanbanList::new("   ").validate().is_err());
        assert!(KanbanList::new("Backlog").validate().is_ok());
    }

    #[test]
    fn test_long_title_rejected() {
        let card = KanbanCard::new("x".repeat(MAX_TITLE_LEN + 1));
        assert!(matches!(card.validate(), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_card_changes_merge() {
        let mut card = KanbanCard::new("Draft");
        card.description = Some("old".to_string());

        card.apply(KanbanCardChanges {
            title: Some("Final".to_string()),
            description: None,
            due_at: Some(1_700_000_000_000),
        });

        assert_eq!(card.title, "Final");
        assert_eq!(card.description.as_deref(), Some("old"));
        assert_eq!(card.due_at, Some(1_700_000_000_000));
    }

    #[test]
    fn test_negative_due_date_rejected() {
        let mut card = KanbanCard::new("Ship");
        card.due_at = Some(-1);
        assert!(card.validate().is_err());
    }
}
