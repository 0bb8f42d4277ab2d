//! Todo Entities
//!
//! Sub-lists hang off a todo; checklist todos hang off a kanban card.

use serde::{Deserialize, Serialize};

use super::entity::DomainResult;
use super::kanban::validate_title;

/// A named sub-list under a todo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubList {
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubListChanges {
    pub title: Option<String>,
}

impl SubList {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)
    }

    pub fn apply(&mut self, changes: SubListChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
    }
}

/// A checklist entry on a kanban card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardTodo {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardTodoChanges {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl CardTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)
    }

    pub fn apply(&mut self, changes: CardTodoChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(completed) = changes.completed {
            self.completed = completed;
        }
    }
}
