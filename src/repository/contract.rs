//! Ranked Entity Contract
//!
//! Everything the generic ranked repository needs to know about one entity
//! type: where it lives, how it is scoped, how its own columns map to SQL,
//! and how it validates itself.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{
    CardTodo, CardTodoChanges, DomainResult, KanbanCard, KanbanCardChanges, KanbanList,
    KanbanListChanges, SubList, SubListChanges,
};

/// Entity-specific hooks for `RankedRepository`
pub trait RankedEntity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Partial update merged into the payload by `update_with_position`
    type Changes: Default + Send + Sync + DeserializeOwned + 'static;

    const TABLE: &'static str;
    const SCOPE_COLUMN: &'static str;
    const RANK_COLUMN: &'static str = "rank";
    const TIEBREAK_COLUMN: &'static str = "created_at";
    const TITLE_COLUMN: &'static str = "title";
    /// Entity columns, in the order of `to_values` and `from_row`
    const COLUMNS: &'static [&'static str];

    fn validate(&self) -> DomainResult<()>;

    fn apply(&mut self, changes: Self::Changes);

    fn to_values(&self) -> Vec<Value>;

    /// Read the entity columns starting at `offset`
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;
}

impl RankedEntity for KanbanList {
    type Changes = KanbanListChanges;

    const TABLE: &'static str = "kanban_lists";
    const SCOPE_COLUMN: &'static str = "board_id";
    const COLUMNS: &'static [&'static str] = &["title"];

    fn validate(&self) -> DomainResult<()> {
        KanbanList::validate(self)
    }

    fn apply(&mut self, changes: Self::Changes) {
        KanbanList::apply(self, changes)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Text(self.title.clone())]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self { title: row.get(offset)? })
    }
}

impl RankedEntity for KanbanCard {
    type Changes = KanbanCardChanges;

    const TABLE: &'static str = "kanban_cards";
    const SCOPE_COLUMN: &'static str = "list_id";
    const COLUMNS: &'static [&'static str] = &["title", "description", "due_at"];

    fn validate(&self) -> DomainResult<()> {
        KanbanCard::validate(self)
    }

    fn apply(&mut self, changes: Self::Changes) {
        KanbanCard::apply(self, changes)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            self.description.clone().map(Value::Text).unwrap_or(Value::Null),
            self.due_at.map(Value::Integer).unwrap_or(Value::Null),
        ]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            title: row.get(offset)?,
            description: row.get(offset + 1)?,
            due_at: row.get(offset + 2)?,
        })
    }
}

impl RankedEntity for SubList {
    type Changes = SubListChanges;

    const TABLE: &'static str = "sub_lists";
    const SCOPE_COLUMN: &'static str = "todo_id";
    const COLUMNS: &'static [&'static str] = &["title"];

    fn validate(&self) -> DomainResult<()> {
        SubList::validate(self)
    }

    fn apply(&mut self, changes: Self::Changes) {
        SubList::apply(self, changes)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Text(self.title.clone())]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self { title: row.get(offset)? })
    }
}

impl RankedEntity for CardTodo {
    type Changes = CardTodoChanges;

    const TABLE: &'static str = "card_todos";
    const SCOPE_COLUMN: &'static str = "card_id";
    const COLUMNS: &'static [&'static str] = &["title", "completed"];

    fn validate(&self) -> DomainResult<()> {
        CardTodo::validate(self)
    }

    fn apply(&mut self, changes: Self::Changes) {
        CardTodo::apply(self, changes)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.title.clone()),
            Value::Integer(if self.completed { 1 } else { 0 }),
        ]
    }

    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            title: row.get(offset)?,
            completed: row.get::<_, i64>(offset + 1)? != 0,
        })
    }
}
