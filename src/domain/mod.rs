//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has no storage dependencies.

mod entity;
mod filter;
mod kanban;
mod ranked;
mod todo;

pub use entity::{DomainError, DomainResult, Entity};
pub use filter::{ItemFilter, MAX_FILTER_IDS, MAX_FILTER_LIMIT};
pub use kanban::{
    validate_title, KanbanCard, KanbanCardChanges, KanbanList, KanbanListChanges, MAX_TITLE_LEN,
};
pub use ranked::{Normalization, PositionUpdate, Ranked};
pub use todo::{CardTodo, CardTodoChanges, SubList, SubListChanges};
