//! List Filter
//!
//! Typed predicates for listing ranked items. A filter is validated before any
//! SQL is built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult};

pub const MAX_FILTER_IDS: usize = 500;
pub const MAX_FILTER_LIMIT: u32 = 1000;
pub const MAX_TITLE_QUERY_LEN: usize = 200;

/// Supported list predicates; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFilter {
    /// Restrict to these ids (empty = any id)
    pub ids: Vec<i64>,
    /// Restrict to one parent container
    pub scope_id: Option<i64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the title
    pub title_contains: Option<String>,
    pub limit: Option<u32>,
}

impl ItemFilter {
    pub fn for_scope(scope_id: i64) -> Self {
        Self {
            scope_id: Some(scope_id),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.ids.len() > MAX_FILTER_IDS {
            return Err(DomainError::InvalidInput(format!(
                "at most {} ids per filter",
                MAX_FILTER_IDS
            )));
        }

        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err(DomainError::InvalidInput(
                    "created_after must not be later than created_before".into(),
                ));
            }
        }

        if let Some(query) = &self.title_contains {
            if query.trim().is_empty() {
                return Err(DomainError::InvalidInput("title query must not be blank".into()));
            }
            if query.chars().count() > MAX_TITLE_QUERY_LEN {
                return Err(DomainError::InvalidInput(format!(
                    "title query must be at most {} characters",
                    MAX_TITLE_QUERY_LEN
                )));
            }
        }

        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_FILTER_LIMIT {
                return Err(DomainError::InvalidInput(format!(
                    "limit must be between 1 and {}",
                    MAX_FILTER_LIMIT
                )));
            }
        }

        Ok(())
    }

    /// LIKE pattern for `title_contains`, with wildcards escaped by `\`
    pub fn title_pattern(&self) -> Option<String> {
        self.title_contains.as_ref().map(|query| {
            let escaped = query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}
