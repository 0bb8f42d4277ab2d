//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations for every ranked table.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

use super::store::SqliteRankStore;

/// Database state wrapper
#[derive(Clone)]
pub struct DbState {
    conn: Arc<Mutex<Connection>>,
}

impl DbState {
    fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Shared connection handle
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Generic rank store over the same connection
    pub fn rank_store(&self) -> SqliteRankStore {
        SqliteRankStore::new(self.connection())
    }
}

/// Initialize database with path
pub async fn init_db(db_path: &Path) -> DomainResult<DbState> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| DomainError::Internal(format!("Failed to create db dir: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Internal(format!("Failed to open db: {}", e)))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(|e| DomainError::Internal(format!("Failed to enable WAL: {}", e)))?;

    run_migrations(&conn)?;
    log::info!("database ready at {}", db_path.display());
    Ok(DbState::new(conn))
}

/// In-memory database, used by tests and dry runs
pub async fn init_in_memory() -> DomainResult<DbState> {
    let conn = Connection::open_in_memory()
        .map_err(|e| DomainError::Internal(format!("Failed to open db: {}", e)))?;
    run_migrations(&conn)?;
    Ok(DbState::new(conn))
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", table))
        .map_err(|e| DomainError::Internal(e.to_string()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| DomainError::Internal(e.to_string()))?;

    for name in names {
        if name.map_err(|e| DomainError::Internal(e.to_string()))? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS kanban_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            board_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            rank REAL NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(board_id, rank)
        );

        CREATE TABLE IF NOT EXISTS kanban_cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            list_id INTEGER NOT NULL REFERENCES kanban_lists(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            rank REAL NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(list_id, rank)
        );

        CREATE TABLE IF NOT EXISTS sub_lists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            todo_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            rank REAL NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(todo_id, rank)
        );

        CREATE TABLE IF NOT EXISTS card_todos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL REFERENCES kanban_cards(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            rank REAL NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(card_id, rank)
        );",
    )
    .map_err(|e| DomainError::Internal(format!("Failed to create tables: {}", e)))?;

    // Columns added after the first release
    if !column_exists(conn, "kanban_cards", "due_at")? {
        conn.execute("ALTER TABLE kanban_cards ADD COLUMN due_at INTEGER", [])
            .map_err(|e| DomainError::Internal(format!("Failed to add due_at: {}", e)))?;
    }

    if !column_exists(conn, "card_todos", "completed")? {
        conn.execute(
            "ALTER TABLE card_todos ADD COLUMN completed INTEGER NOT NULL DEFAULT 0",
            [],
        )
        .map_err(|e| DomainError::Internal(format!("Failed to add completed: {}", e)))?;
    }

    Ok(())
}
