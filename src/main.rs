//! list-rank command line entry point

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use list_rank::commands::{
    create_item, delete_item, error_message, list_items, move_item, normalize_items, AppState,
    CreateRequest, MoveRequest,
};
use list_rank::config::AppConfig;
use list_rank::domain::ItemFilter;
use list_rank::repository::{RankedEntity, RankedRepository};

const APP_NAME: &str = "list-rank";

/// Ordered list positions backed by SQLite
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, env = "LIST_RANK_DB")]
    db: Option<PathBuf>,

    /// JSON config file; defaults apply when it does not exist
    #[arg(long, env = "LIST_RANK_CONFIG", default_value = "list_rank.json")]
    config: PathBuf,

    /// Rolling log directory (overrides the config file)
    #[arg(long, env = "LIST_RANK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EntityKind {
    KanbanList,
    KanbanCard,
    SubList,
    CardTodo,
}

#[derive(Args, Debug)]
struct Target {
    /// Which kind of ranked item to operate on
    #[arg(long, value_enum)]
    entity: EntityKind,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert an item between two neighbor ranks
    Create {
        #[command(flatten)]
        target: Target,
        /// Parent id (board, list, todo or card)
        #[arg(long)]
        scope: i64,
        /// Item fields as JSON, e.g. '{"title":"Backlog"}'
        #[arg(long)]
        data: String,
        #[arg(long)]
        prev: Option<f64>,
        #[arg(long)]
        next: Option<f64>,
    },
    /// Move an item between two neighbor ranks, optionally changing fields
    Move {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: i64,
        /// Field changes as JSON
        #[arg(long, default_value = "{}")]
        data: String,
        #[arg(long)]
        prev: Option<f64>,
        #[arg(long)]
        next: Option<f64>,
    },
    /// List items, ordered by scope then rank
    List {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        scope: Option<i64>,
        /// Case-insensitive title substring
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Delete an item
    Delete {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        id: i64,
    },
    /// Re-space every rank of one scope
    Normalize {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        scope: i64,
    },
}

impl Command {
    fn entity(&self) -> EntityKind {
        match self {
            Command::Create { target, .. }
            | Command::Move { target, .. }
            | Command::List { target, .. }
            | Command::Delete { target, .. }
            | Command::Normalize { target, .. } => target.entity,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, String> {
    let mut config = AppConfig::load(&cli.config).map_err(|e| e.to_string())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }

    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs"));
    rolling_logger::init_logger(log_dir, APP_NAME).map_err(|e| e.to_string())?;
    log::debug!("using database {}", config.db_path.display());

    let state = AppState::open(config).await.map_err(error_message)?;
    let output = execute(&state, cli.command).await;

    // let queued normalizations finish before the process exits
    if let Err(e) = state.shutdown().await {
        let _ = rolling_logger::error(&format!("normalization queue shutdown failed: {}", e));
    }
    output
}

async fn execute(state: &AppState, command: Command) -> Result<String, String> {
    match command.entity() {
        EntityKind::KanbanList => dispatch(&state.kanban_lists, command).await,
        EntityKind::KanbanCard => dispatch(&state.kanban_cards, command).await,
        EntityKind::SubList => dispatch(&state.sub_lists, command).await,
        EntityKind::CardTodo => dispatch(&state.card_todos, command).await,
    }
}

async fn dispatch<D: RankedEntity>(
    repo: &RankedRepository<D>,
    command: Command,
) -> Result<String, String> {
    match command {
        Command::Create {
            scope,
            data,
            prev,
            next,
            ..
        } => {
            let request = CreateRequest {
                scope_id: scope,
                data: parse_json(&data)?,
                prev_rank: prev,
                next_rank: next,
            };
            to_json(&create_item(repo, request).await?)
        }
        Command::Move {
            id,
            data,
            prev,
            next,
            ..
        } => {
            let request = MoveRequest {
                id,
                data: parse_json(&data)?,
                prev_rank: prev,
                next_rank: next,
            };
            to_json(&move_item(repo, request).await?)
        }
        Command::List {
            scope,
            title,
            limit,
            ..
        } => {
            let filter = ItemFilter {
                scope_id: scope,
                title_contains: title,
                limit,
                ..Default::default()
            };
            to_json(&list_items(repo, filter).await?)
        }
        Command::Delete { id, .. } => {
            delete_item(repo, id).await?;
            to_json(&serde_json::json!({ "deleted": id }))
        }
        Command::Normalize { scope, .. } => {
            let rows = normalize_items(repo, scope).await?;
            to_json(&serde_json::json!({ "scope_id": scope, "normalized": rows }))
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|e| format!("Invalid --data JSON: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
