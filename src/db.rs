// Database related types and functions

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

pub mod backup;
pub mod categories;
mod database;
pub mod history;
pub mod phrases;
pub mod prompts;
pub mod settings;
pub mod types;

pub use backup::Backup;
pub use categories::Category;
pub use database::Database;
pub use history::{HistoryRecord, NewHistory};
pub use phrases::{AddPhraseOutcome, BulkInsertOutcome, Phrase, PhraseUpdate, PhraseUpdateOutcome};
pub use prompts::{resolve_content, NewPrompt, PromptRecord, PromptUpdate};
pub use settings::{Settings, SettingsPatch};

pub fn prepare_sqlite_url(url: &str) -> String {
    if url.starts_with("sqlite:") && !url.contains("mode=") && !url.contains(":memory:") {
        if url.contains('?') {
            format!("{url}&mode=rwc")
        } else {
            format!("{url}?mode=rwc")
        }
    } else {
        url.to_string()
    }
}

pub async fn connect_db(db_url: &str, max_connections: u32) -> Result<Pool<Sqlite>> {
    tracing::debug!(db_url = %db_url, max_connections, "Connecting to database");
    Ok(SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?)
}
