//! Writing the built prompt to the configured output file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::db::Database;
use crate::join::{build_prompt, normalize_tokens};

pub const EXPORT_SOURCE: &str = "export";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("output path is not set")]
    MissingPath,

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub ok: bool,
    pub path: String,
    pub bytes_written: usize,
    pub final_text: String,
}

async fn create_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir).await,
        _ => Ok(()),
    }
}

/// Write `text` to `path` as UTF-8, creating parent directories.
///
/// Returns the number of bytes written.
pub async fn write_prompt_file(path: &Path, text: &str) -> Result<usize, ExportError> {
    let write = async {
        create_parent_dir(path).await?;
        tokio::fs::write(path, text.as_bytes()).await
    };
    write.await.map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "Wrote prompt file");
    Ok(text.len())
}

/// Make sure `path` can be written: creates parent directories and
/// creates (or truncates) the file itself.
pub async fn check_output_path(path: &Path) -> std::io::Result<()> {
    create_parent_dir(path).await?;
    tokio::fs::File::create(path).await?;
    tracing::debug!(path = %path.display(), "Output path is writable");
    Ok(())
}

/// Build the prompt with the stored join mode, write it to the configured
/// output path and record it in history.
pub async fn export_tokens(db: &Database, tokens: &[String]) -> Result<ExportOutcome, ExportError> {
    let settings = db.get_settings().await?;
    let output_path = settings.prompt_output_path.trim();
    if output_path.is_empty() {
        return Err(ExportError::MissingPath);
    }

    let final_text = build_prompt(tokens, settings.join_mode);
    let bytes_written = write_prompt_file(Path::new(output_path), &final_text).await?;

    db.record_history(final_text.clone(), EXPORT_SOURCE, &normalize_tokens(tokens))
        .await?;

    tracing::info!(
        path = %output_path,
        bytes_written,
        join_mode = %settings.join_mode,
        "Exported prompt"
    );
    Ok(ExportOutcome {
        ok: true,
        path: output_path.to_string(),
        bytes_written,
        final_text,
    })
}
