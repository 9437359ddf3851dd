use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::{flag, nullable, optional_flag};
use super::Database;
use crate::join::JoinMode;

pub const DEFAULT_OUTPUT_PATH: &str = "C:\\CU\\text_input\\prompt.txt";
pub const DEFAULT_LM_BASE_URL: &str = "http://127.0.0.1:1234/v1";
pub const DEFAULT_LM_API_KEY: &str = "lm-studio";

/// User-editable settings, stored as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub prompt_output_path: String,
    pub join_mode: JoinMode,
    pub lm_base_url: String,
    pub lm_api_key: String,
    pub lm_model: Option<String>,
    pub lm_temperature: f64,
    pub lm_top_p: f64,
    pub lm_top_k: i64,
    #[serde(deserialize_with = "flag")]
    pub lm_use_temperature: bool,
    #[serde(deserialize_with = "flag")]
    pub lm_use_top_p: bool,
    #[serde(deserialize_with = "flag")]
    pub lm_use_top_k: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prompt_output_path: DEFAULT_OUTPUT_PATH.to_string(),
            join_mode: JoinMode::Space,
            lm_base_url: DEFAULT_LM_BASE_URL.to_string(),
            lm_api_key: DEFAULT_LM_API_KEY.to_string(),
            lm_model: None,
            lm_temperature: 0.2,
            lm_top_p: 0.9,
            lm_top_k: 40,
            lm_use_temperature: true,
            lm_use_top_p: true,
            lm_use_top_k: true,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    prompt_output_path: String,
    join_mode: String,
    lm_base_url: String,
    lm_api_key: String,
    lm_model: Option<String>,
    lm_temperature: f64,
    lm_top_p: f64,
    lm_top_k: i64,
    lm_use_temperature: bool,
    lm_use_top_p: bool,
    lm_use_top_k: bool,
}

impl TryFrom<SettingsRow> for Settings {
    type Error = anyhow::Error;

    fn try_from(row: SettingsRow) -> Result<Self> {
        let join_mode = row
            .join_mode
            .parse::<JoinMode>()
            .context("stored join mode is invalid")?;
        Ok(Self {
            prompt_output_path: row.prompt_output_path,
            join_mode,
            lm_base_url: row.lm_base_url,
            lm_api_key: row.lm_api_key,
            lm_model: row.lm_model,
            lm_temperature: row.lm_temperature,
            lm_top_p: row.lm_top_p,
            lm_top_k: row.lm_top_k,
            lm_use_temperature: row.lm_use_temperature,
            lm_use_top_p: row.lm_use_top_p,
            lm_use_top_k: row.lm_use_top_k,
        })
    }
}

/// Partial update of [`Settings`]; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub prompt_output_path: Option<String>,
    pub join_mode: Option<JoinMode>,
    pub lm_base_url: Option<String>,
    pub lm_api_key: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub lm_model: Option<Option<String>>,
    pub lm_temperature: Option<f64>,
    pub lm_top_p: Option<f64>,
    pub lm_top_k: Option<i64>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub lm_use_temperature: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub lm_use_top_p: Option<bool>,
    #[serde(default, deserialize_with = "optional_flag")]
    pub lm_use_top_k: Option<bool>,
}

impl SettingsPatch {
    /// Check value ranges, returning a message suitable for the client.
    pub fn validate(&self) -> Result<(), String> {
        let non_empty = [
            ("promptOutputPath", &self.prompt_output_path),
            ("lmBaseUrl", &self.lm_base_url),
            ("lmApiKey", &self.lm_api_key),
        ];
        for (name, value) in non_empty {
            if matches!(value, Some(v) if v.is_empty()) {
                return Err(format!("{name} must not be empty"));
            }
        }
        if matches!(self.lm_temperature, Some(t) if !(0.0..=2.0).contains(&t)) {
            return Err("lmTemperature must be between 0 and 2".to_string());
        }
        if matches!(self.lm_top_p, Some(p) if !(0.0..=1.0).contains(&p)) {
            return Err("lmTopP must be between 0 and 1".to_string());
        }
        if matches!(self.lm_top_k, Some(k) if k < 0) {
            return Err("lmTopK must not be negative".to_string());
        }
        Ok(())
    }

    pub fn apply(self, current: Settings) -> Settings {
        Settings {
            prompt_output_path: self
                .prompt_output_path
                .unwrap_or(current.prompt_output_path),
            join_mode: self.join_mode.unwrap_or(current.join_mode),
            lm_base_url: self.lm_base_url.unwrap_or(current.lm_base_url),
            lm_api_key: self.lm_api_key.unwrap_or(current.lm_api_key),
            lm_model: self.lm_model.unwrap_or(current.lm_model),
            lm_temperature: self.lm_temperature.unwrap_or(current.lm_temperature),
            lm_top_p: self.lm_top_p.unwrap_or(current.lm_top_p),
            lm_top_k: self.lm_top_k.unwrap_or(current.lm_top_k),
            lm_use_temperature: self
                .lm_use_temperature
                .unwrap_or(current.lm_use_temperature),
            lm_use_top_p: self.lm_use_top_p.unwrap_or(current.lm_use_top_p),
            lm_use_top_k: self.lm_use_top_k.unwrap_or(current.lm_use_top_k),
        }
    }
}

impl Database {
    pub(crate) async fn ensure_settings(&self) -> Result<()> {
        let defaults = Settings::default();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO app_settings (id, prompt_output_path, join_mode, lm_base_url, \
             lm_api_key, lm_model, lm_temperature, lm_top_p, lm_top_k, lm_use_temperature, \
             lm_use_top_p, lm_use_top_k) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&defaults.prompt_output_path)
        .bind(defaults.join_mode.as_str())
        .bind(&defaults.lm_base_url)
        .bind(&defaults.lm_api_key)
        .bind(&defaults.lm_model)
        .bind(defaults.lm_temperature)
        .bind(defaults.lm_top_p)
        .bind(defaults.lm_top_k)
        .bind(defaults.lm_use_temperature)
        .bind(defaults.lm_use_top_p)
        .bind(defaults.lm_use_top_k)
        .execute(self.pool())
        .await?;
        if result.rows_affected() > 0 {
            tracing::info!("Initialised default settings");
        }
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<Settings> {
        tracing::trace!("Fetching settings");
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT prompt_output_path, join_mode, lm_base_url, lm_api_key, lm_model, \
             lm_temperature, lm_top_p, lm_top_k, lm_use_temperature, lm_use_top_p, lm_use_top_k \
             FROM app_settings WHERE id = 1",
        )
        .fetch_optional(self.pool())
        .await?;
        match row {
            Some(row) => row.try_into(),
            None => Ok(Settings::default()),
        }
    }

    /// The join mode every engine call made on behalf of stored data uses.
    pub async fn join_mode(&self) -> Result<JoinMode> {
        Ok(self.get_settings().await?.join_mode)
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let next = patch.apply(self.get_settings().await?);
        self.save_settings(&next).await?;
        tracing::debug!(join_mode = %next.join_mode, "Updated settings");
        Ok(next)
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        write_settings(self.pool(), settings).await
    }
}

pub(crate) async fn write_settings<'e, E>(executor: E, settings: &Settings) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "UPDATE app_settings SET prompt_output_path = ?, join_mode = ?, lm_base_url = ?, \
         lm_api_key = ?, lm_model = ?, lm_temperature = ?, lm_top_p = ?, lm_top_k = ?, \
         lm_use_temperature = ?, lm_use_top_p = ?, lm_use_top_k = ? WHERE id = 1",
    )
    .bind(&settings.prompt_output_path)
    .bind(settings.join_mode.as_str())
    .bind(&settings.lm_base_url)
    .bind(&settings.lm_api_key)
    .bind(&settings.lm_model)
    .bind(settings.lm_temperature)
    .bind(settings.lm_top_p)
    .bind(settings.lm_top_k)
    .bind(settings.lm_use_temperature)
    .bind(settings.lm_use_top_p)
    .bind(settings.lm_use_top_k)
    .execute(executor)
    .await?;
    Ok(())
}
