use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::ai::{rewrite_text, LmConfig, LmError, RewriteMode};
use crate::db::history::DEFAULT_HISTORY_LIMIT;
use crate::db::{
    AddPhraseOutcome, Backup, BulkInsertOutcome, Category, Database, HistoryRecord, NewHistory,
    NewPrompt, Phrase, PhraseUpdate, PhraseUpdateOutcome, PromptRecord, PromptUpdate, Settings,
    SettingsPatch,
};
use crate::export::{check_output_path, export_tokens, ExportError, ExportOutcome};
use crate::join::{build_prompt, split_prompt, JoinMode};
use crate::system_info::SystemInfo;

const LM_FALLBACK_ERROR: &str = "LM Studio error";

#[derive(Clone)]
struct AppState {
    db: Database,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "Request failed");
                "internal_error".to_string()
            }
            other => {
                tracing::debug!(status = %status, error = %other, "Request rejected");
                other.to_string()
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Store(err) => ApiError::Internal(err),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<LmError> for ApiError {
    fn from(err: LmError) -> Self {
        match err {
            LmError::Upstream { status, body } => ApiError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: if body.is_empty() {
                    LM_FALLBACK_ERROR.to_string()
                } else {
                    body
                },
            },
            empty @ LmError::EmptyResponse => ApiError::Upstream {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: empty.to_string(),
            },
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    Ok(payload?.0)
}

fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Build the HTTP router over the store.
pub fn router(db: Database) -> Router {
    router_with_client(db, reqwest::Client::new())
}

pub fn router_with_client(db: Database, http: reqwest::Client) -> Router {
    let state = AppState { db, http };
    let request_id_layer = middleware::from_fn(assign_request_id);
    Router::new()
        .route("/api/health", get(health))
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/phrases", get(list_phrases).post(add_phrase))
        .route("/api/phrases/bulk", post(bulk_add_phrases))
        .route("/api/phrases/:id", get(get_phrase).put(update_phrase).delete(delete_phrase))
        .route("/api/prompts", get(list_prompts).post(create_prompt))
        .route("/api/prompts/:id", get(get_prompt).put(update_prompt).delete(delete_prompt))
        .route("/api/prompts/:id/tokens", get(prompt_tokens))
        .route("/api/history", get(list_history).post(add_history))
        .route("/api/history/:id", get(get_history).delete(delete_history))
        .route("/api/history/:id/tokens", get(history_tokens))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/settings/check-path", post(check_path))
        .route("/api/export", post(export_prompt))
        .route("/api/backup/export", get(export_backup))
        .route("/api/backup/import", post(import_backup))
        .route("/api/lm", post(rewrite))
        .route("/api/join", post(join))
        .route("/api/split", post(split))
        .fallback(not_found)
        .with_state(state)
        .layer(request_id_layer)
}

async fn assign_request_id(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let span = tracing::debug_span!("request", request_id = %request_id);
    let mut response = next.run(req).instrument(span).await;
    let status = response.status();
    if let Ok(header_value) = request_id.parse() {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), header_value);
    }
    tracing::debug!(
        request_id,
        method = %method,
        uri = %uri,
        status = %status,
        "API request completed"
    );
    response
}

async fn not_found(req: Request<Body>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Not found: {}", req.uri().path()),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    build: SystemInfo,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        build: SystemInfo::current(),
    })
}

// Categories

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCategoryRequest {
    name: Option<String>,
    order_index: Option<i64>,
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.db.list_categories().await?))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Category>> {
    state
        .db
        .get_category(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Category not found"))
}

async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let request = body(payload)?;
    let name = required_text(&request.name, "name")?;
    let category = state.db.create_category(&name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<Category>> {
    let request = body(payload)?;
    let name = request
        .name
        .as_deref()
        .map(|name| required_text(name, "name"))
        .transpose()?;
    if matches!(request.order_index, Some(order) if order < 0) {
        return Err(ApiError::BadRequest("orderIndex must not be negative".to_string()));
    }
    state
        .db
        .update_category(&id, name.as_deref(), request.order_index)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Category not found"))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.delete_category(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Category not found"))
    }
}

// Phrases

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhraseFilter {
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPhraseRequest {
    category_id: String,
    text_en: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkPhrasesRequest {
    category_id: String,
    lines: String,
}

async fn list_phrases(
    State(state): State<AppState>,
    Query(filter): Query<PhraseFilter>,
) -> ApiResult<Json<Vec<Phrase>>> {
    Ok(Json(state.db.list_phrases(filter.category_id.as_deref()).await?))
}

async fn get_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Phrase>> {
    state
        .db
        .get_phrase(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Phrase not found"))
}

async fn add_phrase(
    State(state): State<AppState>,
    payload: Result<Json<AddPhraseRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Phrase>)> {
    let request = body(payload)?;
    let text = required_text(&request.text_en, "textEn")?;
    match state.db.add_phrase(&request.category_id, &text).await? {
        AddPhraseOutcome::Added(phrase) => Ok((StatusCode::CREATED, Json(phrase))),
        AddPhraseOutcome::Duplicate => Err(ApiError::Conflict("Phrase already exists")),
        AddPhraseOutcome::MissingCategory => Err(ApiError::NotFound("Category not found")),
    }
}

async fn bulk_add_phrases(
    State(state): State<AppState>,
    payload: Result<Json<BulkPhrasesRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BulkInsertOutcome>)> {
    let request = body(payload)?;
    if request.lines.is_empty() {
        return Err(ApiError::BadRequest("lines must not be empty".to_string()));
    }
    state
        .db
        .bulk_add_phrases(&request.category_id, &request.lines)
        .await?
        .map(|outcome| (StatusCode::CREATED, Json(outcome)))
        .ok_or(ApiError::NotFound("Category not found"))
}

async fn update_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PhraseUpdate>, JsonRejection>,
) -> ApiResult<Json<Phrase>> {
    let update = body(payload)?;
    if matches!(&update.text_en, Some(text) if text.trim().is_empty()) {
        return Err(ApiError::BadRequest("textEn must not be empty".to_string()));
    }
    if matches!(update.order_index, Some(order) if order < 0) {
        return Err(ApiError::BadRequest("orderIndex must not be negative".to_string()));
    }
    match state.db.update_phrase(&id, update).await? {
        PhraseUpdateOutcome::Updated(phrase) => Ok(Json(phrase)),
        PhraseUpdateOutcome::NotFound => Err(ApiError::NotFound("Phrase not found")),
        PhraseUpdateOutcome::MissingCategory => Err(ApiError::NotFound("Category not found")),
    }
}

async fn delete_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.delete_phrase(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Phrase not found"))
    }
}

// Saved prompts and history

#[derive(Debug, Serialize)]
struct WithTokens<T> {
    #[serde(flatten)]
    record: T,
    tokens: Vec<String>,
}

impl From<PromptRecord> for WithTokens<PromptRecord> {
    fn from(record: PromptRecord) -> Self {
        let tokens = record.tokens();
        Self { record, tokens }
    }
}

impl From<HistoryRecord> for WithTokens<HistoryRecord> {
    fn from(record: HistoryRecord) -> Self {
        let tokens = record.tokens();
        Self { record, tokens }
    }
}

#[derive(Debug, Serialize)]
struct TokensResponse {
    tokens: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

async fn list_prompts(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<WithTokens<PromptRecord>>>> {
    let prompts = state.db.list_prompts().await?;
    Ok(Json(prompts.into_iter().map(WithTokens::from).collect()))
}

async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WithTokens<PromptRecord>>> {
    state
        .db
        .get_prompt(&id)
        .await?
        .map(|prompt| Json(prompt.into()))
        .ok_or(ApiError::NotFound("Prompt not found"))
}

async fn create_prompt(
    State(state): State<AppState>,
    payload: Result<Json<NewPrompt>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WithTokens<PromptRecord>>)> {
    let new = body(payload)?;
    let mode = state.db.join_mode().await?;
    let prompt = state
        .db
        .create_prompt(new, mode)
        .await?
        .ok_or_else(|| ApiError::BadRequest("content or tokens required".to_string()))?;
    Ok((StatusCode::CREATED, Json(prompt.into())))
}

async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PromptUpdate>, JsonRejection>,
) -> ApiResult<Json<WithTokens<PromptRecord>>> {
    let update = body(payload)?;
    let mode = state.db.join_mode().await?;
    state
        .db
        .update_prompt(&id, update, mode)
        .await?
        .map(|prompt| Json(prompt.into()))
        .ok_or(ApiError::NotFound("Prompt not found"))
}

async fn delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.delete_prompt(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Prompt not found"))
    }
}

async fn prompt_tokens(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TokensResponse>> {
    let mode = state.db.join_mode().await?;
    state
        .db
        .prompt_tokens(&id, mode)
        .await?
        .map(|tokens| Json(TokensResponse { tokens }))
        .ok_or(ApiError::NotFound("Prompt not found"))
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<WithTokens<HistoryRecord>>>> {
    let limit = query
        .limit
        .as_deref()
        .and_then(|limit| limit.trim().parse::<i64>().ok())
        .filter(|limit| *limit >= 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = state.db.list_history(limit).await?;
    Ok(Json(entries.into_iter().map(WithTokens::from).collect()))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WithTokens<HistoryRecord>>> {
    state
        .db
        .get_history(&id)
        .await?
        .map(|entry| Json(entry.into()))
        .ok_or(ApiError::NotFound("History item not found"))
}

async fn add_history(
    State(state): State<AppState>,
    payload: Result<Json<NewHistory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WithTokens<HistoryRecord>>)> {
    let mut new = body(payload)?;
    new.source = required_text(&new.source, "source")?;
    let mode = state.db.join_mode().await?;
    let entry = state
        .db
        .add_history(new, mode)
        .await?
        .ok_or_else(|| ApiError::BadRequest("content or tokens required".to_string()))?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}

async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db.delete_history(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("History item not found"))
    }
}

async fn history_tokens(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TokensResponse>> {
    let mode = state.db.join_mode().await?;
    state
        .db
        .history_tokens(&id, mode)
        .await?
        .map(|tokens| Json(TokensResponse { tokens }))
        .ok_or(ApiError::NotFound("History item not found"))
}

// Settings, export and backup

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckPathRequest {
    prompt_output_path: String,
}

#[derive(Debug, Deserialize)]
struct ExportRequest {
    tokens: Vec<String>,
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.db.get_settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult<Json<Settings>> {
    let patch = body(payload)?;
    patch.validate().map_err(ApiError::BadRequest)?;
    Ok(Json(state.db.update_settings(patch).await?))
}

async fn check_path(
    payload: Result<Json<CheckPathRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let request = body(payload)?;
    if request.prompt_output_path.is_empty() {
        return Err(ApiError::BadRequest("promptOutputPath must not be empty".to_string()));
    }
    check_output_path(std::path::Path::new(&request.prompt_output_path))
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    Ok(Json(json!({ "ok": true, "path": request.prompt_output_path })))
}

async fn export_prompt(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Json<ExportOutcome>> {
    let request = body(payload)?;
    Ok(Json(export_tokens(&state.db, &request.tokens).await?))
}

async fn export_backup(State(state): State<AppState>) -> ApiResult<Json<Backup>> {
    Ok(Json(state.db.export_backup().await?))
}

async fn import_backup(
    State(state): State<AppState>,
    payload: Result<Json<Backup>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let backup = body(payload)?;
    state
        .db
        .import_backup(&backup)
        .await
        .map_err(|err| ApiError::BadRequest(format!("{err:#}")))?;
    Ok(Json(json!({ "ok": true })))
}

// Local model and engine

#[derive(Debug, Deserialize)]
struct RewriteRequest {
    mode: RewriteMode,
    text: String,
}

#[derive(Debug, Serialize)]
struct TextResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    tokens: Vec<String>,
    join_mode: Option<JoinMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitRequest {
    content: String,
    join_mode: Option<JoinMode>,
}

async fn rewrite(
    State(state): State<AppState>,
    payload: Result<Json<RewriteRequest>, JsonRejection>,
) -> ApiResult<Json<TextResponse>> {
    let request = body(payload)?;
    if request.text.is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let settings = state.db.get_settings().await?;
    let config = LmConfig::from_settings(&settings);
    let text = rewrite_text(&state.http, &config, request.mode, &request.text).await?;
    Ok(Json(TextResponse { text }))
}

async fn resolve_mode(db: &Database, requested: Option<JoinMode>) -> ApiResult<JoinMode> {
    match requested {
        Some(mode) => Ok(mode),
        None => Ok(db.join_mode().await?),
    }
}

async fn join(
    State(state): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<Json<TextResponse>> {
    let request = body(payload)?;
    let mode = resolve_mode(&state.db, request.join_mode).await?;
    Ok(Json(TextResponse {
        text: build_prompt(&request.tokens, mode),
    }))
}

async fn split(
    State(state): State<AppState>,
    payload: Result<Json<SplitRequest>, JsonRejection>,
) -> ApiResult<Json<TokensResponse>> {
    let request = body(payload)?;
    let mode = resolve_mode(&state.db, request.join_mode).await?;
    Ok(Json(TokensResponse {
        tokens: split_prompt(&request.content, mode),
    }))
}
