use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use promptdeck::api_router;
use promptdeck::db::{Database, SettingsPatch};
use promptdeck::tests::util::init_test_db;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn db_pointing_at(server: &MockServer, model: Option<&str>) -> Database {
    let db = init_test_db().await;
    db.update_settings(SettingsPatch {
        lm_base_url: Some(format!("{}/", server.uri())),
        lm_api_key: Some("key-1".to_string()),
        lm_model: Some(model.map(str::to_string)),
        ..Default::default()
    })
    .await
    .unwrap();
    db
}

async fn rewrite(db: Database, payload: Value) -> (StatusCode, Value) {
    let response = api_router(db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lm")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn lm_translates_with_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer key-1"))
        .and(body_partial_json(json!({
            "model": "qwen2.5",
            "messages": [{"role": "system"}, {"role": "user", "content": "рыжие волосы"}],
            "top_p": 0.9,
            "top_k": 40
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "red hair\n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_pointing_at(&server, Some("qwen2.5")).await;
    let (status, payload) = rewrite(db, json!({"mode": "ru2en", "text": "рыжие волосы"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({"text": "red hair"}));
}

#[tokio::test]
async fn lm_falls_back_to_local_model_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"model": "local-model"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "a calm lake at dawn"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_pointing_at(&server, None).await;
    let (status, payload) = rewrite(db, json!({"mode": "improve", "text": "lake dawn"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["text"], "a calm lake at dawn");
}

#[tokio::test]
async fn lm_upstream_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let db = db_pointing_at(&server, None).await;
    let (status, payload) = rewrite(db, json!({"mode": "en2ru", "text": "hello"})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(payload["error"], "LM Studio error");
}

#[tokio::test]
async fn lm_empty_answer_is_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let db = db_pointing_at(&server, None).await;
    let (status, _) = rewrite(db, json!({"mode": "improve", "text": "x"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn lm_rejects_unknown_mode_and_empty_text() {
    let db = init_test_db().await;
    let (status, _) = rewrite(db.clone(), json!({"mode": "summarize", "text": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = rewrite(db, json!({"mode": "improve", "text": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
