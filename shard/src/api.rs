//! REST APIハンドラー
//!
//! 各エンドポイントはキャッシュを確認し、ミスした場合だけ処理を実行する。
//! レスポンスの `latency_ms` はキャッシュ確認後から計測する。

use crate::work::{normalize_doc_id, touch_feature_vector};
use crate::ShardState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use shardlb_common::error::ShardError;
use shardlb_common::protocol::{ShardErrorResponse, ShardResponse};
use shardlb_common::types::EndpointKind;
use std::sync::Arc;
use tokio::time::Instant;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// `user_id` 未指定時のキー
pub const DEFAULT_USER_ID: &str = "u0";

/// `model_version` 未指定時の値
pub const DEFAULT_MODEL_VERSION: &str = "v1";

/// `document_id` 未指定時の値
pub const DEFAULT_DOCUMENT_ID: &str = "0";

/// シャードのaxumアプリケーションを作成
pub fn create_app(state: ShardState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/ready", get(health))
        .route("/auth", get(auth))
        .route("/features", get(features))
        .route("/document", get(document))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// `/auth` のクエリ
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    /// ユーザーID
    pub user_id: Option<String>,
}

/// `/features` のクエリ
#[derive(Debug, Deserialize)]
pub struct FeaturesQuery {
    /// ユーザーID
    pub user_id: Option<String>,
    /// モデルバージョン
    pub model_version: Option<String>,
}

/// `/document` のクエリ
#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    /// ドキュメントID（`186`、`d186` など）
    pub document_id: Option<String>,
}

/// シャードAPIのエラー
#[derive(Debug)]
pub struct ShardApiError(pub ShardError);

impl From<ShardError> for ShardApiError {
    fn from(err: ShardError) -> Self {
        ShardApiError(err)
    }
}

impl IntoResponse for ShardApiError {
    fn into_response(self) -> Response {
        let (status, id) = match &self.0 {
            ShardError::DocumentNotFound(id) => (StatusCode::NOT_FOUND, Some(id.clone())),
            ShardError::Work(_) => {
                tracing::error!(error = %self.0, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        let body = ShardErrorResponse {
            ok: false,
            error: self.0.error_code().to_string(),
            id,
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

fn param_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn ok_response(cache_hit: bool, latency_ms: u64) -> Json<ShardResponse> {
    Json(ShardResponse {
        ok: true,
        cache_hit,
        latency_ms,
    })
}

async fn auth(
    State(state): State<ShardState>,
    Query(query): Query<AuthQuery>,
) -> Result<Json<ShardResponse>, ShardApiError> {
    let user_id = param_or(query.user_id, DEFAULT_USER_ID);
    let hit = state.caches.auth.lock().await.get(&user_id).is_some();

    let started = Instant::now();
    if !hit {
        state.worker.authenticate().await?;
        state.caches.auth.lock().await.insert(user_id.clone(), ());
    }
    let latency_ms = elapsed_ms(started);

    state.log_request(EndpointKind::Auth, &user_id, hit, Some(latency_ms));
    Ok(ok_response(hit, latency_ms))
}

async fn features(
    State(state): State<ShardState>,
    Query(query): Query<FeaturesQuery>,
) -> Result<Json<ShardResponse>, ShardApiError> {
    let user_id = param_or(query.user_id, DEFAULT_USER_ID);
    let model_version = param_or(query.model_version, DEFAULT_MODEL_VERSION);
    let key = format!("{user_id}:{model_version}");

    let mut cache = state.caches.features.lock().await;
    let cached = cache.get_mut(&key);
    let hit = cached.is_some();

    let started = Instant::now();
    if let Some(vector) = cached {
        touch_feature_vector(vector);
    }
    drop(cache);
    if !hit {
        let vector = state.worker.build_features().await?;
        state.caches.features.lock().await.insert(key.clone(), vector);
    }
    let latency_ms = elapsed_ms(started);

    state.log_request(EndpointKind::Features, &key, hit, Some(latency_ms));
    Ok(ok_response(hit, latency_ms))
}

async fn document(
    State(state): State<ShardState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<ShardResponse>, ShardApiError> {
    let raw = param_or(query.document_id, DEFAULT_DOCUMENT_ID);
    let key = normalize_doc_id(&raw);
    let hit = state.caches.documents.lock().await.get(&key).is_some();

    let started = Instant::now();
    if !hit {
        match state.worker.fetch_document(&key).await {
            Ok(parsed) => {
                state
                    .caches
                    .documents
                    .lock()
                    .await
                    .insert(key.clone(), Arc::new(parsed));
            }
            Err(err) => {
                state.log_request(EndpointKind::Document, &key, false, Some(elapsed_ms(started)));
                return Err(err.into());
            }
        }
    }
    let latency_ms = elapsed_ms(started);

    state.log_request(EndpointKind::Document, &key, hit, Some(latency_ms));
    Ok(ok_response(hit, latency_ms))
}
