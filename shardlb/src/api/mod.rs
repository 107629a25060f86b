//! REST APIハンドラー
//!
//! `/healthz` 以外のすべてのパスはプロキシハンドラーでシャードへ転送する。

pub mod error;
pub mod proxy;

use crate::AppState;
use axum::{routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// ルーターのaxumアプリケーションを作成
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .fallback(proxy::route_request)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
