//! スタブシャード
//!
//! どのパスにも自分のシャード名とリクエスト内容をJSONで返す。

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;

use super::http::{spawn_app, TestServer};

#[derive(Clone)]
struct StubState {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

/// 起動中のスタブシャード
#[allow(dead_code)]
pub struct StubShard {
    pub name: &'static str,
    pub server: TestServer,
    hits: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl StubShard {
    /// 受け付けたリクエスト数
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }
}

async fn stub_handler(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let payload = json!({
        "shard": state.name,
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "host": headers.get("host").and_then(|v| v.to_str().ok()),
        "x_test": headers.get("x-test").and_then(|v| v.to_str().ok()),
        "body": body,
    });

    if uri.path() == "/auth/teapot" {
        return (
            StatusCode::IM_A_TEAPOT,
            [("x-shard", state.name), ("x-custom", "preserved")],
            Json(payload),
        )
            .into_response();
    }

    (StatusCode::OK, [("x-shard", state.name)], Json(payload)).into_response()
}

/// スタブシャードを起動する
pub async fn spawn_stub_shard(name: &'static str) -> StubShard {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(stub_handler).with_state(StubState {
        name,
        hits: hits.clone(),
    });

    StubShard {
        name,
        server: spawn_app(app).await,
        hits,
    }
}
