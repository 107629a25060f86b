//! シャードへのプロキシハンドラー
//!
//! パスからエンドポイント種別を判定し、選択したシャードへリクエストを転送する。
//! レスポンスはストリームのまま返し、最後まで流れた時点で利用率と決定ログを更新する。

use crate::api::error::AppError;
use crate::balancer::RoutingLease;
use crate::AppState;
use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    response::Response,
};
use futures::{Stream, StreamExt};
use shardlb_common::error::LbError;
use std::{io, pin::Pin};

/// `user_id` が無いときのクライアントキー
pub const DEFAULT_CLIENT_KEY: &str = "u0";

/// ホップバイホップヘッダーか（転送しない）
fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
        || name == header::TE
        || name == header::TRAILER
        || name == header::PROXY_AUTHORIZATION
        || name == header::PROXY_AUTHENTICATE
        || name.as_str() == "keep-alive"
}

/// クエリ文字列から `user_id` を取り出す
///
/// 未指定・空文字・解析不能の場合は `u0`。
pub fn client_key_from_query(query: Option<&str>) -> String {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .and_then(|pairs| {
            pairs
                .into_iter()
                .find(|(name, value)| name == "user_id" && !value.is_empty())
                .map(|(_, value)| value)
        })
        .unwrap_or_else(|| DEFAULT_CLIENT_KEY.to_string())
}

/// 転送するリクエストヘッダー（host とホップバイホップを除く）
fn forwarded_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// すべての非healthzリクエストを処理する
pub async fn route_request(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let is_head = parts.method == Method::HEAD;
    let path = parts.uri.path().to_string();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let client_key = client_key_from_query(parts.uri.query());

    let lease = state.router.route(&path, &client_key).await;
    let shard = lease.decision().shard;
    let target_url = format!("{}{}", state.backends.base_url(shard), path_and_query);

    tracing::debug!(
        user_id = %client_key,
        shard = %shard,
        url = %target_url,
        "Forwarding request"
    );

    let mut upstream_request = state
        .http_client
        .request(parts.method, &target_url)
        .headers(forwarded_request_headers(&parts.headers));
    if body.size_hint().exact() != Some(0) {
        upstream_request =
            upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }
    let result = upstream_request.send().await;

    match result {
        Ok(response) => Ok(forward_streaming_response(response, lease, is_head).await),
        Err(err) => {
            lease.fail().await;
            tracing::warn!(
                user_id = %client_key,
                shard = %shard,
                error = %err,
                "Failed to forward request to shard"
            );
            let error = if err.is_timeout() {
                LbError::Timeout(format!("shard {shard} did not respond: {err}"))
            } else {
                LbError::Http(format!("shard {shard} unreachable: {err}"))
            };
            Err(AppError(error))
        }
    }
}

/// レスポンスをストリームで返し、完了時にleaseを完了させる
///
/// Content-Length付きのレスポンスはhyperが終端まで読まずにボディを破棄するため、
/// 宣言された長さを受信した時点で完了とみなす。
/// 途中でストリームが失敗した場合、またはクライアントが切断した場合は
/// leaseを破棄するだけで利用率は更新しない。
pub(crate) async fn forward_streaming_response(
    response: reqwest::Response,
    lease: RoutingLease,
    is_head: bool,
) -> Response {
    struct CompletionState {
        upstream: Pin<Box<dyn Stream<Item = Result<axum::body::Bytes, reqwest::Error>> + Send>>,
        lease: Option<RoutingLease>,
        remaining: Option<u64>,
    }

    let status = response.status();
    let headers = response.headers().clone();
    let remaining = response.content_length();

    let lease = if is_head || remaining == Some(0) {
        lease.complete().await;
        None
    } else {
        Some(lease)
    };

    let state = CompletionState {
        upstream: Box::pin(response.bytes_stream()),
        lease,
        remaining,
    };

    let tracked_stream = futures::stream::try_unfold(state, |mut state| async move {
        match state.upstream.next().await {
            Some(Ok(chunk)) => {
                if let Some(remaining) = state.remaining.as_mut() {
                    *remaining = remaining.saturating_sub(chunk.len() as u64);
                    if *remaining == 0 {
                        if let Some(lease) = state.lease.take() {
                            lease.complete().await;
                        }
                    }
                }
                Ok(Some((chunk, state)))
            }
            Some(Err(err)) => {
                if let Some(lease) = state.lease.take() {
                    tracing::warn!(
                        user_id = %lease.decision().client_key,
                        shard = %lease.decision().shard,
                        error = %err,
                        "Shard response stream failed"
                    );
                }
                Err(io::Error::other(err))
            }
            None => {
                if let Some(lease) = state.lease.take() {
                    lease.complete().await;
                }
                Ok(None)
            }
        }
    });

    let mut axum_response = Response::new(Body::from_stream(tracked_stream));
    *axum_response.status_mut() = status;
    {
        let response_headers = axum_response.headers_mut();
        for (name, value) in headers.iter() {
            if is_hop_by_hop(name) {
                continue;
            }
            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                response_headers.append(header_name, header_value);
            }
        }
    }
    axum_response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_key_defaults_to_u0() {
        assert_eq!(client_key_from_query(None), "u0");
        assert_eq!(client_key_from_query(Some("")), "u0");
        assert_eq!(client_key_from_query(Some("user_id=")), "u0");
        assert_eq!(client_key_from_query(Some("model_version=v2")), "u0");
    }

    #[test]
    fn client_key_reads_user_id() {
        assert_eq!(client_key_from_query(Some("user_id=u42")), "u42");
        assert_eq!(
            client_key_from_query(Some("model_version=v1&user_id=alice%20b")),
            "alice b"
        );
    }

    #[test]
    fn forwarded_headers_drop_host_and_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("router:8081"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.append(header::ACCEPT, HeaderValue::from_static("text/plain"));
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));

        let forwarded = forwarded_request_headers(&headers);
        assert!(forwarded.get(header::HOST).is_none());
        assert!(forwarded.get(header::CONNECTION).is_none());
        assert!(forwarded.get("keep-alive").is_none());
        assert_eq!(forwarded.get("x-request-id").unwrap(), "abc");
        assert_eq!(forwarded.get_all(header::ACCEPT).iter().count(), 2);
    }
}
