//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use shardlb_common::error::LbError;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub LbError);

impl From<LbError> for AppError {
    fn from(err: LbError) -> Self {
        AppError(err)
    }
}

impl AppError {
    /// エラーに対応するHTTPステータス
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LbError::Http(_) => StatusCode::BAD_GATEWAY,
            LbError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // バックエンドのアドレス等はDisplay側にのみ含め、ログへ出す
        let payload = json!({
            "error": self.0.external_message()
        });

        (self.status(), Json(payload)).into_response()
    }
}
