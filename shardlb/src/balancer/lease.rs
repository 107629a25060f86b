//! ルーティングリース管理
//!
//! 判定から転送完了までのライフサイクルを管理する `RoutingLease` を提供する。

use std::time::{Duration as StdDuration, Instant};

use super::types::{RoutingDecision, RoutingOutcome};
use super::ShardRouter;

/// 判定済みリクエストのlease
///
/// `complete` / `fail` が呼ばれずに破棄された場合（ストリーム途中の切断など）は
/// 利用率も決定ログも更新しない。
pub struct RoutingLease {
    router: Option<ShardRouter>,
    decision: RoutingDecision,
    started_at: Instant,
}

impl RoutingLease {
    pub(crate) fn new(router: ShardRouter, decision: RoutingDecision) -> Self {
        Self {
            router: Some(router),
            decision,
            started_at: Instant::now(),
        }
    }

    /// 紐づく判定
    pub fn decision(&self) -> &RoutingDecision {
        &self.decision
    }

    /// lease開始からの経過時間
    pub fn elapsed(&self) -> StdDuration {
        self.started_at.elapsed()
    }

    /// レスポンス完了を記録する（利用率更新 + 決定ログ）
    pub async fn complete(mut self) {
        let Some(router) = self.router.take() else {
            return;
        };
        router
            .finish(&self.decision, RoutingOutcome::Completed, self.elapsed())
            .await;
    }

    /// 転送失敗を記録する（決定ログのみ）
    pub async fn fail(mut self) {
        let Some(router) = self.router.take() else {
            return;
        };
        router
            .finish(&self.decision, RoutingOutcome::Failed, self.elapsed())
            .await;
    }
}

impl Drop for RoutingLease {
    fn drop(&mut self) {
        if self.router.take().is_some() {
            tracing::warn!(
                user_id = %self.decision.client_key,
                shard = %self.decision.shard,
                elapsed_ms = self.started_at.elapsed().as_millis() as u64,
                "Routing lease dropped before completion; skipping utilization update"
            );
        }
    }
}
