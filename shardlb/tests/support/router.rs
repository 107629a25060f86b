//! テスト用ルーターの起動

use std::{sync::Arc, time::Duration};

use shardlb::api::create_app;
use shardlb::balancer::{ShardRouter, UtilizationTracker};
use shardlb::decision_log::MemoryDecisionLogger;
use shardlb::AppState;
use shardlb_common::config::{BackendConfig, RoutingConfig};
use shardlb_common::protocol::DecisionRecord;

use super::http::{spawn_app, TestServer};

/// 起動中のルーターと観測用ハンドル
#[allow(dead_code)]
pub struct TestRouter {
    pub server: TestServer,
    pub router: ShardRouter,
    pub log: Arc<MemoryDecisionLogger>,
}

#[allow(dead_code)]
impl TestRouter {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.server.base_url(), path_and_query)
    }

    /// 決定ログが `count` 件以上になるまで待つ
    pub async fn wait_for_records(&self, count: usize) -> Vec<DecisionRecord> {
        for _ in 0..200 {
            if self.log.len() >= count {
                return self.log.records();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} decision records, got {}",
            self.log.records().len()
        );
    }
}

/// 指定バックエンドでルーターを起動する
pub async fn spawn_router(backends: BackendConfig) -> TestRouter {
    spawn_router_with(backends, RoutingConfig::default(), UtilizationTracker::new()).await
}

/// 設定と初期利用率を指定してルーターを起動する
pub async fn spawn_router_with(
    backends: BackendConfig,
    config: RoutingConfig,
    tracker: UtilizationTracker,
) -> TestRouter {
    let log = Arc::new(MemoryDecisionLogger::new());
    let router = ShardRouter::with_tracker(config, tracker, log.clone());
    let state = AppState {
        router: router.clone(),
        http_client: reqwest::Client::new(),
        backends,
    };

    TestRouter {
        server: spawn_app(create_app(state)).await,
        router,
        log,
    }
}
