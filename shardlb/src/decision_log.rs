//! ルーティング決定ログ
//!
//! 1リクエストにつき1レコード。本番ではstdoutへJSON Linesで書き出す。

use shardlb_common::logging::emit_json_line;
use shardlb_common::protocol::DecisionRecord;
use std::sync::{Arc, Mutex};

/// 決定レコードの出力先
pub trait DecisionLogger: Send + Sync {
    /// レコードを1件出力する
    fn record(&self, record: &DecisionRecord);
}

/// 共有ロガー
pub type SharedDecisionLogger = Arc<dyn DecisionLogger>;

/// stdoutへJSON Linesで出力するロガー
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDecisionLogger;

impl DecisionLogger for StdoutDecisionLogger {
    fn record(&self, record: &DecisionRecord) {
        if let Err(err) = emit_json_line(record) {
            tracing::warn!(
                user_id = %record.user_id,
                error = %err,
                "Failed to write decision record"
            );
        }
    }
}

/// メモリに溜めるロガー（テスト用）
#[derive(Debug, Default)]
pub struct MemoryDecisionLogger {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryDecisionLogger {
    /// 空のロガーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに記録されたレコードのコピー
    pub fn records(&self) -> Vec<DecisionRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 記録件数
    pub fn len(&self) -> usize {
        match self.records.lock() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// 記録が空か
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionLogger for MemoryDecisionLogger {
    fn record(&self, record: &DecisionRecord) {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shardlb_common::types::{EndpointKind, ShardId};

    fn sample() -> DecisionRecord {
        DecisionRecord {
            ts: Utc::now(),
            endpoint: EndpointKind::Auth,
            user_id: "u1".to_string(),
            selected_shard: ShardId::Cpu,
            selected_replica: "svc".to_string(),
            load: 0.09,
            locality: 1.0,
            score: 0.09,
            sticky_used: false,
            diverted: false,
        }
    }

    #[test]
    fn memory_logger_keeps_records_in_order() {
        let logger = MemoryDecisionLogger::new();
        assert!(logger.is_empty());

        let mut second = sample();
        second.user_id = "u2".to_string();
        logger.record(&sample());
        logger.record(&second);

        let users: Vec<String> = logger.records().into_iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(logger.len(), 2);
    }
}
