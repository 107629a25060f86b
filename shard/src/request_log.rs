//! リクエストログ
//!
//! 1リクエストにつき1行のJSONを書き出す。

use shardlb_common::logging::emit_json_line;
use shardlb_common::protocol::ShardLogRecord;
use std::sync::{Arc, Mutex};

/// リクエストログの出力先
pub trait RequestLogger: Send + Sync {
    /// レコードを1件出力する
    fn record(&self, record: &ShardLogRecord);
}

/// 共有ロガー
pub type SharedRequestLogger = Arc<dyn RequestLogger>;

/// stdoutへJSON Linesで出力するロガー
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutRequestLogger;

impl RequestLogger for StdoutRequestLogger {
    fn record(&self, record: &ShardLogRecord) {
        if let Err(err) = emit_json_line(record) {
            tracing::warn!(
                endpoint = %record.endpoint,
                error = %err,
                "Failed to write request log"
            );
        }
    }
}

/// メモリに溜めるロガー（テスト用）
#[derive(Debug, Default)]
pub struct MemoryRequestLogger {
    records: Mutex<Vec<ShardLogRecord>>,
}

impl MemoryRequestLogger {
    /// 空のロガーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでに記録されたレコードのコピー
    pub fn records(&self) -> Vec<ShardLogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RequestLogger for MemoryRequestLogger {
    fn record(&self, record: &ShardLogRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
    }
}
