//! アフィニティストア
//!
//! クライアントキーごとのスティッキー割り当てと、TTLを持たないローカリティヒント。
//! どちらのマップも削除しない（プロセス稼働中は増え続ける）。

use chrono::{DateTime, Duration, Utc};
use shardlb_common::types::ShardId;
use std::collections::HashMap;

/// スティッキー割り当て
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityEntry {
    /// 割り当て先シャード
    pub shard: ShardId,
    /// 割り当て時刻（再選択時のみ更新）
    pub assigned_at: DateTime<Utc>,
}

impl AffinityEntry {
    /// `now - assigned_at >= ttl` なら期限切れ
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.assigned_at) >= ttl
    }
}

/// クライアントキー → スティッキー割り当て / ローカリティヒント
#[derive(Debug, Clone, Default)]
pub struct AffinityStore {
    entries: HashMap<String, AffinityEntry>,
    locality: HashMap<String, ShardId>,
}

impl AffinityStore {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// スティッキー割り当てを取得（期限切れでもそのまま返す）
    pub fn get(&self, key: &str) -> Option<AffinityEntry> {
        self.entries.get(key).copied()
    }

    /// スティッキー割り当てを上書き
    pub fn set(&mut self, key: &str, shard: ShardId, now: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            AffinityEntry {
                shard,
                assigned_at: now,
            },
        );
    }

    /// ローカリティヒントを取得
    pub fn locality(&self, key: &str) -> Option<ShardId> {
        self.locality.get(key).copied()
    }

    /// ローカリティヒントを上書き
    pub fn set_locality(&mut self, key: &str, shard: ShardId) {
        self.locality.insert(key.to_string(), shard);
    }

    /// スティッキー割り当ての件数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// スティッキー割り当てが空か
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// ローカリティヒントの件数
    pub fn locality_len(&self) -> usize {
        self.locality.len()
    }
}
