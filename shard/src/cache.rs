//! TTL付きキャッシュ
//!
//! 上限を超えたら最も古く挿入されたエントリから追い出す。
//! 同じキーを再挿入すると挿入順の末尾へ移動する。

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// TTLと件数上限を持つキャッシュ
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    capacity: usize,
    entries: HashMap<String, CacheEntry<V>>,
    /// 挿入順（seq → key）
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<V> TtlCache<V> {
    /// 空のキャッシュを作成
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// 値を参照する。期限切れなら削除してミス扱い
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.get_mut(key).map(|value| &*value)
    }

    /// 値を可変参照する。期限切れなら削除してミス扱い
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let expired = self.entries.get(key)?.is_expired(self.ttl, Instant::now());
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    /// 値を挿入し、上限を超えた分を古い順に追い出す
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.remove(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                seq,
            },
        );

        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// エントリを削除する
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry.value)
    }

    /// 保持件数（期限切れ未回収分を含む）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 件数上限
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
