//! キャッシュミス時の実処理
//!
//! - auth: PBKDF2-HMAC-SHA512による鍵導出（CPU）
//! - features: 大きなバッファの確保とページタッチ（メモリ）
//! - document: `DOC_DIR/<id>.json` の読み込みとパース（IO）
//!
//! 模擬モードではCPU/メモリ処理を固定スリープに置き換える。

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use shardlb_common::config::{ShardConfig, WorkMode};
use shardlb_common::error::{ShardError, ShardResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 鍵導出を区切る反復数
pub const KEY_CHUNK: u64 = 4000;

/// 1チャンクあたりのPBKDF2ラウンド数
pub const ROUNDS_PER_CHUNK: u32 = 5000;

/// 1チャンクで導出する鍵の長さ（バイト）
pub const KEY_LEN: usize = 32;

/// ページタッチの間隔（バイト）
pub const PAGE_STRIDE: usize = 4096;

/// 模擬モードで返す特徴量ベクトルのサイズ
pub const SIMULATED_FEATURE_BYTES: usize = 64;

const KEY_SALT: &[u8] = b"salt";

/// チャンク1つ分の鍵を導出する
///
/// パスワードは `pw<offset>`、ソルトは固定の `salt`。
pub fn derive_chunk_key(offset: u64) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha512>(
        format!("pw{offset}").as_bytes(),
        KEY_SALT,
        ROUNDS_PER_CHUNK,
        &mut key,
    );
    key
}

/// PBKDF2-HMAC-SHA512で鍵素材を導出する
///
/// `iterations` を [`KEY_CHUNK`] ごとに区切って各チャンクの鍵を導出し、XORで畳み込む。
pub fn derive_key_material(iterations: u64) -> [u8; KEY_LEN] {
    let mut material = [0u8; KEY_LEN];
    for offset in (0..iterations).step_by(KEY_CHUNK as usize) {
        let key = derive_chunk_key(offset);
        for (out, byte) in material.iter_mut().zip(key.iter()) {
            *out ^= byte;
        }
    }
    material
}

/// `bytes` バイトのバッファを確保し、ページごとに1バイト書き込む
pub fn make_feature_vector(bytes: usize) -> Vec<u8> {
    let mut vector = vec![0u8; bytes];
    for i in (0..vector.len()).step_by(PAGE_STRIDE) {
        vector[i] = vector[i].wrapping_add(1);
    }
    vector
}

/// キャッシュヒット時の軽いタッチ
pub fn touch_feature_vector(vector: &mut [u8]) {
    if let Some(first) = vector.first_mut() {
        *first ^= 0x1;
    }
}

/// ドキュメントIDを `d<数字>` 形式に正規化する
///
/// 最初の数字の並びを使い、数字が無ければ `d0`。
pub fn normalize_doc_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        "d0".to_string()
    } else {
        format!("d{digits}")
    }
}

/// `dir/<id>.json` を読み込んでパースする
///
/// 読めない・パースできない場合はいずれも [`ShardError::DocumentNotFound`]。
pub async fn load_document(dir: &Path, id: &str) -> ShardResult<serde_json::Value> {
    let path = dir.join(format!("{id}.json"));
    let data = tokio::fs::read(&path).await.map_err(|err| {
        tracing::debug!(path = %path.display(), error = %err, "Document read failed");
        ShardError::DocumentNotFound(id.to_string())
    })?;
    serde_json::from_slice(&data).map_err(|err| {
        tracing::debug!(path = %path.display(), error = %err, "Document parse failed");
        ShardError::DocumentNotFound(id.to_string())
    })
}

/// 設定に従ってキャッシュミス時の処理を実行する
#[derive(Debug, Clone)]
pub struct Worker {
    mode: WorkMode,
    auth_iter: u64,
    feat_bytes: usize,
    doc_dir: PathBuf,
    simulated: Duration,
}

impl Worker {
    /// シャード設定から作成
    pub fn from_config(config: &ShardConfig) -> Self {
        Self {
            mode: config.work_mode,
            auth_iter: config.auth_iter,
            feat_bytes: config.feat_bytes,
            doc_dir: PathBuf::from(&config.doc_dir),
            simulated: Duration::from_millis(config.simulated_ms),
        }
    }

    /// 実行モード
    pub fn mode(&self) -> WorkMode {
        self.mode
    }

    /// 認証処理（CPU）
    pub async fn authenticate(&self) -> ShardResult<()> {
        match self.mode {
            WorkMode::Simulated => {
                tokio::time::sleep(self.simulated).await;
                Ok(())
            }
            WorkMode::Real => {
                let iterations = self.auth_iter;
                tokio::task::spawn_blocking(move || derive_key_material(iterations))
                    .await
                    .map(|_| ())
                    .map_err(|err| ShardError::Work(format!("key derivation task failed: {err}")))
            }
        }
    }

    /// 特徴量ベクトルの生成（メモリ）
    pub async fn build_features(&self) -> ShardResult<Vec<u8>> {
        match self.mode {
            WorkMode::Simulated => {
                tokio::time::sleep(self.simulated).await;
                Ok(vec![0u8; SIMULATED_FEATURE_BYTES])
            }
            WorkMode::Real => {
                let bytes = self.feat_bytes;
                tokio::task::spawn_blocking(move || make_feature_vector(bytes))
                    .await
                    .map_err(|err| ShardError::Work(format!("feature build task failed: {err}")))
            }
        }
    }

    /// ドキュメントの読み込み（IO）
    ///
    /// 模擬モードでもファイルは実際に読む。
    pub async fn fetch_document(&self, id: &str) -> ShardResult<serde_json::Value> {
        if self.mode == WorkMode::Simulated {
            tokio::time::sleep(self.simulated).await;
        }
        load_document(&self.doc_dir, id).await
    }
}
