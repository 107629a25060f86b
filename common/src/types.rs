//! 基本型定義
//!
//! シャードID、リソース次元、エンドポイント種別

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// バックエンドシャードの識別子
///
/// 列挙順 `cpu < mem < io` がすべてのタイブレークに使われる。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ShardId {
    /// CPU寄りのシャード
    Cpu,
    /// メモリ寄りのシャード
    Mem,
    /// IO寄りのシャード
    Io,
}

impl ShardId {
    /// タイブレーク順に並べた全シャード
    pub const ALL: [ShardId; 3] = [ShardId::Cpu, ShardId::Mem, ShardId::Io];

    /// 配列インデックス（0=cpu, 1=mem, 2=io）
    pub fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Mem => 1,
            Self::Io => 2,
        }
    }

    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Mem => "mem",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不明な識別子のパースエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown identifier: '{}'", self.0)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for ShardId {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(Self::Cpu),
            "mem" => Ok(Self::Mem),
            "io" => Ok(Self::Io),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

/// リソース次元
///
/// デマンドベクトル・利用率ベクトル・閾値のインデックスとして使う。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// CPU
    Cpu,
    /// メモリ
    Mem,
    /// IO
    Io,
}

impl Resource {
    /// 全リソース次元（タイブレーク順）
    pub const ALL: [Resource; 3] = [Resource::Cpu, Resource::Mem, Resource::Io];

    /// 配列インデックス（0=cpu, 1=mem, 2=io）
    pub fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Mem => 1,
            Self::Io => 2,
        }
    }

    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Mem => "mem",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// エンドポイント種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// 認証（CPU負荷が支配的）
    Auth,
    /// 特徴量（メモリ負荷が支配的）
    Features,
    /// ドキュメント（IO負荷が支配的）
    Document,
}

impl EndpointKind {
    /// 全エンドポイント種別
    pub const ALL: [EndpointKind; 3] = [
        EndpointKind::Auth,
        EndpointKind::Features,
        EndpointKind::Document,
    ];

    /// リクエストパスのプレフィックスから種別を判定する
    ///
    /// どれにも一致しないパスは `Auth` として扱う。
    pub fn from_path(path: &str) -> Self {
        if path.starts_with("/auth") {
            Self::Auth
        } else if path.starts_with("/features") {
            Self::Features
        } else if path.starts_with("/document") {
            Self::Document
        } else {
            Self::Auth
        }
    }

    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Features => "features",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(Self::Auth),
            "features" => Ok(Self::Features),
            "document" => Ok(Self::Document),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}
