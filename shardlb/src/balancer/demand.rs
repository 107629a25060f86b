//! デマンドモデル
//!
//! エンドポイント種別ごとの静的なリソースコストベクトル。

use super::utilization::UtilizationVector;
use shardlb_common::types::{EndpointKind, Resource};

/// 1リクエストあたりの相対リソースコスト `(cpu, mem, io)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandVector {
    /// CPU成分
    pub cpu: f64,
    /// メモリ成分
    pub mem: f64,
    /// IO成分
    pub io: f64,
}

impl DemandVector {
    /// 新しいデマンドベクトルを作成
    pub const fn new(cpu: f64, mem: f64, io: f64) -> Self {
        Self { cpu, mem, io }
    }

    /// `[cpu, mem, io]` 配列として返す
    pub fn as_array(&self) -> [f64; 3] {
        [self.cpu, self.mem, self.io]
    }

    /// 指定リソースの成分
    pub fn component(&self, resource: Resource) -> f64 {
        self.as_array()[resource.index()]
    }

    /// 支配的リソース（最大成分、同値は cpu, mem, io の順）
    pub fn dominant(&self) -> Resource {
        if self.cpu >= self.mem && self.cpu >= self.io {
            Resource::Cpu
        } else if self.mem >= self.cpu && self.mem >= self.io {
            Resource::Mem
        } else {
            Resource::Io
        }
    }

    /// 利用率ベクトルとの内積（負荷スコア L）
    pub fn dot(&self, utilization: &UtilizationVector) -> f64 {
        self.cpu * utilization.cpu + self.mem * utilization.mem + self.io * utilization.io
    }
}

/// エンドポイント種別 → デマンドベクトル
///
/// プロセス稼働中は不変。
#[derive(Debug, Clone, PartialEq)]
pub struct DemandModel {
    auth: DemandVector,
    features: DemandVector,
    document: DemandVector,
}

impl DemandModel {
    /// authのデマンド
    pub const AUTH: DemandVector = DemandVector::new(0.80, 0.15, 0.05);
    /// featuresのデマンド
    pub const FEATURES: DemandVector = DemandVector::new(0.15, 0.80, 0.05);
    /// documentのデマンド
    pub const DOCUMENT: DemandVector = DemandVector::new(0.15, 0.25, 0.60);

    /// 任意のベクトルでモデルを作成
    pub fn new(auth: DemandVector, features: DemandVector, document: DemandVector) -> Self {
        Self {
            auth,
            features,
            document,
        }
    }

    /// エンドポイント種別のデマンドを返す
    pub fn demand(&self, kind: EndpointKind) -> DemandVector {
        match kind {
            EndpointKind::Auth => self.auth,
            EndpointKind::Features => self.features,
            EndpointKind::Document => self.document,
        }
    }
}

impl Default for DemandModel {
    fn default() -> Self {
        Self::new(Self::AUTH, Self::FEATURES, Self::DOCUMENT)
    }
}
