//! serve サブコマンド
//!
//! ルーターサーバーを起動します。

use clap::Args;

/// serve サブコマンドの引数
///
/// 未指定の場合は環境変数（旧名を含む）とデフォルト値を使う。
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long, env = "SHARDLB_PORT")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long, env = "SHARDLB_HOST")]
    pub host: Option<String>,
}
