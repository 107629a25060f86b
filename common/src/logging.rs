//! ロギング初期化ユーティリティ
//!
//! tracingの出力はstderrへ、JSON Linesレコードはstdoutへ書き出す。

use crate::error::CommonResult;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログレベル指定に使う環境変数
pub const LOG_LEVEL_ENV: &str = "SHARDLB_LOG_LEVEL";

/// tracingサブスクライバを初期化する
///
/// `SHARDLB_LOG_LEVEL`、次に `RUST_LOG` を参照し、どちらも無ければ
/// `default_directives` を使う。
pub fn init(default_directives: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

/// レコードを1行のJSONとして書き出す
pub fn write_json_line<W: Write, T: Serialize>(writer: &mut W, record: &T) -> CommonResult<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// レコードを1行のJSONとしてstdoutへ書き出す
pub fn emit_json_line<T: Serialize>(record: &T) -> CommonResult<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_json_line(&mut handle, record)
}
