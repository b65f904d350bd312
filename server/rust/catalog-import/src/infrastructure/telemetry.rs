//! 構造化ログの初期化。
//!
//! format が "text" の場合はプレーンテキスト出力、それ以外は JSON 出力。
//! RUST_LOG が設定されていれば設定ファイルのレベルより優先する。

use tracing_subscriber::{
    fmt, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::infrastructure::config::LoggingConfig;

/// tracing-subscriber をグローバルに初期化する。2回目以降の呼び出しはエラーになる。
pub fn init_telemetry(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let registry = tracing_subscriber::registry().with(filter);

    if cfg.format == "text" {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    }
    Ok(())
}
