use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use yolo_upload::{AppState, Config, ensure_dirs, load_or_unavailable, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yolo_upload=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;
    ensure_dirs(&config)?;

    // 模型只在启动时加载一次；加载失败不退出，之后的每次检测都会失败
    let detector = load_or_unavailable(&config);

    serve(AppState::new(config, detector)).await
}
