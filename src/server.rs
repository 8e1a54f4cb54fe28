use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, STATIC_ROUTE};
use crate::detector::Detector;
use crate::upload::handler::{show_form, upload};

/// 请求处理共享的状态
///
/// 检测器在启动时创建一次并注入，之后不会重新加载。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub detector: Arc<dyn Detector>,
}

impl AppState {
    pub fn new(config: Config, detector: Arc<dyn Detector>) -> Self {
        Self { config: Arc::new(config), detector }
    }
}

/// 创建上传目录和结果目录（已存在时不做任何事）
pub fn ensure_dirs(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.results_dir)?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(show_form).post(upload))
        .nest_service(STATIC_ROUTE, static_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动HTTP服务，直到进程退出
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.listen_addr()?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("服务已启动: http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
