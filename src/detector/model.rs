use std::path::Path;

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::info;

/// 加载YOLO模型
///
/// 加载ONNX格式的YOLO模型，并应用优化配置。
///
/// # 参数
/// * `model_path` - 模型文件路径
///
/// # 错误处理
/// 模型文件不存在或无法被ONNX Runtime加载时返回Err
pub fn load_model(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("模型文件不存在: {}", model_path.display());
    }

    info!("正在加载模型: {}", model_path.display());

    let model = Session::builder()
        .context("无法创建会话构建器")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("无法设置优化级别")?
        .with_intra_threads(4)
        .context("无法设置线程数")?
        .commit_from_file(model_path)
        .with_context(|| format!("无法加载模型: {}", model_path.display()))?;

    Ok(model)
}
