//! 检测适配模块 - 基于YOLO的目标检测
//!
//! 该模块提供了一整套目标检测功能，包括：
//! - 模型加载
//! - 图像预处理
//! - 模型推理
//! - 结果后处理
//! - 可视化绘制与结果保存
//!
//! 上传处理只依赖 [`Detector`] trait，检测器在启动时创建一次后注入。
//!
//! # 示例
//!
//! ```no_run
//! use std::path::Path;
//! use yolo_upload::config::Config;
//! use yolo_upload::detector::{Detector, YoloDetector};
//!
//! # fn main() -> anyhow::Result<()> {
//! let detector = YoloDetector::from_config(&Config::default())?;
//! detector.predict(Path::new("static/uploads/cat.jpg"), Path::new("static/results"), "prediction")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use anyhow::Result;

pub mod bounds;
pub mod detect;
pub mod draw;
pub mod infer;
pub mod labels;
pub mod model;
pub mod posts;
pub mod prevs;

pub use bounds::{BoundingBox, Detection};
pub use detect::YoloDetector;
pub use draw::draw_detections;
pub use model::load_model;
pub use prevs::{image_to_tensor, resize_image};

/// 目标检测器
///
/// `predict` 读取 `source` 图像，绘制检测结果后写入
/// `project/name/<source文件名>`。推理是同步阻塞调用。
pub trait Detector: Send + Sync {
    fn predict(&self, source: &Path, project: &Path, name: &str) -> Result<()>;
}

/// 模型加载失败时使用的占位检测器，每次调用都返回错误
#[derive(Debug, Clone)]
pub struct UnavailableDetector {
    reason: String,
}

impl UnavailableDetector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl Detector for UnavailableDetector {
    fn predict(&self, source: &Path, _project: &Path, _name: &str) -> Result<()> {
        anyhow::bail!("检测模型不可用 ({}), 无法处理 {}", self.reason, source.display())
    }
}

/// 加载检测器；失败时记录错误并返回 [`UnavailableDetector`]，服务继续运行
pub fn load_or_unavailable(config: &crate::config::Config) -> std::sync::Arc<dyn Detector> {
    match YoloDetector::from_config(config) {
        Ok(detector) => std::sync::Arc::new(detector),
        Err(e) => {
            tracing::error!("加载YOLO模型失败: {:#}", e);
            std::sync::Arc::new(UnavailableDetector::new(format!("{:#}", e)))
        }
    }
}
