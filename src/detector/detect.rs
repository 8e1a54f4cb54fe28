use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::Session;
use tracing::{debug, info};

use crate::config::Config;
use crate::detector::Detector;
use crate::detector::bounds::Detection;
use crate::detector::draw::draw_detections;
use crate::detector::infer::run_inference;
use crate::detector::labels::COCO_CLASSES;
use crate::detector::model::load_model;
use crate::detector::posts::{PostProcess, process_detections};
use crate::detector::prevs::{image_to_tensor, resize_image};

/// YOLO目标检测器
///
/// 封装了完整的检测流程，包括图像预处理、模型推理和结果后处理。
/// 会话放在互斥锁之后，同一时刻只执行一次推理。
pub struct YoloDetector {
    /// ONNX模型会话
    model: Mutex<Session>,
    /// 模型输入节点名称
    input_name: String,
    /// 模型输入宽度
    input_width: usize,
    /// 模型输入高度
    input_height: usize,
    /// 置信度阈值，低于此值的检测结果将被过滤
    confidence_threshold: f32,
    /// NMS（非极大值抑制）阈值，用于去除重复检测
    nms_threshold: f32,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("input_name", &self.input_name)
            .field("input_width", &self.input_width)
            .field("input_height", &self.input_height)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("nms_threshold", &self.nms_threshold)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// 由已加载的会话创建检测器
    pub fn new(model: Session, input_width: usize, input_height: usize) -> Self {
        let input_name = model
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        Self {
            model: Mutex::new(model),
            input_name,
            input_width,
            input_height,
            confidence_threshold: crate::config::DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: crate::config::DEFAULT_NMS_THRESHOLD,
        }
    }

    /// 按配置加载模型并创建检测器
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = load_model(&config.model_path)?;
        let detector = Self::new(model, config.input_size, config.input_size)
            .with_confidence_threshold(config.confidence_threshold)
            .with_nms_threshold(config.nms_threshold);

        info!(
            "模型加载完成: {} (输入 {}x{}, 输入节点 {})",
            config.model_path.display(),
            detector.input_width,
            detector.input_height,
            detector.input_name
        );
        Ok(detector)
    }

    /// 设置置信度阈值，取值范围由 [`Config`] 解析时检查
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// 设置NMS阈值，取值范围由 [`Config`] 解析时检查
    pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
        self.nms_threshold = threshold;
        self
    }

    /// 完整的检测流程：从图像到检测结果
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<Detection>> {
        let (img_width, img_height) = img.dimensions();
        let resized_img = resize_image(img, self.input_width as u32, self.input_height as u32);
        let input_tensor = image_to_tensor(&resized_img, self.input_height, self.input_width);

        let start_time = Instant::now();
        let output = {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow::anyhow!("模型会话锁已损坏"))?;
            run_inference(&mut model, &self.input_name, &input_tensor)?
        };
        debug!("模型推理耗时: {:?}", start_time.elapsed());

        let params = PostProcess {
            img_width: img_width as f32,
            img_height: img_height as f32,
            input_width: self.input_width,
            input_height: self.input_height,
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            labels: &COCO_CLASSES,
        };
        Ok(process_detections(&output, &params))
    }
}

impl Detector for YoloDetector {
    fn predict(&self, source: &Path, project: &Path, name: &str) -> Result<()> {
        let file_name = source
            .file_name()
            .with_context(|| format!("源路径没有文件名: {}", source.display()))?;

        let image = image::open(source).with_context(|| format!("无法加载图像: {}", source.display()))?;
        let detections = self.detect(&image)?;
        info!("{}: 检测到 {} 个目标", source.display(), detections.len());
        for detection in &detections {
            debug!(
                "{} - 置信度: {:.2} - 位置: ({:.1}, {:.1}, {:.1}, {:.1})",
                detection.class_name,
                detection.confidence,
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2
            );
        }

        let annotated = draw_detections(&image, &detections)?;

        let output_dir = project.join(name);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;
        let output_path = output_dir.join(file_name);

        // JPEG 不支持 alpha 通道，统一以 RGB 保存
        DynamicImage::ImageRgb8(annotated.to_rgb8())
            .save(&output_path)
            .with_context(|| format!("无法保存结果图像: {}", output_path.display()))?;

        debug!("结果已保存到: {}", output_path.display());
        Ok(())
    }
}
