//! 边界框处理模块
//!
//! 负责处理模型输出，进行坐标转换、置信度过滤和非极大值抑制(NMS)等后处理操作。

use ndarray::{Array2, Axis};

use crate::detector::bounds::{BoundingBox, Detection};
use crate::detector::labels::class_name;

/// 后处理参数
#[derive(Debug, Clone, Copy)]
pub struct PostProcess<'a> {
    /// 原始图像宽度
    pub img_width: f32,
    /// 原始图像高度
    pub img_height: f32,
    /// 模型输入宽度
    pub input_width: usize,
    /// 模型输入高度
    pub input_height: usize,
    /// 置信度阈值
    pub confidence_threshold: f32,
    /// NMS阈值
    pub nms_threshold: f32,
    /// 类别名称表
    pub labels: &'a [&'a str],
}

/// 处理模型输出，应用置信度和NMS阈值
///
/// # 参数
/// * `output` - 模型输出，形状为(num_boxes, 4 + num_classes)，每行为[cx, cy, w, h, scores...]
/// * `params` - 图像尺寸、阈值和类别名称
///
/// # 返回值
/// 按置信度降序排列的检测结果，坐标相对于原始图像
pub fn process_detections(output: &Array2<f32>, params: &PostProcess<'_>) -> Vec<Detection> {
    let mut detections = Vec::new();

    // YOLO模型输出的是相对于输入图像尺寸的坐标，需要换算回原始图像
    let scale_x = params.img_width / params.input_width as f32;
    let scale_y = params.img_height / params.input_height as f32;

    for row in output.axis_iter(Axis(0)) {
        let Some((class_id, confidence)) = best_class(row.iter().skip(4).copied()) else {
            continue;
        };
        if confidence < params.confidence_threshold {
            continue;
        }

        let bbox = BoundingBox::from_center(row[0], row[1], row[2], row[3])
            .scale(scale_x, scale_y)
            .clamp(params.img_width, params.img_height);
        if !bbox.is_valid() {
            continue;
        }

        detections.push(Detection::new(
            bbox,
            class_id,
            class_name(params.labels, class_id),
            confidence,
        ));
    }

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    apply_nms(detections, params.nms_threshold)
}

/// 返回得分最高的类别及其得分
fn best_class(scores: impl Iterator<Item = f32>) -> Option<(usize, f32)> {
    scores
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// 应用非极大值抑制
///
/// 输入需已按置信度降序排列。只在同一类别内抑制重叠度达到阈值的框。
fn apply_nms(detections: Vec<Detection>, nms_threshold: f32) -> Vec<Detection> {
    let mut suppressed = vec![false; detections.len()];
    let mut result = Vec::new();

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_id != detections[i].class_id {
                continue;
            }
            if detections[i].bbox.iou(&detections[j].bbox) >= nms_threshold {
                suppressed[j] = true;
            }
        }

        result.push(detections[i].clone());
    }

    result
}
