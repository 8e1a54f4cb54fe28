use anyhow::{Context, Result};
use ndarray::{Array2, Array4};
use ort::{inputs, session::Session, value::Tensor};

/// 运行模型推理
///
/// 使用ONNX模型对输入张量进行推理，返回按候选框排列的二维输出。
///
/// # 参数
/// * `model` - ONNX模型Session
/// * `input_name` - 模型输入节点名称
/// * `input` - 输入张量，形状应为(1, 3, height, width)
///
/// # 返回值
/// 形状为(num_boxes, 4 + num_classes)的数组，每行为[cx, cy, w, h, score_0, ...]
pub fn run_inference(model: &mut Session, input_name: &str, input: &Array4<f32>) -> Result<Array2<f32>> {
    let shape: Vec<usize> = input.shape().to_vec();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
        anyhow::bail!("输入张量形状错误: {:?}，应为 [1, 3, H, W]", shape);
    }

    let (data, _offset) = input.clone().into_raw_vec_and_offset();
    let input_tensor = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))
        .context("无法创建输入张量")?;
    let outputs = model
        .run(inputs![input_name => input_tensor])
        .context("模型推理失败")?;

    let (output_shape, output_data) = outputs[0]
        .try_extract_tensor::<f32>()
        .context("无法提取输出张量")?;
    let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();

    to_rows(&dims, output_data.to_vec())
}

/// 将模型原始输出整理为每行一个候选框
///
/// YOLOv8导出的输出形状为 [1, 4 + nc, N]，需要转置；
/// 部分导出为 [1, N, 4 + nc]，直接使用。候选框数量总是多于属性数量。
pub fn to_rows(dims: &[usize], data: Vec<f32>) -> Result<Array2<f32>> {
    if dims.len() != 3 || dims[0] != 1 {
        anyhow::bail!("模型输出形状不符合预期: {:?}", dims);
    }

    let array = Array2::from_shape_vec((dims[1], dims[2]), data).context("无法重塑模型输出")?;

    let rows = if dims[1] < dims[2] { array.reversed_axes() } else { array };
    if rows.ncols() < 5 {
        anyhow::bail!("模型输出属性数量过少: {}", rows.ncols());
    }

    Ok(rows.as_standard_layout().to_owned())
}
