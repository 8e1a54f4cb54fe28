use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use anyhow::bail;
use clap::Parser;

// 目标检测超参数配置
pub const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
pub const DEFAULT_INPUT_SIZE: usize = 640;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.7;
// 输入边长必须是模型最大下采样步长的整数倍
pub const INPUT_SIZE_STRIDE: usize = 32;

// 文件与目录
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
pub const PREDICTION_SUBFOLDER: &str = "prediction";
pub const STATIC_ROUTE: &str = "/static";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// 服务运行配置
///
/// 所有字段都可以通过命令行参数或 `YOLO_UPLOAD_*` 环境变量设置。
#[derive(Debug, Clone, Parser)]
#[command(name = "yolo-upload", version, about = "上传图片并运行YOLO目标检测")]
pub struct Config {
    /// 监听地址
    #[arg(long, env = "YOLO_UPLOAD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// 监听端口
    #[arg(long, env = "YOLO_UPLOAD_PORT", default_value_t = 5000)]
    pub port: u16,

    /// 通过 /static 对外提供的静态目录
    #[arg(long, env = "YOLO_UPLOAD_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// 原始上传图片的保存目录
    #[arg(long, env = "YOLO_UPLOAD_UPLOAD_DIR", default_value = "static/uploads")]
    pub upload_dir: PathBuf,

    /// 检测结果根目录，结果写入其下的 prediction 子目录
    #[arg(long, env = "YOLO_UPLOAD_RESULTS_DIR", default_value = "static/results")]
    pub results_dir: PathBuf,

    /// ONNX格式的YOLO模型路径
    #[arg(long, env = "YOLO_UPLOAD_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// 置信度阈值
    #[arg(long, env = "YOLO_UPLOAD_CONFIDENCE", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_parser = parse_unit_interval)]
    pub confidence_threshold: f32,

    /// NMS阈值
    #[arg(long, env = "YOLO_UPLOAD_NMS", default_value_t = DEFAULT_NMS_THRESHOLD, value_parser = parse_unit_interval)]
    pub nms_threshold: f32,

    /// 模型输入边长（正方形，32 的整数倍）
    #[arg(long, env = "YOLO_UPLOAD_INPUT_SIZE", default_value_t = DEFAULT_INPUT_SIZE, value_parser = parse_input_size)]
    pub input_size: usize,

    /// 请求体最大字节数
    #[arg(long, env = "YOLO_UPLOAD_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl Config {
    /// 解析监听地址
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }

    /// 检测结果实际所在的目录：`<results_dir>/prediction`
    pub fn prediction_dir(&self) -> PathBuf {
        self.results_dir.join(PREDICTION_SUBFOLDER)
    }

    /// 检查配置
    ///
    /// 命令行解析时已经检查过数值范围；直接构造的配置在这里再检查一次。
    /// 页面中的图片通过 [`STATIC_ROUTE`] 访问，所以上传目录和结果目录都必须位于 `static_dir` 之下。
    pub fn validate(&self) -> anyhow::Result<()> {
        check_input_size(self.input_size).map_err(anyhow::Error::msg)?;
        check_unit_interval(self.confidence_threshold).map_err(anyhow::Error::msg)?;
        check_unit_interval(self.nms_threshold).map_err(anyhow::Error::msg)?;

        for (name, dir) in [("upload_dir", &self.upload_dir), ("results_dir", &self.results_dir)] {
            if self.static_relative(dir).is_none() {
                bail!(
                    "{} ({}) 必须位于静态目录 {} 之下",
                    name,
                    dir.display(),
                    self.static_dir.display()
                );
            }
        }
        Ok(())
    }

    /// 路径相对于 `static_dir` 的部分；不在其下或含有 `..` 时为 `None`
    pub fn static_relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        let relative = path.strip_prefix(&self.static_dir).ok()?;
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then_some(relative)
    }

    /// 以给定根目录构造配置，其余字段取默认值
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let static_dir = root.into();
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            upload_dir: static_dir.join("uploads"),
            results_dir: static_dir.join("results"),
            static_dir,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_root("static")
    }
}

fn check_input_size(size: usize) -> Result<(), String> {
    if size == 0 || size % INPUT_SIZE_STRIDE != 0 {
        return Err(format!("模型输入边长必须是 {} 的正整数倍，实际为 {}", INPUT_SIZE_STRIDE, size));
    }
    Ok(())
}

fn check_unit_interval(value: f32) -> Result<(), String> {
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("阈值必须在 0.0 到 1.0 之间，实际为 {}", value));
    }
    Ok(())
}

fn parse_input_size(s: &str) -> Result<usize, String> {
    let size = s.parse::<usize>().map_err(|e| e.to_string())?;
    check_input_size(size)?;
    Ok(size)
}

fn parse_unit_interval(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    check_unit_interval(value)?;
    Ok(value)
}
