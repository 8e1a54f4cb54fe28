use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// 请求处理过程中未被单独处理的错误
///
/// 这些错误不会以任何结构化形式反馈给用户，只记录日志并返回 500。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("无法解析上传数据: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("文件写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("目标检测失败: {0:#}")]
    Detection(#[from] anyhow::Error),

    #[error("检测任务异常退出: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("页面渲染失败: {0}")]
    Template(#[from] askama::Error),

    #[error("图片不在静态目录中: {}", .0.display())]
    OutsideStatic(std::path::PathBuf),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // 请求体格式错误由框架给出 4xx
            AppError::Multipart(e) => {
                tracing::warn!("无法解析上传数据: {}", e);
                e.into_response()
            }
            other => {
                tracing::error!("请求处理失败: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
