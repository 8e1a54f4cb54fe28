//! 上传页面的请求处理
//!
//! POST 的完整流程在 [`process_upload`] 中，返回带标签的 [`UploadOutcome`]，
//! 再由 [`upload`] 转换为 HTTP 响应。

use std::path::Path;
use std::sync::Arc;

use askama::Template;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, OriginalUri, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, info};

use crate::config::{Config, PREDICTION_SUBFOLDER};
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::upload::filename::{allowed_file, secure_filename, static_url};
use crate::upload::template::{IndexTemplate, RequestContext};

/// 客户端上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// 客户端提供的原始文件名
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), bytes: bytes.into() }
    }
}

/// 一次 POST 请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 没有 `file` 字段或文件名为空，重定向回原地址
    Redirect,
    /// 扩展名不允许或文件名清理后为空；不写入任何文件，重新显示空表单
    ///
    /// 页面上不会提示用户文件被拒绝。
    Rejected { filename: String },
    /// 文件已保存并完成检测
    Processed(RequestContext),
}

/// 从 multipart 请求体中取出 `file` 字段
///
/// 没有文件名的同名字段（普通文本字段）视为不存在，其余字段忽略。
pub async fn read_upload(mut multipart: Multipart) -> Result<Option<UploadedFile>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile { filename, bytes }));
    }
    Ok(None)
}

/// 处理一次上传
///
/// 1. 校验扩展名并清理文件名
/// 2. 保存到 `<upload_dir>/<文件名>`，同名文件直接覆盖
/// 3. 调用检测器，结果写入 `<results_dir>/prediction/`
/// 4. 结果文件不存在时以原图代替
pub async fn process_upload(state: &AppState, file: Option<UploadedFile>) -> Result<UploadOutcome> {
    let Some(file) = file else {
        debug!("请求中没有 file 字段");
        return Ok(UploadOutcome::Redirect);
    };
    if file.filename.is_empty() {
        debug!("未选择文件");
        return Ok(UploadOutcome::Redirect);
    }

    if !allowed_file(&file.filename) {
        info!("忽略不允许的文件类型: {}", file.filename);
        return Ok(UploadOutcome::Rejected { filename: file.filename });
    }

    let filename = secure_filename(&file.filename);
    if filename.is_empty() {
        info!("文件名清理后为空: {}", file.filename);
        return Ok(UploadOutcome::Rejected { filename: file.filename });
    }

    let config = &state.config;
    let original_path = config.upload_dir.join(&filename);
    let result_path = config.prediction_dir().join(&filename);

    // 写入前先确定两张图片的访问地址
    let original_image = public_url(config, &original_path)?;
    let result_image = public_url(config, &result_path)?;

    tokio::fs::write(&original_path, &file.bytes).await?;
    info!("已保存上传文件: {} ({} 字节)", original_path.display(), file.bytes.len());

    let detector = Arc::clone(&state.detector);
    let source = original_path.clone();
    let project = config.results_dir.clone();
    tokio::task::spawn_blocking(move || detector.predict(&source, &project, PREDICTION_SUBFOLDER)).await??;

    let result_image = if tokio::fs::try_exists(&result_path).await? {
        result_image
    } else {
        debug!("未找到检测结果 {}，使用原图代替", result_path.display());
        original_image.clone()
    };

    Ok(UploadOutcome::Processed(RequestContext { original_image, result_image }))
}

fn public_url(config: &Config, path: &Path) -> Result<String> {
    static_url(config, path).ok_or_else(|| AppError::OutsideStatic(path.to_path_buf()))
}

/// GET / - 显示上传表单
pub async fn show_form() -> Result<Html<String>> {
    Ok(Html(IndexTemplate::form().render()?))
}

/// POST / - 上传图片并显示检测结果
pub async fn upload(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    // 非 multipart 请求（空请求体、urlencoded 表单）等同于没有 file 字段
    let file = match multipart {
        Ok(multipart) => read_upload(multipart).await?,
        Err(MultipartRejection::InvalidBoundary(_)) => {
            debug!("请求体不是 multipart/form-data");
            None
        }
        Err(rejection) => return Ok(rejection.into_response()),
    };

    match process_upload(&state, file).await? {
        UploadOutcome::Redirect => Ok(redirect_to(&uri)),
        UploadOutcome::Rejected { .. } => Ok(show_form().await?.into_response()),
        UploadOutcome::Processed(context) => {
            Ok(Html(IndexTemplate::with_images(&context).render()?).into_response())
        }
    }
}

fn redirect_to(uri: &Uri) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, uri.to_string())]).into_response()
}
