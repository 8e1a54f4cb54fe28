use askama::Template;

/// 单次请求的图片访问地址，例如 `/static/uploads/cat.jpg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub original_image: String,
    pub result_image: String,
}

/// 上传页面
///
/// 路径只由配置的目录和经过 `secure_filename` 处理的文件名组成，模板中不再转义。
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub context: Option<&'a RequestContext>,
}

impl<'a> IndexTemplate<'a> {
    pub fn form() -> Self {
        Self { context: None }
    }

    pub fn with_images(context: &'a RequestContext) -> Self {
        Self { context: Some(context) }
    }
}
