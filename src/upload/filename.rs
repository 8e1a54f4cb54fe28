use std::path::Path;

use unicode_normalization::UnicodeNormalization;

use crate::config::{ALLOWED_EXTENSIONS, Config, STATIC_ROUTE};

/// 检查文件扩展名是否在允许列表中（不区分大小写）
///
/// 文件名中必须含有 `.`，取最后一个 `.` 之后的部分作为扩展名。
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// 将客户端提供的文件名转换为可以安全保存的文件名
///
/// 规则：
/// 1. 做 NFKD 分解后丢弃非ASCII字符（`é` 变为 `e`）
/// 2. 路径分隔符 `/` 与 `\` 视为空白
/// 3. 以空白切分后用 `_` 连接
/// 4. 删除 `[A-Za-z0-9_.-]` 之外的字符
/// 5. 去掉首尾的 `.` 与 `_`
///
/// 结果不含任何路径分隔符，可能为空字符串。
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// 将路径转换为网页中使用的形式，分隔符统一为 `/`
pub fn web_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// 静态目录中文件的访问地址，例如 `/static/uploads/cat.jpg`
///
/// 路径不在 `static_dir` 之下时返回 `None`。
pub fn static_url(config: &Config, path: &Path) -> Option<String> {
    let relative = config.static_relative(path)?;
    Some(format!("{}/{}", STATIC_ROUTE, web_path(relative)))
}
