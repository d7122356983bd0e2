//! 目标 URL 构造
//!
//! 标识符以百分号编码的片段形式附加在文章 URL 之后，
//! 标签页代理只能靠这个片段知道自己在处理哪个标识符。

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// 与 `encodeURIComponent` 相同的保留字符集
const FRAGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 构造某个标识符对应的标签页 URL
pub fn build_target_url(article_url: &str, identifier: &str) -> String {
    let base = article_url.split('#').next().unwrap_or(article_url);
    format!("{}#{}", base, utf8_percent_encode(identifier, FRAGMENT_SET))
}

/// 从标签页 URL 中取回标识符
pub fn identifier_from_url(url: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    let decoded = percent_decode_str(fragment).decode_utf8().ok()?;
    let identifier = decoded.trim();
    if identifier.is_empty() {
        None
    } else {
        Some(identifier.to_string())
    }
}
