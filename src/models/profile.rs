//! 用户资料与批量输入解析

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// 提交表单时使用的用户资料
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
}

impl Profile {
    /// 三个字段是否都已填写
    pub fn is_complete(&self) -> bool {
        [&self.username, &self.email, &self.mobile]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    /// 校验并返回清洗后的资料
    pub fn validated(&self) -> Result<Profile, ProfileError> {
        let username = self.username.trim();
        let email = self.email.trim();
        let mobile = self.mobile.trim();

        if username.is_empty() {
            return Err(ProfileError::Missing { field: "username" });
        }
        if email.is_empty() {
            return Err(ProfileError::Missing { field: "email" });
        }
        if mobile.is_empty() {
            return Err(ProfileError::Missing { field: "mobile" });
        }
        if !validate_email(email) {
            return Err(ProfileError::InvalidEmail(email.to_string()));
        }
        if !validate_mobile(mobile) {
            return Err(ProfileError::InvalidMobile(mobile.to_string()));
        }
        let sanitized = sanitize_username(username);
        if !validate_username(&sanitized) {
            return Err(ProfileError::InvalidUsername(username.to_string()));
        }

        Ok(Profile {
            username: sanitized,
            email: email.to_string(),
            mobile: mobile.to_string(),
        })
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"))
}

fn mobile_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{7,15}$").expect("mobile regex"))
}

pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

/// 允许 `+`、空格、`-`、括号，剩余必须是 7-15 位数字
pub fn validate_mobile(mobile: &str) -> bool {
    let cleaned: String = mobile
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    mobile_regex().is_match(&cleaned)
}

/// 去掉 `[A-Za-z0-9._-]` 以外的字符
pub fn sanitize_username(username: &str) -> String {
    username
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

pub fn validate_username(username: &str) -> bool {
    let len = sanitize_username(username).len();
    (1..=30).contains(&len)
}

/// 批量用户名解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub usernames: Vec<String>,
    pub duplicates_removed: usize,
}

/// 按行解析用户名列表
///
/// 跳过空行和 `#` 注释，清洗后丢弃非法项，保留首次出现的顺序去重。
pub fn parse_usernames(text: &str) -> ParsedBatch {
    let raw: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .map(sanitize_username)
        .filter(|s| validate_username(s))
        .collect();

    let mut seen = HashSet::new();
    let usernames: Vec<String> = raw
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect();

    ParsedBatch {
        duplicates_removed: raw.len() - usernames.len(),
        usernames,
    }
}
