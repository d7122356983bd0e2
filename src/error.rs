use thiserror::Error;

use crate::models::BatchStatus;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 标签页操作错误
    #[error("标签页错误: {0}")]
    Tab(#[from] TabError),
    /// 进度快照存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 用户资料错误
    #[error("资料错误: {0}")]
    Profile(#[from] ProfileError),
    /// 状态机错误
    #[error("编排错误: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
    /// 订阅浏览器事件失败
    #[error("订阅浏览器事件失败: {source}")]
    EventSubscriptionFailed {
        #[source]
        source: chromiumoxide::error::CdpError,
    },
}

/// 标签页操作错误
#[derive(Debug, Error)]
pub enum TabError {
    /// 创建标签页失败（例如弹窗被拦截）
    #[error("创建标签页失败 ({url}): {reason}")]
    CreationFailed { url: String, reason: String },
}

/// 进度快照存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读写文件失败
    #[error("快照文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 编解码失败
    #[error("快照 JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 用户资料错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// 字段为空
    #[error("字段 {field} 不能为空")]
    Missing { field: &'static str },
    /// 邮箱格式不正确
    #[error("邮箱格式不正确: {0}")]
    InvalidEmail(String),
    /// 手机号格式不正确
    #[error("手机号需为 7-15 位数字: {0}")]
    InvalidMobile(String),
    /// 用户名格式不正确
    #[error("用户名需为 1-30 个字符 (字母、数字、_ . -): {0}")]
    InvalidUsername(String),
}

/// 状态机错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// 只有 Running 状态下才能派发
    #[error("当前状态 {status:?} 下不能派发任务")]
    NotRunning { status: BatchStatus },
    /// 非法状态迁移
    #[error("非法状态迁移: {from:?} -> {to:?}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(port: u16, source: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed { port, source })
    }

    /// 创建浏览器启动错误
    pub fn browser_launch_failed(source: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::LaunchFailed { source })
    }
}

impl TabError {
    /// 创建标签页失败
    pub fn creation_failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        TabError::CreationFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
