//! 编排器消息协议
//!
//! - `Command`：控制端 → 编排器
//! - `AgentSignal`：标签页代理 → 编排器
//! - `Event`：编排器 → 控制端（尽力投递，接收方可能不存在）

use serde::{Deserialize, Serialize};

use crate::models::batch::TabHandle;
use crate::models::snapshot::PersistedProgress;

/// 控制端命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// 开始（或替换）一个批量任务
    Start { items: Vec<String> },
    /// 取消当前批量任务
    Cancel,
    /// 请求恢复最近的进度快照
    GetState,
}

/// 标签页代理对一次提交尝试的自我判断（仅用于日志，不参与计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentOutcome {
    /// 已提交且页面出现成功提示
    Submitted,
    /// 页面出现验证码
    Captcha,
    /// 未找到表单（超时）
    FormNotFound,
    /// 用户资料不完整，未填写
    MissingDetails,
    /// 无法判断
    Unknown,
}

/// 标签页代理信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentSignal {
    /// 本标签页的自动化已结束（每个标签页只发一次）
    FillDone { outcome: AgentOutcome },
    /// 请求关闭本标签页（尽力而为）
    CloseTab,
}

/// 编排器事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    ProgressUpdate {
        current: usize,
        total: usize,
        remaining: usize,
    },
    TabCreationError {
        identifier: String,
        failed: usize,
        total: usize,
    },
    BulkOperationComplete {
        total: usize,
        success: usize,
        failed: usize,
    },
    BulkOperationCancelled,
    OperationStateRestored {
        state: PersistedProgress,
    },
}

/// 编排器事件循环的统一输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorInput {
    Command(Command),
    /// `tab` 为 `None` 表示发送方信息缺失
    Agent {
        tab: Option<TabHandle>,
        signal: AgentSignal,
    },
    /// 任意标签页关闭（不一定是编排器打开的）
    TabRemoved(TabHandle),
}
