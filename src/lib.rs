//! # Streak Restore
//!
//! 按用户名列表批量提交"恢复连续记录"申请表单的自动化工具
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有单个标签页的 Page，只暴露能力
//! - `JsExecutor` - 提供 eval() / url() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `TabDriver` - 打开 / 关闭标签页
//! - `SnapshotStore` - 读写进度快照
//! - `EventNotifier` - 尽力通知控制端
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个标签页"的完整处理流程
//! - `TabAgent` - 文章页 → 表单 → 填写 → 提交 → 结果判断 → fillDone
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/bulk_orchestrator` - 批量状态机，一次一个标签页
//! - `orchestrator/app` - 运行时和命令行控制端
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{BatchStatus, Command, Event, PersistedProgress, Profile, TabHandle};
pub use orchestrator::{App, BulkOrchestrator, OrchestratorSettings};
pub use workflow::TabAgent;
