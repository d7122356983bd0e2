//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `bulk_orchestrator` - 批量操作状态机
//! - 持有唯一的 `BatchJob`
//! - 一次只派发一个标签页
//! - 对账代理信号、标签页关闭、创建失败
//! - 写快照、发事件
//!
//! ### `app` - 运行时
//! - 管理浏览器资源
//! - 把 CDP 事件和控制端命令汇入同一个输入通道
//!
//! ## 层次关系
//!
//! ```text
//! app (进程、浏览器、控制端)
//!     ↓
//! bulk_orchestrator (Vec<String> → 顺序派发)
//!     ↓
//! services (能力层：tab_driver / snapshot_store / notifier)
//!     ↓
//! workflow::TabAgent (单个标签页)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod app;
pub mod bulk_orchestrator;

pub use app::App;
pub use bulk_orchestrator::{BulkOrchestrator, OrchestratorSettings};
