//! 批量任务数据模型
//!
//! `BatchJob` 只由编排器持有和修改，外部只能看到 `PersistedProgress` 快照。

use std::collections::VecDeque;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::models::snapshot::PersistedProgress;

/// 标签页句柄（CDP target id）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabHandle(pub String);

impl TabHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TabHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// 批量任务状态
///
/// ```text
/// Idle → Running → {Completed, Cancelled} → Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchStatus {
    /// 是否允许从当前状态迁移到 `to`
    ///
    /// 取消在任何状态下都合法。
    pub fn can_transition_to(self, to: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Running, Completed)
                | (Completed, Idle)
                | (Cancelled, Idle)
                | (_, Cancelled)
        )
    }
}

/// 一个标签页与其正在处理的标识符的临时绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabAssignment {
    pub tab: TabHandle,
    pub identifier: String,
    /// 派发时间（Unix 毫秒）
    pub dispatched_at: i64,
}

/// 批量任务完成时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// 单次运行的批量任务
#[derive(Debug, Default)]
pub struct BatchJob {
    items: Vec<String>,
    total: usize,
    completed: usize,
    failed: usize,
    remaining: VecDeque<String>,
    active: Option<TabAssignment>,
    status: BatchStatus,
}

impl BatchJob {
    /// 创建空闲任务
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == BatchStatus::Running
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn active(&self) -> Option<&TabAssignment> {
        self.active.as_ref()
    }

    /// 当前进度位置：已经出队的数量
    pub fn current(&self) -> usize {
        self.total - self.remaining.len()
    }

    /// 状态迁移，拒绝非法迁移
    pub fn transition(&mut self, to: BatchStatus) -> Result<(), OrchestratorError> {
        if !self.status.can_transition_to(to) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Idle → Running，拷贝输入并清零计数
    pub fn begin(&mut self, items: &[String]) -> Result<(), OrchestratorError> {
        self.transition(BatchStatus::Running)?;
        self.items = items.to_vec();
        self.total = items.len();
        self.completed = 0;
        self.failed = 0;
        self.remaining = items.iter().cloned().collect();
        self.active = None;
        Ok(())
    }

    /// 弹出队首标识符
    pub fn pop_next(&mut self) -> Result<Option<String>, OrchestratorError> {
        self.ensure_running()?;
        Ok(self.remaining.pop_front())
    }

    /// 记录一次已解决的派发；`failed` 为真时同时计入失败
    pub fn record_resolved(&mut self, failed: bool) {
        self.completed += 1;
        if failed {
            self.failed += 1;
        }
        debug_assert!(self.failed <= self.completed && self.completed <= self.total);
    }

    pub fn assign(&mut self, assignment: TabAssignment) {
        debug_assert!(self.active.is_none(), "同一时间只能有一个活动标签页");
        self.active = Some(assignment);
    }

    /// 若 `tab` 正是活动标签页，则移除并返回其绑定
    pub fn release(&mut self, tab: &TabHandle) -> Option<TabAssignment> {
        match &self.active {
            Some(a) if &a.tab == tab => self.active.take(),
            _ => None,
        }
    }

    /// 无条件移除当前绑定（发送方信息缺失时使用）
    pub fn release_any(&mut self) -> Option<TabAssignment> {
        self.active.take()
    }

    /// Running → Completed，返回最终统计
    pub fn finish(&mut self) -> Result<BatchSummary, OrchestratorError> {
        self.transition(BatchStatus::Completed)?;
        Ok(BatchSummary {
            total: self.total,
            success: self.total - self.failed,
            failed: self.failed,
        })
    }

    /// 任意状态 → Cancelled，清空队列和计数
    ///
    /// 活动标签页的绑定被遗忘，标签页本身保持打开。
    pub fn cancel(&mut self) {
        self.status = BatchStatus::Cancelled;
        self.clear();
    }

    /// 终止状态 → Idle
    pub fn reset(&mut self) -> Result<(), OrchestratorError> {
        self.transition(BatchStatus::Idle)?;
        self.clear();
        Ok(())
    }

    /// 生成当前可观测字段的快照
    pub fn snapshot(&self, timestamp: i64) -> PersistedProgress {
        PersistedProgress {
            processing: self.is_running(),
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            remaining: self.remaining.len(),
            timestamp,
        }
    }

    fn ensure_running(&self) -> Result<(), OrchestratorError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(OrchestratorError::NotRunning {
                status: self.status,
            })
        }
    }

    fn clear(&mut self) {
        self.items.clear();
        self.total = 0;
        self.completed = 0;
        self.failed = 0;
        self.remaining.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_transition_table() {
        use BatchStatus::*;
        assert!(Idle.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Idle));
        assert!(Cancelled.can_transition_to(Idle));
        assert!(Idle.can_transition_to(Cancelled));
        assert!(Cancelled.can_transition_to(Cancelled));

        assert!(!Idle.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Running));
        assert!(!Running.can_transition_to(Idle));
    }

    #[test]
    fn test_begin_copies_items() {
        let mut items = names(&["alice", "bob"]);
        let mut job = BatchJob::idle();
        job.begin(&items).unwrap();

        items.push("carol".to_string());
        items[0] = "mallory".to_string();

        assert_eq!(job.total(), 2);
        assert_eq!(job.remaining(), 2);
        assert_eq!(job.items(), &names(&["alice", "bob"])[..]);
        assert_eq!(job.pop_next().unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn test_pop_next_rejected_when_idle() {
        let mut job = BatchJob::idle();
        assert_eq!(
            job.pop_next(),
            Err(OrchestratorError::NotRunning {
                status: BatchStatus::Idle
            })
        );
    }

    #[test]
    fn test_release_only_matching_tab() {
        let mut job = BatchJob::idle();
        job.begin(&names(&["alice"])).unwrap();
        job.assign(TabAssignment {
            tab: TabHandle::new("A"),
            identifier: "alice".to_string(),
            dispatched_at: 0,
        });

        assert!(job.release(&TabHandle::new("B")).is_none());
        assert!(job.active().is_some());
        let released = job.release(&TabHandle::new("A")).unwrap();
        assert_eq!(released.identifier, "alice");
        assert!(job.active().is_none());
    }

    #[test]
    fn test_finish_counts_success() {
        let mut job = BatchJob::idle();
        job.begin(&names(&["a", "b", "c"])).unwrap();
        while job.pop_next().unwrap().is_some() {}
        job.record_resolved(false);
        job.record_resolved(true);
        job.record_resolved(false);

        let summary = job.finish().unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                success: 2,
                failed: 1
            }
        );
        assert_eq!(job.status(), BatchStatus::Completed);
        job.reset().unwrap();
        assert_eq!(job.status(), BatchStatus::Idle);
        assert_eq!(job.total(), 0);
    }

    #[test]
    fn test_cancel_clears_everything() {
        let mut job = BatchJob::idle();
        job.begin(&names(&["a", "b"])).unwrap();
        job.assign(TabAssignment {
            tab: TabHandle::new("A"),
            identifier: "a".to_string(),
            dispatched_at: 0,
        });
        job.cancel();

        assert_eq!(job.status(), BatchStatus::Cancelled);
        assert_eq!(job.remaining(), 0);
        assert!(job.active().is_none());
        let snap = job.snapshot(42);
        assert!(!snap.processing);
        assert_eq!(snap.total, 0);
    }
}
