//! 批量操作编排器 - 编排层
//!
//! ## 职责
//!
//! 持有唯一的 `BatchJob`，一次只让一个标签页在处理中：
//!
//! 1. **队列**：按顺序派发标识符，每次出队一个
//! 2. **单飞**：同一时刻最多一个 `TabAssignment`
//! 3. **对账**：代理信号、标签页关闭、创建失败都会释放活动槽位
//! 4. **持久化**：每次状态变化都写快照，终止时删除
//! 5. **汇报**：通过 `EventNotifier` 尽力通知控制端
//!
//! ## 设计特点
//!
//! - 所有处理函数都拿 `&mut self`，运行到结束才让出，不需要锁
//! - 单个标签页没有超时，卡住的标签页需要用户关闭或取消
//! - 快照和通知失败都被吞掉，不影响批量本身

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::OrchestratorError;
use crate::models::{
    now_millis, AgentSignal, BatchJob, BatchStatus, BatchSummary, Command, Event,
    OrchestratorInput, PersistedProgress, TabAssignment, TabHandle,
};
use crate::services::{build_target_url, Delivery, EventNotifier, SnapshotStore, TabDriver};

/// 编排器参数
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub article_url: String,
    pub close_tab_grace: Duration,
    /// 快照超过该时长即视为过期
    pub snapshot_max_age: Duration,
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            article_url: config.article_url.clone(),
            close_tab_grace: Duration::from_millis(config.close_tab_grace_ms),
            snapshot_max_age: Duration::from_secs(config.snapshot_max_age_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// 批量操作编排器
pub struct BulkOrchestrator<D, S, N> {
    job: BatchJob,
    driver: D,
    store: S,
    notifier: N,
    settings: OrchestratorSettings,
}

impl<D, S, N> BulkOrchestrator<D, S, N>
where
    D: TabDriver,
    S: SnapshotStore,
    N: EventNotifier,
{
    /// 创建处于 Idle 状态的编排器
    pub fn new(driver: D, store: S, notifier: N, settings: OrchestratorSettings) -> Self {
        Self {
            job: BatchJob::idle(),
            driver,
            store,
            notifier,
            settings,
        }
    }

    pub fn job(&self) -> &BatchJob {
        &self.job
    }

    pub fn status(&self) -> BatchStatus {
        self.job.status()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// 事件循环：逐个处理输入，直到所有发送端关闭
    pub async fn run(mut self, mut inputs: UnboundedReceiver<OrchestratorInput>) {
        while let Some(input) = inputs.recv().await {
            self.handle(input).await;
        }
        debug!("输入通道已关闭，编排器退出");
    }

    /// 按输入类型分发到对应的处理函数
    pub async fn handle(&mut self, input: OrchestratorInput) {
        let result = match input {
            OrchestratorInput::Command(Command::Start { items }) => self.start(&items).await,
            OrchestratorInput::Command(Command::Cancel) => {
                self.cancel();
                Ok(())
            }
            OrchestratorInput::Command(Command::GetState) => {
                self.get_state();
                Ok(())
            }
            OrchestratorInput::Agent { tab, signal } => {
                self.on_agent_signal(tab.as_ref(), signal).await
            }
            OrchestratorInput::TabRemoved(tab) => self.on_tab_removed(&tab).await,
        };

        if let Err(e) = result {
            error!("❌ 编排器状态错误: {}", e);
        }
    }

    /// 开始一个批量任务；空列表什么也不做
    ///
    /// 仍在运行的旧任务会被直接替换。
    pub async fn start(&mut self, items: &[String]) -> Result<(), OrchestratorError> {
        if items.is_empty() {
            debug!("收到空的标识符列表，忽略");
            return Ok(());
        }

        match self.job.status() {
            BatchStatus::Idle => {}
            BatchStatus::Running => {
                warn!(
                    "⚠️ 新批量任务替换正在运行的任务 (已完成 {}/{})",
                    self.job.completed(),
                    self.job.total()
                );
                self.job.cancel();
                self.job.reset()?;
            }
            BatchStatus::Completed | BatchStatus::Cancelled => self.job.reset()?,
        }

        self.job.begin(items)?;
        info!("🚀 开始批量任务，共 {} 个标识符", self.job.total());
        self.persist();
        self.dispatch_next().await
    }

    /// 派发下一个标识符；队列为空时进入完成流程
    ///
    /// 创建失败会立即继续下一个，单个失败不会中断批量。
    async fn dispatch_next(&mut self) -> Result<(), OrchestratorError> {
        loop {
            if !self.job.is_running() {
                return Err(OrchestratorError::NotRunning {
                    status: self.job.status(),
                });
            }

            let current = self.job.current();
            let total = self.job.total();
            let remaining = self.job.remaining();

            let Some(identifier) = self.job.pop_next()? else {
                return self.complete();
            };

            let url = build_target_url(&self.settings.article_url, &identifier);
            self.emit(Event::ProgressUpdate {
                current,
                total,
                remaining,
            });
            self.persist();
            info!("[{}/{}] 派发: {}", current + 1, total, identifier);

            match self.driver.create_tab(&url).await {
                Ok(tab) => {
                    debug!("{} 绑定到 {}", identifier, tab);
                    self.job.assign(TabAssignment {
                        tab,
                        identifier,
                        dispatched_at: now_millis(),
                    });
                    return Ok(());
                }
                Err(e) => {
                    warn!("⚠️ {} 的标签页打开失败: {}", identifier, e);
                    self.job.record_resolved(true);
                    self.persist();
                    self.emit(Event::TabCreationError {
                        identifier,
                        failed: self.job.failed(),
                        total: self.job.total(),
                    });
                }
            }
        }
    }

    /// 处理标签页代理的信号
    ///
    /// 未被跟踪的标签页发来的 fillDone 直接丢弃；
    /// 缺少发送方信息时仍当作当前活动标签页的完成处理。
    pub async fn on_agent_signal(
        &mut self,
        tab: Option<&TabHandle>,
        signal: AgentSignal,
    ) -> Result<(), OrchestratorError> {
        match signal {
            AgentSignal::FillDone { outcome } => {
                if !self.job.is_running() {
                    debug!("没有运行中的任务，丢弃 fillDone ({:?})", tab);
                    return Ok(());
                }

                let released = match tab {
                    Some(tab) => self.job.release(tab),
                    None => {
                        warn!("⚠️ fillDone 缺少标签页信息，按当前活动标签页完成处理");
                        self.job.release_any()
                    }
                };
                let Some(assignment) = released else {
                    debug!("丢弃未跟踪标签页的 fillDone: {:?}", tab);
                    return Ok(());
                };

                info!(
                    "✓ {} 处理结束 ({:?}, {})",
                    assignment.identifier, outcome, assignment.tab
                );
                self.job.record_resolved(false);
                self.persist();
                self.dispatch_next().await
            }
            AgentSignal::CloseTab => {
                if let Some(tab) = tab {
                    self.driver.close_tab(tab, self.settings.close_tab_grace).await;
                }
                Ok(())
            }
        }
    }

    /// 处理任意标签页关闭
    ///
    /// 用户提前关闭标签页视为跳过：计入完成，不计入失败。
    pub async fn on_tab_removed(&mut self, tab: &TabHandle) -> Result<(), OrchestratorError> {
        self.driver.forget(tab);

        let Some(assignment) = self.job.release(tab) else {
            return Ok(());
        };
        if !self.job.is_running() {
            return Ok(());
        }

        info!("{} 的标签页被提前关闭，跳过", assignment.identifier);
        self.job.record_resolved(false);
        self.persist();
        self.dispatch_next().await
    }

    /// 取消当前任务，任何状态下都可以调用
    ///
    /// 不会关闭当前活动的标签页。
    pub fn cancel(&mut self) {
        if self.job.is_running() {
            info!(
                "🛑 取消批量任务 (已完成 {}/{})",
                self.job.completed(),
                self.job.total()
            );
        }
        self.job.cancel();
        self.clear_persisted();
        self.emit(Event::BulkOperationCancelled);
    }

    /// 最近的快照，过期则视为不存在
    pub fn get_snapshot(&self) -> Option<PersistedProgress> {
        let snapshot = match self.store.load() {
            Ok(snapshot) => snapshot?,
            Err(e) => {
                warn!("⚠️ 读取进度快照失败: {}", e);
                return None;
            }
        };

        let max_age_ms = i64::try_from(self.settings.snapshot_max_age.as_millis()).unwrap_or(i64::MAX);
        if snapshot.is_fresh(now_millis(), max_age_ms) {
            Some(snapshot)
        } else {
            debug!("进度快照已过期，忽略: {:?}", snapshot);
            None
        }
    }

    /// 若有新鲜的快照则通知控制端
    pub fn get_state(&self) {
        if let Some(state) = self.get_snapshot() {
            self.emit(Event::OperationStateRestored { state });
        }
    }

    fn complete(&mut self) -> Result<(), OrchestratorError> {
        let summary = self.job.finish()?;
        self.clear_persisted();
        log_summary(&summary);
        self.emit(Event::BulkOperationComplete {
            total: summary.total,
            success: summary.success,
            failed: summary.failed,
        });
        self.job.reset()
    }

    fn persist(&self) {
        let snapshot = self.job.snapshot(now_millis());
        if let Err(e) = self.store.save(&snapshot) {
            warn!("⚠️ 写入进度快照失败: {}", e);
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.store.clear() {
            warn!("⚠️ 清除进度快照失败: {}", e);
        }
    }

    fn emit(&self, event: Event) {
        if self.notifier.notify(event) == Delivery::NoReceiver {
            debug!("事件没有接收方");
        }
    }
}

fn log_summary(summary: &BatchSummary) {
    info!("{}", "─".repeat(60));
    info!(
        "✓ 批量任务完成: 成功 {}/{}，失败 {}",
        summary.success, summary.total, summary.failed
    );
    info!("{}", "─".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, TabError};
    use crate::models::AgentOutcome;
    use crate::services::{BroadcastNotifier, MemorySnapshotStore};
    use std::collections::VecDeque;
    use tokio::sync::broadcast;

    /// 记录所有请求的假驱动，可按顺序预设失败
    #[derive(Default)]
    struct FakeDriver {
        created: Vec<String>,
        closed: Vec<TabHandle>,
        failures: VecDeque<bool>,
        next_id: usize,
    }

    impl TabDriver for FakeDriver {
        async fn create_tab(&mut self, url: &str) -> Result<TabHandle, TabError> {
            self.created.push(url.to_string());
            if self.failures.pop_front().unwrap_or(false) {
                return Err(TabError::creation_failed(url, "popup blocked"));
            }
            self.next_id += 1;
            Ok(TabHandle::new(format!("T{}", self.next_id)))
        }

        async fn close_tab(&mut self, tab: &TabHandle, _grace: Duration) {
            self.closed.push(tab.clone());
        }
    }

    /// 永远失败的存储
    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn save(&self, _: &PersistedProgress) -> Result<(), StoreError> {
            Err(StoreError::Json(serde_json::from_str::<u8>("x").unwrap_err()))
        }
        fn load(&self) -> Result<Option<PersistedProgress>, StoreError> {
            Err(StoreError::Json(serde_json::from_str::<u8>("x").unwrap_err()))
        }
        fn clear(&self) -> Result<(), StoreError> {
            Err(StoreError::Json(serde_json::from_str::<u8>("x").unwrap_err()))
        }
    }

    type TestOrchestrator = BulkOrchestrator<FakeDriver, MemorySnapshotStore, BroadcastNotifier>;

    fn setup() -> (TestOrchestrator, MemorySnapshotStore, broadcast::Receiver<Event>) {
        let store = MemorySnapshotStore::new();
        let notifier = BroadcastNotifier::with_capacity(64);
        let rx = notifier.subscribe();
        let orchestrator = BulkOrchestrator::new(
            FakeDriver::default(),
            store.clone(),
            notifier,
            OrchestratorSettings::default(),
        );
        (orchestrator, store, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn items(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn done() -> AgentSignal {
        AgentSignal::FillDone {
            outcome: AgentOutcome::Submitted,
        }
    }

    #[tokio::test]
    async fn test_empty_start_is_noop() {
        let (mut orch, store, mut rx) = setup();
        orch.start(&[]).await.unwrap();
        assert_eq!(orch.status(), BatchStatus::Idle);
        assert!(orch.driver().created.is_empty());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(store.current(), None);
    }

    #[tokio::test]
    async fn test_start_dispatches_first_item_only() {
        let (mut orch, store, mut rx) = setup();
        orch.start(&items(&["alice", "bob"])).await.unwrap();

        assert_eq!(orch.driver().created.len(), 1);
        assert!(orch.driver().created[0].ends_with("#alice"));
        assert_eq!(orch.job().active().unwrap().identifier, "alice");
        assert_eq!(
            drain(&mut rx),
            vec![Event::ProgressUpdate {
                current: 0,
                total: 2,
                remaining: 2
            }]
        );

        let snap = store.current().unwrap();
        assert!(snap.processing);
        assert_eq!((snap.total, snap.completed, snap.remaining), (2, 0, 1));
    }

    #[tokio::test]
    async fn test_stale_fill_done_is_ignored() {
        let (mut orch, _store, mut rx) = setup();
        orch.start(&items(&["alice", "bob"])).await.unwrap();
        drain(&mut rx);

        orch.on_agent_signal(Some(&TabHandle::new("other")), done())
            .await
            .unwrap();

        assert_eq!(orch.job().completed(), 0);
        assert_eq!(orch.driver().created.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_fill_done_without_sender_completes_active() {
        let (mut orch, _store, _rx) = setup();
        orch.start(&items(&["alice", "bob"])).await.unwrap();
        orch.on_agent_signal(None, done()).await.unwrap();

        assert_eq!(orch.job().completed(), 1);
        assert_eq!(orch.job().active().unwrap().identifier, "bob");
    }

    #[tokio::test]
    async fn test_close_tab_is_forwarded_without_accounting() {
        let (mut orch, _store, _rx) = setup();
        orch.start(&items(&["alice"])).await.unwrap();
        let tab = orch.job().active().unwrap().tab.clone();

        orch.on_agent_signal(Some(&tab), AgentSignal::CloseTab)
            .await
            .unwrap();

        assert_eq!(orch.driver().closed, vec![tab]);
        assert_eq!(orch.job().completed(), 0);
        assert!(orch.job().active().is_some());
    }

    #[tokio::test]
    async fn test_unrelated_tab_removal_is_ignored() {
        let (mut orch, _store, _rx) = setup();
        orch.start(&items(&["alice"])).await.unwrap();
        orch.on_tab_removed(&TabHandle::new("unrelated")).await.unwrap();
        assert_eq!(orch.job().completed(), 0);
        assert!(orch.job().active().is_some());
    }

    #[tokio::test]
    async fn test_restart_replaces_running_job() {
        let (mut orch, _store, mut rx) = setup();
        orch.start(&items(&["alice", "bob"])).await.unwrap();
        let old_tab = orch.job().active().unwrap().tab.clone();

        orch.start(&items(&["carol"])).await.unwrap();
        assert_eq!(orch.job().total(), 1);
        assert_eq!(orch.job().active().unwrap().identifier, "carol");

        // 旧标签页的信号已经无效
        orch.on_agent_signal(Some(&old_tab), done()).await.unwrap();
        assert_eq!(orch.job().completed(), 0);

        let events = drain(&mut rx);
        assert!(!events.contains(&Event::BulkOperationCancelled));
    }

    #[tokio::test]
    async fn test_cancel_orphans_active_tab() {
        let (mut orch, store, mut rx) = setup();
        orch.start(&items(&["alice", "bob"])).await.unwrap();
        let tab = orch.job().active().unwrap().tab.clone();
        drain(&mut rx);

        orch.cancel();
        assert_eq!(orch.status(), BatchStatus::Cancelled);
        assert_eq!(store.current(), None);
        assert_eq!(drain(&mut rx), vec![Event::BulkOperationCancelled]);
        assert!(orch.driver().closed.is_empty());

        orch.on_agent_signal(Some(&tab), done()).await.unwrap();
        orch.on_tab_removed(&tab).await.unwrap();
        assert_eq!(orch.driver().created.len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_start_after_cancel() {
        let (mut orch, _store, _rx) = setup();
        orch.cancel();
        orch.start(&items(&["alice"])).await.unwrap();
        assert_eq!(orch.status(), BatchStatus::Running);
    }

    #[tokio::test]
    async fn test_all_creations_fail() {
        let (mut orch, _store, mut rx) = setup();
        orch.driver_mut().failures = VecDeque::from(vec![true, true]);
        orch.start(&items(&["a", "b"])).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&Event::BulkOperationComplete {
                total: 2,
                success: 0,
                failed: 2
            })
        );
        assert!(events.contains(&Event::TabCreationError {
            identifier: "b".to_string(),
            failed: 2,
            total: 2
        }));
        assert_eq!(orch.status(), BatchStatus::Idle);
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_break_batch() {
        let notifier = BroadcastNotifier::with_capacity(16);
        let mut rx = notifier.subscribe();
        let mut orch = BulkOrchestrator::new(
            FakeDriver::default(),
            BrokenStore,
            notifier,
            OrchestratorSettings::default(),
        );

        orch.start(&items(&["alice"])).await.unwrap();
        orch.on_agent_signal(None, done()).await.unwrap();
        assert_eq!(orch.get_snapshot(), None);
        orch.get_state();

        assert_eq!(
            drain(&mut rx).last(),
            Some(&Event::BulkOperationComplete {
                total: 1,
                success: 1,
                failed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_no_listener_is_fine() {
        let notifier = BroadcastNotifier::with_capacity(4);
        let mut orch = BulkOrchestrator::new(
            FakeDriver::default(),
            MemorySnapshotStore::new(),
            notifier,
            OrchestratorSettings::default(),
        );
        orch.start(&items(&["alice"])).await.unwrap();
        orch.on_agent_signal(None, done()).await.unwrap();
        assert_eq!(orch.status(), BatchStatus::Idle);
    }

    #[tokio::test]
    async fn test_handle_routes_inputs() {
        let (mut orch, _store, mut rx) = setup();
        orch.handle(OrchestratorInput::Command(Command::Start {
            items: items(&["alice"]),
        }))
        .await;
        let tab = orch.job().active().unwrap().tab.clone();
        orch.handle(OrchestratorInput::TabRemoved(tab)).await;

        assert_eq!(
            drain(&mut rx).last(),
            Some(&Event::BulkOperationComplete {
                total: 1,
                success: 1,
                failed: 0
            })
        );

        orch.handle(OrchestratorInput::Command(Command::Cancel)).await;
        assert_eq!(orch.status(), BatchStatus::Cancelled);
    }
}
