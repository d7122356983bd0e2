//! 应用运行时 - 编排层
//!
//! ## 职责
//!
//! 把浏览器、标签页代理、编排器和控制端连成一个进程：
//!
//! 1. **应用初始化**：写日志头、连接或启动浏览器
//! 2. **事件接线**：CDP 的 targetDestroyed → `TabRemoved`，代理信号 → `Agent`
//! 3. **单消费者循环**：所有输入经同一个 mpsc 通道交给编排器顺序处理
//! 4. **控制端**：发送 getState / start，输出事件，Ctrl-C 时发送 cancel

use std::sync::Arc;

use anyhow::{bail, Result};
use chromiumoxide::cdp::browser_protocol::target::EventTargetDestroyed;
use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::{AppResult, BrowserError};
use crate::models::{BatchSummary, Command, Event, OrchestratorInput, Profile, TabHandle};
use crate::orchestrator::bulk_orchestrator::{BulkOrchestrator, OrchestratorSettings};
use crate::services::{BroadcastNotifier, ChromeTabDriver, FileSnapshotStore};
use crate::utils::logging::{init_log_file, log_event, log_startup, print_final_stats};
use crate::workflow::TabAgent;

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Arc<Browser>,
    inputs: UnboundedSender<OrchestratorInput>,
    notifier: BroadcastNotifier,
    worker: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, profile: Profile) -> AppResult<Self> {
        if let Err(e) = init_log_file(&config.output_log_file) {
            warn!("⚠️ 无法写入日志文件 {}: {}", config.output_log_file, e);
        }
        log_startup(&config.article_url);

        let browser = if config.headless {
            browser::launch_headless_browser(config.chrome_executable.as_deref()).await?
        } else {
            browser::connect_to_browser(config.browser_debug_port).await?
        };
        let browser = Arc::new(browser);

        let (inputs, receiver) = mpsc::unbounded_channel();
        let notifier = BroadcastNotifier::new(broadcast::channel(64).0);

        let watcher = spawn_tab_watcher(&browser, inputs.clone()).await?;

        let agent = Arc::new(TabAgent::new(profile, &config));
        let orchestrator = BulkOrchestrator::new(
            ChromeTabDriver::new(Arc::clone(&browser), agent, inputs.clone()),
            FileSnapshotStore::new(&config.snapshot_file),
            notifier.clone(),
            OrchestratorSettings::from(&config),
        );
        let worker = tokio::spawn(orchestrator.run(receiver));

        Ok(Self {
            config,
            _browser: browser,
            inputs,
            notifier,
            worker,
            watcher,
        })
    }

    /// 订阅编排器事件
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.notifier.subscribe()
    }

    /// 向编排器发送命令；编排器已退出时返回 false
    pub fn send(&self, command: Command) -> bool {
        self.inputs.send(OrchestratorInput::Command(command)).is_ok()
    }

    /// 运行一个批量任务直到完成或取消
    ///
    /// 返回 `None` 表示任务被取消。
    pub async fn run(&self, usernames: Vec<String>) -> Result<Option<BatchSummary>> {
        let mut events = self.subscribe();

        self.send(Command::GetState);
        if !self.send(Command::Start { items: usernames }) {
            bail!("编排器已退出，无法开始任务");
        }

        let mut cancel_requested = false;
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        log_event(&event);
                        match event {
                            Event::BulkOperationComplete { total, success, failed } => {
                                let summary = BatchSummary { total, success, failed };
                                print_final_stats(&summary, &self.config.output_log_file);
                                return Ok(Some(summary));
                            }
                            Event::BulkOperationCancelled => return Ok(None),
                            _ => {}
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ 控制端落后，跳过 {} 个事件", skipped);
                    }
                    Err(RecvError::Closed) => bail!("编排器事件通道已关闭"),
                },
                _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                    info!("收到 Ctrl-C，正在取消...");
                    cancel_requested = true;
                    self.send(Command::Cancel);
                }
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.watcher.abort();
        self.worker.abort();
    }
}

/// 监听浏览器中所有标签页的关闭事件
async fn spawn_tab_watcher(
    browser: &Browser,
    inputs: UnboundedSender<OrchestratorInput>,
) -> AppResult<JoinHandle<()>> {
    let mut destroyed = browser
        .event_listener::<EventTargetDestroyed>()
        .await
        .map_err(|source| BrowserError::EventSubscriptionFailed { source })?;

    Ok(tokio::spawn(async move {
        while let Some(event) = destroyed.next().await {
            let tab = TabHandle::new(event.target_id.inner().clone());
            debug!("标签页已关闭: {}", tab);
            if inputs.send(OrchestratorInput::TabRemoved(tab)).is_err() {
                break;
            }
        }
    }))
}
