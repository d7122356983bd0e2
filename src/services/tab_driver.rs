//! 标签页驱动 - 业务能力层
//!
//! 只负责"打开/关闭标签页"能力，不关心批量流程

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, Page};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::TabError;
use crate::models::{OrchestratorInput, TabHandle};
use crate::workflow::TabAgent;

/// 标签页驱动能力
pub trait TabDriver {
    /// 打开一个新标签页并返回其句柄
    fn create_tab(&mut self, url: &str)
        -> impl Future<Output = Result<TabHandle, TabError>> + Send;

    /// 在宽限期后关闭标签页（尽力而为，不向调用方报错）
    fn close_tab(&mut self, tab: &TabHandle, grace: Duration) -> impl Future<Output = ()> + Send;

    /// 标签页已被外部关闭，释放相关资源
    fn forget(&mut self, _tab: &TabHandle) {}
}

/// 基于 CDP 的标签页驱动
///
/// 职责：
/// - 通过 `Browser::new_page` 打开标签页
/// - 为每个新标签页启动一个 `TabAgent`
/// - 持有已打开的 Page，用于之后的关闭请求
pub struct ChromeTabDriver {
    browser: Arc<Browser>,
    agent: Arc<TabAgent>,
    signals: UnboundedSender<OrchestratorInput>,
    pages: HashMap<TabHandle, Page>,
}

impl ChromeTabDriver {
    /// 创建新的标签页驱动
    pub fn new(
        browser: Arc<Browser>,
        agent: Arc<TabAgent>,
        signals: UnboundedSender<OrchestratorInput>,
    ) -> Self {
        Self {
            browser,
            agent,
            signals,
            pages: HashMap::new(),
        }
    }
}

impl TabDriver for ChromeTabDriver {
    async fn create_tab(&mut self, url: &str) -> Result<TabHandle, TabError> {
        debug!("正在打开标签页: {}", url);
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| TabError::creation_failed(url, e))?;

        let tab = TabHandle::new(page.target_id().inner().clone());
        info!("✓ 已打开标签页 {}", tab);

        // 代理在后台运行，结束时通过 signals 回报
        let agent = Arc::clone(&self.agent);
        tokio::spawn(agent.run(page.clone(), tab.clone(), self.signals.clone()));

        self.pages.insert(tab.clone(), page);
        Ok(tab)
    }

    async fn close_tab(&mut self, tab: &TabHandle, grace: Duration) {
        let Some(page) = self.pages.remove(tab) else {
            debug!("标签页 {} 不在记录中，忽略关闭请求", tab);
            return;
        };

        let tab = tab.clone();
        tokio::spawn(async move {
            sleep(grace).await;
            match page.close().await {
                Ok(()) => debug!("已关闭标签页 {}", tab),
                Err(e) => warn!("关闭标签页 {} 失败: {}", tab, e),
            }
        });
    }

    fn forget(&mut self, tab: &TabHandle) {
        self.pages.remove(tab);
    }
}
