use serde::{Deserialize, Serialize};

/// 批量进度的持久化快照
///
/// 只保存计数，不保存队列内容和活动绑定，重启后只能恢复进度显示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    pub processing: bool,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub remaining: usize,
    /// 快照时间（Unix 毫秒）
    pub timestamp: i64,
}

impl PersistedProgress {
    /// 快照是否仍在有效期内
    pub fn is_fresh(&self, now_ms: i64, max_age_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) <= max_age_ms
    }

    /// 已出队数量
    pub fn processed(&self) -> usize {
        self.total.saturating_sub(self.remaining)
    }
}

/// 当前 Unix 毫秒
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
