//! 进度快照存储 - 业务能力层
//!
//! 快照只用于展示，读写失败由调用方吞掉

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::StoreError;
use crate::models::PersistedProgress;

/// 快照存储能力
pub trait SnapshotStore {
    /// 覆盖写入快照
    fn save(&self, progress: &PersistedProgress) -> Result<(), StoreError>;
    /// 读取快照，不存在时返回 `None`
    fn load(&self) -> Result<Option<PersistedProgress>, StoreError>;
    /// 删除快照
    fn clear(&self) -> Result<(), StoreError>;
}

/// 基于 JSON 文件的快照存储
///
/// 先写临时文件再 rename，保证覆盖是原子的。
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, progress: &PersistedProgress) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(progress)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!("快照已写入: {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedProgress>, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_slice(&content)?))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// 内存快照存储，克隆后共享同一份数据
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<PersistedProgress>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的快照
    pub fn current(&self) -> Option<PersistedProgress> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, progress: &PersistedProgress) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(*progress);
        }
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedProgress>, StoreError> {
        Ok(self.current())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedProgress {
        PersistedProgress {
            processing: true,
            total: 5,
            completed: 2,
            failed: 1,
            remaining: 2,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_file_store_overwrite_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("progress.json"));

        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        let second = PersistedProgress {
            completed: 3,
            remaining: 1,
            ..sample()
        };
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap(), Some(second));
        assert!(!dir.path().join("progress.json.tmp").exists());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, b"not json").unwrap();
        let store = FileSnapshotStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn test_memory_store_is_shared_between_clones() {
        let store = MemorySnapshotStore::new();
        let view = store.clone();
        store.save(&sample()).unwrap();
        assert_eq!(view.current(), Some(sample()));
        store.clear().unwrap();
        assert_eq!(view.current(), None);
    }
}
