//! 检查点存储
//!
//! 按会话 thread_id 保存持久化状态子集，使同一 thread 的下一次调用
//! 能带着 classification / resolution_attempted / escalated 等标志继续。
//! 进程内 Map，启动后唯一的可变共享状态之一，锁在每条路径上都及时释放。

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::Checkpoint;

/// 线程级检查点存储
#[derive(Default)]
pub struct CheckpointStore {
    inner: Mutex<HashMap<String, Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, thread_id: &str) -> Option<Checkpoint> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(thread_id).cloned())
    }

    pub fn save(&self, thread_id: &str, checkpoint: Checkpoint) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(thread_id.to_string(), checkpoint);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Message;

    #[test]
    fn test_save_and_load() {
        let store = CheckpointStore::new();
        assert!(store.load("t-1").is_none());

        let mut checkpoint = Checkpoint::default();
        checkpoint.messages.push(Message::user("hi"));
        checkpoint.escalated = true;
        store.save("t-1", checkpoint);

        let loaded = store.load("t-1").unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert!(loaded.escalated);
        assert!(store.load("t-2").is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let store = CheckpointStore::new();
        store.save("t-1", Checkpoint::default());
        let mut second = Checkpoint::default();
        second.resolution_attempted = true;
        store.save("t-1", second);

        assert!(store.load("t-1").unwrap().resolution_attempted);
        assert_eq!(store.len(), 1);
    }
}
