//! 持久化内存实现
//!
//! 仅用于本地测试和占位。

use crate::{PersistError, ReadingStore};
use async_trait::async_trait;
use domain::Reading;
use std::sync::RwLock;

/// 读数内存存储
pub struct InMemoryReadingStore {
    readings: RwLock<Vec<Reading>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(Vec::new()),
        }
    }

    /// 当前累计的读数数量（用于测试）
    pub fn len(&self) -> usize {
        self.readings.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已存储读数的拷贝（用于测试）
    pub fn readings(&self) -> Vec<Reading> {
        self.readings
            .read()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for InMemoryReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn store(&self, reading: &Reading) -> Result<(), PersistError> {
        let mut readings = self
            .readings
            .write()
            .map_err(|_| PersistError::Request("lock failed".to_string()))?;
        readings.push(reading.clone());
        Ok(())
    }
}
