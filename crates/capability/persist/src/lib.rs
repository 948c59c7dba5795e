//! 读数持久化能力。
//!
//! 核心把持久化视为 fire-and-forget 的外部协作者：调用一次、观察结果，
//! 不做重试。HTTP 实现向 Web API 写入单条读数；内存实现用于本地测试
//! 和占位。

mod http;
mod in_memory;

pub use http::{HttpReadingStore, HttpReadingStoreConfig};
pub use in_memory::InMemoryReadingStore;

use async_trait::async_trait;
use domain::Reading;

/// 持久化错误。
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("request error: {0}")]
    Request(String),
    #[error("unexpected status: {0}")]
    Status(u16),
}

/// 读数持久化存储抽象。
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn store(&self, reading: &Reading) -> Result<(), PersistError>;
}

/// 空存储（关闭持久化时使用）。
#[derive(Debug, Default)]
pub struct NoopReadingStore;

#[async_trait]
impl ReadingStore for NoopReadingStore {
    async fn store(&self, _reading: &Reading) -> Result<(), PersistError> {
        Ok(())
    }
}
