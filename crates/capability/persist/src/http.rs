//! HTTP Web API 持久化实现。

use crate::{PersistError, ReadingStore};
use async_trait::async_trait;
use domain::Reading;
use std::time::Duration;

/// HTTP 存储配置。
#[derive(Debug, Clone)]
pub struct HttpReadingStoreConfig {
    pub base_url: String,
    pub readings_path: String,
    pub timeout: Duration,
}

impl Default for HttpReadingStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8888".to_string(),
            readings_path: "api/conditionsreadings".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// 向 Web API POST 单条读数的存储实现。
#[derive(Debug, Clone)]
pub struct HttpReadingStore {
    client: reqwest::Client,
    url: String,
}

impl HttpReadingStore {
    pub fn new(config: HttpReadingStoreConfig) -> Result<Self, PersistError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| PersistError::Request(err.to_string()))?;
        Ok(Self {
            client,
            url: join_url(&config.base_url, &config.readings_path),
        })
    }

    /// 实际写入的完整 URL。
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadingStore for HttpReadingStore {
    async fn store(&self, reading: &Reading) -> Result<(), PersistError> {
        let body = ghm_codec::encode(reading).map_err(|err| PersistError::Encode(err.to_string()))?;
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| PersistError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PersistError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
