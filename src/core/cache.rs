use crate::core::Storage;
use crate::domain::model::ChatReply;
use crate::utils::error::Result;
use sha2::{Digest, Sha256};

/// 以 seed 分隔的回應快取，同樣的請求直接回傳先前的結果
pub struct ResponseCache<S: Storage> {
    storage: S,
}

impl<S: Storage> ResponseCache<S> {
    /// `storage` 應已指向 `<cache_dir>/<seed>`
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn key_for(body: &serde_json::Value) -> String {
        let digest = Sha256::digest(body.to_string().as_bytes());
        format!("{:x}", digest)
    }

    pub async fn get(&self, key: &str) -> Option<ChatReply> {
        let data = self.storage.read_file(&format!("{}.json", key)).await.ok()?;
        match serde_json::from_slice(&data) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, reply: &ChatReply) -> Result<()> {
        let data = serde_json::to_vec_pretty(reply)?;
        self.storage.write_file(&format!("{}.json", key), &data).await
    }
}
