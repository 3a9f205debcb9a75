use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::LockStore;
use crate::LockError;

struct Record {
    value: String,
    expires_at: Instant,
}

impl Record {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// プロセス内ストアバックエンド。テストおよび単一プロセス構成向け。
pub struct InMemoryLockStore {
    records: Mutex<HashMap<String, Record>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get(key) {
            if !record.is_expired() {
                return Ok(false);
            }
        }
        records.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        let records = self.records.lock().await;
        match records.get(key) {
            Some(record) if !record.is_expired() => Ok(Some(record.value.clone())),
            _ => Ok(None),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError> {
        let mut records = self.records.lock().await;
        match records.get(key) {
            Some(record) if !record.is_expired() && record.value == expected => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut records = self.records.lock().await;
        match records.get_mut(key) {
            Some(record) if !record.is_expired() && record.value == expected => {
                record.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
