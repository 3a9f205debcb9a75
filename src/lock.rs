use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::acquire::{acquire_loop, AcquireOutcome};
use crate::config::{AttemptLimit, LockConfig, LockOptions};
use crate::key;
use crate::store::LockStore;
use crate::LockError;

/// 名前付き分散ロックのファサード。
///
/// 構築時に名前からストレージキーを一度だけ導出し、デフォルト設定と
/// 注入されたストアを保持する。同じ名前・同じストアで構築された
/// 全プロセスが同一のキーを取り合う。待機者間の順序は保証しない。
pub struct LeaseLock {
    name: String,
    key: String,
    store: Arc<dyn LockStore>,
    defaults: LockConfig,
}

impl LeaseLock {
    pub fn new(name: impl Into<String>, store: Arc<dyn LockStore>) -> Result<Self, LockError> {
        Self::with_config(name, store, LockConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        store: Arc<dyn LockStore>,
        defaults: LockConfig,
    ) -> Result<Self, LockError> {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidName("空文字列".to_string()));
        }
        defaults.validate()?;
        let key = key::derive_key(&name);
        Ok(Self {
            name,
            key,
            store,
            defaults,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// このロックが使うストレージキー。
    pub fn key(&self) -> &str {
        &self.key
    }

    /// デフォルト設定でロックを取得する。
    pub async fn acquire(&self) -> Result<AcquireOutcome, LockError> {
        self.acquire_with(LockOptions::new()).await
    }

    /// 呼び出しごとの上書きをマージしてロックを取得する。
    pub async fn acquire_with(&self, options: LockOptions) -> Result<AcquireOutcome, LockError> {
        self.acquire_cancellable(options, CancellationToken::new())
            .await
    }

    /// キャンセル可能な取得。cancel が発火すると待機中のリトライを破棄して
    /// `Cancelled` で終了する。
    pub async fn acquire_cancellable(
        &self,
        options: LockOptions,
        cancel: CancellationToken,
    ) -> Result<AcquireOutcome, LockError> {
        let config = self.defaults.merged(options)?;
        acquire_loop(self.store.clone(), &self.key, &config, cancel).await
    }

    /// 一度だけ試してすぐ戻る。
    pub async fn try_once(&self) -> Result<AcquireOutcome, LockError> {
        self.try_once_with(LockOptions::new()).await
    }

    /// 一度だけ試す。`options` の ttl などはマージされるが、max_attempts は
    /// 常に 1 に固定される。
    pub async fn try_once_with(
        &self,
        mut options: LockOptions,
    ) -> Result<AcquireOutcome, LockError> {
        options.max_attempts = Some(AttemptLimit::Limit(1));
        self.acquire_with(options).await
    }

    /// 診断用。キーに生存中のレコードがあるかを調べる。
    pub async fn is_held(&self) -> Result<bool, LockError> {
        Ok(self.store.get(&self.key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::RetryDelay;
    use crate::lease::ReleaseOutcome;
    use crate::memory::InMemoryLockStore;

    fn fast_config() -> LockConfig {
        LockConfig::default().with_retry_delay(RetryDelay::Fixed(Duration::from_millis(2)))
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let store = Arc::new(InMemoryLockStore::new());
        let result = LeaseLock::new("", store);
        assert!(matches!(result, Err(LockError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_invalid_defaults_are_rejected_at_construction() {
        let store = Arc::new(InMemoryLockStore::new());
        let result = LeaseLock::with_config(
            "job",
            store,
            LockConfig::default().with_max_attempts(AttemptLimit::Limit(0)),
        );
        assert!(matches!(result, Err(LockError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_same_name_derives_same_key() {
        let store = Arc::new(InMemoryLockStore::new());
        let a = LeaseLock::new("orders:refresh", store.clone()).unwrap();
        let b = LeaseLock::new("orders:refresh", store).unwrap();
        assert_eq!(a.key(), b.key());
    }

    #[tokio::test]
    async fn test_acquire_unheld_lock_then_release() {
        let store = Arc::new(InMemoryLockStore::new());
        let lock = LeaseLock::new("job", store.clone()).unwrap();

        let outcome = lock.acquire().await.unwrap();
        assert!(outcome.is_acquired());
        assert!(lock.is_held().await.unwrap());

        let mut lease = outcome.into_lease().unwrap();
        assert_eq!(lease.release().await.unwrap(), ReleaseOutcome::Released);
        assert!(!lock.is_held().await.unwrap());
    }

    #[tokio::test]
    async fn test_acquired_record_holds_the_lease_token() {
        let store = Arc::new(InMemoryLockStore::new());
        let lock = LeaseLock::new("job", store.clone()).unwrap();

        let lease = lock.acquire().await.unwrap().into_lease().unwrap();
        let stored = store.get(lock.key()).await.unwrap();
        assert_eq!(stored.as_deref(), lease.token());
    }

    #[tokio::test]
    async fn test_try_once_on_held_lock_returns_exhausted_without_waiting() {
        let store = Arc::new(InMemoryLockStore::new());
        let defaults =
            LockConfig::default().with_retry_delay(RetryDelay::Fixed(Duration::from_secs(60)));
        let lock = LeaseLock::with_config("job", store.clone(), defaults).unwrap();
        let _lease = lock.acquire().await.unwrap().into_lease().unwrap();

        let start = std::time::Instant::now();
        let outcome = lock.try_once().await.unwrap();
        assert!(matches!(outcome, AcquireOutcome::Exhausted));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_try_once_ignores_max_attempts_override() {
        let store = Arc::new(InMemoryLockStore::new());
        let lock = LeaseLock::with_config("job", store.clone(), fast_config()).unwrap();
        let _lease = lock.acquire().await.unwrap().into_lease().unwrap();

        let outcome = lock
            .try_once_with(
                LockOptions::new()
                    .with_max_attempts(AttemptLimit::Unbounded)
                    .with_retry_delay(RetryDelay::Fixed(Duration::from_secs(60))),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, AcquireOutcome::Exhausted));
    }

    #[tokio::test]
    async fn test_lock_becomes_acquirable_after_ttl_expiry() {
        let store = Arc::new(InMemoryLockStore::new());
        let lock = LeaseLock::with_config("job", store.clone(), fast_config()).unwrap();

        let _lease = lock
            .acquire_with(LockOptions::new().with_ttl(Duration::from_millis(20)))
            .await
            .unwrap()
            .into_lease()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let second = LeaseLock::with_config("job", store, fast_config()).unwrap();
        let outcome = second.try_once().await.unwrap();
        assert!(outcome.is_acquired());
    }

    #[tokio::test]
    async fn test_retry_outlives_short_ttl_and_succeeds() {
        let store = Arc::new(InMemoryLockStore::new());
        let lock = LeaseLock::with_config("job", store.clone(), fast_config()).unwrap();
        let _held = lock
            .acquire_with(LockOptions::new().with_ttl(Duration::from_millis(30)))
            .await
            .unwrap()
            .into_lease()
            .unwrap();

        let second = LeaseLock::with_config("job", store, fast_config()).unwrap();
        let outcome = second
            .acquire_with(
                LockOptions::new()
                    .with_max_attempts(AttemptLimit::Limit(2))
                    .with_retry_delay(RetryDelay::Fixed(Duration::from_millis(50))),
            )
            .await
            .unwrap();
        assert!(outcome.is_acquired());
    }

    #[tokio::test]
    async fn test_independent_names_do_not_contend() {
        let store = Arc::new(InMemoryLockStore::new());
        let a = LeaseLock::new("job:a", store.clone()).unwrap();
        let b = LeaseLock::new("job:b", store).unwrap();

        let _lease_a = a.acquire().await.unwrap().into_lease().unwrap();
        let outcome = b.try_once().await.unwrap();
        assert!(outcome.is_acquired());
    }

    #[tokio::test]
    async fn test_is_held_sees_foreign_holder() {
        let store = Arc::new(InMemoryLockStore::new());
        let holder = LeaseLock::new("job", store.clone()).unwrap();
        let observer = LeaseLock::new("job", store).unwrap();

        assert!(!observer.is_held().await.unwrap());
        let _lease = holder.acquire().await.unwrap().into_lease().unwrap();
        assert!(observer.is_held().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion_under_contention() {
        let store = Arc::new(InMemoryLockStore::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let entries = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let in_section = in_section.clone();
            let entries = entries.clone();
            handles.push(tokio::spawn(async move {
                let lock = LeaseLock::with_config("contended", store, fast_config()).unwrap();
                let mut lease = lock.acquire().await.unwrap().into_lease().unwrap();

                assert_eq!(in_section.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
                entries.fetch_add(1, Ordering::SeqCst);

                assert_eq!(lease.release().await.unwrap(), ReleaseOutcome::Released);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(entries.load(Ordering::SeqCst), 8);
    }
}
