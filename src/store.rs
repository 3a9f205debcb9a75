use std::time::Duration;

use async_trait::async_trait;

use crate::LockError;

/// ロックレコードを保持するキーバリューストアの抽象。
///
/// 競合 (レコードが既に存在する / 値が一致しない) は `Ok(false)`、
/// トランスポートやバックエンドの障害は `Err(LockError::Store)` で返す。
/// 各操作はバックエンド側でアトミックであること。
#[async_trait]
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait LockStore: Send + Sync {
    /// キーが存在しない場合のみレコードを作成し、期限を ttl 後に設定する。
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, LockError>;

    /// 現在の値を読む。期限切れのレコードは不在として扱う。
    async fn get(&self, key: &str) -> Result<Option<String>, LockError>;

    /// 現在の値が expected と一致する場合のみレコードを削除する。
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError>;

    /// 現在の値が expected と一致する場合のみ期限を ttl 後に再設定する。
    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, LockError>;
}
