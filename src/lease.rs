use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::store::LockStore;
use crate::LockError;

/// 解放の終端結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// 自分のレコードを削除した。
    Released,
    /// 何も保持していなかった (期限切れ・解放済み・未束縛のいずれか)。
    NotHeld,
}

/// 取得に成功したロックのハンドル。
///
/// 取得時のキーとトークンを束縛し、解放はトークンが一致するレコードの
/// 削除としてのみ行う。`unbound()` は何も保持しないハンドルで、後始末の
/// コードが取得の成否を調べずに release を呼べるようにする。
pub struct Lease {
    state: LeaseState,
}

enum LeaseState {
    Bound {
        key: String,
        token: String,
        store: Arc<dyn LockStore>,
    },
    Unbound,
}

impl Lease {
    pub fn unbound() -> Self {
        Self {
            state: LeaseState::Unbound,
        }
    }

    pub(crate) fn bound(key: &str, token: String, store: Arc<dyn LockStore>) -> Self {
        Self {
            state: LeaseState::Bound {
                key: key.to_string(),
                token,
                store,
            },
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, LeaseState::Bound { .. })
    }

    pub fn key(&self) -> Option<&str> {
        match &self.state {
            LeaseState::Bound { key, .. } => Some(key),
            LeaseState::Unbound => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            LeaseState::Bound { token, .. } => Some(token),
            LeaseState::Unbound => None,
        }
    }

    /// 自分のトークンと一致する場合のみレコードを削除する。
    ///
    /// 二重呼び出しは安全で、二度目は `NotHeld` になる。ストア障害時は
    /// ハンドルを束縛したまま返すため、解放を再試行できる。
    pub async fn release(&mut self) -> Result<ReleaseOutcome, LockError> {
        let (key, token, store) = match &self.state {
            LeaseState::Bound { key, token, store } => {
                (key.clone(), token.clone(), store.clone())
            }
            LeaseState::Unbound => return Ok(ReleaseOutcome::NotHeld),
        };

        let deleted = store.compare_and_delete(&key, &token).await?;
        self.state = LeaseState::Unbound;
        if deleted {
            Ok(ReleaseOutcome::Released)
        } else {
            Ok(ReleaseOutcome::NotHeld)
        }
    }

    /// 保持中のレコードの期限を ttl 後に再設定する。
    ///
    /// 既に保持者でなくなっている場合と未束縛のハンドルでは `Ok(false)`。
    pub async fn extend(&self, ttl: Duration) -> Result<bool, LockError> {
        match &self.state {
            LeaseState::Bound { key, token, store } => {
                store.compare_and_expire(key, token, ttl).await
            }
            LeaseState::Unbound => Ok(false),
        }
    }
}

impl Default for Lease {
    fn default() -> Self {
        Self::unbound()
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            LeaseState::Bound { key, .. } => f
                .debug_struct("Lease")
                .field("key", key)
                .field("bound", &true)
                .finish(),
            LeaseState::Unbound => f
                .debug_struct("Lease")
                .field("bound", &false)
                .finish(),
        }
    }
}
