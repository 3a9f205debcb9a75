use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{AttemptLimit, LockConfig};
use crate::lease::Lease;
use crate::store::LockStore;
use crate::{token, LockError};

/// ロック取得の終端結果。
#[derive(Debug)]
pub enum AcquireOutcome {
    /// 条件付き書き込みに成功し、リースを保持している。
    Acquired(Lease),
    /// max_attempts 回試行しても取得できなかった。
    Exhausted,
    /// timeout の期限までに取得できなかった。
    TimedOut,
    /// 呼び出し側のキャンセルにより中断した。
    Cancelled,
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    pub fn into_lease(self) -> Option<Lease> {
        match self {
            Self::Acquired(lease) => Some(lease),
            _ => None,
        }
    }
}

/// 取得リトライループ。
///
/// リトライするのは「既に保持されている」場合のみ。ストア障害は最初の
/// 発生時点でそのまま返す。待機は cancel と timeout 期限に割り込まれる。
pub(crate) async fn acquire_loop(
    store: Arc<dyn LockStore>,
    key: &str,
    config: &LockConfig,
    cancel: CancellationToken,
) -> Result<AcquireOutcome, LockError> {
    let deadline = config
        .timeout
        .map(|timeout| tokio::time::Instant::now() + timeout);
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(AcquireOutcome::Cancelled);
        }

        attempts += 1;
        let token_value = match &config.token {
            Some(fixed) => fixed.clone(),
            None => token::new_token(),
        };

        if store.set_if_absent(key, &token_value, config.ttl).await? {
            return Ok(AcquireOutcome::Acquired(Lease::bound(
                key,
                token_value,
                store,
            )));
        }

        if let AttemptLimit::Limit(max) = config.max_attempts {
            if attempts >= max {
                tracing::debug!(key, attempts, "試行回数の上限に達した");
                return Ok(AcquireOutcome::Exhausted);
            }
        }

        let delay = config.retry_delay.delay_for(attempts);
        tracing::debug!(
            key,
            attempts,
            delay_ms = delay.as_millis() as u64,
            "ロックを取得できず、リトライを待機"
        );

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(AcquireOutcome::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => return Ok(AcquireOutcome::TimedOut),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(AcquireOutcome::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
