use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::LockError;

/// 取得試行回数の上限。`Limit(1)` は「一度だけ試す」を意味する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    Unbounded,
    Limit(u32),
}

/// 失敗した試行の間に挟む待機ポリシー。
///
/// `Custom` は試行回数 (1 始まり) を受け取り待機時間を返す。副作用を
/// 持ってよい。戻り値がそのまま次の試行までの待機になる。
#[derive(Clone)]
pub enum RetryDelay {
    Fixed(Duration),
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// 指数バックオフ。倍率 2.0、±10% のジッタ付き、`cap` で頭打ち。
    pub fn exponential(initial: Duration, cap: Duration) -> Self {
        Self::custom(move |attempt| {
            let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
            let base = initial.as_millis() as f64 * 2.0f64.powi(exp);
            let capped = base.min(cap.as_millis() as f64);
            let jitter_range = capped * 0.1;
            let delay_ms = capped - jitter_range + rand::random::<f64>() * jitter_range * 2.0;
            Duration::from_millis(delay_ms as u64)
        })
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Custom(f) => f(attempt),
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// ロック取得のデフォルト設定。
///
/// `token` を設定すると全試行でその値を所有権トークンとして使う
/// (決定的なテスト向け)。未設定なら試行ごとに新しいトークンを生成する。
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub ttl: Duration,
    pub retry_delay: RetryDelay,
    pub max_attempts: AttemptLimit,
    pub timeout: Option<Duration>,
    pub token: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(5000),
            retry_delay: RetryDelay::Fixed(Duration::from_millis(50)),
            max_attempts: AttemptLimit::Unbounded,
            timeout: None,
            token: None,
        }
    }
}

impl LockConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: AttemptLimit) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.ttl.is_zero() {
            return Err(LockError::InvalidConfig("ttl は正の値であること".to_string()));
        }
        if self.max_attempts == AttemptLimit::Limit(0) {
            return Err(LockError::InvalidConfig(
                "max_attempts は 1 以上であること".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(LockError::InvalidConfig(
                    "timeout は正の値であること".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 呼び出しごとの上書きをフィールド単位でマージし、検証済みの設定を返す。
    pub fn merged(&self, options: LockOptions) -> Result<LockConfig, LockError> {
        let merged = LockConfig {
            ttl: options.ttl.unwrap_or(self.ttl),
            retry_delay: options
                .retry_delay
                .unwrap_or_else(|| self.retry_delay.clone()),
            max_attempts: options.max_attempts.unwrap_or(self.max_attempts),
            timeout: options.timeout.or(self.timeout),
            token: options.token.or_else(|| self.token.clone()),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// 呼び出しごとの設定上書き。未設定のフィールドはデフォルト側の値を使う。
#[derive(Debug, Clone, Default)]
pub struct LockOptions {
    pub ttl: Option<Duration>,
    pub retry_delay: Option<RetryDelay>,
    pub max_attempts: Option<AttemptLimit>,
    pub timeout: Option<Duration>,
    pub token: Option<String>,
}

impl LockOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: RetryDelay) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: AttemptLimit) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
