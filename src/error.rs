use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("ロック名が不正です: {0}")]
    InvalidName(String),
    #[error("ロック設定が不正です: {0}")]
    InvalidConfig(String),
    #[error("ストアエラー: {0}")]
    Store(String),
}
