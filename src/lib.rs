//! k1s0-lease-lock: リース方式の分散排他ロックライブラリ。
//!
//! アトミックな条件付き書き込みと比較削除を持つキーバリューストアの上で、
//! 名前付きリソースの排他制御を提供する。保持者が落ちたロックは TTL で
//! 自動回収される。

pub mod acquire;
pub mod config;
pub mod error;
pub mod key;
pub mod lease;
pub mod lock;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod store;
pub mod token;

pub use acquire::AcquireOutcome;
pub use config::{AttemptLimit, LockConfig, LockOptions, RetryDelay};
pub use error::LockError;
pub use key::derive_key;
pub use lease::{Lease, ReleaseOutcome};
pub use lock::LeaseLock;
pub use memory::InMemoryLockStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisLockStore;
pub use store::LockStore;
pub use token::new_token;

#[cfg(feature = "mock")]
pub use store::MockLockStore;
