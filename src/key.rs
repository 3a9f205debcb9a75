use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "lock:";

/// ロック名から固定長のストレージキーを導出する。
///
/// 同一の名前は常に同一のキーになる。名前を SHA-256 でハッシュし、
/// 共有ストア内の無関係なキーと衝突しないよう名前空間プレフィックスを付ける。
pub fn derive_key(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("{}{}", KEY_PREFIX, hex::encode(digest))
}
