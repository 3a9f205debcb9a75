use uuid::Uuid;

/// 取得試行ごとの所有権トークンを生成する。
///
/// 解放時に自分が設定したレコードであることを証明する値。128bit の
/// ランダム UUID を使うため、同一キーに対して衝突することは実質ない。
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}
