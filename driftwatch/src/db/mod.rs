//! データベースアクセス層
//!
//! SQLiteベースのチェック結果永続化

/// チェック結果ストレージ
pub mod checks;

/// 遅延接続ストア
pub mod lazy;

/// データベースマイグレーション
pub mod migrations;

/// Repository traitパターン（テスタビリティ向上）
pub mod traits;

pub use checks::{CheckSummary, SqliteCheckStore, StoredCheck};
pub use lazy::LazyCheckStore;
pub use traits::CheckStore;
