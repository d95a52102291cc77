//! driftwatch 共通ライブラリ
//!
//! watchdogとログAPIで共有するデータ型・設定・エラー・ログ行パーサー

#![warn(missing_docs)]

/// 設定構造体
pub mod config;

/// エラー型
pub mod error;

/// ログ行パーサー
pub mod log;

/// コアデータ型
pub mod types;
