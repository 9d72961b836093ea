/// データベース接続の初期化
pub mod connection;

/// スキーマのマイグレーション
pub mod migrations;

pub use connection::{initialize_database, open_in_memory};
pub use migrations::run_migrations;
