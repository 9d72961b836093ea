/// 共有エラー型とエラーハンドリング
pub mod errors;

/// 共有データベース接続管理
pub mod database;

/// 共有設定管理
pub mod config;

/// HTTPサーバー基盤
pub mod server;

// 便利な再エクスポート
pub use config::{
    initialize_logging_system, load_environment_variables, AppConfig, Environment,
};
pub use database::{initialize_database, open_in_memory, run_migrations};
pub use errors::{AppError, AppResult, ErrorSeverity};
