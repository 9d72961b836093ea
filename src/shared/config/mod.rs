/// 実行環境と環境変数による設定
pub mod environment;

pub use environment::{
    initialize_logging_system, load_environment_variables, AppConfig,
    CorsConfig, DatabaseConfig, Environment, LoggerConfig, ServerConfig,
};
