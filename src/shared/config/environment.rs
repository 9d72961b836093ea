use crate::shared::errors::{AppError, AppResult};
use std::net::SocketAddr;
use std::path::PathBuf;

/// アプリケーションの実行環境を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// 開発環境
    Development,
    /// プロダクション環境
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// 実行環境を判定する
///
/// # 判定ロジック
/// 1. 環境変数 ENVIRONMENT の値を確認
/// 2. デバッグビルドの場合は Development
/// 3. リリースビルドの場合は Production
fn resolve_environment(value: Option<&str>) -> Environment {
    if let Some(env_var) = value {
        let env = Environment::parse(env_var);
        log::debug!("環境判定: 実行時環境変数を使用 -> {env_var} -> {env:?}");
        return env;
    }

    // フォールバック: ビルド設定に基づく判定
    if cfg!(debug_assertions) {
        Environment::Development
    } else {
        Environment::Production
    }
}

/// HTTPサーバー設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// 待ち受けアドレスを解決する
    ///
    /// SERVER_HOST にはIPアドレスのほか `localhost` などのホスト名も指定できる。
    /// 複数のアドレスに解決された場合は最初のものを使う。
    pub async fn resolve_address(&self) -> AppResult<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                AppError::configuration(format!("SERVER_HOSTを解決できません: {}: {e}", self.host))
            })?;

        addrs.next().ok_or_else(|| {
            AppError::configuration(format!("SERVER_HOSTに対応するアドレスがありません: {}", self.host))
        })
    }
}

/// データベース設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLiteファイルのパス（`:memory:` も可）
    pub path: PathBuf,
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level: String,
}

impl LoggerConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_lowercase().as_str() {
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

/// CORS設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    /// プリフライト結果のキャッシュ秒数
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: split_list("GET,POST,PUT,DELETE,OPTIONS"),
            allow_headers: split_list("Authorization,Content-Type"),
            expose_headers: Vec::new(),
            allow_credentials: true,
            max_age: 3600,
        }
    }
}

/// アプリケーション全体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logger: LoggerConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の取得関数から設定を読み込む
    ///
    /// # 環境変数
    /// - `ENVIRONMENT` - development / production
    /// - `SERVER_HOST`, `SERVER_PORT` - 待ち受けアドレス（既定: 0.0.0.0:8080）
    /// - `DATABASE_PATH` - SQLiteファイル（既定: データディレクトリ配下）
    /// - `LOG_LEVEL` - 既定は開発環境で debug、本番で info
    /// - `CORS_ALLOW_ORIGINS`, `CORS_ALLOW_METHODS`, `CORS_ALLOW_HEADERS`,
    ///   `CORS_EXPOSE_HEADERS`, `CORS_ALLOW_CREDENTIALS`, `CORS_MAX_AGE`
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = resolve_environment(get("ENVIRONMENT").as_deref());

        let port = match get("SERVER_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| AppError::configuration(format!("SERVER_PORTが不正です: {value}: {e}")))?,
            None => 8080,
        };
        let server = ServerConfig {
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        };

        let database = DatabaseConfig {
            path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_database_path(environment)),
        };

        let logger = LoggerConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| match environment {
                Environment::Development => "debug".to_string(),
                Environment::Production => "info".to_string(),
            }),
        };

        let defaults = CorsConfig::default();
        let cors = CorsConfig {
            allow_origins: get("CORS_ALLOW_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.allow_origins),
            allow_methods: get("CORS_ALLOW_METHODS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.allow_methods),
            allow_headers: get("CORS_ALLOW_HEADERS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.allow_headers),
            expose_headers: get("CORS_EXPOSE_HEADERS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.expose_headers),
            allow_credentials: match get("CORS_ALLOW_CREDENTIALS") {
                Some(value) => parse_bool("CORS_ALLOW_CREDENTIALS", &value)?,
                None => defaults.allow_credentials,
            },
            max_age: match get("CORS_MAX_AGE") {
                Some(value) => parse_seconds("CORS_MAX_AGE", &value)?,
                None => defaults.max_age,
            },
        };

        Ok(Self {
            environment,
            server,
            database,
            logger,
            cors,
        })
    }

    /// 読み込んだ設定をログに出力する
    pub fn log_summary(&self) {
        log::info!(
            "設定を読み込みました: environment={}, server={}:{}, database={}, log_level={}, cors_origins={:?}",
            self.environment.as_str(),
            self.server.host,
            self.server.port,
            self.database.path.display(),
            self.logger.level,
            self.cors.allow_origins
        );
    }
}

/// 環境に応じたデータベースファイル名を取得する
///
/// # ファイル名の規則
/// - 開発環境: "dev_subscriptions.db"
/// - プロダクション環境: "subscriptions.db"
pub fn get_database_filename(env: Environment) -> &'static str {
    match env {
        Environment::Development => "dev_subscriptions.db",
        Environment::Production => "subscriptions.db",
    }
}

/// OSのデータディレクトリ配下の既定データベースパス
fn default_database_path(env: Environment) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subscription-service")
        .join(get_database_filename(env))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AppError::configuration(format!("{key}が不正です: {value}"))),
    }
}

/// 秒数を解析する（"3600" と "3600s" の両方を受け付ける）
fn parse_seconds(key: &str, value: &str) -> AppResult<u64> {
    value
        .trim()
        .trim_end_matches('s')
        .parse::<u64>()
        .map_err(|e| AppError::configuration(format!("{key}が不正です: {value}: {e}")))
}

/// .envファイルを読み込む
///
/// ログシステム初期化前に呼ばれるため、結果は標準エラー出力に書き出す。
/// ファイルがない場合は直接設定された環境変数を使用する。
pub fn load_environment_variables() {
    match dotenv::dotenv() {
        Ok(path) => {
            eprintln!("環境ファイルを読み込みました: {}", path.display());
        }
        Err(_) => {
            eprintln!(".envファイルが見つかりません。環境変数が直接設定されていることを確認してください。");
        }
    }
}

/// ログシステムを初期化する
///
/// # 処理内容
/// 1. 設定からログレベルを決定
/// 2. env_loggerを初期化（RUST_LOG による上書きも可能）
pub fn initialize_logging_system(config: &AppConfig) {
    let result = env_logger::Builder::new()
        .filter_level(config.logger.level_filter())
        .parse_default_env()
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("ログシステムは既に初期化されています: {e}");
        return;
    }

    log::info!(
        "ログシステムを初期化しました: level={}, environment={}",
        config.logger.level,
        config.environment.as_str()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_environment_equality() {
        assert_eq!(Environment::Development, Environment::Development);
        assert_ne!(Environment::Development, Environment::Production);
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("local"), Environment::Development);
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("ENVIRONMENT", "development")]).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logger.level, "debug");
        assert_eq!(config.cors, CorsConfig::default());
        assert!(config
            .database
            .path
            .ends_with(get_database_filename(Environment::Development)));
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_production_defaults_to_info_logging() {
        let config = config_from(&[("ENVIRONMENT", "production")]).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.logger.level, "info");
        assert_eq!(config.logger.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9090"),
            ("DATABASE_PATH", ":memory:"),
            ("LOG_LEVEL", "warn"),
            ("CORS_ALLOW_ORIGINS", "https://a.example, https://b.example"),
            ("CORS_ALLOW_CREDENTIALS", "false"),
            ("CORS_MAX_AGE", "600s"),
        ])
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, PathBuf::from(":memory:"));
        assert_eq!(config.logger.level_filter(), log::LevelFilter::Warn);
        assert_eq!(
            config.cors.allow_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.cors.max_age, 600);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        assert!(matches!(
            config_from(&[("SERVER_PORT", "http")]),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            config_from(&[("CORS_MAX_AGE", "forever")]),
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_address_accepts_ip_and_hostname() {
        let ip = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
        };
        assert_eq!(
            ip.resolve_address().await.unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );

        let hostname = ServerConfig {
            host: "localhost".to_string(),
            port: 9090,
        };
        let addr = hostname.resolve_address().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9090);
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let logger = LoggerConfig {
            level: "verbose".to_string(),
        };
        assert_eq!(logger.level_filter(), log::LevelFilter::Info);
    }
}
