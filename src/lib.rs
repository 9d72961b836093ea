// 機能別モジュール構成
pub mod features;
pub mod shared;

use features::subscriptions::{SqliteSubscriptionRepository, SubscriptionHandler, SubscriptionService};
use shared::config::{initialize_logging_system, load_environment_variables, AppConfig};
use shared::database::initialize_database;
use shared::errors::AppResult;
use shared::server::{shutdown_on_signal, Cors, HttpServer};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// アプリケーションを起動する
///
/// # 処理内容
/// 1. 環境変数を読み込み（.envファイルがある場合）
/// 2. 設定を読み込み、ログシステムを初期化
/// 3. tokioランタイム上でHTTPサーバーを停止要求まで実行
pub fn run() -> AppResult<()> {
    load_environment_variables();

    let config = AppConfig::from_env()?;
    initialize_logging_system(&config);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

/// 設定に従ってサービスを組み立て、停止要求まで待ち受ける
pub async fn serve(config: AppConfig) -> AppResult<()> {
    log::info!("データベースを初期化しています...");
    let db_conn = initialize_database(&config.database.path).map_err(|e| {
        log::error!("データベースの初期化に失敗しました: {e}");
        e
    })?;

    let repository = Arc::new(SqliteSubscriptionRepository::new(Arc::new(Mutex::new(db_conn))));
    let service = Arc::new(SubscriptionService::new(repository));
    let handler = Arc::new(SubscriptionHandler::new(service));

    let addr = config.server.resolve_address().await?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        log::error!("ポートのバインドに失敗しました: {addr}: {e}");
        e
    })?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    HttpServer::new(handler, Cors::new(config.cors))
        .serve(listener, shutdown)
        .await?;

    log::info!("アプリケーションを終了しました");
    Ok(())
}
