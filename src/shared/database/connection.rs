use super::migrations::run_migrations;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::Connection;
use std::path::Path;

/// インメモリデータベースを表すパス
pub const IN_MEMORY_PATH: &str = ":memory:";

/// データベース接続を初期化し、マイグレーションを実行する
///
/// # 引数
/// * `database_path` - データベースファイルのパス（`:memory:` の場合はインメモリ）
///
/// # 戻り値
/// データベース接続、または失敗時はエラー
///
/// # 処理内容
/// 1. 親ディレクトリの確保
/// 2. データベース接続の開設
/// 3. テーブル作成とマイグレーションの実行
pub fn initialize_database(database_path: &Path) -> AppResult<Connection> {
    if database_path == Path::new(IN_MEMORY_PATH) {
        log::warn!("インメモリデータベースを使用します（再起動でデータは失われます）");
        return open_in_memory();
    }

    ensure_parent_directory(database_path)?;

    let conn = Connection::open(database_path).map_err(|e| {
        AppError::repository(format!(
            "データベースのオープンに失敗しました: {}: {e}",
            database_path.display()
        ))
    })?;

    run_migrations(&conn)?;

    log::info!("データベースを初期化しました: {}", database_path.display());

    Ok(conn)
}

/// マイグレーション済みのインメモリデータベースを開く
pub fn open_in_memory() -> AppResult<Connection> {
    let conn = Connection::open_in_memory()?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// データベースファイルの親ディレクトリが存在しない場合は作成する
fn ensure_parent_directory(database_path: &Path) -> AppResult<()> {
    let Some(parent) = database_path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() || parent.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(parent).map_err(|e| {
        AppError::configuration(format!(
            "データディレクトリの作成に失敗: {}: {e}",
            parent.display()
        ))
    })?;
    log::info!("データディレクトリを作成: {}", parent.display());

    Ok(())
}
