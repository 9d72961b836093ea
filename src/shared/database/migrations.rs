use crate::shared::errors::AppResult;
use rusqlite::{params, Connection};

/// 適用順に並べたマイグレーション（バージョン, 説明, SQL）
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "create_subscriptions",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        id TEXT PRIMARY KEY,
        service_name TEXT NOT NULL,
        price INTEGER NOT NULL,
        user_id TEXT NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE
    );
    CREATE INDEX IF NOT EXISTS idx_subscriptions_user_id ON subscriptions(user_id);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_service_name ON subscriptions(service_name);
    CREATE INDEX IF NOT EXISTS idx_subscriptions_start_date ON subscriptions(start_date);",
)];

/// すべてのデータベースマイグレーションを実行する
///
/// 適用済みのバージョンは `schema_migrations` に記録し、再実行しない。
pub fn run_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    let mut applied = 0;

    for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![version, name, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        log::info!("マイグレーションを適用しました: {version} {name}");
        applied += 1;
    }

    if applied == 0 {
        log::debug!("スキーマは最新です（version={current}）");
    }

    Ok(())
}

/// 適用済みの最新バージョンを取得する（未適用なら0）
pub fn current_version(conn: &Connection) -> AppResult<i64> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}
