use super::models::{Subscription, SubscriptionFilter, TotalCostFilter};
use super::month_year::MonthYear;
use crate::shared::errors::{AppError, AppResult};
use rusqlite::{params, Connection, Row, ToSql};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// サブスクリプションの永続化を抽象化するリポジトリ
///
/// 「レコードが存在しない」場合は `AppError::NotFound`、
/// それ以外のストレージ障害は `AppError::Repository` を返す。
pub trait SubscriptionRepository: Send + Sync {
    /// IDでサブスクリプションを取得する
    fn get(&self, id: Uuid) -> AppResult<Subscription>;

    /// フィルターに一致するサブスクリプションをページ単位で取得する
    fn list(&self, filter: &SubscriptionFilter) -> AppResult<Vec<Subscription>>;

    /// 新しいサブスクリプションを保存する
    fn add(&self, subscription: &Subscription) -> AppResult<()>;

    /// IDが一致するレコードを丸ごと置き換える（存在確認は行わない）
    fn update(&self, subscription: &Subscription) -> AppResult<()>;

    /// IDでサブスクリプションを削除する
    fn delete(&self, id: Uuid) -> AppResult<()>;

    /// 条件に一致するサブスクリプションの価格合計を計算する（該当なしは0）
    fn calculate_total_cost(&self, filter: &TotalCostFilter) -> AppResult<i64>;
}

const SELECT_COLUMNS: &str =
    "SELECT id, service_name, price, user_id, start_date, end_date FROM subscriptions";

/// SQLiteによるリポジトリ実装
#[derive(Clone)]
pub struct SqliteSubscriptionRepository {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSubscriptionRepository {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// データベース接続を取得する
    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| AppError::repository(format!("データベースロックエラー: {e}")))
    }
}

/// テーブルの1行分（エンティティへの変換前）
struct SubscriptionRow {
    id: String,
    service_name: String,
    price: i64,
    user_id: String,
    start_date: MonthYear,
    end_date: Option<MonthYear>,
}

impl SubscriptionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            service_name: row.get(1)?,
            price: row.get(2)?,
            user_id: row.get(3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
        })
    }

    /// エンティティに変換する
    ///
    /// 保存済みデータが不変条件を満たさない場合もリポジトリエラーとして扱う。
    fn into_entity(self) -> AppResult<Subscription> {
        let id = parse_stored_uuid(&self.id)?;
        let user_id = parse_stored_uuid(&self.user_id)?;

        Subscription::with_id(
            id,
            self.service_name,
            user_id,
            self.price,
            self.start_date,
            self.end_date,
        )
        .map_err(|e| AppError::repository(format!("ID {id} の保存データが不正です: {e}")))
    }
}

fn parse_stored_uuid(text: &str) -> AppResult<Uuid> {
    Uuid::parse_str(text)
        .map_err(|e| AppError::repository(format!("保存されたUUIDが不正です: {text}: {e}")))
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn get(&self, id: Uuid) -> AppResult<Subscription> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                SubscriptionRow::from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    AppError::not_found(format!("ID {id} のサブスクリプション"))
                }
                _ => AppError::from(e),
            })?;

        row.into_entity()
    }

    fn list(&self, filter: &SubscriptionFilter) -> AppResult<Vec<Subscription>> {
        let mut query = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        // ユーザーIDフィルター
        if let Some(user_id) = filter.user_id {
            query.push_str(" AND user_id = ?");
            params.push(Box::new(user_id.to_string()));
        }

        // サービス名フィルター（完全一致）
        if let Some(service_name) = &filter.service_name {
            query.push_str(" AND service_name = ?");
            params.push(Box::new(service_name.clone()));
        }

        // 開始月の下限
        if let Some(start_date) = filter.start_date {
            query.push_str(" AND start_date >= ?");
            params.push(Box::new(start_date));
        }

        // 終了月の上限（終了月なしは常に一致）
        if let Some(end_date) = filter.end_date {
            query.push_str(" AND (end_date IS NULL OR end_date <= ?)");
            params.push(Box::new(end_date));
        }

        query.push_str(" ORDER BY rowid LIMIT ? OFFSET ?");
        params.push(Box::new(filter.limit()));
        params.push(Box::new(filter.offset()));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), SubscriptionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SubscriptionRow::into_entity).collect()
    }

    fn add(&self, subscription: &Subscription) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO subscriptions (id, service_name, price, user_id, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                subscription.id().to_string(),
                subscription.service_name(),
                subscription.price(),
                subscription.user_id().to_string(),
                subscription.start_date(),
                subscription.end_date(),
            ],
        )?;

        Ok(())
    }

    fn update(&self, subscription: &Subscription) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE subscriptions
             SET service_name = ?1, price = ?2, user_id = ?3, start_date = ?4, end_date = ?5
             WHERE id = ?6",
            params![
                subscription.service_name(),
                subscription.price(),
                subscription.user_id().to_string(),
                subscription.start_date(),
                subscription.end_date(),
                subscription.id().to_string(),
            ],
        )?;

        Ok(())
    }

    fn delete(&self, id: Uuid) -> AppResult<()> {
        let conn = self.conn()?;
        let affected_rows = conn.execute(
            "DELETE FROM subscriptions WHERE id = ?1",
            params![id.to_string()],
        )?;

        if affected_rows == 0 {
            return Err(AppError::not_found(format!("ID {id} のサブスクリプション")));
        }

        Ok(())
    }

    fn calculate_total_cost(&self, filter: &TotalCostFilter) -> AppResult<i64> {
        let conn = self.conn()?;

        // 開始月が期間内のものだけを合計する（終了月は見ない）
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(price), 0) FROM subscriptions
             WHERE user_id = ?1 AND service_name = ?2 AND start_date BETWEEN ?3 AND ?4",
            params![
                filter.user_id.to_string(),
                filter.service_name,
                filter.period_start,
                filter.period_end,
            ],
            |row| row.get(0),
        )?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::database::open_in_memory;

    fn repository() -> SqliteSubscriptionRepository {
        SqliteSubscriptionRepository::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    fn month(year: i32, month: u32) -> MonthYear {
        MonthYear::new(year, month).unwrap()
    }

    fn subscription(
        service_name: &str,
        user_id: Uuid,
        price: i64,
        start: MonthYear,
        end: Option<MonthYear>,
    ) -> Subscription {
        Subscription::new(service_name, user_id, price, start, end).unwrap()
    }

    fn ids(subs: &[Subscription]) -> Vec<Uuid> {
        subs.iter().map(Subscription::id).collect()
    }

    #[test]
    fn test_add_and_get() {
        let repo = repository();
        let sub = subscription("Netflix", Uuid::new_v4(), 999, month(2025, 8), None);

        repo.add(&sub).unwrap();
        let loaded = repo.get(sub.id()).unwrap();

        assert_eq!(loaded, sub);
        assert_eq!(loaded.end_date(), None);
    }

    #[test]
    fn test_get_not_found() {
        let repo = repository();
        let id = Uuid::new_v4();
        let error = repo.get(id).unwrap_err();
        assert!(error.is_not_found());
        assert_eq!(
            error.user_message(),
            format!("ID {id} のサブスクリプションが見つかりません")
        );
    }

    #[test]
    fn test_add_duplicate_id_is_repository_error() {
        let repo = repository();
        let sub = subscription("Netflix", Uuid::new_v4(), 999, month(2025, 8), None);

        repo.add(&sub).unwrap();
        let result = repo.add(&sub);
        assert!(matches!(result, Err(AppError::Repository(_))));
    }

    #[test]
    fn test_update_replaces_record() {
        let repo = repository();
        let mut sub = subscription("Netflix", Uuid::new_v4(), 999, month(2025, 8), None);
        repo.add(&sub).unwrap();

        sub.set_service_name("Netflix Premium");
        sub.set_price(1999);
        sub.set_start_end_date(month(2025, 9), Some(month(2026, 9)))
            .unwrap();
        repo.update(&sub).unwrap();

        assert_eq!(repo.get(sub.id()).unwrap(), sub);
    }

    #[test]
    fn test_delete() {
        let repo = repository();
        let sub = subscription("Netflix", Uuid::new_v4(), 999, month(2025, 8), None);
        repo.add(&sub).unwrap();

        repo.delete(sub.id()).unwrap();
        assert!(matches!(repo.get(sub.id()), Err(AppError::NotFound(_))));
        assert!(matches!(repo.delete(sub.id()), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_list_empty_result() {
        let repo = repository();
        let filter = SubscriptionFilter {
            service_name: Some("non-existent-service".to_string()),
            ..Default::default()
        };
        assert!(repo.list(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_by_user_and_service() {
        let repo = repository();
        let user = Uuid::new_v4();
        let other_user = Uuid::new_v4();

        let matching = subscription("Netflix", user, 999, month(2025, 1), None);
        repo.add(&matching).unwrap();
        repo.add(&subscription("Spotify", user, 299, month(2025, 1), None))
            .unwrap();
        repo.add(&subscription("Netflix", other_user, 999, month(2025, 1), None))
            .unwrap();

        let filter = SubscriptionFilter {
            user_id: Some(user),
            service_name: Some("Netflix".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list(&filter).unwrap()), vec![matching.id()]);
    }

    #[test]
    fn test_list_min_start_date_is_inclusive() {
        let repo = repository();
        let user = Uuid::new_v4();

        let before = subscription("A", user, 1, month(2025, 7), None);
        let on = subscription("A", user, 1, month(2025, 8), None);
        let after = subscription("A", user, 1, month(2025, 9), None);
        for sub in [&before, &on, &after] {
            repo.add(sub).unwrap();
        }

        let filter = SubscriptionFilter {
            start_date: Some(month(2025, 8)),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list(&filter).unwrap()), vec![on.id(), after.id()]);
    }

    #[test]
    fn test_list_max_end_date_includes_open_ended() {
        let repo = repository();
        let user = Uuid::new_v4();

        let open_ended = subscription("A", user, 1, month(2030, 1), None);
        let ends_on_bound = subscription("A", user, 1, month(2025, 1), Some(month(2025, 8)));
        let ends_after_bound = subscription("A", user, 1, month(2025, 1), Some(month(2025, 9)));
        for sub in [&open_ended, &ends_on_bound, &ends_after_bound] {
            repo.add(sub).unwrap();
        }

        let filter = SubscriptionFilter {
            end_date: Some(month(2025, 8)),
            ..Default::default()
        };
        assert_eq!(
            ids(&repo.list(&filter).unwrap()),
            vec![open_ended.id(), ends_on_bound.id()]
        );

        // どんなに早い上限でも終了月なしは含まれる
        let filter = SubscriptionFilter {
            end_date: Some(month(1990, 1)),
            ..Default::default()
        };
        assert_eq!(ids(&repo.list(&filter).unwrap()), vec![open_ended.id()]);
    }

    #[test]
    fn test_list_pagination() {
        let repo = repository();
        let user = Uuid::new_v4();
        let subs: Vec<Subscription> = (1..=5)
            .map(|m| subscription("A", user, 100, month(2025, m), None))
            .collect();
        for sub in &subs {
            repo.add(sub).unwrap();
        }

        let page = |page, page_size| SubscriptionFilter {
            page,
            page_size,
            ..Default::default()
        };

        assert_eq!(ids(&repo.list(&page(1, 2)).unwrap()), ids(&subs[0..2]));
        assert_eq!(ids(&repo.list(&page(3, 2)).unwrap()), ids(&subs[4..5]));
        assert!(repo.list(&page(4, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_list_page_beyond_i64_range_is_empty() {
        let repo = repository();
        repo.add(&subscription("A", Uuid::new_v4(), 100, month(2025, 1), None))
            .unwrap();

        let filter = SubscriptionFilter {
            page: u32::MAX,
            page_size: u32::MAX,
            ..Default::default()
        };
        assert!(repo.list(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_calculate_total_cost_uses_start_date_only() {
        let repo = repository();
        let user = Uuid::new_v4();

        repo.add(&subscription("A", user, 100, month(2025, 7), Some(month(2025, 8))))
            .unwrap();
        repo.add(&subscription("A", user, 200, month(2025, 8), None))
            .unwrap();
        repo.add(&subscription("A", user, 300, month(2025, 8), Some(month(2026, 1))))
            .unwrap();
        // 別ユーザー・別サービスは対象外
        repo.add(&subscription("A", Uuid::new_v4(), 1000, month(2025, 8), None))
            .unwrap();
        repo.add(&subscription("B", user, 1000, month(2025, 8), None))
            .unwrap();

        let filter = TotalCostFilter {
            user_id: user,
            service_name: "A".to_string(),
            period_start: month(2025, 8),
            period_end: month(2025, 8),
        };
        assert_eq!(repo.calculate_total_cost(&filter).unwrap(), 500);

        let filter = TotalCostFilter {
            period_start: month(2025, 7),
            period_end: month(2025, 12),
            ..filter
        };
        assert_eq!(repo.calculate_total_cost(&filter).unwrap(), 600);
    }

    #[test]
    fn test_calculate_total_cost_no_match_is_zero() {
        let repo = repository();
        let filter = TotalCostFilter {
            user_id: Uuid::new_v4(),
            service_name: "A".to_string(),
            period_start: month(2025, 1),
            period_end: month(2025, 12),
        };
        assert_eq!(repo.calculate_total_cost(&filter).unwrap(), 0);
    }

    #[test]
    fn test_corrupted_row_is_repository_error() {
        let repo = repository();
        {
            let conn = repo.conn().unwrap();
            conn.execute(
                "INSERT INTO subscriptions (id, service_name, price, user_id, start_date, end_date)
                 VALUES ('broken', 'A', 1, 'also-broken', '2025-08-01', NULL)",
                [],
            )
            .unwrap();
        }

        let result = repo.list(&SubscriptionFilter::default());
        assert!(matches!(result, Err(AppError::Repository(_))));
    }
}
