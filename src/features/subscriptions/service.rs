use super::models::{
    CreateSubscriptionCommand, Subscription, SubscriptionFilter, TotalCostFilter,
    UpdateSubscriptionCommand,
};
use super::repository::SubscriptionRepository;
use crate::shared::errors::AppResult;
use std::sync::Arc;
use uuid::Uuid;

/// サブスクリプションのユースケースを調整するサービス
///
/// 状態を持たず、呼び出しごとにリポジトリへ委譲する。
pub struct SubscriptionService {
    repository: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionService {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    /// IDでサブスクリプションを取得する
    pub fn get_subscription(&self, id: Uuid) -> AppResult<Subscription> {
        self.repository.get(id)
    }

    /// フィルターに一致するサブスクリプション一覧を取得する
    pub fn list_subscriptions(&self, filter: &SubscriptionFilter) -> AppResult<Vec<Subscription>> {
        self.repository.list(filter)
    }

    /// サブスクリプションを作成し、生成されたIDを返す
    pub fn create_subscription(&self, command: CreateSubscriptionCommand) -> AppResult<Uuid> {
        let subscription = Subscription::new(
            command.service_name,
            command.user_id,
            command.price,
            command.start_date,
            command.end_date,
        )?;

        self.repository.add(&subscription)?;

        log::info!(
            "サブスクリプションを作成しました: id={}, user_id={}",
            subscription.id(),
            subscription.user_id()
        );
        Ok(subscription.id())
    }

    /// サブスクリプションを更新する
    ///
    /// 期間の検証に失敗した場合はストレージに何も書き込まない。
    pub fn update_subscription(&self, id: Uuid, command: UpdateSubscriptionCommand) -> AppResult<()> {
        let mut subscription = self.repository.get(id)?;

        subscription.set_service_name(command.service_name);
        subscription.set_price(command.price);
        subscription.set_start_end_date(command.start_date, command.end_date)?;

        self.repository.update(&subscription)?;

        log::info!("サブスクリプションを更新しました: id={id}");
        Ok(())
    }

    /// サブスクリプションを削除する
    ///
    /// 既に存在しない場合も成功として扱う。
    pub fn delete_subscription(&self, id: Uuid) -> AppResult<()> {
        match self.repository.delete(id) {
            Ok(()) => {
                log::info!("サブスクリプションを削除しました: id={id}");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                log::debug!("削除対象が存在しません（成功として扱います）: id={id}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 合計金額を計算する
    pub fn calculate_total_cost(&self, filter: &TotalCostFilter) -> AppResult<i64> {
        self.repository.calculate_total_cost(filter)
    }
}
