use super::month_year::MonthYear;
use crate::shared::errors::{AppError, AppResult, FieldErrors};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一覧取得のデフォルトページサイズ
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// サブスクリプションエンティティ
///
/// 終了月が存在する場合、開始月より前であってはならない。
/// この条件は生成時と日付の変更時に常に検証され、違反時は状態を変更しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: Uuid,
    service_name: String,
    price: i64,
    user_id: Uuid,
    start_date: MonthYear,
    end_date: Option<MonthYear>,
}

impl Subscription {
    /// 新しいサブスクリプションを作成する（IDは自動生成）
    ///
    /// # 戻り値
    /// 作成されたサブスクリプション、終了月が開始月より前の場合は `InvalidPeriod`
    pub fn new(
        service_name: impl Into<String>,
        user_id: Uuid,
        price: i64,
        start_date: MonthYear,
        end_date: Option<MonthYear>,
    ) -> AppResult<Self> {
        Self::with_id(
            Uuid::new_v4(),
            service_name,
            user_id,
            price,
            start_date,
            end_date,
        )
    }

    /// 既存のIDでサブスクリプションを再構築する（ストレージからの復元用）
    pub fn with_id(
        id: Uuid,
        service_name: impl Into<String>,
        user_id: Uuid,
        price: i64,
        start_date: MonthYear,
        end_date: Option<MonthYear>,
    ) -> AppResult<Self> {
        validate_period(start_date, end_date)?;

        Ok(Self {
            id,
            service_name: service_name.into(),
            price,
            user_id,
            start_date,
            end_date,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn start_date(&self) -> MonthYear {
        self.start_date
    }

    pub fn end_date(&self) -> Option<MonthYear> {
        self.end_date
    }

    pub fn set_service_name(&mut self, service_name: impl Into<String>) {
        self.service_name = service_name.into();
    }

    pub fn set_price(&mut self, price: i64) {
        self.price = price;
    }

    /// 開始月を変更する（現在の終了月との組み合わせを検証）
    pub fn set_start_date(&mut self, start_date: MonthYear) -> AppResult<()> {
        validate_period(start_date, self.end_date)?;
        self.start_date = start_date;
        Ok(())
    }

    /// 終了月を変更する（現在の開始月との組み合わせを検証）
    pub fn set_end_date(&mut self, end_date: Option<MonthYear>) -> AppResult<()> {
        validate_period(self.start_date, end_date)?;
        self.end_date = end_date;
        Ok(())
    }

    /// 開始月と終了月を同時に変更する
    ///
    /// 組み合わせを検証してから両方を反映するため、
    /// 途中で不正な期間が観測されることはない。
    pub fn set_start_end_date(
        &mut self,
        start_date: MonthYear,
        end_date: Option<MonthYear>,
    ) -> AppResult<()> {
        validate_period(start_date, end_date)?;
        self.start_date = start_date;
        self.end_date = end_date;
        Ok(())
    }
}

/// 終了月が開始月より前でないことを検証する（同月は有効）
fn validate_period(start_date: MonthYear, end_date: Option<MonthYear>) -> AppResult<()> {
    match end_date {
        Some(end) if end < start_date => Err(AppError::InvalidPeriod),
        _ => Ok(()),
    }
}

/// サブスクリプション作成コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionCommand {
    pub service_name: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: MonthYear,
    pub end_date: Option<MonthYear>,
}

/// サブスクリプション更新コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSubscriptionCommand {
    pub service_name: String,
    pub price: i64,
    pub start_date: MonthYear,
    pub end_date: Option<MonthYear>,
}

/// 一覧取得フィルター
///
/// 指定された条件はすべてANDで結合される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub user_id: Option<Uuid>,
    /// サービス名の完全一致
    pub service_name: Option<String>,
    /// この月以降に開始したもの
    pub start_date: Option<MonthYear>,
    /// この月以前に終了したもの、または終了月なし
    pub end_date: Option<MonthYear>,
    /// 1始まりのページ番号
    pub page: u32,
    pub page_size: u32,
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            service_name: None,
            start_date: None,
            end_date: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SubscriptionFilter {
    /// 取得件数
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// 読み飛ばす件数（(page - 1) * page_size）
    ///
    /// i64に収まらない場合は `i64::MAX` に丸め、空のページになる。
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)).saturating_mul(i64::from(self.page_size))
    }
}

/// 合計金額計算フィルター
///
/// 開始月が期間内（両端を含む）のサブスクリプションのみが対象。終了月は考慮しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalCostFilter {
    pub user_id: Uuid,
    pub service_name: String,
    pub period_start: MonthYear,
    pub period_end: MonthYear,
}

/// サブスクリプション作成リクエスト
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// サブスクリプション更新リクエスト
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub service_name: Option<String>,
    pub price: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// サブスクリプションのレスポンス表現
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub service_name: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: MonthYear,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<MonthYear>,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(sub: &Subscription) -> Self {
        Self {
            id: sub.id(),
            service_name: sub.service_name().to_string(),
            price: sub.price(),
            user_id: sub.user_id(),
            start_date: sub.start_date(),
            end_date: sub.end_date(),
        }
    }
}

/// 作成されたリソースのID
#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: Uuid,
}

/// 数値結果
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: i64,
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// バリデーションエラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub fields: FieldErrors,
}
