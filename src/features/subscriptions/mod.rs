/// サブスクリプション機能モジュール
///
/// このモジュールは、サブスクリプション管理に関連するすべての機能を提供します：
/// - サブスクリプションの作成、読み取り、更新、削除
/// - フィルター付きの一覧取得とページング
/// - 期間内の合計金額の計算
/// - HTTPリクエストの検証とレスポンスへの変換
pub mod handlers;
pub mod models;
pub mod month_year;
pub mod repository;
pub mod service;
pub mod validation;

// 公開インターフェース
pub use handlers::SubscriptionHandler;

pub use models::{
    CreateSubscriptionCommand, Subscription, SubscriptionFilter, SubscriptionResponse,
    TotalCostFilter, UpdateSubscriptionCommand,
};

pub use month_year::MonthYear;

pub use repository::{SqliteSubscriptionRepository, SubscriptionRepository};

pub use service::SubscriptionService;
