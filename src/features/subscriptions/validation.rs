//! リクエストのバリデーション
//!
//! ワイヤ形式のリクエストを検証し、サービス層のコマンド・フィルターへ変換します。
//! 失敗したフィールドはすべて集約して `AppError::Validation` として返します。

use super::models::{
    CreateSubscriptionCommand, CreateSubscriptionRequest, SubscriptionFilter, TotalCostFilter,
    UpdateSubscriptionCommand, UpdateSubscriptionRequest, DEFAULT_PAGE_SIZE,
};
use super::month_year::MonthYear;
use crate::shared::errors::{AppError, AppResult, FieldErrors};
use std::collections::HashMap;
use uuid::Uuid;

const REQUIRED: &str = "必須項目です";

/// フィールドエラーを集約する
#[derive(Debug, Default)]
struct FieldErrorCollector {
    errors: FieldErrors,
}

impl FieldErrorCollector {
    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// 必須の値を取り出す（欠落時はエラーを記録してNone）
    fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.add(field, REQUIRED);
        }
        value
    }

    fn service_name(&mut self, field: &str, value: Option<String>) -> Option<String> {
        let name = self.required(field, value)?;
        if name.trim().is_empty() {
            self.add(field, "サービス名を入力してください");
            return None;
        }
        Some(name)
    }

    fn price(&mut self, field: &str, value: Option<i64>) -> Option<i64> {
        let price = self.required(field, value)?;
        if price < 0 {
            self.add(field, "金額は0以上である必要があります");
            return None;
        }
        Some(price)
    }

    fn uuid(&mut self, field: &str, value: Option<&str>) -> Option<Uuid> {
        let text = self.required(field, value)?;
        match Uuid::parse_str(text.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.add(field, format!("UUID形式ではありません: {text}"));
                None
            }
        }
    }

    /// 任意の月年（空・null は None）
    ///
    /// 戻り値の外側の `None` は解析失敗を表す。
    fn optional_month(&mut self, field: &str, value: Option<&str>) -> Option<Option<MonthYear>> {
        match value {
            None => Some(None),
            Some(text) => match MonthYear::parse(text) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    self.add(field, e.user_message());
                    None
                }
            },
        }
    }

    fn required_month(&mut self, field: &str, value: Option<&str>) -> Option<MonthYear> {
        match self.optional_month(field, value)? {
            Some(month) => Some(month),
            None => {
                self.add(field, REQUIRED);
                None
            }
        }
    }

    /// 1以上の整数（未指定時はデフォルト値）
    fn positive(&mut self, field: &str, value: Option<&str>, default: u32) -> Option<u32> {
        let Some(text) = value.filter(|v| !v.trim().is_empty()) else {
            return Some(default);
        };
        match text.trim().parse::<u32>() {
            Ok(n) if n >= 1 => Some(n),
            _ => {
                self.add(field, "1以上の整数である必要があります");
                None
            }
        }
    }

    fn finish(self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// 作成リクエストを検証してコマンドに変換する
pub fn validate_create_request(
    request: CreateSubscriptionRequest,
) -> AppResult<CreateSubscriptionCommand> {
    let mut errors = FieldErrorCollector::default();

    let service_name = errors.service_name("service_name", request.service_name);
    let price = errors.price("price", request.price);
    let user_id = errors.uuid("user_id", request.user_id.as_deref());
    let start_date = errors.required_month("start_date", request.start_date.as_deref());
    let end_date = errors.optional_month("end_date", request.end_date.as_deref());

    match (service_name, price, user_id, start_date, end_date) {
        (Some(service_name), Some(price), Some(user_id), Some(start_date), Some(end_date)) => {
            errors.finish()?;
            Ok(CreateSubscriptionCommand {
                service_name,
                price,
                user_id,
                start_date,
                end_date,
            })
        }
        _ => Err(errors.finish().err().unwrap_or_else(|| AppError::field("request", REQUIRED))),
    }
}

/// 更新リクエストを検証してコマンドに変換する
pub fn validate_update_request(
    request: UpdateSubscriptionRequest,
) -> AppResult<UpdateSubscriptionCommand> {
    let mut errors = FieldErrorCollector::default();

    let service_name = errors.service_name("service_name", request.service_name);
    let price = errors.price("price", request.price);
    let start_date = errors.required_month("start_date", request.start_date.as_deref());
    let end_date = errors.optional_month("end_date", request.end_date.as_deref());

    match (service_name, price, start_date, end_date) {
        (Some(service_name), Some(price), Some(start_date), Some(end_date)) => {
            errors.finish()?;
            Ok(UpdateSubscriptionCommand {
                service_name,
                price,
                start_date,
                end_date,
            })
        }
        _ => Err(errors.finish().err().unwrap_or_else(|| AppError::field("request", REQUIRED))),
    }
}

/// 一覧取得のクエリパラメータをフィルターに変換する
pub fn parse_subscription_filter(query: &HashMap<String, String>) -> AppResult<SubscriptionFilter> {
    let mut errors = FieldErrorCollector::default();
    let get = |key: &str| query.get(key).map(String::as_str);

    let user_id = match get("user_id").filter(|v| !v.trim().is_empty()) {
        Some(text) => errors.uuid("user_id", Some(text)).map(Some),
        None => Some(None),
    };
    let service_name = get("service_name")
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let start_date = errors.optional_month("start_date", get("start_date"));
    let end_date = errors.optional_month("end_date", get("end_date"));
    let page = errors.positive("page", get("page"), 1);
    let page_size = errors.positive("page_size", get("page_size"), DEFAULT_PAGE_SIZE);

    match (user_id, start_date, end_date, page, page_size) {
        (Some(user_id), Some(start_date), Some(end_date), Some(page), Some(page_size)) => {
            errors.finish()?;
            Ok(SubscriptionFilter {
                user_id,
                service_name,
                start_date,
                end_date,
                page,
                page_size,
            })
        }
        _ => Err(errors.finish().err().unwrap_or_else(|| AppError::field("query", REQUIRED))),
    }
}

/// 合計金額計算のクエリパラメータをフィルターに変換する
pub fn parse_total_cost_filter(query: &HashMap<String, String>) -> AppResult<TotalCostFilter> {
    let mut errors = FieldErrorCollector::default();
    let get = |key: &str| query.get(key).map(String::as_str);

    let user_id = errors.uuid("user_id", get("user_id"));
    let service_name = errors.service_name("service_name", get("service_name").map(str::to_string));
    let period_start = errors.required_month("period_start", get("period_start"));
    let period_end = errors.required_month("period_end", get("period_end"));

    match (user_id, service_name, period_start, period_end) {
        (Some(user_id), Some(service_name), Some(period_start), Some(period_end)) => {
            errors.finish()?;
            Ok(TotalCostFilter {
                user_id,
                service_name,
                period_start,
                period_end,
            })
        }
        _ => Err(errors.finish().err().unwrap_or_else(|| AppError::field("query", REQUIRED))),
    }
}

/// パスパラメータのIDを解析する
pub fn parse_id(text: &str) -> AppResult<Uuid> {
    Uuid::parse_str(text).map_err(|_| AppError::bad_request(format!("uuid not valid: {text}")))
}
