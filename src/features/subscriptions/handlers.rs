//! HTTPリクエストとサービス層の橋渡し
//!
//! パス・クエリ・ボディを検証済みのコマンドに変換してサービスを呼び出し、
//! 結果をJSONレスポンスに変換する。

use super::models::{
    CreateSubscriptionRequest, ErrorResponse, IdResponse, SubscriptionResponse,
    UpdateSubscriptionRequest, ValidationErrorResponse, ValueResponse,
};
use super::service::SubscriptionService;
use super::validation::{
    parse_id, parse_subscription_filter, parse_total_cost_filter, validate_create_request,
    validate_update_request,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::server::{empty_response, json_response, ApiRequest, HttpResponse, RequestHandler};
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

const SUBSCRIPTIONS: &str = "subscriptions";
const TOTAL: &str = "total";

/// `/subscriptions` 配下のルーティングを担当するハンドラー
pub struct SubscriptionHandler {
    service: Arc<SubscriptionService>,
}

impl SubscriptionHandler {
    pub fn new(service: Arc<SubscriptionService>) -> Self {
        Self { service }
    }

    fn list(&self, request: &ApiRequest) -> AppResult<HttpResponse> {
        let filter = parse_subscription_filter(&request.query)?;
        let subscriptions = self.service.list_subscriptions(&filter)?;

        let body: Vec<SubscriptionResponse> =
            subscriptions.iter().map(SubscriptionResponse::from).collect();
        Ok(json_response(StatusCode::OK, &body))
    }

    fn total(&self, request: &ApiRequest) -> AppResult<HttpResponse> {
        let filter = parse_total_cost_filter(&request.query)?;
        let value = self.service.calculate_total_cost(&filter)?;
        Ok(json_response(StatusCode::OK, &ValueResponse { value }))
    }

    fn get(&self, id: &str) -> AppResult<HttpResponse> {
        let id = parse_id(id)?;
        let subscription = self.service.get_subscription(id)?;
        Ok(json_response(
            StatusCode::OK,
            &SubscriptionResponse::from(&subscription),
        ))
    }

    fn create(&self, request: &ApiRequest) -> AppResult<HttpResponse> {
        let body: CreateSubscriptionRequest = decode_body(request)?;
        let command = validate_create_request(body)?;
        let id = self.service.create_subscription(command)?;
        Ok(json_response(StatusCode::CREATED, &IdResponse { id }))
    }

    fn update(&self, id: &str, request: &ApiRequest) -> AppResult<HttpResponse> {
        let id = parse_id(id)?;
        let body: UpdateSubscriptionRequest = decode_body(request)?;
        let command = validate_update_request(body)?;
        self.service.update_subscription(id, command)?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }

    fn delete(&self, id: &str) -> AppResult<HttpResponse> {
        let id = parse_id(id)?;
        self.service.delete_subscription(id)?;
        Ok(empty_response(StatusCode::NO_CONTENT))
    }
}

impl RequestHandler for SubscriptionHandler {
    fn handle(&self, request: ApiRequest) -> HttpResponse {
        let segments = request.segments();

        let result = match (segments.as_slice(), &request.method) {
            ([SUBSCRIPTIONS], &Method::GET) => self.list(&request),
            ([SUBSCRIPTIONS], &Method::POST) => self.create(&request),
            ([SUBSCRIPTIONS], _) => return method_not_allowed("GET, POST, OPTIONS"),
            ([SUBSCRIPTIONS, TOTAL], &Method::GET) => self.total(&request),
            ([SUBSCRIPTIONS, id], &Method::GET) => self.get(id),
            ([SUBSCRIPTIONS, id], &Method::PUT) => self.update(id, &request),
            ([SUBSCRIPTIONS, id], &Method::DELETE) => self.delete(id),
            ([SUBSCRIPTIONS, _], _) => return method_not_allowed("GET, PUT, DELETE, OPTIONS"),
            _ => {
                return json_response(
                    StatusCode::NOT_FOUND,
                    &ErrorResponse {
                        error: "route not found".to_string(),
                    },
                )
            }
        };

        result.unwrap_or_else(|e| error_response(&e, &request))
    }
}

/// JSONボディをデコードする（空ボディは不正なリクエスト）
fn decode_body<T: DeserializeOwned>(request: &ApiRequest) -> AppResult<T> {
    if request.body.is_empty() {
        return Err(AppError::bad_request("request body is required"));
    }
    Ok(serde_json::from_slice(&request.body)?)
}

/// エラーをレスポンスに変換する
///
/// ログレベルはエラーの重要度から決まる。
fn error_response(error: &AppError, request: &ApiRequest) -> HttpResponse {
    log::log!(
        error.severity().log_level(),
        "リクエスト処理に失敗しました: {} {}: {}",
        request.method,
        request.path,
        error.details()
    );

    match error {
        AppError::Validation(fields) => json_response(
            error.status_code(),
            &ValidationErrorResponse {
                error: error.user_message(),
                fields: fields.clone(),
            },
        ),
        _ => json_response(
            error.status_code(),
            &ErrorResponse {
                error: error.user_message(),
            },
        ),
    }
}

fn method_not_allowed(allow: &'static str) -> HttpResponse {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &ErrorResponse {
            error: "method not allowed".to_string(),
        },
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}
