use hyper::body::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;

/// サーバーが返すレスポンス型
pub type HttpResponse = Response<Full<Bytes>>;

/// ボディを読み終えたリクエスト
///
/// ハンドラーはブロッキングなストレージ操作を行うため、
/// 非同期の `Incoming` ではなく読み込み済みの値を受け取る。
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// クエリ文字列を解析して設定する（同じキーは後勝ち）
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = parse_query(query);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 末尾のスラッシュを除いたパスのセグメント
    pub fn segments(&self) -> Vec<&str> {
        self.path
            .trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// 読み込み済みリクエストを処理するハンドラー
///
/// 呼び出しは `spawn_blocking` 上で行われる。
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: ApiRequest) -> HttpResponse;
}

/// `application/x-www-form-urlencoded` 形式のクエリを解析する
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// JSONレスポンスを作成する
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            log::error!("レスポンスのシリアライズに失敗しました: {e}");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

/// ボディなしのレスポンスを作成する
pub fn empty_response(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// プレーンテキストのレスポンスを作成する
pub fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_parse_query_decodes_values() {
        let query = parse_query("service_name=Yandex%20Plus&page=2&page=3");
        assert_eq!(query.get("service_name").map(String::as_str), Some("Yandex Plus"));
        assert_eq!(query.get("page").map(String::as_str), Some("3"));
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn test_segments_ignore_trailing_slash() {
        let request = ApiRequest::new(Method::GET, "/subscriptions/total/");
        assert_eq!(request.segments(), vec!["subscriptions", "total"]);
        assert!(ApiRequest::new(Method::GET, "/").segments().is_empty());
    }

    #[tokio::test]
    async fn test_json_response_sets_content_type() {
        let response = json_response(StatusCode::CREATED, &serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }
}
