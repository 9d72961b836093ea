use super::http::{empty_response, HttpResponse};
use crate::shared::config::CorsConfig;
use hyper::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
};
use hyper::StatusCode;

/// 設定に基づいてCORSヘッダーを付与する
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// プリフライトリクエストへの応答（204）
    pub fn preflight(&self, request_headers: &HeaderMap) -> HttpResponse {
        let mut response = empty_response(StatusCode::NO_CONTENT);
        self.apply(request_headers, &mut response);

        let headers = response.headers_mut();
        insert_joined(headers, ACCESS_CONTROL_ALLOW_METHODS, &self.config.allow_methods);
        insert_joined(headers, ACCESS_CONTROL_ALLOW_HEADERS, &self.config.allow_headers);
        headers.insert(
            ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(self.config.max_age),
        );
        response
    }

    /// 通常のレスポンスにCORSヘッダーを付与する
    pub fn apply(&self, request_headers: &HeaderMap, response: &mut HttpResponse) {
        let Some(origin) = self.allowed_origin(request_headers) else {
            return;
        };

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(VARY, HeaderValue::from_static("Origin"));
        if self.config.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        insert_joined(headers, ACCESS_CONTROL_EXPOSE_HEADERS, &self.config.expose_headers);
    }

    /// 許可するOriginヘッダー値を決定する
    ///
    /// ワイルドカードと資格情報の併用はブラウザに拒否されるため、
    /// その場合はリクエストのOriginをそのまま返す。
    fn allowed_origin(&self, request_headers: &HeaderMap) -> Option<HeaderValue> {
        let request_origin = request_headers.get(ORIGIN);
        let wildcard = self.config.allow_origins.iter().any(|o| o == "*");

        if wildcard {
            return match (self.config.allow_credentials, request_origin) {
                (true, Some(origin)) => Some(origin.clone()),
                _ => Some(HeaderValue::from_static("*")),
            };
        }

        let origin = request_origin?;
        let text = origin.to_str().ok()?;
        self.config
            .allow_origins
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(text))
            .then(|| origin.clone())
    }
}

fn insert_joined(headers: &mut HeaderMap, name: hyper::header::HeaderName, values: &[String]) {
    if values.is_empty() {
        return;
    }
    match HeaderValue::from_str(&values.join(", ")) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => log::warn!("CORSヘッダー値が不正です: {name}: {e}"),
    }
}
