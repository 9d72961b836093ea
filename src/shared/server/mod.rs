//! HTTPサーバー
//!
//! tokioのTCPリスナーで接続を受け付け、接続ごとにhyperのHTTP/1サービスを起動する。
//! 停止要求を受けると新規接続の受け付けを止め、処理中の接続の完了を待つ。

pub mod cors;
pub mod http;

pub use cors::Cors;
pub use http::{
    empty_response, json_response, parse_query, text_response, ApiRequest, HttpResponse,
    RequestHandler,
};

use crate::shared::errors::AppResult;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// 停止時に処理中の接続を待つ最大時間
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// ヘルスチェック用のパス
pub const HEALTH_PATH: &str = "/health";

/// HTTPサーバー
pub struct HttpServer {
    handler: Arc<dyn RequestHandler>,
    cors: Arc<Cors>,
}

impl HttpServer {
    pub fn new(handler: Arc<dyn RequestHandler>, cors: Cors) -> Self {
        Self {
            handler,
            cors: Arc::new(cors),
        }
    }

    /// 停止要求があるまで接続を処理する
    ///
    /// # 引数
    /// * `listener` - バインド済みのTCPリスナー
    /// * `shutdown` - キャンセルされると受け付けを停止する
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> AppResult<()> {
        let addr = listener.local_addr()?;
        log::info!("HTTPサーバーを開始しました: http://{addr}");

        let graceful = GracefulShutdown::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::trace!("接続を受け付けました: {peer}");
                            let io = TokioIo::new(stream);
                            let handler = Arc::clone(&self.handler);
                            let cors = Arc::clone(&self.cors);
                            let service = service_fn(move |req| {
                                handle_request(req, Arc::clone(&handler), Arc::clone(&cors))
                            });

                            let connection = graceful.watch(http1::Builder::new().serve_connection(io, service));
                            tokio::spawn(async move {
                                if let Err(err) = connection.await {
                                    log::debug!("HTTP接続処理エラー: {peer}: {err}");
                                }
                            });
                        }
                        Err(e) => {
                            log::error!("接続受け入れエラー: {e}");
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    log::info!("停止要求を受信しました。新規接続の受け付けを停止します");
                    break;
                }
            }
        }

        drop(listener);

        tokio::select! {
            _ = graceful.shutdown() => {
                log::info!("すべての接続が終了しました");
            }
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT) => {
                log::warn!("接続の終了待ちがタイムアウトしました（{}秒）", SHUTDOWN_TIMEOUT.as_secs());
            }
        }

        log::info!("HTTPサーバーを停止しました");
        Ok(())
    }
}

/// Ctrl-C または SIGTERM を受けたらトークンをキャンセルする
pub async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Ctrl-Cハンドラーの登録に失敗しました: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("SIGTERMハンドラーの登録に失敗しました: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-Cを受信しました"),
        _ = terminate => log::info!("SIGTERMを受信しました"),
        _ = token.cancelled() => return,
    }

    token.cancel();
}

/// HTTPリクエストを処理してアクセスログを出力する
async fn handle_request(
    req: Request<Incoming>,
    handler: Arc<dyn RequestHandler>,
    cors: Arc<Cors>,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = dispatch(req, handler, &cors).await;

    log_request(&method, &target, response.status(), started.elapsed());
    Ok(response)
}

async fn dispatch(req: Request<Incoming>, handler: Arc<dyn RequestHandler>, cors: &Cors) -> HttpResponse {
    let (parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        return cors.preflight(&parts.headers);
    }

    let mut response = if parts.method == Method::GET && parts.uri.path() == HEALTH_PATH {
        json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
    } else {
        match body.collect().await {
            Ok(collected) => {
                let request = ApiRequest {
                    method: parts.method.clone(),
                    path: parts.uri.path().to_string(),
                    query: parse_query(parts.uri.query().unwrap_or("")),
                    headers: parts.headers.clone(),
                    body: collected.to_bytes(),
                };

                // ストレージ操作はブロッキングなので専用スレッドで実行する
                match tokio::task::spawn_blocking(move || handler.handle(request)).await {
                    Ok(response) => response,
                    Err(e) => {
                        log::error!("リクエスト処理タスクが異常終了しました: {e}");
                        json_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            &serde_json::json!({ "error": "internal server error" }),
                        )
                    }
                }
            }
            Err(e) => {
                log::warn!("リクエストボディの読み込みに失敗しました: {e}");
                json_response(
                    StatusCode::BAD_REQUEST,
                    &serde_json::json!({ "error": "failed to read request body" }),
                )
            }
        }
    };

    cors.apply(&parts.headers, &mut response);
    response
}

/// 5xxはerror、4xxはwarn、それ以外はinfoで出力する
fn log_request(method: &Method, target: &str, status: StatusCode, latency: Duration) {
    let level = if status.is_server_error() {
        log::Level::Error
    } else if status.is_client_error() {
        log::Level::Warn
    } else {
        log::Level::Info
    };

    log::log!(
        level,
        "{method} {target} {} {:.3}ms",
        status.as_u16(),
        latency.as_secs_f64() * 1000.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::CorsConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// パスとボディをそのまま返すハンドラー
    struct EchoHandler;

    impl RequestHandler for EchoHandler {
        fn handle(&self, request: ApiRequest) -> HttpResponse {
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "method": request.method.as_str(),
                    "path": request.path,
                    "page": request.query.get("page"),
                    "body": String::from_utf8_lossy(&request.body),
                }),
            )
        }
    }

    /// 常にパニックするハンドラー
    struct PanickingHandler;

    impl RequestHandler for PanickingHandler {
        fn handle(&self, _request: ApiRequest) -> HttpResponse {
            panic!("ハンドラー内部の不整合");
        }
    }

    async fn start_server() -> (std::net::SocketAddr, CancellationToken, tokio::task::JoinHandle<AppResult<()>>) {
        start_server_with(Arc::new(EchoHandler)).await
    }

    async fn start_server_with(
        handler: Arc<dyn RequestHandler>,
    ) -> (std::net::SocketAddr, CancellationToken, tokio::task::JoinHandle<AppResult<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        let server = HttpServer::new(handler, Cors::new(CorsConfig::default()));
        let handle = tokio::spawn(server.serve(listener, token.clone()));
        (addr, token, handle)
    }

    async fn send_raw(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, token, handle) = start_server().await;

        let response = send_raw(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains(r#"{"status":"ok"}"#));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_request_is_delegated_with_query_and_body() {
        let (addr, token, handle) = start_server().await;

        let response = send_raw(
            addr,
            "POST /subscriptions?page=2 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        )
        .await;

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains(r#""path":"/subscriptions""#));
        assert!(response.contains(r#""page":"2""#));
        assert!(response.contains(r#""body":"{}""#));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_options_is_answered_as_preflight() {
        let (addr, token, handle) = start_server().await;

        let response = send_raw(
            addr,
            "OPTIONS /subscriptions HTTP/1.1\r\nHost: localhost\r\nOrigin: https://app.example\r\nConnection: close\r\n\r\n",
        )
        .await
        .to_lowercase();

        assert!(response.starts_with("http/1.1 204 no content"));
        assert!(response.contains("access-control-allow-origin: https://app.example"));
        assert!(response.contains("access-control-max-age: 3600"));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_internal_error() {
        let (addr, token, handle) = start_server_with(Arc::new(PanickingHandler)).await;

        let response = send_raw(
            addr,
            "GET /subscriptions HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error"));
        assert!(response.contains(r#"{"error":"internal server error"}"#));

        // サーバーは次のリクエストも処理できる
        let health = send_raw(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 200 OK"));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_server() {
        let (_addr, token, handle) = start_server().await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
