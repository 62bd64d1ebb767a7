//! HTTP server, per-request dispatch, and graceful shutdown.
//!
//! # Dispatch pipeline
//!
//! Each inbound request walks a fixed, stateless pipeline:
//!
//! 1. `OPTIONS` requests are answered 200 with the CORS headers, without
//!    consulting the route table.
//! 2. The route table resolves method + path to a handler; an unmatched
//!    request falls back to the registered not-found handler, or to a fixed
//!    404 response.
//! 3. A [`Context`] is built and the handler invoked.
//! 4. The build identifier (when configured) and the CORS headers are
//!    injected, then the reply is written back — as an HTTP redirect when
//!    the handler asked for one, as headers + status + body otherwise.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server stops accepting new connections,
//! lets every in-flight connection task run to completion, and returns from
//! the serve call. Set your pod's `terminationGracePeriodSeconds` longer
//! than your slowest request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::context::{Context, RawBody};
use crate::error::Error;
use crate::handler::ErasedHandler;
use crate::reply::Reply;
use crate::router::Router;
use crate::tls::{self, DevCertificates, TlsFiles};

/// Body of the fixed 404 response, written when no route matches and no
/// not-found handler is registered.
const NOT_FOUND_BODY: &[u8] = b"No provider could be found";

const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-headers", "*"),
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET,POST,PUT,PATCH,DELETE,OPTIONS"),
];

/// Name of the response header carrying the configured build identifier.
const BUILD_HEADER: &str = "x-build-date";

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` (`"ip:port"`) when one of
    /// the serve methods is called. An unparseable address surfaces there
    /// as [`Error::InvalidAddress`].
    ///
    /// ```rust,no_run
    /// use rudder::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self {
            addr: addr.to_owned(),
        }
    }

    /// Starts accepting plaintext connections and dispatching them through
    /// `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "rudder listening");
        run(listener, router, None).await
    }

    /// Starts accepting TLS connections.
    ///
    /// With `files` present, the key and certificate are loaded from the
    /// given PEM paths. Without them, the [`DevCertificates`] provider
    /// generates a self-signed pair which is persisted to `key.pem` and
    /// `cert.pem` before serving — see [`tls::materialize`] to drive a
    /// custom [`CertificateProvider`](crate::tls::CertificateProvider)
    /// instead.
    pub async fn serve_tls(self, router: Router, files: Option<TlsFiles>) -> Result<(), Error> {
        let files = match files {
            Some(files) => files,
            None => tls::materialize(&DevCertificates)?,
        };
        let acceptor = tls::acceptor(&files)?;

        let addr: SocketAddr = self.addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "rudder listening (tls)");
        run(listener, router, Some(acceptor)).await
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn run(listener: TcpListener, router: Router, tls: Option<TlsAcceptor>) -> Result<(), Error> {
    // Wrap the router in Arc so it can be shared across concurrent
    // connection tasks without copying the entire route table.
    let router = Arc::new(router);

    // JoinSet tracks every spawned connection task so we can wait for
    // them all to finish during graceful shutdown.
    let mut tasks = tokio::task::JoinSet::new();

    // Pin the shutdown future so we can poll it in a loop.
    // Futures in Rust must not move in memory after the first poll — that
    // is what `Pin` enforces. `tokio::pin!` pins the future on the stack.
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // `biased` makes select! check arms top-to-bottom instead of
            // randomly. We check shutdown first so a SIGTERM immediately
            // stops accepting new connections, even if more are queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let tls = tls.clone();

                tasks.spawn(async move {
                    match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(tls_stream) => serve_stream(tls_stream, router, remote_addr).await,
                            Err(e) => error!(peer = %remote_addr, "tls handshake error: {e}"),
                        },
                        None => serve_stream(stream, router, remote_addr).await,
                    }
                });
            }

            // Reap finished connection tasks so the JoinSet does not grow
            // without bound on long-running servers.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    // Drain: wait for every in-flight connection to finish before we return.
    while tasks.join_next().await.is_some() {}

    info!("rudder stopped");
    Ok(())
}

async fn serve_stream<S>(stream: S, router: Arc<Router>, remote_addr: SocketAddr)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper IO traits.
    let io = TokioIo::new(stream);

    // `service_fn` turns a plain async function into a hyper `Service`.
    // The closure is called once per request on the connection, not once
    // per connection.
    let svc = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { dispatch(router, req, remote_addr).await }
    });

    // `auto::Builder` transparently handles both HTTP/1.1 and HTTP/2 —
    // whatever the client negotiates.
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(io, svc)
        .await
    {
        error!(peer = %remote_addr, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: routes one request and produces one response.
///
/// The error type is [`Infallible`](std::convert::Infallible) — all failures
/// are handled internally (404, fallback handlers) so hyper never sees an
/// error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    Ok(respond(&router, parts, RawBody::Wire(body), Some(remote_addr)).await)
}

pub(crate) async fn respond(
    router: &Router,
    parts: http::request::Parts,
    body: RawBody,
    remote_addr: Option<SocketAddr>,
) -> http::Response<Full<Bytes>> {
    // Preflight is answered before routing; the route table never sees it.
    if parts.method == http::Method::OPTIONS {
        let mut response = empty_response(StatusCode::OK);
        inject_cors(response.headers_mut());
        return response;
    }

    let (handler, params) = match router.find_handler(parts.method.as_str(), parts.uri.path()) {
        Some(found) => found,
        None => match router.not_found_handler() {
            Some(handler) => (handler, HashMap::new()),
            None => {
                let mut response =
                    http::Response::new(Full::new(Bytes::from_static(NOT_FOUND_BODY)));
                *response.status_mut() = StatusCode::NOT_FOUND;
                return response;
            }
        },
    };

    let ctx = Context::new(parts, body, params, remote_addr);
    let reply = handler.call(ctx).await;

    write_reply(router, reply)
}

fn write_reply(router: &Router, reply: Reply) -> http::Response<Full<Bytes>> {
    let status = StatusCode::from_u16(reply.status()).unwrap_or(StatusCode::OK);
    let Reply {
        headers, content, redirect, ..
    } = reply;

    // A redirect reply carries only the destination; its accumulated body
    // and headers are ignored.
    if let Some(destination) = redirect {
        let mut response = empty_response(status);
        apply_build_id(router, response.headers_mut());
        inject_cors(response.headers_mut());
        match HeaderValue::from_str(&destination) {
            Ok(value) => {
                response.headers_mut().insert(http::header::LOCATION, value);
            }
            Err(_) => warn!(%destination, "redirect destination is not a valid header value"),
        }
        return response;
    }

    let mut response = http::Response::new(Full::new(Bytes::from(content)));
    *response.status_mut() = status;
    apply_build_id(router, response.headers_mut());
    inject_cors(response.headers_mut());

    for (key, value) in headers {
        let name = match key.parse::<http::header::HeaderName>() {
            Ok(name) => name,
            Err(_) => {
                warn!(header = %key, "skipping invalid response header name");
                continue;
            }
        };
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                response.headers_mut().insert(name, value);
            }
            Err(_) => warn!(header = %key, "skipping invalid response header value"),
        }
    }

    response
}

fn empty_response(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::default());
    *response.status_mut() = status;
    response
}

fn inject_cors(headers: &mut http::HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

fn apply_build_id(router: &Router, headers: &mut http::HeaderMap) {
    if let Some(build_id) = router.build_id() {
        match HeaderValue::from_str(build_id) {
            Ok(value) => {
                headers.insert(BUILD_HEADER, value);
            }
            Err(_) => warn!("build identifier is not a valid header value"),
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` is a future that never resolves — on non-Unix platforms
    // the SIGTERM arm is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(method: &str, path: &str) -> http::request::Parts {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .expect("request parts")
            .into_parts()
            .0
    }

    async fn send(router: &Router, method: &str, path: &str) -> http::Response<Full<Bytes>> {
        respond(router, parts(method, path), RawBody::Ready(Bytes::new()), None).await
    }

    async fn body_of(response: &http::Response<Full<Bytes>>) -> Vec<u8> {
        use http_body_util::BodyExt;
        response
            .body()
            .clone()
            .collect()
            .await
            .map(|collected| collected.to_bytes().to_vec())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn options_is_answered_without_consulting_routes() {
        let router = Router::new();
        let response = send(&router, "OPTIONS", "/absolutely/anywhere").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get("access-control-allow-headers").unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get("access-control-allow-methods").unwrap(),
            "GET,POST,PUT,PATCH,DELETE,OPTIONS"
        );
        assert!(body_of(&response).await.is_empty());
    }

    #[tokio::test]
    async fn every_registration_helper_routes_its_method() {
        let router = Router::new()
            .get("/", |ctx: Context| async move { ctx.success("OK") })
            .post("/", |ctx: Context| async move { ctx.success("OK") })
            .put("/", |ctx: Context| async move { ctx.success("OK") })
            .patch("/", |ctx: Context| async move { ctx.success("OK") })
            .delete("/", |ctx: Context| async move { ctx.success("OK") });

        for method in ["GET", "POST", "PUT", "PATCH", "DELETE"] {
            let response = send(&router, method, "/").await;
            assert_eq!(response.status(), StatusCode::OK, "{method}");
            assert_eq!(body_of(&response).await, b"OK", "{method}");
        }
    }

    #[tokio::test]
    async fn an_unmatched_request_gets_the_fixed_404() {
        let router = Router::new().get("/defined/route", |ctx: Context| async move {
            ctx.success("matched route")
        });

        let response = send(&router, "GET", "/undefined/route").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(&response).await, NOT_FOUND_BODY);
        // The fixed 404 short-circuits the pipeline before header injection.
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn a_method_mismatch_is_an_unmatched_request() {
        let router = Router::new().get("/user/:name", |ctx: Context| async move {
            ctx.success("found")
        });

        let response = send(&router, "POST", "/user/alice").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn the_not_found_handler_takes_over_unmatched_requests() {
        let router = Router::new().not_found(|ctx: Context| async move {
            ctx.success("not found handled correctly")
        });

        let response = send(&router, "GET", "/some/url/which/is/not/a/route").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(&response).await, b"not found handled correctly");
    }

    #[tokio::test]
    async fn path_parameters_reach_the_handler() {
        let router = Router::new().get("/user/:name", |ctx: Context| async move {
            match ctx.param("name") {
                Some(name) => ctx.success(name.to_owned()),
                None => ctx.error("fault"),
            }
        });

        let response = send(&router, "GET", "/user/alice").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(&response).await, b"alice");
    }

    #[tokio::test]
    async fn optional_parameters_bind_progressively() {
        let router = Router::new().get("/a/[:b]/[:c]", |ctx: Context| async move {
            let bound = [ctx.param("b"), ctx.param("c")]
                .iter()
                .flatten()
                .count();
            ctx.success(bound)
        });

        for (path, expected) in [("/a", b"0"), ("/a/x", b"1"), ("/a/x/y", b"2")] {
            let response = send(&router, "GET", path).await;
            assert_eq!(body_of(&response).await, expected, "{path}");
        }
    }

    #[tokio::test]
    async fn dispatched_responses_carry_cors_headers() {
        let router = Router::new().get("/", |ctx: Context| async move { ctx.success(()) });

        let response = send(&router, "GET", "/").await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn the_build_identifier_is_emitted_when_configured() {
        let router = Router::new()
            .build_identifier("2026-08-06T12:00:00Z")
            .get("/", |ctx: Context| async move { ctx.success(()) });

        let response = send(&router, "GET", "/").await;
        assert_eq!(
            response.headers().get("x-build-date").unwrap(),
            "2026-08-06T12:00:00Z"
        );

        let bare = Router::new().get("/", |ctx: Context| async move { ctx.success(()) });
        let response = send(&bare, "GET", "/").await;
        assert!(response.headers().get("x-build-date").is_none());
    }

    #[tokio::test]
    async fn a_redirect_reply_becomes_an_http_redirect() {
        let router = Router::new().get("/old", |ctx: Context| async move {
            ctx.redirect("/moved")
        });

        let response = send(&router, "GET", "/old").await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(http::header::LOCATION).unwrap(), "/moved");
        assert!(body_of(&response).await.is_empty());
    }

    #[tokio::test]
    async fn a_permanent_redirect_uses_301() {
        let router = Router::new().get("/old", |ctx: Context| async move {
            ctx.permanent_redirect("/moved")
        });

        let response = send(&router, "GET", "/old").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[tokio::test]
    async fn handler_reply_headers_are_written() {
        let router = Router::new().get("/", |ctx: Context| async move {
            ctx.success(()).header("custom-header", "set")
        });

        let response = send(&router, "GET", "/").await;
        assert_eq!(response.headers().get("custom-header").unwrap(), "set");
    }

    #[tokio::test]
    async fn a_root_prefix_scopes_dispatch() {
        let router = Router::new()
            .root("/prefix")
            .get("/here", |ctx: Context| async move { ctx.success("scoped") });

        let response = send(&router, "GET", "/prefix/here").await;
        assert_eq!(body_of(&response).await, b"scoped");

        let response = send(&router, "GET", "/here").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn an_error_reply_writes_its_status() {
        let router = Router::new().get("/", |ctx: Context| async move { ctx.error(()) });

        let response = send(&router, "GET", "/").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
