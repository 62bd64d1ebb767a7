//! Incoming request context.
//!
//! One [`Context`] wraps one inbound HTTP request. It is built by the
//! dispatcher after route resolution, handed to the handler, and discarded
//! once the response is written — never shared across requests, so its
//! accessors need no synchronization.
//!
//! The request body is read at most once, on first use of [`body`],
//! [`has_body`], [`body_error`] or the post-variable accessors, and cached
//! for the rest of the request.
//!
//! [`body`]: Context::body
//! [`has_body`]: Context::has_body
//! [`body_error`]: Context::body_error

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use url::form_urlencoded;

use crate::payload::Args;
use crate::reply::Reply;

/// The body as the dispatcher hands it over: still on the wire, or already
/// in memory (fakes and tests).
pub(crate) enum RawBody {
    Wire(Incoming),
    Ready(Bytes),
}

#[derive(Default)]
struct BodyRecord {
    content: Bytes,
    error: Option<hyper::Error>,
}

/// An incoming HTTP request plus everything route resolution learned about
/// it: bound path parameters and request metadata.
///
/// Handlers receive a `Context` by value and produce a [`Reply`] through the
/// builder methods ([`success`](Context::success), [`error`](Context::error),
/// [`response`](Context::response), [`redirect`](Context::redirect),
/// [`permanent_redirect`](Context::permanent_redirect)).
pub struct Context {
    parts: Parts,
    params: HashMap<String, String>,
    host: String,
    url: String,
    user_agent: String,
    remote_addr: Option<SocketAddr>,
    raw_body: Option<RawBody>,
    body: BodyRecord,
    body_loaded: bool,
    reply_headers: HashMap<String, String>,
}

impl Context {
    pub(crate) fn new(
        parts: Parts,
        body: RawBody,
        params: HashMap<String, String>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let host = parts
            .headers
            .get(http::header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.host().map(str::to_owned))
            .unwrap_or_default();
        let user_agent = parts
            .headers
            .get(http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let url = parts.uri.path().to_owned();

        Self {
            parts,
            params,
            host,
            url,
            user_agent,
            remote_addr,
            raw_body: Some(body),
            body: BodyRecord::default(),
            body_loaded: false,
            reply_headers: HashMap::new(),
        }
    }

    /// Builds a context for exercising a handler without a live connection.
    ///
    /// The body is taken as already read, so the body accessors behave
    /// exactly as they would after a wire read. Metadata that normally comes
    /// from the transport can be layered on with [`with_header`] and
    /// [`with_remote_addr`].
    ///
    /// ```rust
    /// # use rudder::Context;
    /// # use std::collections::HashMap;
    /// let ctx = Context::fake(
    ///     "GET",
    ///     "/user/alice",
    ///     Vec::<u8>::new(),
    ///     HashMap::from([("name".to_owned(), "alice".to_owned())]),
    /// );
    /// assert_eq!(ctx.param("name"), Some("alice"));
    /// ```
    ///
    /// [`with_header`]: Context::with_header
    /// [`with_remote_addr`]: Context::with_remote_addr
    pub fn fake(
        method: &str,
        path: &str,
        body: impl Into<Bytes>,
        params: HashMap<String, String>,
    ) -> Self {
        let mut request = http::Request::new(());
        if let Ok(parsed) = method.to_ascii_uppercase().parse::<http::Method>() {
            *request.method_mut() = parsed;
        }
        if let Ok(parsed) = path.parse::<http::Uri>() {
            *request.uri_mut() = parsed;
        }
        let (parts, ()) = request.into_parts();
        let url = parts.uri.path().to_owned();

        Self {
            parts,
            params,
            host: String::new(),
            url,
            user_agent: String::new(),
            remote_addr: None,
            raw_body: None,
            body: BodyRecord {
                content: body.into(),
                error: None,
            },
            body_loaded: true,
            reply_headers: HashMap::new(),
        }
    }

    /// Adds a request header to a [`fake`](Context::fake) context. Invalid
    /// header names or values are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            self.parts.headers.insert(name, value);
        }
        self
    }

    /// Sets the transport remote address on a [`fake`](Context::fake)
    /// context.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    // ── Request metadata ──────────────────────────────────────────────────────

    /// The request method, uppercase.
    pub fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    /// The effective URL path of the request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The host the request was addressed to.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn referer(&self) -> &str {
        self.header("referer").unwrap_or_default()
    }

    /// The caller's address: the first `X-Forwarded-For` entry when a proxy
    /// supplied one, otherwise the transport remote address.
    pub fn ip(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            let first = forwarded.split(',').next().unwrap_or_default().trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }

        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_default()
    }

    // ── Headers ───────────────────────────────────────────────────────────────

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some_and(|value| !value.is_empty())
    }

    /// The full request header map.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }

    // ── Path parameters ───────────────────────────────────────────────────────

    /// A named path parameter bound by the route pattern.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns
    /// `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    // ── Query variables ───────────────────────────────────────────────────────

    /// A variable from the URL query string.
    pub fn query_var(&self, name: &str) -> Option<String> {
        let query = self.parts.uri.query()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn has_query_var(&self, name: &str) -> bool {
        self.query_var(name).is_some_and(|value| !value.is_empty())
    }

    // ── Body and post variables ───────────────────────────────────────────────

    async fn prime_body(&mut self) {
        if self.body_loaded {
            return;
        }
        self.body_loaded = true;

        match self.raw_body.take() {
            Some(RawBody::Ready(bytes)) => self.body.content = bytes,
            Some(RawBody::Wire(incoming)) => match incoming.collect().await {
                Ok(collected) => self.body.content = collected.to_bytes(),
                Err(e) => self.body.error = Some(e),
            },
            None => {}
        }
    }

    /// The request body. Read from the wire on first use, cached after; a
    /// failed read yields an empty slice and sets [`body_error`].
    ///
    /// [`body_error`]: Context::body_error
    pub async fn body(&mut self) -> &[u8] {
        self.prime_body().await;
        &self.body.content
    }

    pub async fn has_body(&mut self) -> bool {
        self.prime_body().await;
        !self.body.content.is_empty()
    }

    /// The error from the body read, if it failed.
    pub async fn body_error(&mut self) -> Option<&hyper::Error> {
        self.prime_body().await;
        self.body.error.as_ref()
    }

    /// A variable from the body, interpreted as
    /// `application/x-www-form-urlencoded`.
    pub async fn post_var(&mut self, name: &str) -> Option<String> {
        self.prime_body().await;
        form_urlencoded::parse(&self.body.content)
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub async fn has_post_var(&mut self, name: &str) -> bool {
        self.post_var(name)
            .await
            .is_some_and(|value| !value.is_empty())
    }

    // ── Reply building ────────────────────────────────────────────────────────

    /// Accumulates a response header merged into every reply this context
    /// produces from here on. Last write per key wins.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.reply_headers.insert(key.into(), value.into());
    }

    fn reply(&self) -> Reply {
        Reply::seeded(self.reply_headers.clone())
    }

    /// A successful reply — see [`Reply::success`].
    pub fn success(&self, args: impl Args) -> Reply {
        self.reply().success(args)
    }

    /// A failed reply — see [`Reply::error`].
    pub fn error(&self, args: impl Args) -> Reply {
        self.reply().error(args)
    }

    /// A generic reply — see [`Reply::response`].
    pub fn response(&self, args: impl Args) -> Reply {
        self.reply().response(args)
    }

    /// A temporary (302) redirect to `destination`, emitted verbatim.
    pub fn redirect(&self, destination: impl Into<String>) -> Reply {
        self.reply().redirect(destination)
    }

    /// A permanent (301) redirect to `destination`.
    pub fn permanent_redirect(&self, destination: impl Into<String>) -> Reply {
        self.reply().permanent_redirect(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_params() -> HashMap<String, String> {
        HashMap::new()
    }

    fn one_param(name: &str, value: &str) -> HashMap<String, String> {
        HashMap::from([(name.to_owned(), value.to_owned())])
    }

    #[test]
    fn headers_are_detectable_case_insensitively() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params())
            .with_header("x-custom-header", "exists");

        assert!(ctx.has_header("X-Custom-Header"));
        assert_eq!(ctx.header("X-Custom-Header"), Some("exists"));
        assert!(!ctx.has_header("x-absent-header"));
    }

    #[test]
    fn the_full_header_map_is_exposed() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params())
            .with_header("x-custom-header", "exists");

        assert_eq!(
            ctx.headers().get("x-custom-header").unwrap(),
            &http::header::HeaderValue::from_static("exists")
        );
    }

    #[test]
    fn path_parameters_are_exposed() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), one_param("parameterOne", "exists"));

        assert!(ctx.has_param("parameterOne"));
        assert_eq!(ctx.param("parameterOne"), Some("exists"));
        assert!(!ctx.has_param("unsetParameter"));
        assert_eq!(ctx.param("unsetParameter"), None);
    }

    #[test]
    fn the_url_accessor_returns_the_request_path() {
        let ctx = Context::fake("GET", "/this/is/the/url", Vec::<u8>::new(), no_params());
        assert_eq!(ctx.url(), "/this/is/the/url");
    }

    #[test]
    fn ip_prefers_the_first_forwarded_entry() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params())
            .with_header("X-Forwarded-For", "127.0.0.1, 10.0.0.1")
            .with_remote_addr("127.0.0.2:9999".parse().unwrap());

        assert_eq!(ctx.ip(), "127.0.0.1");
    }

    #[test]
    fn ip_falls_back_to_the_remote_address() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params())
            .with_remote_addr("127.0.0.2:9999".parse().unwrap());

        assert_eq!(ctx.ip(), "127.0.0.2:9999");
    }

    #[test]
    fn referer_reads_the_header() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params())
            .with_header("Referer", "https://example.org");

        assert_eq!(ctx.referer(), "https://example.org");
    }

    #[tokio::test]
    async fn body_is_cached_and_idempotent() {
        let mut ctx = Context::fake("POST", "/", &b"post-data=set"[..], no_params());

        assert!(ctx.has_body().await);
        assert_eq!(ctx.body().await, b"post-data=set");
        assert_eq!(ctx.body().await, b"post-data=set");
        assert!(ctx.body_error().await.is_none());
    }

    #[tokio::test]
    async fn an_empty_body_reads_as_absent() {
        let mut ctx = Context::fake("POST", "/", Vec::<u8>::new(), no_params());

        assert!(!ctx.has_body().await);
        assert!(ctx.body().await.is_empty());
        assert!(ctx.body_error().await.is_none());
    }

    #[tokio::test]
    async fn post_variables_parse_the_form_body() {
        let mut ctx = Context::fake("POST", "/", &b"post-data=set&other=1"[..], no_params());

        assert!(ctx.has_post_var("post-data").await);
        assert_eq!(ctx.post_var("post-data").await.as_deref(), Some("set"));
        assert!(!ctx.has_post_var("unset-post-variable").await);
        assert_eq!(ctx.post_var("unset-post-variable").await, None);
    }

    #[test]
    fn query_variables_parse_the_query_string() {
        let ctx = Context::fake("GET", "/search?q=routing&page=2", Vec::<u8>::new(), no_params());

        assert_eq!(ctx.query_var("q").as_deref(), Some("routing"));
        assert_eq!(ctx.query_var("page").as_deref(), Some("2"));
        assert!(!ctx.has_query_var("absent"));
    }

    #[test]
    fn set_header_lands_on_every_subsequent_reply() {
        let mut ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params());
        ctx.set_header("Custom-Response-Header", "Set");

        let reply = ctx.success(());
        assert_eq!(
            reply.headers().get("Custom-Response-Header").map(String::as_str),
            Some("Set")
        );

        let reply = ctx.error("later");
        assert_eq!(
            reply.headers().get("Custom-Response-Header").map(String::as_str),
            Some("Set")
        );
    }

    #[test]
    fn builder_methods_mirror_the_reply_surface() {
        let ctx = Context::fake("GET", "/", Vec::<u8>::new(), no_params());

        assert_eq!(ctx.success(()).status(), 200);
        assert_eq!(ctx.error(()).status(), 400);
        assert_eq!(ctx.response("body").status(), 200);

        let redirect = ctx.redirect("http://example.org");
        assert_eq!(redirect.status(), 302);
        assert_eq!(redirect.redirect_target(), Some("http://example.org"));

        let permanent = ctx.permanent_redirect("http://example.org");
        assert_eq!(permanent.status(), 301);
    }

    #[test]
    fn method_is_reported_uppercase() {
        let ctx = Context::fake("get", "/", Vec::<u8>::new(), no_params());
        assert_eq!(ctx.method(), "GET");
    }
}
