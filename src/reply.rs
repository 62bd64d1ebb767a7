//! Outgoing response value and the [`IntoReply`] conversion trait.
//!
//! A [`Reply`] is plain data — status, headers, body bytes, optional
//! redirect. Handlers usually obtain one from the builder methods on
//! [`Context`](crate::Context) and may keep chaining on the value itself:
//!
//! ```rust
//! # use rudder::{Context, Reply};
//! # use std::collections::HashMap;
//! # let ctx = Context::fake("GET", "/", Vec::<u8>::new(), HashMap::new());
//! let reply: Reply = ctx
//!     .success((201, "created"))
//!     .header("location", "/users/99");
//! assert_eq!(reply.status(), 201);
//! ```

use std::collections::HashMap;

use crate::payload::{Args, body_bytes, status_override};

/// An outgoing HTTP response, built by a handler.
///
/// Every builder method takes and returns the value — replies are threaded
/// explicitly, never shared, so concurrent requests cannot trample each
/// other's state.
#[derive(Clone, Debug, Default)]
pub struct Reply {
    pub(crate) status: Option<u16>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) content: Vec<u8>,
    pub(crate) redirect: Option<String>,
}

impl Reply {
    /// An empty reply: no status (200 when written), no headers, no body.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seeded(headers: HashMap<String, String>) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }

    /// Marks the reply successful — status 200 unless the first argument is
    /// an integer in `100..=999`, which overrides it. Remaining arguments
    /// are coerced to bytes and appended to the body.
    pub fn success(mut self, args: impl Args) -> Self {
        let parts = args.into_payloads();
        self.status = Some(status_override(&parts, 200));
        self.content.extend_from_slice(&body_bytes(parts));
        self
    }

    /// Marks the reply failed — status 400 unless overridden, same argument
    /// handling as [`success`](Reply::success).
    pub fn error(mut self, args: impl Args) -> Self {
        let parts = args.into_payloads();
        self.status = Some(status_override(&parts, 400));
        self.content.extend_from_slice(&body_bytes(parts));
        self
    }

    /// Appends to the body without disturbing a status set earlier in the
    /// chain; a fresh reply gets 200 or the leading override.
    pub fn response(mut self, args: impl Args) -> Self {
        let parts = args.into_payloads();
        if self.status.is_none() {
            self.status = Some(status_override(&parts, 200));
        }
        self.content.extend_from_slice(&body_bytes(parts));
        self
    }

    /// Turns the reply into a temporary (302) redirect. The destination is
    /// emitted verbatim — no validation, no escaping.
    pub fn redirect(mut self, destination: impl Into<String>) -> Self {
        self.status = Some(302);
        self.redirect = Some(destination.into());
        self
    }

    /// Turns the reply into a permanent (301) redirect.
    pub fn permanent_redirect(mut self, destination: impl Into<String>) -> Self {
        self.status = Some(301);
        self.redirect = Some(destination.into());
        self
    }

    /// Sets a response header. Last write per key wins.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// The status code the dispatcher will write — 200 when never set.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The redirect destination, when this reply is a redirect. A redirect
    /// reply's body and headers are ignored by the dispatcher.
    pub fn redirect_target(&self) -> Option<&str> {
        self.redirect.as_deref()
    }
}

// ── IntoReply ─────────────────────────────────────────────────────────────────

/// Conversion into a [`Reply`].
///
/// Implemented for `Reply` itself and for plain strings, which become a
/// 200 response with the string as the body — handy for trivial handlers:
///
/// ```rust,no_run
/// # use rudder::Context;
/// async fn pong(_ctx: Context) -> &'static str {
///     "pong"
/// }
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply {
        Reply::new().success(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply {
        Reply::new().success(self)
    }
}
