//! Ordered request route table.
//!
//! Routes are tried in registration order — first registered, first matched.
//! That ordering is the documented contract, not an accident: overlapping
//! patterns resolve to whichever the application registered first.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::matcher;

struct Route {
    method: String,
    pattern: String,
    handler: BoxedHandler,
}

/// The application route table.
///
/// Build it once at startup, then pass it to
/// [`Server::serve`](crate::Server::serve). Each registration method returns
/// `self` so registrations chain naturally. The table is read-only once
/// serving begins.
///
/// ```rust,no_run
/// # use rudder::{Context, Reply, Router};
/// # async fn get_user(_: Context) -> Reply { Reply::new() }
/// # async fn create_user(_: Context) -> Reply { Reply::new() }
/// # async fn missing(_: Context) -> Reply { Reply::new() }
/// let app = Router::new()
///     .get("/users/:id", get_user)
///     .post("/users", create_user)
///     .not_found(missing);
/// ```
pub struct Router {
    routes: Vec<Route>,
    not_found: Option<BoxedHandler>,
    root: String,
    build_identifier: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_found: None,
            root: String::new(),
            build_identifier: None,
        }
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.route("GET", pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.route("POST", pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.route("PUT", pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.route("PATCH", pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.route("DELETE", pattern, handler)
    }

    /// Register a handler for an arbitrary method string. Matching against
    /// the request method is case-insensitive.
    ///
    /// Path parameters use `:name` for mandatory segments and `[:name]` for
    /// optional trailing ones — `ctx.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use rudder::{Context, Reply, Router};
    /// # async fn report(_: Context) -> Reply { Reply::new() }
    /// Router::new().route("REPORT", "/report/:year/[:month]", report);
    /// ```
    pub fn route(mut self, method: &str, pattern: &str, handler: impl Handler) -> Self {
        self.routes.push(Route {
            method: method.to_owned(),
            pattern: pattern.to_owned(),
            handler: handler.into_boxed_handler(),
        });
        self
    }

    /// Register the fallback handler invoked when no route matches. Without
    /// one, unmatched requests get a fixed 404.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = Some(handler.into_boxed_handler());
        self
    }

    /// Mount every route under a URL prefix. A request path outside the
    /// prefix matches nothing.
    pub fn root(mut self, prefix: &str) -> Self {
        self.root = prefix.to_owned();
        self
    }

    /// A deployment identifier emitted as the `X-Build-Date` header on every
    /// dispatched response.
    pub fn build_identifier(mut self, value: &str) -> Self {
        self.build_identifier = Some(value.to_owned());
        self
    }

    pub(crate) fn find_handler(
        &self,
        method: &str,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|route| route.method.eq_ignore_ascii_case(method))
            .find_map(|route| {
                matcher::find(&route.pattern, path, &self.root)
                    .map(|params| (Arc::clone(&route.handler), params))
            })
    }

    pub(crate) fn not_found_handler(&self) -> Option<BoxedHandler> {
        self.not_found.as_ref().map(Arc::clone)
    }

    pub(crate) fn build_id(&self) -> Option<&str> {
        self.build_identifier.as_deref()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
