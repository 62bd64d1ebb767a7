//! # rudder
//!
//! An embeddable HTTP request router. Register handlers against path
//! patterns, get a uniform request surface in, hand a typed reply back.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! rudder owns the part that changes between applications — resolving a
//! method + path to your handler and turning your handler's return value
//! into an HTTP response. Everything it deliberately does not own (rate
//! limiting, body-size limits, request timeouts) belongs to the proxy or
//! ingress in front of it.
//!
//! - **Pattern routing** — `/users/:id` binds mandatory segments,
//!   `/report/:year/[:month]` forgives absent optional ones. First
//!   registered, first matched.
//! - **Polymorphic replies** — `ctx.success("OK")`,
//!   `ctx.success((202, payload))`, `ctx.error(())`: strings, numbers,
//!   booleans, timestamps, bytes and JSON-serializable values all coerce to
//!   body bytes by one set of rules.
//! - **Async I/O** — tokio + hyper, HTTP/1.1 and HTTP/2, graceful shutdown
//!   on SIGTERM / Ctrl-C.
//! - **TLS for development** — `serve_tls(router, None)` self-signs a
//!   localhost certificate and persists it beside the process.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rudder::{Context, Reply, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/users/:id", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(ctx: Context) -> Reply {
//!     match ctx.param("id") {
//!         Some(id) => ctx.success(format!(r#"{{"id":"{id}"}}"#)),
//!         None => ctx.error("id parameter is missing"),
//!     }
//! }
//!
//! async fn create_user(mut ctx: Context) -> Reply {
//!     if !ctx.has_body().await {
//!         return ctx.error((422, "empty body"));
//!     }
//!     ctx.success((201, "created"))
//! }
//! ```

mod context;
mod error;
mod handler;
mod matcher;
mod payload;
mod reply;
mod router;
mod server;

pub mod tls;

pub use context::Context;
pub use error::Error;
pub use handler::Handler;
pub use payload::{Args, Payload};
pub use reply::{IntoReply, Reply};
pub use router::Router;
pub use server::Server;
pub use tls::TlsFiles;
