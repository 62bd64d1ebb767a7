//! Minimal rudder example — parameterized routes and polymorphic replies.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/report/2024/06
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/x-www-form-urlencoded' \
//!        -d 'name=alice'
//!   curl -v http://localhost:3000/old-endpoint
//!   curl http://localhost:3000/definitely/not/a/route

use rudder::{Context, Payload, Reply, Router, Server};
use serde::Serialize;

#[derive(Serialize)]
struct User {
    id: String,
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .get("/users/:id", get_user)
        .post("/users", create_user)
        .get("/report/:year/[:month]", report)
        .get("/old-endpoint", moved)
        .not_found(missing)
        .build_identifier(env!("CARGO_PKG_VERSION"));

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/:id
//
// A serializable struct goes out as JSON via Payload::json.
async fn get_user(ctx: Context) -> Reply {
    match ctx.param("id") {
        Some(id) => ctx.success(Payload::json(User {
            id: id.to_owned(),
            name: "alice".to_owned(),
        })),
        None => ctx.error("id parameter is missing"),
    }
}

// POST /users — reads a form-urlencoded body.
async fn create_user(mut ctx: Context) -> Reply {
    let Some(name) = ctx.post_var("name").await else {
        return ctx.error((422, "name is required"));
    };

    ctx.success((201, Payload::json(User {
        id: "99".to_owned(),
        name,
    })))
}

// GET /report/:year/[:month] — the month segment is optional.
async fn report(ctx: Context) -> Reply {
    let year = ctx.param("year").unwrap_or("unknown");
    match ctx.param("month") {
        Some(month) => ctx.success(format!("report for {year}-{month}")),
        None => ctx.success(format!("report for all of {year}")),
    }
}

// GET /old-endpoint → 302
async fn moved(ctx: Context) -> Reply {
    ctx.redirect("/users/42")
}

async fn missing(ctx: Context) -> Reply {
    ctx.error((404, "nothing lives at ", ctx.url().to_owned()))
}
