//! Response body arguments and the coercion rules that turn them into bytes.
//!
//! Handlers hand the reply builders loosely-typed values — a string, a
//! number, a timestamp, a serializable struct. [`Payload`] is the closed set
//! of kinds the builders accept, resolved once per argument at the call site
//! rather than inspected at runtime. [`Args`] is the variadic surface:
//! `success("OK")`, `success((202, "OK"))` and `success(())` all work.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::Serialize;
use tracing::error;

// ── Payload ───────────────────────────────────────────────────────────────────

/// One response-body argument.
///
/// Each variant carries everything needed to render itself; conversion to
/// bytes happens in [`Payload::into_bytes`] when the reply is assembled.
///
/// | variant | rendering |
/// |---|---|
/// | `Bool` | `"true"` / `"false"` |
/// | `Int` | decimal digits |
/// | `Float` | shortest round-trip decimal, no exponent |
/// | `Bytes` | passed through unchanged |
/// | `Text` | UTF-8 bytes of the string |
/// | `Time` | `YYYY-MM-DD HH:MM:SS` in the carried offset |
/// | `Structured` | JSON, serialized when the payload was built |
/// | `Empty` | nothing |
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Time(DateTime<FixedOffset>),
    Structured(Vec<u8>),
    Empty,
}

impl Payload {
    /// Builds a structured payload from any serializable value.
    ///
    /// Serialization happens here, once. A value that cannot be serialized
    /// contributes no bytes to the body; the failure is logged and the
    /// client sees the rest of the response unchanged.
    pub fn json(value: impl Serialize) -> Payload {
        match serde_json::to_vec(&value) {
            Ok(bytes) => Payload::Structured(bytes),
            Err(e) => {
                error!("structured payload could not be serialized: {e}");
                Payload::Empty
            }
        }
    }

    /// The status-code override carried by this payload, if any.
    ///
    /// Only integer payloads in the valid HTTP range qualify. Anything else
    /// — including an out-of-range integer — is body content.
    pub(crate) fn as_status_code(&self) -> Option<u16> {
        match self {
            Payload::Int(code) if (100..=999).contains(code) => Some(*code as u16),
            _ => None,
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Bool(value) => value.to_string().into_bytes(),
            Payload::Int(value) => value.to_string().into_bytes(),
            Payload::Float(value) => value.to_string().into_bytes(),
            Payload::Bytes(value) => value,
            Payload::Text(value) => value.into_bytes(),
            Payload::Time(value) => value.format("%Y-%m-%d %H:%M:%S").to_string().into_bytes(),
            Payload::Structured(value) => value,
            Payload::Empty => Vec::new(),
        }
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Payload::Int(i64::from(value))
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Int(value)
    }
}

impl From<u16> for Payload {
    fn from(value: u16) -> Self {
        Payload::Int(i64::from(value))
    }
}

impl From<u32> for Payload {
    fn from(value: u32) -> Self {
        Payload::Int(i64::from(value))
    }
}

impl From<usize> for Payload {
    fn from(value: usize) -> Self {
        Payload::Int(value as i64)
    }
}

impl From<f32> for Payload {
    fn from(value: f32) -> Self {
        Payload::Float(f64::from(value))
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Bytes(value.to_vec())
    }
}

/// Timestamps keep whatever zone or offset they were built with.
impl<Tz: TimeZone> From<DateTime<Tz>> for Payload {
    fn from(value: DateTime<Tz>) -> Self {
        Payload::Time(value.fixed_offset())
    }
}

/// A naive timestamp is taken as UTC.
impl From<NaiveDateTime> for Payload {
    fn from(value: NaiveDateTime) -> Self {
        Payload::Time(value.and_utc().fixed_offset())
    }
}

// ── Args ──────────────────────────────────────────────────────────────────────

/// The variadic-argument surface of the reply builders.
///
/// Implemented for `()` (no arguments), single payload-convertible values,
/// and tuples of up to five of them:
///
/// ```rust
/// # use rudder::Context;
/// # use std::collections::HashMap;
/// # let ctx = Context::fake("GET", "/", Vec::<u8>::new(), HashMap::new());
/// ctx.success(());                      // 200, empty body
/// ctx.success("OK");                    // 200, body "OK"
/// ctx.success((202, "accepted"));       // 202, body "accepted"
/// ctx.error((401, "who are you?"));     // 401
/// ```
pub trait Args {
    fn into_payloads(self) -> Vec<Payload>;
}

impl Args for () {
    fn into_payloads(self) -> Vec<Payload> {
        Vec::new()
    }
}

impl<Tz: TimeZone> Args for DateTime<Tz> {
    fn into_payloads(self) -> Vec<Payload> {
        vec![self.into()]
    }
}

macro_rules! single_arg {
    ($($ty:ty),+ $(,)?) => {$(
        impl Args for $ty {
            fn into_payloads(self) -> Vec<Payload> {
                vec![self.into()]
            }
        }
    )+};
}

single_arg!(
    bool, i32, i64, u16, u32, usize, f32, f64, &str, String, Vec<u8>, &[u8], NaiveDateTime, Payload,
);

macro_rules! tuple_args {
    ($($name:ident),+) => {
        impl<$($name: Into<Payload>),+> Args for ($($name,)+) {
            fn into_payloads(self) -> Vec<Payload> {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_args!(A);
tuple_args!(A, B);
tuple_args!(A, B, C);
tuple_args!(A, B, C, D);
tuple_args!(A, B, C, D, E);

// ── Argument-list resolution ──────────────────────────────────────────────────

/// The status code an argument list asks for, or `default` when the first
/// argument is not an in-range integer.
pub(crate) fn status_override(parts: &[Payload], default: u16) -> u16 {
    parts
        .first()
        .and_then(Payload::as_status_code)
        .unwrap_or(default)
}

/// Renders an argument list to body bytes. A leading in-range status code is
/// consumed by [`status_override`] and skipped here; everything else is
/// coerced and concatenated with no separator.
pub(crate) fn body_bytes(parts: Vec<Payload>) -> Vec<u8> {
    let mut output = Vec::new();
    for (pos, piece) in parts.into_iter().enumerate() {
        if pos == 0 && piece.as_status_code().is_some() {
            continue;
        }
        output.extend_from_slice(&piece.into_bytes());
    }
    output
}
