//! Handler return values and response normalization.
//!
//! Handlers return `Result<impl IntoValue, Error>`. Whatever comes back —
//! raw bytes, a string, a serializable struct, an explicit status+body
//! envelope, or an error — [`normalize`] resolves it into exactly one
//! `(status, body, content-type)` triple:
//!
//! | handler produced            | status   | body                         | content-type               |
//! |-----------------------------|----------|------------------------------|----------------------------|
//! | trusted error               | its own  | `{"status":..,"message":..}` | `application/json`         |
//! | any other error             | 500      | `Internal Server Error`      | `text/plain`               |
//! | nothing (`()` / `None`)     | 204      | empty                        | —                          |
//! | `Reply(status, body)`       | explicit | body, detected as below      |                            |
//! | bytes                       | 200      | as-is                        | `application/octet-stream` |
//! | string                      | 200      | UTF-8                        | `text/plain`               |
//! | anything serializable       | 200      | JSON                         | `application/json`         |
//!
//! The detected content-type only *fills* the header: if the chain already
//! set an explicit `content-type` on the [`Ctx`](crate::Ctx), that wins.

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;

use crate::error::Error;
use crate::logger::Logger;

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain";
pub(crate) const CONTENT_TYPE_OCTET: &str = "application/octet-stream";

/// Fixed body for collapsed internal errors. The original error text never
/// reaches the client.
pub(crate) const GENERIC_ERROR_TEXT: &str = "Internal Server Error";

// ── Value ─────────────────────────────────────────────────────────────────────

/// A handler's response body, before normalization.
///
/// Exactly one of {explicit envelope, raw value, error} determines the wire
/// response; precedence is error > envelope > raw value > empty-default.
#[derive(Debug)]
pub enum Value {
    /// No body. Outside an envelope this becomes `204 No Content`.
    Empty,
    /// Raw bytes, passed through unchanged.
    Bytes(Bytes),
    /// Plain text, sent as UTF-8.
    Text(String),
    /// A structured value, serialized to JSON at write time.
    Structured(serde_json::Value),
    /// An explicit (status, body) envelope.
    Reply { status: u16, body: Box<Value> },
}

// ── IntoValue ─────────────────────────────────────────────────────────────────

/// Conversion from a handler's return type into a [`Value`].
///
/// Implemented for the common shapes below; implement it on your own types
/// to return them directly from handlers. Conversion is fallible so that
/// serialization failures surface as internal errors (logged, collapsed to
/// a generic 500) instead of panicking mid-request.
pub trait IntoValue {
    fn into_value(self) -> Result<Value, Error>;
}

impl IntoValue for Value {
    fn into_value(self) -> Result<Value, Error> {
        Ok(self)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Empty)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Text(self))
    }
}

impl IntoValue for &'static str {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Text(self.to_owned()))
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Bytes(self.into()))
    }
}

impl IntoValue for Bytes {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Bytes(self))
    }
}

impl IntoValue for serde_json::Value {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Structured(self))
    }
}

/// `None` responds `204 No Content`.
impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Result<Value, Error> {
        match self {
            Some(v) => v.into_value(),
            None => Ok(Value::Empty),
        }
    }
}

/// Typed JSON body: `Ok(Json(user))`.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoValue for Json<T> {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Structured(serde_json::to_value(self.0)?))
    }
}

/// An explicit status+body envelope: `Ok(Reply(201, "created"))`.
pub struct Reply<T>(pub u16, pub T);

impl<T: IntoValue> IntoValue for Reply<T> {
    fn into_value(self) -> Result<Value, Error> {
        Ok(Value::Reply { status: self.0, body: Box::new(self.1.into_value()?) })
    }
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// A fully resolved response, ready to write.
pub(crate) struct Rendered {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: Option<&'static str>,
}

/// Trusted errors cross the wire in this shape.
#[derive(Serialize)]
struct WireError<'a> {
    status: u16,
    message: &'a str,
}

/// Resolves a handler chain's outcome into status, body bytes, and an
/// auto-detected content-type.
pub(crate) fn normalize(result: Result<Value, Error>, log: &dyn Logger) -> Rendered {
    match result {
        Ok(value) => render(None, value, log),

        Err(Error::Status { status, message }) => {
            let body = serde_json::to_vec(&WireError { status, message: &message })
                .unwrap_or_else(|_| format!(r#"{{"status":{status},"message":""}}"#).into_bytes());

            Rendered {
                status: code_or_500(status),
                body: body.into(),
                content_type: Some(CONTENT_TYPE_JSON),
            }
        }

        Err(err) => {
            log.error(&format!("request failed: {err}"));
            generic_error()
        }
    }
}

/// Body-type detection. `status` is `Some` once an envelope has been
/// unwrapped; a bare `Empty` (no envelope) defaults to 204.
fn render(status: Option<u16>, value: Value, log: &dyn Logger) -> Rendered {
    match value {
        Value::Reply { status, body } => render(Some(status), *body, log),

        Value::Empty => Rendered {
            status: code_or_500(status.unwrap_or(204)),
            body: Bytes::new(),
            content_type: None,
        },

        Value::Bytes(body) => Rendered {
            status: code_or_500(status.unwrap_or(200)),
            body,
            content_type: Some(CONTENT_TYPE_OCTET),
        },

        Value::Text(text) => Rendered {
            status: code_or_500(status.unwrap_or(200)),
            body: text.into(),
            content_type: Some(CONTENT_TYPE_TEXT),
        },

        Value::Structured(json) => match serde_json::to_vec(&json) {
            Ok(body) => Rendered {
                status: code_or_500(status.unwrap_or(200)),
                body: body.into(),
                content_type: Some(CONTENT_TYPE_JSON),
            },
            Err(e) => {
                log.error(&format!("failed to serialize response body: {e}"));
                generic_error()
            }
        },
    }
}

fn generic_error() -> Rendered {
    Rendered {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: Bytes::from_static(GENERIC_ERROR_TEXT.as_bytes()),
        content_type: Some(CONTENT_TYPE_TEXT),
    }
}

fn code_or_500(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
