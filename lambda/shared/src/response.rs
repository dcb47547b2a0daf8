//! Response construction and the invocation boundary.
//!
//! [`respond`] is the outermost layer of every handler: it turns errors and panics
//! into JSON responses and stamps the CORS headers on whatever comes out, so the
//! router always gets a well-formed reply.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use lambda_http::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use serde_json::{json, Value};
use tracing::error;

use crate::error::ApiError;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Fixed cross-origin headers attached to every response of one handler.
#[derive(Debug, Clone, Copy)]
pub struct Cors {
    pub allow_origin: &'static str,
    pub allow_methods: &'static str,
    pub allow_headers: &'static str,
}

impl Cors {
    pub fn apply(&self, response: &mut Response<Body>) {
        let headers = response.headers_mut();
        headers.insert(
            HeaderName::from_static("access-control-allow-origin"),
            HeaderValue::from_static(self.allow_origin),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-methods"),
            HeaderValue::from_static(self.allow_methods),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-headers"),
            HeaderValue::from_static(self.allow_headers),
        );
    }

    /// Answer to a preflight request.
    pub fn preflight(&self) -> Response<Body> {
        let mut response = Response::new(Body::Empty);
        self.apply(&mut response);
        response
    }
}

/// JSON response with the given status.
pub fn json(status: StatusCode, value: &Value) -> Response<Body> {
    let mut response = Response::new(Body::Text(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

pub fn ok(value: &Value) -> Response<Body> {
    json(StatusCode::OK, value)
}

pub fn created(value: &Value) -> Response<Body> {
    json(StatusCode::CREATED, value)
}

pub fn message(status: StatusCode, text: &str) -> Response<Body> {
    json(status, &json!({ "message": text }))
}

impl ApiError {
    pub fn into_response(self) -> Response<Body> {
        json(self.status(), &json!({ "error": self.public_message() }))
    }
}

/// Run one invocation and always come back with a response.
pub async fn respond<F>(cors: &Cors, handler: F) -> Response<Body>
where
    F: Future<Output = Result<Response<Body>, ApiError>>,
{
    let outcome = AssertUnwindSafe(handler).catch_unwind().await;

    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            if err.status().is_server_error() {
                error!(error = %err, "request failed");
            }
            err.into_response()
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %detail, "handler panicked");
            ApiError::Internal(detail).into_response()
        }
    };

    cors.apply(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORS: Cors = Cors {
        allow_origin: "*",
        allow_methods: "GET,POST,OPTIONS",
        allow_headers: "Content-Type",
    };

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_success_gets_cors_headers() {
        let response = respond(&CORS, async { Ok(ok(&json!({ "a": 1 }))) }).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], APPLICATION_JSON);
        assert_eq!(body_json(&response), json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_error_is_mapped() {
        let response = respond(&CORS, async { Err(ApiError::validation("Title is required")) }).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-methods"], "GET,POST,OPTIONS");
        assert_eq!(body_json(&response), json!({ "error": "Title is required" }));
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let response = respond(&CORS, async {
            if true {
                panic!("state corrupted");
            }
            Ok(ok(&json!({})))
        })
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["access-control-allow-headers"], "Content-Type");
        assert_eq!(body_json(&response), json!({ "error": "Internal server error" }));
    }

    #[test]
    fn test_preflight() {
        let response = CORS.preflight();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
