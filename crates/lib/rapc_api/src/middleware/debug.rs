//! Debug layer: copy internal error details into the response body.
//!
//! Only installed when `ENABLE_DEBUG` is set.

use axum::body::{Body, to_bytes};
use axum::http::header::CONTENT_LENGTH;
use axum::{extract::Request, middleware::Next, response::Response};
use tracing::warn;

use crate::error::ErrorDetail;

pub async fn expose_error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "could not buffer error body");
            return Response::from_parts(parts, Body::empty());
        }
    };
    let mut json: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(json) => json,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    json["detail"] = serde_json::Value::String(detail);

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(json.to_string()))
}
