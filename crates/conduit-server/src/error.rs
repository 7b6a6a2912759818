// SPDX-License-Identifier: Apache-2.0
//! Turns [`conduit_core::PipelineError`] into an HTTP response carrying the
//! error taxonomy's status code and JSON envelope (`spec.md` §4.12).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use conduit_core::PipelineError;

pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = (status, axum::Json(self.0.to_json_body())).into_response();
        if let Some(retry_after) = self.0.retry_after_secs() {
            resp.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&retry_after.to_string()).unwrap(),
            );
        }
        resp
    }
}
