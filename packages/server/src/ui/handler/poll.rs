//! The long-polling endpoint.
//!
//! A request is decoded here and handed to the multiplexer. The handler
//! future stays pending for as long as the connection holds the response;
//! if the client disconnects, hyper drops the future and the multiplexer
//! handle reports the request as abandoned.

use std::{io, sync::Arc};

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use thiserror::Error;

use crate::{
    infrastructure::dto::poll::{PollRequestDto, PollResponseDto},
    ui::state::AppState,
};

/// Hard cap on a poll request body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_000_000;

/// Failures while reading a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[from] axum::Error),
}

pub async fn poll_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let bytes = match read_body(&headers, body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e @ BodyError::TooLarge { .. }) => {
            tracing::warn!("Dropping connection: {}", e);
            return abort_connection();
        }
        Err(e) => {
            tracing::warn!("Rejecting poll request: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let dto = match serde_json::from_slice::<PollRequestDto>(&bytes) {
        Ok(dto) => dto,
        Err(e) => {
            tracing::warn!("Failed to parse poll request as JSON: {}", e);
            return (StatusCode::BAD_REQUEST, format!("JSON parse error {}", e)).into_response();
        }
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    match state.multiplexer.poll(dto.into_request(user_agent)).await {
        Ok(response) => Json(PollResponseDto::from(response)).into_response(),
        Err(e) => {
            tracing::error!("Poll request failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// A response whose body fails immediately, so hyper tears the transport
/// connection down instead of writing a well-formed HTTP error.
fn abort_connection() -> Response {
    let body = Body::from_stream(futures_util::stream::once(async {
        Err::<Bytes, _>(io::Error::other("request body too large"))
    }));
    (StatusCode::PAYLOAD_TOO_LARGE, body).into_response()
}

/// Accumulate the body, giving up as soon as it crosses `limit`.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Vec<u8>, BodyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > limit) {
        return Err(BodyError::TooLarge { limit });
    }

    let mut stream = body.into_data_stream();
    let mut buf = Vec::with_capacity(declared.unwrap_or(0));
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
