use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, StatusCode, header};
use tracing::error;
use wirecall_protocol::headers;

use crate::dispatch::{CallOutcome, RpcServer};

/// Builds an axum router exposing every registered procedure at
/// `POST /{name}`. Non-POST methods get 405 from the method router; the
/// dispatcher supplies the remaining statuses. Nest the router to serve the
/// procedures under a prefix.
pub fn router(server: Arc<RpcServer>) -> Router {
    Router::new().route(
        "/{name}",
        post(move |Path(name): Path<String>, request_headers: HeaderMap, body: Bytes| {
            let server = Arc::clone(&server);
            async move { respond(server.dispatch(&name, &request_headers, body).await) }
        }),
    )
}

impl RpcServer {
    /// Consumes the server into a ready-to-serve [`Router`].
    #[must_use]
    pub fn into_router(self) -> Router {
        router(Arc::new(self))
    }
}

fn respond(outcome: CallOutcome) -> Response {
    let built = match outcome {
        CallOutcome::Unary {
            body,
            content_type,
            serializer,
            failed,
        } => {
            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(headers::SERIALIZER, serializer);
            if failed {
                builder = builder.header(headers::CALLBACK_STATUS, headers::CALLBACK_STATUS_EXCEPTION);
            }
            builder.body(Body::from(body))
        }
        CallOutcome::Streaming { frames, serializer } => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, headers::EVENT_STREAM_CONTENT_TYPE)
            .header(headers::SERIALIZER, serializer)
            .header(headers::SERIALIZER_BASE, headers::BASE64)
            .body(Body::from_stream(frames.map(Ok::<_, Infallible>))),
        CallOutcome::Rejected { status, message } => {
            Response::builder().status(status).body(Body::from(message))
        }
    };

    built.unwrap_or_else(|cause| {
        error!(error = %cause, "failed to build response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}
