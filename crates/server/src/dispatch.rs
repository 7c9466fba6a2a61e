use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, StatusCode, header};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use wirecall_protocol::Arguments;
use wirecall_serializers::{JsonSerializer, Serializer, SerializerRegistry};

use crate::encoder::StreamEncoder;
use crate::registry::{
    Handler, HandlerError, ProcedureRegistry, UnaryResult, ValueStream,
};

/// Default heartbeat interval between ping frames.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(3);

/// Default bound of the streaming output channel.
pub const DEFAULT_STREAM_CAPACITY: usize = 16;

/// What a dispatched call produced, ready to be rendered as a response.
pub enum CallOutcome {
    /// A single encoded body. `failed` marks the body as an encoded failure
    /// description rather than a success payload.
    Unary {
        /// The serializer-encoded response body.
        body: Bytes,
        /// The response body's media type.
        content_type: &'static str,
        /// The codec name the client should decode with.
        serializer: &'static str,
        /// Whether the body is a failure description.
        failed: bool,
    },
    /// Live event-stream frames.
    Streaming {
        /// Wire frames, in producer order with pings interleaved.
        frames: ReceiverStream<Bytes>,
        /// The codec name the client should decode payloads with.
        serializer: &'static str,
    },
    /// The call never reached a handler.
    Rejected {
        /// The HTTP-style status to surface.
        status: StatusCode,
        /// A human-readable reason.
        message: String,
    },
}

impl CallOutcome {
    fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// The call dispatch engine: resolves the serializer and procedure for each
/// request, binds arguments, invokes the handler, and classifies the result
/// per the procedure's registered invocation kind.
///
/// Classification failures (negotiation, lookup, binding) are recovered into
/// structured outcomes and never raise; handler failures are caught at the
/// invocation boundary and converted into the protocol-level failure signal.
pub struct RpcServer {
    procedures: ProcedureRegistry,
    serializers: SerializerRegistry,
    response_serializer: Arc<dyn Serializer>,
    heartbeat: Duration,
    stream_capacity: usize,
}

impl RpcServer {
    /// Creates a server over a registry of procedures, responding in JSON
    /// with default streaming settings.
    #[must_use]
    pub fn new(procedures: ProcedureRegistry) -> Self {
        Self {
            procedures,
            serializers: SerializerRegistry::default(),
            response_serializer: Arc::new(JsonSerializer),
            heartbeat: DEFAULT_HEARTBEAT,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }

    /// Replaces the serializer registry used for request negotiation.
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    /// Sets the codec used to encode results. It should also be registered
    /// in the serializer registry so clients can resolve it by name.
    #[must_use]
    pub fn with_response_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.response_serializer = serializer;
        self
    }

    /// Sets the interval between streaming keep-alive pings.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Sets the bound of the streaming output channel.
    #[must_use]
    pub fn with_stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity;
        self
    }

    /// Dispatches one call: negotiate, resolve, bind, invoke, classify.
    pub async fn dispatch(&self, name: &str, headers: &HeaderMap, body: Bytes) -> CallOutcome {
        let request_serializer = match self.serializers.negotiate(
            header_str(headers, wirecall_protocol::headers::SERIALIZER),
            header_str(headers, header::CONTENT_TYPE.as_str()),
        ) {
            Ok(serializer) => serializer,
            Err(cause) => {
                debug!(procedure = name, error = %cause, "serializer negotiation failed");
                return CallOutcome::rejected(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    cause.to_string(),
                );
            }
        };

        let Some(procedure) = self.procedures.lookup(name) else {
            debug!(procedure = name, "unknown procedure");
            return CallOutcome::rejected(
                StatusCode::NOT_FOUND,
                format!("no procedure named `{name}`"),
            );
        };

        let payload = if body.is_empty() {
            Value::Object(Map::new())
        } else {
            match request_serializer.decode(&body) {
                Ok(payload) => payload,
                Err(cause) => {
                    return CallOutcome::rejected(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        cause.to_string(),
                    );
                }
            }
        };
        let args = match procedure.params().bind(payload) {
            Ok(args) => args,
            Err(cause) => {
                debug!(procedure = name, error = %cause, "argument binding failed");
                return CallOutcome::rejected(StatusCode::UNPROCESSABLE_ENTITY, cause.to_string());
            }
        };

        debug!(procedure = name, kind = ?procedure.invocation_kind(), "dispatching call");
        match procedure.handler() {
            Handler::Unary(handler) => self.unary_outcome(handler(args).await),
            Handler::BlockingUnary(handler) => {
                let handler = Arc::clone(handler);
                let result = match tokio::task::spawn_blocking(move || handler(args)).await {
                    Ok(result) => result,
                    Err(cause) => Err(HandlerError::new("TaskError", cause.to_string())),
                };
                self.unary_outcome(result)
            }
            Handler::Streaming(handler) => self.streaming_outcome(handler(args)),
            Handler::BlockingStreaming(handler) => {
                self.streaming_outcome(blocking_stream(Arc::clone(handler), args))
            }
        }
    }

    fn unary_outcome(&self, result: UnaryResult) -> CallOutcome {
        match result {
            Ok(value) => match self.response_serializer.encode(&value) {
                Ok(body) => CallOutcome::Unary {
                    body,
                    content_type: self.response_serializer.content_type(),
                    serializer: self.response_serializer.name(),
                    failed: false,
                },
                Err(cause) => {
                    self.failure_outcome(HandlerError::new("SerializeError", cause.to_string()))
                }
            },
            Err(failure) => self.failure_outcome(failure),
        }
    }

    fn failure_outcome(&self, failure: HandlerError) -> CallOutcome {
        let description = failure.description();
        warn!(%description, "handler failed");
        let body = self
            .response_serializer
            .encode(&Value::String(description.clone()))
            .unwrap_or_else(|_| Bytes::from(description.into_bytes()));
        CallOutcome::Unary {
            body,
            content_type: self.response_serializer.content_type(),
            serializer: self.response_serializer.name(),
            failed: true,
        }
    }

    fn streaming_outcome(&self, source: ValueStream) -> CallOutcome {
        let encoder = StreamEncoder::new(
            Arc::clone(&self.response_serializer),
            self.heartbeat,
            self.stream_capacity,
        );
        CallOutcome::Streaming {
            frames: encoder.encode(source),
            serializer: self.response_serializer.name(),
        }
    }
}

/// Drives a blocking iterator on the blocking pool, bridging it into a
/// stream with a one-slot channel so backpressure reaches the iterator.
fn blocking_stream(
    handler: Arc<dyn Fn(Arguments) -> Box<dyn Iterator<Item = UnaryResult> + Send> + Send + Sync>,
    args: Arguments,
) -> ValueStream {
    let (tx, rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || {
        for item in handler(args) {
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx).boxed()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
