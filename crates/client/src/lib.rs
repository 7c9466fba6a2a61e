//! Client side of wirecall: suspending and blocking call facades over the
//! HTTP transport, plus stubs that bind arguments against a declared
//! signature before anything goes on the wire.
//!
//! Unary calls decode a single response body; streaming calls consume a
//! live event-stream and surface each produced value in order. A remote
//! failure arrives as [`Error::Remote`] carrying the server's description
//! verbatim, on both paths.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod blocking;
mod error;

pub use error::{Error, Result};
pub use wirecall_protocol::{Arguments, Params};

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{StreamExt, stream};
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use wirecall_protocol::{EVENT_EXCEPTION, EVENT_YIELD, Event, EventParser, LineSplitter, headers};
use wirecall_serializers::{JsonSerializer, Serializer, SerializerRegistry};

/// Suspending call facade over a wirecall server.
///
/// Cheap to clone; clones share the HTTP connection pool and the codec
/// registry.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: String,
    serializers: Arc<SerializerRegistry>,
    request_serializer: Arc<dyn Serializer>,
}

impl RpcClient {
    /// Creates a client rooted at `base_url`, with the built-in codecs and
    /// JSON requests.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(base_url.into()),
            serializers: Arc::new(SerializerRegistry::default()),
            request_serializer: Arc::new(JsonSerializer),
        }
    }

    /// Replaces the codec registry used to decode responses.
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = Arc::new(serializers);
        self
    }

    /// Sets the codec used to encode request bodies.
    #[must_use]
    pub fn with_request_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.request_serializer = serializer;
        self
    }

    /// Creates a stub for one remote procedure with a declared signature.
    #[must_use]
    pub fn stub(&self, name: &str, params: Params) -> Stub {
        Stub {
            client: self.clone(),
            name: name.to_owned(),
            params,
        }
    }

    fn request(&self, name: &str, args: Arguments) -> Result<reqwest::RequestBuilder> {
        let mut builder = self
            .http
            .post(format!("{}{name}", self.base_url))
            .header(headers::SERIALIZER, self.request_serializer.name())
            .header(
                http::header::CONTENT_TYPE,
                self.request_serializer.content_type(),
            );
        if !args.is_empty() {
            let body = self.request_serializer.encode(&args.into_value())?;
            builder = builder.body(body);
        }
        Ok(builder)
    }

    /// Invokes a unary procedure and decodes its result as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] when the procedure body failed,
    /// [`Error::Status`] when the server rejected the call before invoking
    /// it, and local variants for transport or decoding faults.
    pub async fn call<T: DeserializeOwned>(&self, name: &str, args: Arguments) -> Result<T> {
        debug!(procedure = name, "unary call");
        let response = self.request(name, args)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let serializer = resolve_response_serializer(&self.serializers, response.headers())?;
        let failed = remote_failure(response.headers());
        let body = response.bytes().await?;
        let value = serializer.decode(&body)?;
        if failed {
            return Err(Error::Remote(failure_description(value)));
        }
        serde_json::from_value(value).map_err(Error::ResultType)
    }

    /// Invokes a streaming procedure, yielding each produced value in order.
    ///
    /// The stream ends when the remote body completes, or with a single
    /// [`Error::Remote`] item when it fails mid-stream. Keep-alive comment
    /// frames are consumed silently.
    pub fn call_streaming<T>(&self, name: &str, args: Arguments) -> BoxStream<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!(procedure = name, "streaming call");
        let request = self.request(name, args);
        let serializers = Arc::clone(&self.serializers);

        Box::pin(async_stream::try_stream! {
            let (response, serializer) = open_event_stream(request?, &serializers).await?;
            let mut splitter = LineSplitter::new();
            let mut parser = EventParser::new();
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                for line in splitter.push(&chunk) {
                    if let Some(event) = parser.feed_line(&line) {
                        if let Some(item) = interpret_event::<T>(&event, serializer.as_ref()) {
                            let value = item?;
                            yield value;
                        }
                    }
                }
            }
        })
    }
}

async fn open_event_stream(
    request: reqwest::RequestBuilder,
    serializers: &SerializerRegistry,
) -> Result<(reqwest::Response, Arc<dyn Serializer>)> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            message,
        });
    }

    let serializer = resolve_response_serializer(serializers, response.headers())?;
    check_stream_base(response.headers())?;
    Ok((response, serializer))
}

/// A callable bound to one remote procedure name and a declared signature.
///
/// Arguments are bound locally before any request is sent, so signature
/// violations surface as [`Error::Bind`] without a round trip.
#[derive(Clone)]
pub struct Stub {
    client: RpcClient,
    name: String,
    params: Params,
}

impl Stub {
    /// The remote procedure name this stub calls.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the procedure as a unary call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] when `args` violate the declared signature;
    /// otherwise as [`RpcClient::call`].
    pub async fn call<T: DeserializeOwned>(&self, args: Arguments) -> Result<T> {
        let args = self.params.bind(args.into_value())?;
        self.client.call(&self.name, args).await
    }

    /// Invokes the procedure as a streaming call.
    ///
    /// A signature violation is delivered as the only stream item.
    pub fn call_streaming<T>(&self, args: Arguments) -> BoxStream<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.params.bind(args.into_value()) {
            Ok(args) => self.client.call_streaming(&self.name, args),
            Err(error) => stream::once(async move { Err(Error::Bind(error)) }).boxed(),
        }
    }
}

fn normalize_base_url(mut base_url: String) -> String {
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}

fn header_value<'a>(response_headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    response_headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

pub(crate) fn resolve_response_serializer(
    registry: &SerializerRegistry,
    response_headers: &HeaderMap,
) -> Result<Arc<dyn Serializer>> {
    let name = header_value(response_headers, headers::SERIALIZER)
        .ok_or_else(|| Error::BadResponse("response names no serializer".to_owned()))?;
    Ok(registry.by_name(name)?)
}

pub(crate) fn remote_failure(response_headers: &HeaderMap) -> bool {
    header_value(response_headers, headers::CALLBACK_STATUS)
        == Some(headers::CALLBACK_STATUS_EXCEPTION)
}

pub(crate) fn check_stream_base(response_headers: &HeaderMap) -> Result<()> {
    match header_value(response_headers, headers::SERIALIZER_BASE) {
        Some(base) if base != headers::BASE64 => Err(Error::BadResponse(format!(
            "unsupported serializer base `{base}`"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn failure_description(value: Value) -> String {
    match value {
        Value::String(description) => description,
        other => other.to_string(),
    }
}

/// Maps a parsed event onto the local iteration: a `yield` becomes a decoded
/// value, an `exception` becomes [`Error::Remote`], anything else is
/// skipped.
pub(crate) fn interpret_event<T: DeserializeOwned>(
    event: &Event,
    serializer: &dyn Serializer,
) -> Option<Result<T>> {
    match event.event_type() {
        Some(EVENT_YIELD) => Some(decode_yield(event, serializer)),
        Some(EVENT_EXCEPTION) => Some(Err(Error::Remote(
            event.data().unwrap_or_default().to_owned(),
        ))),
        _ => None,
    }
}

fn decode_yield<T: DeserializeOwned>(event: &Event, serializer: &dyn Serializer) -> Result<T> {
    let payload = event
        .data()
        .ok_or_else(|| Error::BadResponse("yield event without data".to_owned()))?;
    let bytes = wirecall_protocol::decode_payload(payload)?;
    let value = serializer.decode(&bytes)?;
    serde_json::from_value(value).map_err(Error::ResultType)
}
