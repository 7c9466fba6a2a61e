//! Blocking call facade for threaded callers, mirroring
//! [`RpcClient`](crate::RpcClient).
//!
//! Streaming calls are consumed through [`StreamingCall`], a plain
//! [`Iterator`] that reads the event-stream body with blocking I/O.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use wirecall_protocol::{EventParser, LineSplitter, headers};
use wirecall_serializers::{JsonSerializer, Serializer, SerializerRegistry};

use crate::error::{Error, Result};
use crate::{
    Arguments, Params, check_stream_base, failure_description, interpret_event, remote_failure,
    resolve_response_serializer,
};

/// Blocking counterpart of [`RpcClient`](crate::RpcClient).
///
/// Must not be used from within an async runtime; it is meant for plain
/// threaded programs.
#[derive(Clone)]
pub struct BlockingRpcClient {
    http: reqwest::blocking::Client,
    base_url: String,
    serializers: Arc<SerializerRegistry>,
    request_serializer: Arc<dyn Serializer>,
}

impl BlockingRpcClient {
    /// Creates a client rooted at `base_url`, with the built-in codecs and
    /// JSON requests.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: crate::normalize_base_url(base_url.into()),
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
    pub fn stub(&self, name: &str, params: Params) -> BlockingStub {
        BlockingStub {
            client: self.clone(),
            name: name.to_owned(),
            params,
        }
    }

    fn request(&self, name: &str, args: Arguments) -> Result<reqwest::blocking::RequestBuilder> {
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
    /// As [`RpcClient::call`](crate::RpcClient::call).
    pub fn call<T: DeserializeOwned>(&self, name: &str, args: Arguments) -> Result<T> {
        debug!(procedure = name, "unary call");
        let response = self.request(name, args)?.send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let serializer = resolve_response_serializer(&self.serializers, response.headers())?;
        let failed = remote_failure(response.headers());
        let body = response.bytes()?;
        let value = serializer.decode(&body)?;
        if failed {
            return Err(Error::Remote(failure_description(value)));
        }
        serde_json::from_value(value).map_err(Error::ResultType)
    }

    /// Invokes a streaming procedure, returning an iterator over its values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] when the server rejects the call; remote
    /// mid-stream failures surface as [`Error::Remote`] items of the
    /// iterator.
    pub fn call_streaming<T: DeserializeOwned>(
        &self,
        name: &str,
        args: Arguments,
    ) -> Result<StreamingCall<T>> {
        debug!(procedure = name, "streaming call");
        let response = self.request(name, args)?.send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        let serializer = resolve_response_serializer(&self.serializers, response.headers())?;
        check_stream_base(response.headers())?;
        Ok(StreamingCall {
            response,
            serializer,
            splitter: LineSplitter::new(),
            parser: EventParser::new(),
            pending: VecDeque::new(),
            finished: false,
        })
    }
}

/// Blocking counterpart of [`Stub`](crate::Stub): binds arguments against
/// the declared signature before sending anything.
#[derive(Clone)]
pub struct BlockingStub {
    client: BlockingRpcClient,
    name: String,
    params: Params,
}

impl BlockingStub {
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
    /// otherwise as [`BlockingRpcClient::call`].
    pub fn call<T: DeserializeOwned>(&self, args: Arguments) -> Result<T> {
        let args = self.params.bind(args.into_value())?;
        self.client.call(&self.name, args)
    }

    /// Invokes the procedure as a streaming call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] when `args` violate the declared signature;
    /// otherwise as [`BlockingRpcClient::call_streaming`].
    pub fn call_streaming<T: DeserializeOwned>(&self, args: Arguments) -> Result<StreamingCall<T>> {
        let args = self.params.bind(args.into_value())?;
        self.client.call_streaming(&self.name, args)
    }
}

/// An in-flight streaming call, iterated one produced value at a time.
///
/// Iteration ends when the remote body completes or after a single
/// [`Error::Remote`] item when it fails mid-stream. Keep-alive comment
/// frames are consumed silently.
pub struct StreamingCall<T> {
    response: reqwest::blocking::Response,
    serializer: Arc<dyn Serializer>,
    splitter: LineSplitter,
    parser: EventParser,
    pending: VecDeque<Result<T>>,
    finished: bool,
}

impl<T: DeserializeOwned> Iterator for StreamingCall<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }

            let mut buf = [0u8; 2048];
            match self.response.read(&mut buf) {
                Ok(0) => self.finished = true,
                Ok(read) => {
                    for line in self.splitter.push(&buf[..read]) {
                        if let Some(event) = self.parser.feed_line(&line) {
                            if let Some(item) =
                                interpret_event::<T>(&event, self.serializer.as_ref())
                            {
                                self.pending.push_back(item);
                            }
                        }
                    }
                }
                Err(error) => {
                    self.finished = true;
                    return Some(Err(Error::Io(error)));
                }
            }
        }
    }
}
