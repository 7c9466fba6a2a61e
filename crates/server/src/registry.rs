use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;
use tracing::debug;
use wirecall_protocol::{Arguments, BindError, Params};

use crate::error::{Error, Result};

/// How a registered procedure produces its result. Fixed at registration;
/// dispatch never inspects return values to classify a call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvocationKind {
    /// Exactly one result.
    Unary,
    /// A lazily produced, ordered sequence of results.
    Streaming,
}

/// The concurrency convention a handler was written for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
    /// Plain functions, run on the blocking thread pool.
    Blocking,
    /// Futures and streams, run on the async runtime.
    Suspending,
}

/// A failure reported by a registered procedure body.
///
/// Carries an exception kind and message; [`HandlerError::description`] is
/// the string that crosses the wire and is re-raised on the client.
#[derive(Clone, Debug)]
pub struct HandlerError {
    kind: String,
    message: String,
}

impl HandlerError {
    /// Creates an error from an exception kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// The `"{kind}: {message}"` description delivered to the client.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<BindError> for HandlerError {
    fn from(error: BindError) -> Self {
        Self::new("ArgumentError", error.to_string())
    }
}

/// What a unary handler (or one streamed item) produces.
pub type UnaryResult = std::result::Result<Value, HandlerError>;

/// A lazily produced sequence of handler results.
pub type ValueStream = BoxStream<'static, UnaryResult>;

type AsyncUnaryFn = dyn Fn(Arguments) -> BoxFuture<'static, UnaryResult> + Send + Sync;
type AsyncStreamingFn = dyn Fn(Arguments) -> ValueStream + Send + Sync;
type BlockingUnaryFn = dyn Fn(Arguments) -> UnaryResult + Send + Sync;
type BlockingStreamingFn =
    dyn Fn(Arguments) -> Box<dyn Iterator<Item = UnaryResult> + Send> + Send + Sync;

/// A registered callable tagged with its calling convention.
pub(crate) enum Handler {
    Unary(Arc<AsyncUnaryFn>),
    Streaming(Arc<AsyncStreamingFn>),
    BlockingUnary(Arc<BlockingUnaryFn>),
    BlockingStreaming(Arc<BlockingStreamingFn>),
}

impl Handler {
    pub(crate) fn invocation_kind(&self) -> InvocationKind {
        match self {
            Self::Unary(_) | Self::BlockingUnary(_) => InvocationKind::Unary,
            Self::Streaming(_) | Self::BlockingStreaming(_) => InvocationKind::Streaming,
        }
    }

    pub(crate) fn execution_mode(&self) -> ExecutionMode {
        match self {
            Self::Unary(_) | Self::Streaming(_) => ExecutionMode::Suspending,
            Self::BlockingUnary(_) | Self::BlockingStreaming(_) => ExecutionMode::Blocking,
        }
    }
}

/// A named, remotely invokable operation. Immutable after registration.
pub struct Procedure {
    name: String,
    params: Params,
    handler: Handler,
}

impl Procedure {
    /// The unique call name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter signature.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The invocation kind declared at registration.
    #[must_use]
    pub fn invocation_kind(&self) -> InvocationKind {
        self.handler.invocation_kind()
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

/// Maps call names to registered procedures.
///
/// Registering a name twice silently overwrites the earlier entry (last
/// writer wins): procedures are expected to be declared once at startup, so
/// overwrite is a deliberate convenience rather than an error. Registration
/// fails fast when a handler's execution mode does not match the registry's
/// declared mode.
pub struct ProcedureRegistry {
    mode: ExecutionMode,
    procedures: HashMap<String, Arc<Procedure>>,
}

impl ProcedureRegistry {
    /// Creates a registry that accepts handlers of the given mode.
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            procedures: HashMap::new(),
        }
    }

    /// The registry's declared execution mode.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Looks up a procedure by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<Procedure>> {
        self.procedures.get(name).cloned()
    }

    /// The registered procedure names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    /// Registers a suspending unary procedure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeMismatch`] on a [`ExecutionMode::Blocking`]
    /// registry.
    pub fn unary<F, Fut>(&mut self, name: &str, params: Params, handler: F) -> Result<()>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UnaryResult> + Send + 'static,
    {
        self.insert(
            name,
            params,
            Handler::Unary(Arc::new(move |args| Box::pin(handler(args)))),
        )
    }

    /// Registers a suspending streaming procedure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeMismatch`] on a [`ExecutionMode::Blocking`]
    /// registry.
    pub fn streaming<F, S>(&mut self, name: &str, params: Params, handler: F) -> Result<()>
    where
        F: Fn(Arguments) -> S + Send + Sync + 'static,
        S: futures::Stream<Item = UnaryResult> + Send + 'static,
    {
        self.insert(
            name,
            params,
            Handler::Streaming(Arc::new(move |args| handler(args).boxed())),
        )
    }

    /// Registers a blocking unary procedure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeMismatch`] on a [`ExecutionMode::Suspending`]
    /// registry.
    pub fn blocking_unary<F>(&mut self, name: &str, params: Params, handler: F) -> Result<()>
    where
        F: Fn(Arguments) -> UnaryResult + Send + Sync + 'static,
    {
        self.insert(name, params, Handler::BlockingUnary(Arc::new(handler)))
    }

    /// Registers a blocking streaming procedure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeMismatch`] on a [`ExecutionMode::Suspending`]
    /// registry.
    pub fn blocking_streaming<F, I>(&mut self, name: &str, params: Params, handler: F) -> Result<()>
    where
        F: Fn(Arguments) -> I + Send + Sync + 'static,
        I: IntoIterator<Item = UnaryResult> + 'static,
        I::IntoIter: Send + 'static,
    {
        self.insert(
            name,
            params,
            Handler::BlockingStreaming(Arc::new(move |args| Box::new(handler(args).into_iter()))),
        )
    }

    fn insert(&mut self, name: &str, params: Params, handler: Handler) -> Result<()> {
        if handler.execution_mode() != self.mode {
            return Err(Error::ModeMismatch {
                name: name.to_owned(),
                registry: self.mode,
                handler: handler.execution_mode(),
            });
        }

        debug!(
            procedure = name,
            kind = ?handler.invocation_kind(),
            "registered procedure"
        );
        self.procedures.insert(
            name.to_owned(),
            Arc::new(Procedure {
                name: name.to_owned(),
                params,
                handler,
            }),
        );
        Ok(())
    }
}
