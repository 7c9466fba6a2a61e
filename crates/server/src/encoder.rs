//! Renders a lazy value sequence as event-stream frames while a heartbeat
//! keeps the connection alive.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use wirecall_protocol::{Event, encode_payload, ping_frame};
use wirecall_serializers::Serializer;

use crate::registry::{HandlerError, ValueStream};

/// Turns a stream of handler results into wire frames.
///
/// Two tasks share one bounded channel: the producer serializes and
/// transport-encodes each value in order, and the heartbeat injects ping
/// comments on a fixed interval. Once the producer completes (exhaustion or
/// failure) it cancels the heartbeat through a token, so no frame is ever
/// emitted after completion; the heartbeat's interval sleep and channel send
/// both wait on the token, so cancellation cannot deadlock. If the receiver
/// goes away (client disconnect) sends fail and both tasks stop, dropping
/// the source stream and running its teardown.
pub(crate) struct StreamEncoder {
    serializer: Arc<dyn Serializer>,
    heartbeat: Duration,
    capacity: usize,
}

impl StreamEncoder {
    pub(crate) fn new(
        serializer: Arc<dyn Serializer>,
        heartbeat: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            serializer,
            heartbeat,
            capacity,
        }
    }

    /// Spawns the producer and heartbeat; frames arrive on the returned
    /// stream in producer order with pings interleaved.
    pub(crate) fn encode(&self, mut source: ValueStream) -> ReceiverStream<Bytes> {
        let (tx, rx) = mpsc::channel::<Bytes>(self.capacity);
        let done = CancellationToken::new();

        let producer_tx = tx.clone();
        let producer_done = done.clone();
        let serializer = Arc::clone(&self.serializer);
        tokio::spawn(async move {
            while let Some(item) = source.next().await {
                match item {
                    Ok(value) => {
                        let frame = match serializer.encode(&value) {
                            Ok(bytes) => Event::yield_data(encode_payload(&bytes)).to_wire(),
                            Err(cause) => {
                                error!(error = %cause, "result encoding failed mid-stream");
                                let failure =
                                    HandlerError::new("SerializeError", cause.to_string());
                                let _ = producer_tx
                                    .send(Event::exception(failure.description()).to_wire())
                                    .await;
                                break;
                            }
                        };
                        if producer_tx.send(frame).await.is_err() {
                            debug!("event-stream receiver dropped, stopping producer");
                            break;
                        }
                    }
                    Err(failure) => {
                        debug!(description = %failure.description(), "handler failed mid-stream");
                        let _ = producer_tx
                            .send(Event::exception(failure.description()).to_wire())
                            .await;
                        break;
                    }
                }
            }
            drop(source);
            producer_done.cancel();
        });

        let interval = self.heartbeat;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = done.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                tokio::select! {
                    () = done.cancelled() => break,
                    sent = tx.send(ping_frame()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        ReceiverStream::new(rx)
    }
}
