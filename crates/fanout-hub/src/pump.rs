//! Read and write pumps.
//!
//! Each registered connection runs two independent tasks. The read pump
//! moves inbound frames into the hub as broadcasts; the write pump drains
//! the connection's outbound queue onto the socket. Both are generic over
//! `Stream`/`Sink` of [`Frame`] so any transport can drive them.

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::connection::OutboundQueue;
use crate::hub::HubHandle;
use crate::ids::ConnectionId;
use crate::payload::Frame;

/// Keep-alive and limits shared by both pumps.
#[derive(Clone, Debug)]
pub struct PumpConfig {
    /// How often the write pump sends a Ping.
    pub ping_interval: Duration,
    /// Read deadline; any received frame resets it. Must exceed `ping_interval`.
    pub pong_wait: Duration,
    /// Upper bound on a single frame write.
    pub write_timeout: Duration,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Deliver client messages back to the sender as well.
    pub echo_to_sender: bool,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(54),
            pong_wait: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512 * 1024,
            echo_to_sender: false,
        }
    }
}

/// Why a read pump stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Peer closed the stream.
    Closed,
    /// Stream yielded an error.
    Error(String),
    /// Nothing arrived within `pong_wait`.
    TimedOut,
    /// Inbound message exceeded `max_message_size`.
    TooLarge,
    /// Write pump exited, the hub evicted the connection, or the process is
    /// shutting down.
    Cancelled,
    /// The hub stopped accepting events.
    HubClosed,
}

/// Why a write pump stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Outbound queue closed and fully written.
    Drained,
    /// A write failed or timed out.
    Failed(String),
    /// Cancelled; queued payloads were flushed best-effort.
    Cancelled,
    /// The hub dropped the connection for falling behind.
    Evicted,
}

impl ReadOutcome {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Error(_) => "error",
            Self::TimedOut => "timed_out",
            Self::TooLarge => "too_large",
            Self::Cancelled => "cancelled",
            Self::HubClosed => "hub_closed",
        }
    }
}

impl WriteOutcome {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drained => "drained",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::Evicted => "evicted",
        }
    }
}

/// Forward inbound frames to the hub until the stream ends.
///
/// Always submits exactly one `Unregister` for `id` before returning.
pub async fn read_pump<S, E>(
    id: ConnectionId,
    mut stream: S,
    hub: HubHandle,
    config: PumpConfig,
    cancel: CancellationToken,
) -> ReadOutcome
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let outcome = loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break ReadOutcome::Cancelled,
            next = timeout(config.pong_wait, stream.next()) => next,
        };
        let frame = match next {
            Err(_) => break ReadOutcome::TimedOut,
            Ok(None) => break ReadOutcome::Closed,
            Ok(Some(Err(err))) => break ReadOutcome::Error(err.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };
        match frame {
            Frame::Message(payload) => {
                if payload.len() > config.max_message_size {
                    warn!(
                        conn_id = %id,
                        bytes = payload.len(),
                        limit = config.max_message_size,
                        "inbound message too large"
                    );
                    break ReadOutcome::TooLarge;
                }
                let submitted = if config.echo_to_sender {
                    hub.echo(id.clone(), payload).await
                } else {
                    hub.relay(id.clone(), payload).await
                };
                if submitted.is_err() {
                    break ReadOutcome::HubClosed;
                }
            }
            // Liveness only. Pings are answered by the transport.
            Frame::Ping(_) | Frame::Pong(_) => trace!(conn_id = %id, "keep-alive frame"),
            Frame::Close => break ReadOutcome::Closed,
        }
    };

    if let ReadOutcome::Error(reason) = &outcome {
        debug!(conn_id = %id, error = %reason, "read failed");
    }
    let _ = hub.unregister(id.clone()).await;
    debug!(conn_id = %id, outcome = outcome.as_str(), "read pump stopped");
    outcome
}

/// Write queued payloads to the sink in FIFO order, with periodic pings.
///
/// Stops as soon as the hub evicts the connection, even mid-write. On exit
/// cancels `cancel` first so the read pump stops too, then sends a Close
/// frame and closes the sink within one `write_timeout`. The close is
/// skipped after a failed write.
pub async fn write_pump<K, E>(
    id: ConnectionId,
    mut sink: K,
    mut queue: OutboundQueue,
    hub: HubHandle,
    config: PumpConfig,
    cancel: CancellationToken,
) -> WriteOutcome
where
    K: Sink<Frame, Error = E> + Unpin,
    E: Display,
{
    let limit = config.write_timeout;
    let period = config.ping_interval.max(Duration::from_millis(1));
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let evicted = queue.eviction();

    let outcome = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break flush(&mut sink, &mut queue, limit).await,
            () = evicted.cancelled() => break WriteOutcome::Evicted,
            next = queue.recv() => match next {
                Some(payload) => {
                    let frame = Frame::Message(payload);
                    if let Some(stop) = write_frame(&mut sink, frame, limit, &evicted).await {
                        break stop;
                    }
                }
                None => break WriteOutcome::Drained,
            },
            _ = ping.tick() => {
                let frame = Frame::Ping(Bytes::new());
                if let Some(stop) = write_frame(&mut sink, frame, limit, &evicted).await {
                    break stop;
                }
            }
        }
    };

    cancel.cancel();
    match &outcome {
        WriteOutcome::Failed(reason) => {
            warn!(conn_id = %id, error = %reason, "write failed, dropping connection");
            let _ = hub.unregister(id.clone()).await;
        }
        WriteOutcome::Evicted => debug!(conn_id = %id, "evicted by hub, closing stream"),
        WriteOutcome::Drained | WriteOutcome::Cancelled => {}
    }
    if !matches!(outcome, WriteOutcome::Failed(_)) {
        let closing = async {
            if sink.send(Frame::Close).await.is_ok() {
                let _ = sink.close().await;
            }
        };
        let _ = timeout(limit, closing).await;
    }
    debug!(conn_id = %id, outcome = outcome.as_str(), "write pump stopped");
    outcome
}

/// Write one frame unless the hub evicts the connection first.
async fn write_frame<K, E>(
    sink: &mut K,
    frame: Frame,
    limit: Duration,
    evicted: &CancellationToken,
) -> Option<WriteOutcome>
where
    K: Sink<Frame, Error = E> + Unpin,
    E: Display,
{
    tokio::select! {
        biased;
        () = evicted.cancelled() => Some(WriteOutcome::Evicted),
        written = send(sink, frame, limit) => written.err().map(WriteOutcome::Failed),
    }
}

async fn flush<K, E>(sink: &mut K, queue: &mut OutboundQueue, limit: Duration) -> WriteOutcome
where
    K: Sink<Frame, Error = E> + Unpin,
    E: Display,
{
    while let Some(payload) = queue.try_recv() {
        if let Err(reason) = send(sink, Frame::Message(payload), limit).await {
            return WriteOutcome::Failed(reason);
        }
    }
    WriteOutcome::Cancelled
}

async fn send<K, E>(sink: &mut K, frame: Frame, limit: Duration) -> Result<(), String>
where
    K: Sink<Frame, Error = E> + Unpin,
    E: Display,
{
    match timeout(limit, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("write timed out after {limit:?}")),
    }
}
