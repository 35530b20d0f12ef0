//! Per-connection driver: register, run both pumps, clean up.

use std::fmt::Display;
use std::time::{Duration, Instant};

use futures::{Sink, SinkExt, Stream};
use metrics::histogram;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, instrument, warn};

use crate::connection::Connection;
use crate::errors::HubError;
use crate::hub::HubHandle;
use crate::ids::ConnectionId;
use crate::metrics::CONNECTION_DURATION_SECONDS;
use crate::payload::Frame;
use crate::pump::{PumpConfig, ReadOutcome, WriteOutcome, read_pump, write_pump};

/// How a served connection ended.
#[derive(Clone, Debug)]
pub struct ConnectionSummary {
    /// Connection id.
    pub id: ConnectionId,
    /// Why the read pump stopped.
    pub read: ReadOutcome,
    /// Why the write pump stopped.
    pub write: WriteOutcome,
    /// Time from registration to both pumps finishing.
    pub lifetime: Duration,
}

/// Serve one upgraded connection until both pumps finish.
///
/// Registers with the hub first. If the hub refuses, the sink is closed and
/// the error returned without starting either pump. `shutdown` cancels the
/// connection along with everything else derived from it.
#[instrument(skip_all, fields(conn_id = %id))]
pub async fn serve<K, S, KE, SE>(
    id: ConnectionId,
    mut sink: K,
    stream: S,
    hub: HubHandle,
    config: PumpConfig,
    shutdown: &CancellationToken,
) -> Result<ConnectionSummary, HubError>
where
    K: Sink<Frame, Error = KE> + Unpin + Send + 'static,
    KE: Display + Send + 'static,
    S: Stream<Item = Result<Frame, SE>> + Unpin + Send + 'static,
    SE: Display + Send + 'static,
{
    let (conn, queue) = Connection::with_id(id.clone(), hub.outbound_capacity());
    let lifecycle = conn.lifecycle();

    if let Err(err) = hub.register(conn).await {
        warn!(error = %err, "registration refused, closing stream");
        let _ = lifecycle.mark_closed();
        let _ = timeout(config.write_timeout, sink.send(Frame::Close)).await;
        let _ = timeout(config.write_timeout, sink.close()).await;
        return Err(err);
    }
    info!("connection registered");

    let started = Instant::now();
    let cancel = shutdown.child_token();
    let writer = tokio::spawn(
        write_pump(
            id.clone(),
            sink,
            queue,
            hub.clone(),
            config.clone(),
            cancel.clone(),
        )
        .in_current_span(),
    );
    let reader = tokio::spawn(read_pump(id.clone(), stream, hub, config, cancel).in_current_span());

    let (read, write) = tokio::join!(reader, writer);
    let read = read.unwrap_or_else(|err| ReadOutcome::Error(format!("read pump aborted: {err}")));
    let write =
        write.unwrap_or_else(|err| WriteOutcome::Failed(format!("write pump aborted: {err}")));
    let _ = lifecycle.mark_closed();

    let lifetime = started.elapsed();
    histogram!(CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
    info!(
        read = read.as_str(),
        write = write.as_str(),
        lifetime_ms = u64::try_from(lifetime.as_millis()).unwrap_or(u64::MAX),
        "connection closed"
    );

    Ok(ConnectionSummary {
        id,
        read,
        write,
        lifetime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Hub, HubConfig};
    use crate::payload::Payload;
    use futures::StreamExt;
    use futures::channel::mpsc as fmpsc;

    fn running_hub(config: HubConfig) -> HubHandle {
        let (hub, handle) = Hub::new(config);
        let _task = tokio::spawn(hub.run());
        handle
    }

    fn duplex() -> (
        fmpsc::UnboundedSender<Frame>,
        fmpsc::UnboundedReceiver<Frame>,
        fmpsc::UnboundedSender<Result<Frame, String>>,
        fmpsc::UnboundedReceiver<Result<Frame, String>>,
    ) {
        let (out_tx, out_rx) = fmpsc::unbounded();
        let (in_tx, in_rx) = fmpsc::unbounded();
        (out_tx, out_rx, in_tx, in_rx)
    }

    #[tokio::test]
    async fn two_connections_relay_through_hub() {
        let hub = running_hub(HubConfig::default());
        let shutdown = CancellationToken::new();

        let (a_sink, mut a_out, a_in, a_stream) = duplex();
        let (b_sink, mut b_out, b_in, b_stream) = duplex();

        let a = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            async move {
                serve(ConnectionId::from_raw("a"), a_sink, a_stream, hub, PumpConfig::default(), &shutdown).await
            }
        });
        let b = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            async move {
                serve(ConnectionId::from_raw("b"), b_sink, b_stream, hub, PumpConfig::default(), &shutdown).await
            }
        });

        // Wait for both registrations.
        while hub.stats().active < 2 {
            tokio::task::yield_now().await;
        }

        a_in.unbounded_send(Ok(Frame::Message(Payload::text("from a")))).unwrap();
        assert_eq!(b_out.next().await, Some(Frame::Message(Payload::text("from a"))));

        a_in.unbounded_send(Ok(Frame::Close)).unwrap();
        let summary = a.await.unwrap().unwrap();
        assert_eq!(summary.read, ReadOutcome::Closed);
        assert_eq!(summary.write, WriteOutcome::Drained);
        // A never saw its own message; its stream got a Close.
        assert_eq!(a_out.next().await, Some(Frame::Close));

        drop(b_in);
        let summary = b.await.unwrap().unwrap();
        assert_eq!(summary.id, ConnectionId::from_raw("b"));
        assert_eq!(hub.stats().active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_client_is_evicted_and_stops_relaying() {
        let hub = running_hub(HubConfig {
            outbound_capacity: 1,
            ..HubConfig::default()
        });
        let shutdown = CancellationToken::new();
        let config = PumpConfig {
            write_timeout: Duration::from_secs(1),
            ..PumpConfig::default()
        };

        // A's socket accepts nothing; B keeps up.
        let a_sink = Box::pin(futures::sink::unfold((), |(), _frame: Frame| {
            futures::future::pending::<Result<(), String>>()
        }));
        let (a_in, a_stream) = fmpsc::unbounded::<Result<Frame, String>>();
        let (b_sink, mut b_out, _b_in, b_stream) = duplex();

        let a = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            let config = config.clone();
            async move { serve(ConnectionId::from_raw("a"), a_sink, a_stream, hub, config, &shutdown).await }
        });
        let _b = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            let config = config.clone();
            async move { serve(ConnectionId::from_raw("b"), b_sink, b_stream, hub, config, &shutdown).await }
        });
        while hub.stats().active < 2 {
            tokio::task::yield_now().await;
        }

        for n in 0..3 {
            let text = format!("fill {n}");
            hub.broadcast(text.as_str()).await.unwrap();
            assert_eq!(b_out.next().await, Some(Frame::Message(Payload::text(text))));
        }
        let stats = hub.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.active, 1);

        let _ = a_in.unbounded_send(Ok(Frame::Message(Payload::text("from evicted a"))));

        let summary = tokio::time::timeout(config.write_timeout * 2, a)
            .await
            .expect("evicted connection should close promptly")
            .unwrap()
            .unwrap();
        assert_eq!(summary.write, WriteOutcome::Evicted);
        assert_eq!(summary.read, ReadOutcome::Cancelled);

        hub.broadcast("after eviction").await.unwrap();
        assert_eq!(
            b_out.next().await,
            Some(Frame::Message(Payload::text("after eviction")))
        );
    }

    #[tokio::test]
    async fn refused_registration_closes_stream() {
        let hub = running_hub(HubConfig {
            max_connections: 0,
            ..HubConfig::default()
        });
        let (sink, mut out, _in_tx, stream) = duplex();

        let err = serve(
            ConnectionId::new(),
            sink,
            stream,
            hub,
            PumpConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err, HubError::CapacityExceeded { limit: 0 });
        assert_eq!(out.next().await, Some(Frame::Close));
        assert_eq!(out.next().await, None);
    }

    #[tokio::test]
    async fn shutdown_cancels_both_pumps() {
        let hub = running_hub(HubConfig::default());
        let shutdown = CancellationToken::new();
        let (sink, mut out, _in_tx, stream) = duplex();

        let task = tokio::spawn({
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            async move {
                serve(ConnectionId::new(), sink, stream, hub, PumpConfig::default(), &shutdown).await
            }
        });
        while hub.stats().active < 1 {
            tokio::task::yield_now().await;
        }
        hub.broadcast("before shutdown").await.unwrap();
        assert_eq!(
            out.next().await,
            Some(Frame::Message(Payload::text("before shutdown")))
        );

        shutdown.cancel();
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.read, ReadOutcome::Cancelled);
        assert!(matches!(
            summary.write,
            WriteOutcome::Cancelled | WriteOutcome::Drained
        ));
        assert_eq!(out.next().await, Some(Frame::Close));
    }
}
