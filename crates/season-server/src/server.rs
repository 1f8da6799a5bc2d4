//! The season broadcast: up to four tracked TCP clients, each pushed the next
//! season of a staggered rotation on every timer firing.

use crate::{
    metrics::Metrics,
    rotation::SeasonRotation,
    slots::{Slot, SlotTable, MAX_CLIENTS},
};
use seasons::Season;
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::watch,
    time::{Instant, MissedTickBehavior},
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(3_000);
/// Slotless connections held open at once; later ones are closed on accept.
pub const DEFAULT_OVERFLOW_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Time between broadcast cycles.
    pub interval: Duration,
    /// Upper bound for writing and flushing one message.
    pub write_timeout: Duration,
    pub overflow_limit: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            overflow_limit: DEFAULT_OVERFLOW_LIMIT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind the season listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept a season client")]
    Accept(#[source] io::Error),
    #[error("slot {slot}: write did not flush within {timeout:?}")]
    WriteTimeout { slot: usize, timeout: Duration },
    #[error("slot {slot}: write failed")]
    Write {
        slot: usize,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Tracked(usize),
    /// Accepted at the transport level but never written to.
    Overflow,
    /// Accepted and closed straight away; the overflow list is full.
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Sent,
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub slot: usize,
    pub season: Season,
    pub outcome: WriteOutcome,
}

/// What one timer firing did, slot by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub deliveries: Vec<Delivery>,
}

impl CycleReport {
    pub fn seasons(&self) -> Vec<Season> {
        self.deliveries.iter().map(|d| d.season).collect()
    }

    fn count(&self, outcome: WriteOutcome) -> usize {
        self.deliveries.iter().filter(|d| d.outcome == outcome).count()
    }

    pub fn sent(&self) -> usize {
        self.count(WriteOutcome::Sent)
    }

    pub fn timed_out(&self) -> usize {
        self.count(WriteOutcome::TimedOut)
    }

    pub fn failed(&self) -> usize {
        self.count(WriteOutcome::Failed)
    }
}

/// Queues one season name behind any bytes still owed to the peer and waits
/// for all of it to flush.
///
/// On timeout the unwritten tail stays in `slot.pending` and is sent first
/// next cycle. An I/O error drops the backlog; the peer is gone.
pub async fn send_season<W>(
    slot: &mut Slot<W>,
    season: Season,
    timeout: Duration,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let Slot {
        index,
        writer,
        pending,
        ..
    } = slot;
    pending.extend_from_slice(seasons::encode(season));

    let write = async {
        while !pending.is_empty() {
            let n = writer.write(pending.as_slice()).await?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }
            pending.drain(..n);
        }
        writer.flush().await
    };

    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => {
            pending.clear();
            Err(ServerError::Write {
                slot: *index,
                source,
            })
        }
        Err(_) => Err(ServerError::WriteTimeout {
            slot: *index,
            timeout,
        }),
    }
}

/// Runs one cycle over a snapshot of the tracked slots. Failures are logged
/// and counted; the slot stays tracked and is written again next cycle.
pub async fn broadcast_to<W>(
    slots: &mut SlotTable<W>,
    rotation: &mut SeasonRotation,
    write_timeout: Duration,
    metrics: &Metrics,
) -> CycleReport
where
    W: AsyncWrite + Unpin,
{
    let seasons = rotation.next_cycle(slots.len());
    metrics.broadcast_cycles_total.inc();

    let mut report = CycleReport::default();
    for (slot, season) in slots.iter_mut().zip(seasons) {
        let outcome = match send_season(slot, season, write_timeout).await {
            Ok(()) => {
                metrics.messages_sent_total.inc();
                tracing::debug!(slot = slot.index, peer = %slot.peer, %season, "Sent season.");
                WriteOutcome::Sent
            }
            Err(e @ ServerError::WriteTimeout { .. }) => {
                metrics.write_timeouts_total.inc();
                tracing::warn!(peer = %slot.peer, error = %e, "Season write abandoned.");
                WriteOutcome::TimedOut
            }
            Err(e) => {
                metrics.write_errors_total.inc();
                let cause = std::error::Error::source(&e).map(ToString::to_string);
                tracing::warn!(peer = %slot.peer, error = %e, cause = ?cause, "Season write failed.");
                WriteOutcome::Failed
            }
        };
        report.deliveries.push(Delivery {
            slot: slot.index,
            season,
            outcome,
        });
    }
    report
}

/// Non-blocking check for EOF or a reset. Anything the peer sent is discarded.
fn peer_closed(stream: &TcpStream) -> bool {
    let mut scratch = [0u8; 64];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
            Err(_) => return true,
        }
    }
}

enum LoopEvent {
    Shutdown,
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Tick,
}

pub struct BroadcastServer {
    listener: TcpListener,
    settings: BroadcastSettings,
    slots: SlotTable<TcpStream>,
    overflow: Vec<(SocketAddr, TcpStream)>,
    rotation: SeasonRotation,
    metrics: Arc<Metrics>,
}

impl BroadcastServer {
    pub async fn bind(
        addr: SocketAddr,
        settings: BroadcastSettings,
        metrics: Arc<Metrics>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(%addr, ?settings, "Season server listening.");

        Ok(Self {
            listener,
            settings,
            slots: SlotTable::new(MAX_CLIENTS),
            overflow: Vec::new(),
            rotation: SeasonRotation::new(),
            metrics,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    #[inline]
    pub fn tracked_clients(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn overflow_clients(&self) -> usize {
        self.overflow.len()
    }

    #[inline]
    pub fn rotation(&self) -> SeasonRotation {
        self.rotation
    }

    /// Waits for one connection and assigns it a slot if one is free.
    pub async fn accept(&mut self) -> Result<Admission, ServerError> {
        let (stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;
        Ok(self.admit(stream, peer))
    }

    /// Releases overflow connections whose peer has gone away.
    pub fn prune_overflow(&mut self) {
        let before = self.overflow.len();
        self.overflow.retain(|(peer, stream)| {
            let closed = peer_closed(stream);
            if closed {
                tracing::debug!(%peer, "Overflow client disconnected.");
            }
            !closed
        });
        if self.overflow.len() != before {
            self.metrics.overflow_connections.set(self.overflow.len() as i64);
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) -> Admission {
        self.metrics.connections_accepted_total.inc();
        match self.slots.try_admit(peer, stream) {
            Ok(slot) => {
                self.metrics.clients_tracked.set(self.slots.len() as i64);
                tracing::info!(slot, %peer, "Client tracked.");
                Admission::Tracked(slot)
            }
            Err((exhausted, stream)) => {
                self.prune_overflow();
                if self.overflow.len() >= self.settings.overflow_limit {
                    tracing::warn!(%peer, limit = self.settings.overflow_limit, "Overflow list full, closing client.");
                    drop(stream);
                    return Admission::Dropped;
                }
                self.overflow.push((peer, stream));
                self.metrics.overflow_connections.set(self.overflow.len() as i64);
                tracing::info!(%peer, reason = %exhausted, "Client accepted without a slot.");
                Admission::Overflow
            }
        }
    }

    /// One timer firing.
    pub async fn broadcast_cycle(&mut self) -> CycleReport {
        self.prune_overflow();
        let index = self.rotation.index();
        let report = broadcast_to(
            &mut self.slots,
            &mut self.rotation,
            self.settings.write_timeout,
            &self.metrics,
        )
        .await;
        tracing::info!(
            index,
            clients = self.slots.len(),
            sent = report.sent(),
            timed_out = report.timed_out(),
            failed = report.failed(),
            "Broadcast cycle complete."
        );
        report
    }

    /// Accepts clients and broadcasts every interval until `shutdown` fires
    /// or its sender is dropped. The first cycle runs one full interval after
    /// start.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<()>) -> Result<(), ServerError> {
        let interval = self.settings.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => LoopEvent::Shutdown,
                accepted = self.listener.accept() => LoopEvent::Accepted(accepted),
                _ = ticker.tick() => LoopEvent::Tick,
            };

            match event {
                LoopEvent::Shutdown => {
                    tracing::info!("Shutdown signal received, stopping broadcast.");
                    break;
                }
                LoopEvent::Accepted(Ok((stream, peer))) => {
                    self.admit(stream, peer);
                }
                LoopEvent::Accepted(Err(e)) => {
                    tracing::warn!(error = %ServerError::Accept(e), "Accept failed.");
                }
                LoopEvent::Tick => {
                    self.broadcast_cycle().await;
                }
            }
        }
        Ok(())
    }
}
