//! Client side of the season broadcast.
//!
//! The socket lives on its own thread with a current-thread tokio runtime and
//! forwards decoded events over a channel. The render thread drains that
//! channel at the start of each tick, so the current season is only ever
//! written from the thread that reads it.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use seasons::Season;
use std::{future::Future, io, thread, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    net::TcpStream,
};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

const READ_BUFFER_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    State(ConnectionState),
    Season(Season),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("no connection to {addr} within {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("season socket read failed")]
    Read(#[source] std::io::Error),
    #[error("failed to start the season runtime")]
    Runtime(#[source] std::io::Error),
}

/// One window's view of the season broadcast.
pub struct SeasonChannel {
    rx: Receiver<ChannelEvent>,
    state: ConnectionState,
    season: Season,
    _worker: Option<thread::JoinHandle<()>>,
}

impl SeasonChannel {
    /// Starts connecting to `addr`. Never blocks the caller; a failed connect
    /// is logged and leaves the season at `None`.
    pub fn connect(addr: String, timeout: Duration, label: String) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = spawn_network(addr, timeout, label, tx);
        Self {
            _worker: Some(worker),
            ..Self::from_events(rx)
        }
    }

    /// A channel that never connects.
    pub fn offline() -> Self {
        let (_tx, rx) = crossbeam_channel::bounded(0);
        Self::from_events(rx)
    }

    fn from_events(rx: Receiver<ChannelEvent>) -> Self {
        Self {
            rx,
            state: ConnectionState::Disconnected,
            season: Season::None,
            _worker: None,
        }
    }

    /// Applies every pending event; returns whether the season changed.
    pub fn poll(&mut self) -> bool {
        let before = self.season;
        loop {
            match self.rx.try_recv() {
                Ok(ChannelEvent::State(state)) => self.state = state,
                Ok(ChannelEvent::Season(season)) => self.season = season,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.season != before
    }

    #[inline]
    pub fn season(&self) -> Season {
        self.season
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

pub fn spawn_network(
    addr: String,
    timeout: Duration,
    label: String,
    tx: Sender<ChannelEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("{label}: {}", ChannelError::Runtime(e));
                return;
            }
        };

        let connect = TcpStream::connect(addr.clone());
        let _ = rt.block_on(drive(&addr, timeout, &label, &tx, connect));
    })
}

/// Runs one connection to completion and always ends in `Disconnected`.
async fn drive<C, S>(
    addr: &str,
    timeout: Duration,
    label: &str,
    tx: &Sender<ChannelEvent>,
    connect: C,
) -> Result<(), ChannelError>
where
    C: Future<Output = io::Result<S>>,
    S: AsyncRead + Unpin,
{
    let result = run_season_loop(addr, timeout, label, tx, connect).await;
    match &result {
        Ok(()) => log::info!("{label}: season channel closed"),
        Err(e) => log::error!("{label}: {e}"),
    }
    let _ = tx.send(ChannelEvent::State(ConnectionState::Disconnected));
    result
}

/// Awaits `connect` for at most `timeout`.
async fn connect_within<C, S>(addr: &str, timeout: Duration, connect: C) -> Result<S, ChannelError>
where
    C: Future<Output = io::Result<S>>,
{
    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| ChannelError::ConnectTimeout {
            addr: addr.to_owned(),
            timeout,
        })?
        .map_err(|source| ChannelError::Connect {
            addr: addr.to_owned(),
            source,
        })
}

async fn run_season_loop<C, S>(
    addr: &str,
    timeout: Duration,
    label: &str,
    tx: &Sender<ChannelEvent>,
    connect: C,
) -> Result<(), ChannelError>
where
    C: Future<Output = io::Result<S>>,
    S: AsyncRead + Unpin,
{
    log::info!("{label}: connecting to {addr}...");
    if tx.send(ChannelEvent::State(ConnectionState::Connecting)).is_err() {
        return Ok(());
    }

    let mut stream = connect_within(addr, timeout, connect).await?;

    log::info!("{label}: connected to {addr}");
    if tx.send(ChannelEvent::State(ConnectionState::Connected)).is_err() {
        return Ok(());
    }

    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        let n = stream.read(&mut buf).await.map_err(ChannelError::Read)?;
        if n == 0 {
            log::warn!("{label}: server closed the season channel");
            return Ok(());
        }

        // One read is one message.
        match seasons::decode_payload(&buf[..n]) {
            Ok(season) => {
                log::debug!("{label}: season is now {season}");
                if tx.send(ChannelEvent::Season(season)).is_err() {
                    return Ok(());
                }
            }
            Err(e) => log::warn!("{label}: ignoring season message: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    fn poll_until(channel: &mut SeasonChannel, mut done: impl FnMut(&SeasonChannel) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            channel.poll();
            if done(channel) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn receives_and_decodes_seasons() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut channel = SeasonChannel::connect(addr, DEFAULT_CONNECT_TIMEOUT, "test".into());
        let (mut peer, _) = listener.accept().unwrap();

        assert!(poll_until(&mut channel, |c| c.state() == ConnectionState::Connected));
        assert_eq!(channel.season(), Season::None);

        peer.write_all(b"HIVER").unwrap();
        assert!(poll_until(&mut channel, |c| c.season() == Season::Winter));

        // Garbage keeps the last known season.
        peer.write_all(b"???").unwrap();
        thread::sleep(Duration::from_millis(100));
        peer.write_all(b"AUTOMNE").unwrap();
        assert!(poll_until(&mut channel, |c| c.season() == Season::Autumn));

        drop(peer);
        assert!(poll_until(&mut channel, |c| c.state() == ConnectionState::Disconnected));
        assert_eq!(channel.season(), Season::Autumn);
    }

    #[test]
    fn failed_connect_leaves_season_unset() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let mut channel =
            SeasonChannel::connect(addr, Duration::from_millis(500), "test".into());
        assert!(poll_until(&mut channel, |c| {
            c._worker.as_ref().is_some_and(|w| w.is_finished())
        }));
        channel.poll();
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.season(), Season::None);
    }

    #[tokio::test]
    async fn stalled_connect_times_out_and_stays_unset() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut channel = SeasonChannel::from_events(rx);

        let result = drive(
            "203.0.113.1:9999",
            Duration::from_millis(50),
            "test",
            &tx,
            std::future::pending::<io::Result<TcpStream>>(),
        )
        .await;

        assert!(matches!(
            result,
            Err(ChannelError::ConnectTimeout { timeout, .. }) if timeout == Duration::from_millis(50)
        ));
        assert!(!channel.poll());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.season(), Season::None);
    }

    #[tokio::test]
    async fn connect_error_is_not_a_timeout() {
        let refused = async { Err::<TcpStream, _>(io::Error::from(io::ErrorKind::ConnectionRefused)) };
        let err = connect_within("127.0.0.1:1", DEFAULT_CONNECT_TIMEOUT, refused)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Connect { .. }));
    }

    #[test]
    fn offline_channel_never_changes() {
        let mut channel = SeasonChannel::offline();
        assert!(!channel.poll());
        assert_eq!(channel.season(), Season::None);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }
}
