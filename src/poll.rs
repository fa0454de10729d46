use std::{
    io,
    ops::ControlFlow,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    artwork::{ArtSource, Artwork},
    daemon::{Connector, DaemonAddr, DaemonClient, RetryPolicy, Session, SessionError, TrackRef},
};

/// One poll result, handed from the poll thread to the display.
#[derive(Debug, Clone)]
pub struct Publication {
    /// Increases by one per poll cycle.
    pub seq: u64,
    pub track: Option<TrackRef>,
    pub artwork: Option<Artwork>,
}

#[derive(Debug, Error)]
#[error("display is no longer receiving artwork")]
pub struct DisplayClosed;

/// Thread-safe hand-off into the UI thread's queue. Must return without
/// waiting for the UI to consume the value.
pub trait Publisher: Send {
    fn publish(&self, publication: Publication) -> Result<(), DisplayClosed>;
}

impl Publisher for mpsc::Sender<Publication> {
    fn publish(&self, publication: Publication) -> Result<(), DisplayClosed> {
        self.send(publication).map_err(|_| DisplayClosed)
    }
}

/// Reads the current track, resolves and publishes its art, then blocks
/// until the daemon reports a change. Repeats until the session fails or
/// the display goes away.
pub struct PollLoop<C: DaemonClient, P: Publisher> {
    session: Session<C>,
    source: Box<dyn ArtSource>,
    publisher: P,
    seq: u64,
    last_track: Option<TrackRef>,
}

impl<C: DaemonClient, P: Publisher> PollLoop<C, P> {
    pub fn new(session: Session<C>, source: Box<dyn ArtSource>, publisher: P) -> Self {
        Self {
            session,
            source,
            publisher,
            seq: 0,
            last_track: None,
        }
    }

    /// Returns `Ok(())` only when the display has closed. The session is
    /// released on every exit path.
    pub fn run(mut self) -> Result<(), SessionError> {
        loop {
            if self.publish_current()?.is_break() {
                info!(addr = %self.session.addr(), "display closed, stopping poll loop");
                return Ok(());
            }
            self.session.block_until_change()?;
        }
    }

    /// Resolves the current track's art and publishes it. Breaks when the
    /// display is gone.
    pub fn publish_current(&mut self) -> Result<ControlFlow<()>, SessionError> {
        let track = self.session.current_track()?;
        if track != self.last_track {
            debug!(track = ?track.as_ref().map(TrackRef::as_str), "current track changed");
            self.last_track = track.clone();
        }

        let artwork = match &track {
            Some(track) => self.source.resolve(track, &mut self.session)?,
            None => None,
        };

        self.seq += 1;
        debug!(
            seq = self.seq,
            source = self.source.name(),
            found = artwork.is_some(),
            "publishing artwork"
        );
        let publication = Publication {
            seq: self.seq,
            track,
            artwork,
        };
        Ok(match self.publisher.publish(publication) {
            Ok(()) => ControlFlow::Continue(()),
            Err(DisplayClosed) => ControlFlow::Break(()),
        })
    }
}

/// Connects and runs the poll loop on a dedicated thread. The thread ends
/// only on a fatal session error or when the display closes; callers are
/// expected to detach it and let process exit abandon it.
pub fn spawn_poll_thread<K, P>(
    mut connector: K,
    addr: DaemonAddr,
    policy: RetryPolicy,
    source: Box<dyn ArtSource>,
    publisher: P,
) -> io::Result<JoinHandle<()>>
where
    K: Connector + Send + 'static,
    P: Publisher + 'static,
{
    thread::Builder::new()
        .name("mpd-poll".into())
        .spawn(move || {
            info!(%addr, source = source.name(), "starting poll loop");
            let result = Session::open(&mut connector, &addr, policy)
                .and_then(|session| PollLoop::new(session, source, publisher).run());
            match result {
                Ok(()) => info!("poll loop finished"),
                Err(err) => {
                    let err = anyhow::Error::new(err);
                    error!("poll loop terminated: {err:#}");
                }
            }
        })
}
