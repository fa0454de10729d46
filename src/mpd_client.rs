use std::{io, net::TcpStream};

use mpd::{
    error::{Error as MpdError, ErrorCode},
    idle::Idle,
    Client, Song,
};
use tracing::debug;

use crate::daemon::{Connector, DaemonAddr, DaemonClient, SessionError, TrackRef};

/// Opens MPD connections over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct MpdConnector;

impl Connector for MpdConnector {
    type Client = MpdClient;

    fn connect(&mut self, addr: &DaemonAddr) -> Result<MpdClient, SessionError> {
        match Client::connect((addr.host.as_str(), addr.port)) {
            Ok(client) => {
                debug!(%addr, version = ?client.version, "mpd handshake complete");
                Ok(MpdClient {
                    client: Some(client),
                })
            }
            Err(MpdError::Io(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
                Err(SessionError::Refused {
                    addr: addr.clone(),
                    source: Box::new(err),
                })
            }
            Err(err) => Err(SessionError::Connect {
                addr: addr.clone(),
                source: Box::new(err),
            }),
        }
    }
}

pub struct MpdClient {
    client: Option<Client<TcpStream>>,
}

impl MpdClient {
    fn client(&mut self, op: &'static str) -> Result<&mut Client<TcpStream>, SessionError> {
        self.client
            .as_mut()
            .ok_or_else(|| SessionError::request(op, "connection already closed"))
    }
}

fn is_missing(err: &MpdError) -> bool {
    matches!(err, MpdError::Server(server) if matches!(server.code, ErrorCode::NoExist))
}

impl DaemonClient for MpdClient {
    fn current_track(&mut self) -> Result<Option<TrackRef>, SessionError> {
        let song = self
            .client("currentsong")?
            .currentsong()
            .map_err(|e| SessionError::request("currentsong", e))?;
        Ok(song.map(|song| TrackRef::new(song.file)))
    }

    fn block_until_change(&mut self) -> Result<(), SessionError> {
        let changed = self
            .client("idle")?
            .wait(&[])
            .map_err(|e| SessionError::request("idle", e))?;
        debug!(subsystems = ?changed, "mpd reported a change");
        Ok(())
    }

    fn fetch_embedded_art(&mut self, track: &TrackRef) -> Result<Option<Vec<u8>>, SessionError> {
        let song = Song {
            file: track.as_str().to_owned(),
            ..Default::default()
        };
        match self.client("albumart")?.albumart(&song) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(SessionError::request("albumart", err)),
        }
    }

    /// Dropping the client closes the socket; MPD treats that as a clean
    /// disconnect.
    fn disconnect(&mut self) -> Result<(), SessionError> {
        self.client.take();
        Ok(())
    }
}
