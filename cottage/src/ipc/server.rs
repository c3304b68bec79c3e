//! Unix domain socket server for IPC

use crate::room::BroadcastRoom;
use anyhow::{Context, Result};
use cottage_ipc::{read_message, write_message, Command, IpcError, Response, RoomEvent};
use std::path::{Path, PathBuf};
use tokio::io::{BufReader, BufWriter};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// A command waiting for the UI loop, which owns the session.
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Response>,
}

pub struct Server {
    listener: UnixListener,
    path: PathBuf,
    requests: mpsc::Sender<Request>,
    room: BroadcastRoom,
}

impl Server {
    pub fn bind(
        path: impl AsRef<Path>,
        requests: mpsc::Sender<Request>,
        room: BroadcastRoom,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Remove old socket if it exists
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind IPC socket at {:?}", path))?;
        info!("IPC server listening on {:?}", path);
        Ok(Self {
            listener,
            path,
            requests,
            room,
        })
    }

    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let requests = self.requests.clone();
                    let room = self.room.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, requests, room).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_client(
    stream: UnixStream,
    requests: mpsc::Sender<Request>,
    room: BroadcastRoom,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    loop {
        let command: Command = match read_message(&mut reader).await {
            Ok(command) => command,
            Err(IpcError::Closed) => return Ok(()),
            Err(IpcError::Serialization(e)) => {
                warn!("Malformed command: {}", e);
                write_message(&mut writer, &Response::Error(e.to_string())).await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        debug!(?command, "IPC command received");

        if command == Command::Subscribe {
            return stream_events(&mut writer, room.subscribe()).await;
        }

        let (reply, response) = oneshot::channel();
        let response = if requests.send(Request { command, reply }).await.is_err() {
            Response::Error("cottage is shutting down".to_string())
        } else {
            response
                .await
                .unwrap_or_else(|_| Response::Error("command dropped".to_string()))
        };
        write_message(&mut writer, &response).await?;
    }
}

async fn stream_events<W>(writer: &mut W, mut events: broadcast::Receiver<RoomEvent>) -> Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    write_message(writer, &Response::Ok).await?;
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = write_message(writer, &Response::Event(event)).await {
                    debug!("subscriber went away: {}", e);
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber lagging behind room events");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}
