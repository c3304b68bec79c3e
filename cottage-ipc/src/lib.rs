//! Inter-process communication between cottage and cottagectl
//!
//! Messages are newline-delimited JSON over a Unix domain socket. Every
//! command is answered by one response, except `Subscribe`, which is
//! acknowledged and then turns the connection into a stream of room events.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Commands that cottagectl can send to cottage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start {
        task: String,
        minutes: u32,
        play_sound: bool,
    },
    Extend {
        minutes: u32,
    },
    Break {
        minutes: u32,
    },
    SkipBreak,
    Continue {
        minutes: u32,
        add_to_existing: bool,
    },
    CancelContinue,
    Restart,
    Finish,
    Status,
    Subscribe,
}

/// Responses from cottage back to cottagectl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    /// The command did not apply to the current phase
    Ignored,
    /// The command carried invalid input
    Rejected(String),
    Status(SessionStatus),
    Event(RoomEvent),
    Error(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Focusing,
    TimeUp,
    OnBreak,
    BreakEnded,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Focusing => "focusing",
            Phase::TimeUp => "time up",
            Phase::OnBreak => "on break",
            Phase::BreakEnded => "break ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub focus_task: String,
    pub focus_minutes: u32,
    pub studied_secs: i64,
    pub remaining_secs: i64,
    pub break_remaining_secs: Option<i64>,
    pub progress: f64,
}

/// A best-effort event published to everyone watching a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection closed before a message arrived")]
    Closed,

    #[error("Connection refused - is cottage running?")]
    ConnectionRefused,
}

pub const SOCKET_PATH: &str = "/tmp/cottage.sock";

/// Serializes a message as one JSON line.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, IpcError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, IpcError> {
    Ok(serde_json::from_str(line.trim_end())?)
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    writer.write_all(&encode(message)?).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next JSON line. A clean EOF is reported as `IpcError::Closed`.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::Closed);
    }
    decode(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[test]
    fn encoded_messages_are_single_lines() {
        let bytes = encode(&Command::Start {
            task: "Linear algebra\nchapter 3".to_string(),
            minutes: 25,
            play_sound: true,
        })
        .unwrap();
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(bytes.last(), Some(&b'\n'));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode::<Command>("{not json"),
            Err(IpcError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn messages_survive_the_stream() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Response::Ignored).await.unwrap();
        write_message(&mut buf, &Response::Rejected("empty task".into()))
            .await
            .unwrap();

        let mut reader = BufReader::new(buf.as_slice());
        let first: Response = read_message(&mut reader).await.unwrap();
        let second: Response = read_message(&mut reader).await.unwrap();
        assert_eq!(first, Response::Ignored);
        assert_eq!(second, Response::Rejected("empty task".into()));
        assert!(matches!(
            read_message::<_, Response>(&mut reader).await,
            Err(IpcError::Closed)
        ));
    }

    #[test]
    fn phase_labels_are_human_readable() {
        assert_eq!(Phase::TimeUp.label(), "time up");
        assert_eq!(Phase::default(), Phase::Idle);
    }
}
