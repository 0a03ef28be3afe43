//! Shared TCP transport glue and the Echo command schema used by both
//! demos. Not part of the library crate — wiring a real socket to the
//! engine is host glue, same boundary the teacher draws between
//! `pulseaudio::protocol`/`pulseaudio::client` and its own `examples/`
//! binaries.

use std::sync::Arc;

use amp_engine::engine::{EngineHandle, Transport, TransportError};
use amp_engine::protocol::{AmpString, ArgSpec, CommandSchema, Integer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// A [`Transport`] that forwards outbound packets to a writer task over an
/// unbounded channel, the same shape as the teacher's
/// `ReactorHandle::write_command` (push onto a channel; a different task or
/// thread performs the actual write).
pub struct TcpTransport {
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
}

impl Transport for TcpTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.outgoing
            .send(bytes)
            .map_err(|_| TransportError("writer task has shut down".to_string()))
    }
}

/// Drives one TCP connection end to end: spawns a writer task fed by the
/// transport, and feeds inbound bytes to the engine until the connection
/// closes in either direction.
pub async fn run_connection(stream: TcpStream, engine: EngineHandle) {
    let (mut read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    engine.connection_made(Arc::new(TcpTransport { outgoing: tx }));

    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
            if write_half.flush().await.is_err() {
                break;
            }
        }
    });

    let mut buf = [0u8; 4096];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                engine.connection_lost("peer closed the connection");
                break;
            }
            Ok(n) => {
                if let Err(err) = engine.data_received(&buf[..n]) {
                    log::error!("closing connection after protocol error: {err}");
                    break;
                }
            }
            Err(err) => {
                engine.connection_lost(err.to_string());
                break;
            }
        }
    }

    writer.abort();
}

/// `EchoCommand{text: String, times: Integer -> text: String}`, declaring
/// `MyException` as its one custom error (spec.md §8 scenarios 1, 5, 6).
pub fn echo_schema() -> CommandSchema {
    use amp_engine::protocol::ErrorSpec;

    CommandSchema::new(
        "Echo",
        vec![
            ArgSpec::new("text", AmpString),
            ArgSpec::new("times", Integer),
        ],
        vec![ArgSpec::new("text", AmpString)],
    )
    .with_errors(vec![ErrorSpec::for_error::<MyException>(
        "MyException",
        "MyException",
    )])
}

/// The demo's one declared command error (spec.md §8 scenario 5).
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct MyException(pub String);

impl From<String> for MyException {
    fn from(s: String) -> Self {
        MyException(s)
    }
}
