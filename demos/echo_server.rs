//! Runs the Echo responder from spec.md §8 scenario 1 over TCP.
//!
//! ```sh
//! cargo run --example echo_server
//! ```

#[path = "common.rs"]
mod common;

use std::collections::HashMap;
use std::sync::Arc;

use amp_engine::engine::{EngineHandle, Responders};
use amp_engine::protocol::{CommandError, Value};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let responders = Arc::new(
        Responders::builder()
            .register(common::echo_schema(), echo_handler)
            .build(),
    );

    let listener = TcpListener::bind("127.0.0.1:7629").await?;
    log::info!("echo server listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("accepted connection from {peer}");

        let engine = EngineHandle::new(Arc::clone(&responders));
        tokio::spawn(common::run_connection(stream, engine));
    }
}

async fn echo_handler(
    _engine: EngineHandle,
    args: HashMap<&'static str, Value>,
) -> Result<HashMap<&'static str, Value>, CommandError> {
    let Some(Value::String(text)) = args.get("text") else {
        return Err(CommandError::new("MyException", "text argument missing"));
    };
    let Some(Value::Integer(times)) = args.get("times") else {
        return Err(CommandError::new("MyException", "times argument missing"));
    };

    let repeated = text.repeat((*times).max(0) as usize);

    let mut response: HashMap<&'static str, Value> = HashMap::new();
    response.insert("text", Value::String(repeated));
    Ok(response)
}
