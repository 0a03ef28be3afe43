//! Calls the Echo command against `echo_server` and prints the answer
//! (spec.md §8 scenario 1).
//!
//! ```sh
//! cargo run --example echo_server &
//! cargo run --example echo_client -- "my-text" 2
//! ```

#[path = "common.rs"]
mod common;

use std::collections::HashMap;
use std::sync::Arc;

use amp_engine::engine::{EngineHandle, Responders};
use amp_engine::protocol::Value;
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = std::env::args().skip(1);
    let text = argv.next().unwrap_or_else(|| "my-text".to_string());
    let times: i64 = argv
        .next()
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(2);

    let stream = TcpStream::connect("127.0.0.1:7629").await?;

    // The client registers no responders of its own for this demo; AMP is
    // symmetric, so a real peer could register handlers here too and the
    // server could call back into it.
    let engine = EngineHandle::new(Arc::new(Responders::builder().build()));
    tokio::spawn(common::run_connection(stream, engine.clone()));

    let schema = Arc::new(common::echo_schema());
    let mut args: HashMap<&'static str, Value> = HashMap::new();
    args.insert("text", Value::String(text));
    args.insert("times", Value::Integer(times));

    match engine.call_remote(schema, args).await {
        Ok(response) => {
            if let Some(Value::String(text)) = response.get("text") {
                println!("{text}");
            } else {
                println!("{response:?}");
            }
        }
        Err(err) => eprintln!("call failed: {err}"),
    }

    Ok(())
}
