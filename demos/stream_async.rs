//! Async stream example with Tokio.
//!
//! Run with: cargo run --example stream_async --features tokio

use keytap::EventKind;
use std::time::Duration;
use tokio::time::interval;

#[tokio::main]
async fn main() -> keytap::Result<()> {
    println!("keytap stream example (async/tokio)");
    println!("Press Esc to exit.\n");

    let stream = keytap::start()?;
    let mut rx = stream.into_async(256);
    let mut heartbeat = interval(Duration::from_secs(5));
    let mut count = 0u64;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    println!("Stream closed.");
                    break;
                };
                count += 1;
                if event.kind == EventKind::KeyDown {
                    println!("[{count}] {event}");
                    if event.keychar == "esc" {
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                println!("... {count} events so far");
            }
        }
    }

    keytap::end()
}
