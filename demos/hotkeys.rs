//! Hotkey example: register a few chords and print the raw event stream.
//!
//! Run with: cargo run --example hotkeys
//!
//! Note: On macOS, you need to grant Accessibility permissions to the terminal.

use keytap::{Event, EventKind, Hook, RecvError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> keytap::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Handle Ctrl+C
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        println!("\nStopping...");
    })
    .expect("Error setting Ctrl-C handler");

    let hook = Hook::new();

    hook.register(EventKind::KeyDown, &["f13", "ctrl"], |e: &Event| {
        println!(">>> ctrl+f13 pressed ({e})");
    })?;
    let hold = hook.register_chord(EventKind::KeyHold, "shift+space", |_: &Event| {
        println!(">>> shift+space held");
    })?;
    hook.register_chord(EventKind::KeyUp, "alt+q", move |_: &Event| {
        println!(">>> alt+q released, shift+space hold hotkey {hold} stays registered");
    })?;

    println!("keytap hotkey example");
    println!("Try ctrl+f13, hold shift+space, or press and release alt+q.");
    println!("Press Ctrl+C to exit.\n");

    let stream = hook.start()?;
    let mut moves = 0u32;

    while running.load(Ordering::SeqCst) {
        match stream.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => match event.kind {
                EventKind::MouseMove | EventKind::MouseDrag => {
                    // Only print every 50th motion event to reduce spam
                    moves += 1;
                    if moves % 50 == 0 {
                        println!("{event}");
                    }
                }
                _ => println!("{event}"),
            },
            Err(RecvError::Timeout) => {}
            Err(e) => {
                eprintln!("Stream ended: {e}");
                break;
            }
        }
    }

    println!("{} events dropped by this consumer", stream.dropped());
    hook.end()
}
