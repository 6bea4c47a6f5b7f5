//! `xcb-events events`: stream decoded events.

use std::os::fd::BorrowedFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use clap::Args;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use xcbind::xproto::{self, ConfigureNotifyEvent, ExposeEvent, InputEvent, event_mask};
use xcbind::{ConnectOptions, Connection, DecodedEvent, Event, EventRegistry, XcbTransport};

use crate::OutputFormat;

/// Arguments for `xcb-events events`.
#[derive(Args)]
pub struct EventsArgs {
    /// Stop after this many events.
    #[arg(long, short = 'n')]
    count: Option<usize>,

    /// Window to watch (defaults to the screen's root window).
    #[arg(long, value_parser = parse_window)]
    window: Option<u32>,

    /// Readiness poll interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    interval: u16,

    /// Output format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
}

pub fn run(options: ConnectOptions, args: &EventsArgs) -> Result<()> {
    let mut registry = EventRegistry::new();
    xproto::register_events(&mut registry)?;
    if EventRegistry::install(registry).is_err() {
        tracing::warn!("event registry already installed");
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&interrupted))?;

    let (conn, screen) = crate::connect(options)?;
    select(&conn, screen, args.window)?;
    let fd = conn.file_descriptor()?;
    let mut seen = 0usize;

    while !interrupted.load(Ordering::Relaxed) {
        if args.count.is_some_and(|n| seen >= n) {
            break;
        }
        if let Some(event) = conn.poll_for_event()? {
            print_event(&event, args.format)?;
            seen += 1;
            continue;
        }
        if conn.has_error()? {
            bail!("connection to the X server failed");
        }
        conn.flush()?;

        #[allow(unsafe_code)]
        // SAFETY: `fd` belongs to `conn`, which outlives this borrow.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(args.interval)) {
            Ok(_) | Err(nix::errno::Errno::EINTR) => {}
            Err(e) => return Err(e.into()),
        }
    }
    tracing::debug!(seen, "event stream finished");
    Ok(())
}

/// Events selected on the watched window. Exclusive selections such as
/// button presses on the root are left to the window manager.
const WATCH_MASK: u32 = event_mask::STRUCTURE_NOTIFY
    | event_mask::SUBSTRUCTURE_NOTIFY
    | event_mask::FOCUS_CHANGE
    | event_mask::PROPERTY_CHANGE;

/// Selects [`WATCH_MASK`] on `window` or the root of `screen`, waiting for
/// the server to accept it.
fn select(conn: &Connection<XcbTransport>, screen: i32, window: Option<u32>) -> Result<()> {
    let window = match window {
        Some(window) => window,
        None => {
            conn.setup()?
                .screen(screen)
                .with_context(|| format!("display has no screen {screen}"))?
                .root
        }
    };
    let mut cookie = conn.select_events(window, WATCH_MASK)?;
    conn.flush()?;
    cookie
        .resolve()
        .with_context(|| format!("cannot select events on window {window:#x}"))?;
    tracing::debug!(window, mask = WATCH_MASK, "events selected");
    Ok(())
}

/// Parses a window id in decimal or `0x` hex.
fn parse_window(s: &str) -> Result<u32, std::num::ParseIntError> {
    s.strip_prefix("0x")
        .map_or_else(|| s.parse(), |hex| u32::from_str_radix(hex, 16))
}

fn print_event(event: &Event, format: OutputFormat) -> Result<()> {
    let value = match event {
        Event::Decoded(decoded) => decoded_json(decoded)?,
        Event::Fallback(fallback) => serde_json::to_value(fallback)?,
        _ => serde_json::Value::Null,
    };
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => println!("{:>3}  {value}", event.code()),
    }
    Ok(())
}

fn decoded_json(event: &DecodedEvent) -> Result<serde_json::Value> {
    let value = if let Some(e) = event.downcast_ref::<InputEvent>() {
        serde_json::to_value(e)?
    } else if let Some(e) = event.downcast_ref::<ExposeEvent>() {
        serde_json::to_value(e)?
    } else if let Some(e) = event.downcast_ref::<ConfigureNotifyEvent>() {
        serde_json::to_value(e)?
    } else {
        serde_json::json!({ "type": event.type_name() })
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_ids_parse_in_hex_or_decimal() {
        assert_eq!(parse_window("0x400001").unwrap(), 0x0040_0001);
        assert_eq!(parse_window("1334").unwrap(), 1334);
        assert!(parse_window("0xzz").is_err());
    }

    #[test]
    fn watch_mask_avoids_exclusive_selections() {
        assert_eq!(WATCH_MASK & event_mask::BUTTON_PRESS, 0);
        assert_ne!(WATCH_MASK & event_mask::SUBSTRUCTURE_NOTIFY, 0);
    }
}
