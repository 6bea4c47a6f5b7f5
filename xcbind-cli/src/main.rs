//! CLI for inspecting an X display through xcbind.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod events;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;
use xcbind::{ConnectOptions, Connection, XcbTransport};

#[derive(Parser)]
#[command(name = "xcb-events", version, about = "Inspect an X display through libxcb")]
struct Cli {
    /// Display to connect to (defaults to $DISPLAY).
    #[arg(long, short, global = true)]
    display: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the connection setup.
    Info {
        /// Output format.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Round-trip a reply request and a checked request.
    Ping,

    /// Stream events until interrupted.
    Events(events::EventsArgs),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for info/events.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = Cli::parse().dispatch() {
        eprintln!("xcb-events: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let options = match self.display {
            Some(name) => ConnectOptions::new().display(name),
            None => ConnectOptions::new(),
        };
        match self.command {
            Command::Info { format } => info(options, format),
            Command::Ping => ping(options),
            Command::Events(args) => events::run(options, &args),
            Command::Completion { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Self::command(),
                    "xcb-events",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    }
}

/// Opens the display, attaching the display name to failures.
pub(crate) fn connect(options: ConnectOptions) -> Result<(Connection<XcbTransport>, i32)> {
    let name = options.display_name().unwrap_or("$DISPLAY").to_owned();
    options.connect().with_context(|| format!("cannot open display {name}"))
}

fn info(options: ConnectOptions, format: OutputFormat) -> Result<()> {
    let (conn, screen) = connect(options)?;
    let setup = conn.setup()?;

    if matches!(format, OutputFormat::Json) {
        let obj = serde_json::json!({
            "screen": screen,
            "file_descriptor": conn.file_descriptor()?,
            "setup": setup,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("vendor:          {} (release {})", setup.vendor, setup.release_number);
    println!(
        "protocol:        {}.{}",
        setup.protocol_major_version, setup.protocol_minor_version
    );
    println!("screen:          {screen} of {}", setup.roots_len);
    println!(
        "resource ids:    base {:#010x}, mask {:#010x}",
        setup.resource_id_base, setup.resource_id_mask
    );
    println!("max request:     {} words", setup.maximum_request_length);
    println!("keycodes:        {}..={}", setup.min_keycode, setup.max_keycode);
    Ok(())
}

fn ping(options: ConnectOptions) -> Result<()> {
    let (conn, _) = connect(options)?;

    let mut focus = conn.get_input_focus()?;
    let mut noop = conn.no_operation_checked()?;
    conn.flush()?;
    println!("sent {focus} and {noop}");

    let reply = focus
        .resolve()?
        .into_reply()
        .context("GetInputFocus returned no reply")?;
    println!(
        "GetInputFocus:   focus {:#x}, revert_to {}",
        reply.focus, reply.revert_to
    );

    if noop.resolve()?.is_ack() {
        println!("NoOperation:     acknowledged");
    }
    println!("id:              {:#x}", conn.generate_id()?);
    Ok(())
}
