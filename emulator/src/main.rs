use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stride_emulator::backend::Backend;
use stride_emulator::config::load_tracker_config;
use stride_emulator::http::HttpStepApi;
use stride_emulator::loopback::LoopbackApi;
use stride_emulator::runtime;
use stride_emulator::sensor::SimulatedAccelerometer;
use stride_emulator::session::{Session, should_terminate};
use stride_emulator::store::FileCredentialStore;
use stride_emulator::transcript::TranscriptLogger;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stride-emulator")]
#[command(about = "Interactive host emulator for the Stride step tracker")]
struct Args {
    /// Base URL of the step back-end.
    #[arg(long, env = "STRIDE_API_URL", default_value = "http://localhost:8080")]
    api_url: String,
    /// JSON file holding the stored bearer token.
    #[arg(long, default_value = ".stride/credentials.json")]
    store: PathBuf,
    /// TOML file overriding tracker intervals and thresholds.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serve the step API in-process instead of over HTTP.
    #[arg(long)]
    offline: bool,
    /// Emulate a platform without an accelerometer.
    #[arg(long)]
    no_sensor: bool,
    /// Write a console transcript to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_tracker_config(args.config.as_deref())?;
    let backend = if args.offline {
        Backend::Loopback(LoopbackApi::new())
    } else {
        Backend::Http(HttpStepApi::new(&args.api_url)?)
    };
    let sensor = if args.no_sensor {
        SimulatedAccelerometer::unsupported()
    } else {
        SimulatedAccelerometer::new()
    };
    let gait = sensor.gait(&config);
    let store = FileCredentialStore::new(args.store);
    let transcript = args
        .transcript
        .as_deref()
        .map(|path| TranscriptLogger::create(path, "Stride emulator transcript"))
        .transpose()
        .context("failed to open transcript")?;

    let agent = runtime::launch(config, sensor, backend, store)
        .context("failed to start agent runtime")?;
    let mut session = Session::new(agent, gait, transcript);

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Stride emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        for notice in session.take_notices()? {
            writeln!(writer, "{notice}")?;
        }

        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
        if should_terminate(trimmed) {
            break;
        }
    }

    Ok(())
}
