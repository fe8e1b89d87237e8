use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use stride_core::config::TrackerConfig;
use stride_emulator::backend::Backend;
use stride_emulator::loopback::LoopbackApi;
use stride_emulator::runtime;
use stride_emulator::sensor::SimulatedAccelerometer;
use stride_emulator::session::Session;
use stride_emulator::store::FileCredentialStore;
use stride_emulator::transcript::TranscriptLogger;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TranscriptProfile {
    Walk,
    Debounce,
}

impl TranscriptProfile {
    const ALL: [Self; 2] = [Self::Walk, Self::Debounce];

    fn file_name(self) -> &'static str {
        match self {
            TranscriptProfile::Walk => "emulator-walk.log",
            TranscriptProfile::Debounce => "emulator-debounce.log",
        }
    }

    fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Walk => "Stride emulator walk and sync transcript",
            TranscriptProfile::Debounce => "Stride emulator debounce transcript",
        }
    }

    fn script(self) -> &'static [&'static str] {
        match self {
            TranscriptProfile::Walk => &[
                "status",
                "sync",
                "login walker secret",
                "walk 8",
                "sync",
                "walk 3",
                "status",
                "refresh",
                "sync",
                "status",
                "history 6",
                "logout",
                "status",
            ],
            TranscriptProfile::Debounce => &[
                "login runner secret",
                "shake 40",
                "idle",
                "walk 2",
                "status",
                "help walk",
                "logout",
            ],
        }
    }
}

fn main() -> anyhow::Result<()> {
    let out_dir = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("transcripts"), PathBuf::from);

    let config = TrackerConfig::default()
        .with_sample_interval(Duration::from_millis(20))
        .with_flush_interval(Duration::from_secs(600));
    let store_path = env::temp_dir().join("stride-capture-credentials.json");
    remove_stale(&store_path)?;

    let sensor = SimulatedAccelerometer::new();
    let gait = sensor.gait(&config);
    let agent = runtime::launch(
        config,
        sensor,
        Backend::Loopback(LoopbackApi::new()),
        FileCredentialStore::new(&store_path),
    )
    .context("failed to start agent runtime")?;
    let mut session = Session::new(agent, gait, None);

    for profile in TranscriptProfile::ALL {
        let path = out_dir.join(profile.file_name());
        let transcript = TranscriptLogger::create(&path, profile.header())
            .with_context(|| format!("failed to create {}", path.display()))?;
        session.set_transcript(Some(transcript));
        for line in profile.script() {
            session.handle_command(line)?;
        }
        println!("wrote {}", path.display());
    }

    session.set_transcript(None);
    remove_stale(&store_path)?;
    Ok(())
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}
