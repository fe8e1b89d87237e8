//! Hosts the tracking agent on an `embassy` executor thread.

use std::io;
use std::thread;

use embassy_executor::Executor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use static_cell::StaticCell;
use stride_agent::Agent;
use stride_core::config::TrackerConfig;
use tracing::info;

use crate::backend::Backend;
use crate::sensor::SimulatedAccelerometer;
use crate::store::FileCredentialStore;

pub type EmulatorAgent = Agent<CriticalSectionRawMutex>;

static AGENT: StaticCell<EmulatorAgent> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

/// Starts the agent on its own executor thread and returns the shared handle.
///
/// Call once per process.
///
/// # Errors
///
/// Fails when the executor thread cannot be spawned.
pub fn launch(
    config: TrackerConfig,
    sensor: SimulatedAccelerometer,
    api: Backend,
    store: FileCredentialStore,
) -> io::Result<&'static EmulatorAgent> {
    let agent: &'static EmulatorAgent = AGENT.init(Agent::new(config));
    info!(backend = %api.describe(), store = %store.path().display(), "starting agent");

    thread::Builder::new()
        .name("stride-agent".to_owned())
        .spawn(move || {
            let executor = EXECUTOR.init(Executor::new());
            executor.run(|spawner| {
                spawner
                    .spawn(agent_task(agent, sensor, api, store))
                    .expect("failed to spawn agent task");
            });
        })?;

    Ok(agent)
}

#[embassy_executor::task]
async fn agent_task(
    agent: &'static EmulatorAgent,
    sensor: SimulatedAccelerometer,
    api: Backend,
    store: FileCredentialStore,
) {
    let mut sensor = sensor;
    let mut store = store;
    match agent.run(&mut sensor, &api, &mut store).await {}
}
