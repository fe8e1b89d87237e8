#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embassy_futures::block_on;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Timer, with_timeout};
use stride_agent::{Agent, AgentEvent, HomeSummary, LoginError, MotionSensor, StepApi};
use stride_core::api::ApiError;
use stride_core::config::{DetectorConfig, TrackerConfig};
use stride_core::credentials::{
    CredentialError, CredentialStore, MemoryCredential, MemoryCredentialStore,
};
use stride_core::motion::{MotionSample, SensorUnavailable};
use stride_core::sync::SyncAck;

pub type TestAgent = Agent<CriticalSectionRawMutex>;

pub const PASSWORD: &str = "secret";
pub const ISSUED_TOKEN: &str = "jwt-issued";
pub const STEP: MotionSample = MotionSample::new(0.3, 0.3, 1.6);

/// Short sample interval, 1 ms debounce, and a flush period long enough that
/// only explicit `SyncNow` commands upload unless a test overrides it.
pub fn test_config() -> TrackerConfig {
    TrackerConfig::new(
        Duration::from_millis(2),
        Duration::from_secs(3_600),
        DetectorConfig::new(1.2, Duration::from_millis(1)),
    )
}

pub fn agent() -> TestAgent {
    Agent::new(test_config())
}

/// Sensor fed from a shared queue; idles at rest when the queue is empty.
#[derive(Clone)]
pub struct ScriptedSensor {
    feed: Arc<Mutex<VecDeque<MotionSample>>>,
    available: bool,
    interval: Arc<Mutex<Duration>>,
    pub starts: Arc<AtomicU32>,
    pub stops: Arc<AtomicU32>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            feed: Arc::new(Mutex::new(VecDeque::new())),
            available: true,
            interval: Arc::new(Mutex::new(Duration::from_millis(2))),
            starts: Arc::new(AtomicU32::new(0)),
            stops: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Queues `count` strides; each is followed by a resting sample.
    pub fn walk(&self, count: usize) {
        let mut feed = self.feed.lock().unwrap();
        for _ in 0..count {
            feed.push_back(STEP);
            feed.push_back(MotionSample::at_rest());
        }
    }
}

impl MotionSensor for ScriptedSensor {
    fn start(&mut self, interval: Duration) -> Result<(), SensorUnavailable> {
        if !self.available {
            return Err(SensorUnavailable);
        }
        *self.interval.lock().unwrap() = interval;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_sample(&mut self) -> MotionSample {
        let interval = *self.interval.lock().unwrap();
        Timer::after_micros(u64::try_from(interval.as_micros()).unwrap()).await;
        self.feed
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MotionSample::at_rest)
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Back-end double with scripted responses and a call log.
#[derive(Default)]
pub struct FakeApi {
    sync_results: Mutex<VecDeque<Result<SyncAck, ApiError>>>,
    home_results: Mutex<VecDeque<Result<HomeSummary, ApiError>>>,
    pub sync_calls: Mutex<Vec<(String, u32)>>,
    pub home_calls: Mutex<Vec<String>>,
    pub login_calls: AtomicU32,
    hold_sync: AtomicBool,
    release: Signal<CriticalSectionRawMutex, ()>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sync(&self, result: Result<SyncAck, ApiError>) {
        self.sync_results.lock().unwrap().push_back(result);
    }

    pub fn push_home(&self, result: Result<HomeSummary, ApiError>) {
        self.home_results.lock().unwrap().push_back(result);
    }

    /// Makes the next sync request wait until [`release_sync`](Self::release_sync).
    pub fn hold_next_sync(&self) {
        self.hold_sync.store(true, Ordering::SeqCst);
    }

    pub fn release_sync(&self) {
        self.release.signal(());
    }

    pub fn sync_calls(&self) -> Vec<(String, u32)> {
        self.sync_calls.lock().unwrap().clone()
    }

    pub fn home_calls(&self) -> Vec<String> {
        self.home_calls.lock().unwrap().clone()
    }
}

pub fn home_with_total(total_steps: u32) -> HomeSummary {
    HomeSummary {
        nickname: "walker".to_owned(),
        total_steps,
        ..HomeSummary::default()
    }
}

impl StepApi for FakeApi {
    async fn login(&self, _username: &str, password: &str) -> Result<String, LoginError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if password == PASSWORD {
            Ok(ISSUED_TOKEN.to_owned())
        } else {
            Err(LoginError::Denied("invalid credentials".to_owned()))
        }
    }

    async fn sync_steps(&self, token: &str, steps: u32) -> Result<SyncAck, ApiError> {
        self.sync_calls
            .lock()
            .unwrap()
            .push((token.to_owned(), steps));
        if self.hold_sync.swap(false, Ordering::SeqCst) {
            self.release.wait().await;
        }
        self.sync_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SyncAck))
    }

    async fn fetch_home(&self, token: &str) -> Result<HomeSummary, ApiError> {
        self.home_calls.lock().unwrap().push(token.to_owned());
        self.home_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(home_with_total(0)))
    }
}

/// Credential store the test can inspect and edit while the agent runs.
#[derive(Clone, Default)]
pub struct SharedStore(Arc<Mutex<MemoryCredentialStore>>);

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store.0.lock().unwrap().save_token(token).unwrap();
        store
    }

    pub fn current_token(&self) -> Option<String> {
        self.0
            .lock()
            .unwrap()
            .token()
            .unwrap()
            .map(|token| token.as_str().to_owned())
    }

    pub fn remove_token(&self) {
        self.0.lock().unwrap().clear_token().unwrap();
    }
}

impl CredentialStore for SharedStore {
    type Error = CredentialError;
    type Credential = MemoryCredential;

    fn get(&mut self, key: &str) -> Result<Option<Self::Credential>, Self::Error> {
        self.0.lock().unwrap().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.0.lock().unwrap().set(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<(), Self::Error> {
        self.0.lock().unwrap().delete(key)
    }
}

/// Runs the agent alongside `script` and returns the script's output.
pub fn drive<F: Future>(
    agent: &TestAgent,
    sensor: &ScriptedSensor,
    api: &FakeApi,
    store: &SharedStore,
    script: F,
) -> F::Output {
    let mut sensor = sensor.clone();
    let mut store = store.clone();
    block_on(async {
        match select(agent.run(&mut sensor, api, &mut store), script).await {
            Either::First(never) => match never {},
            Either::Second(output) => output,
        }
    })
}

/// Waits for the first event matching `matches`, discarding others.
pub async fn expect_event(agent: &TestAgent, matches: impl Fn(&AgentEvent) -> bool) -> AgentEvent {
    with_timeout(embassy_time::Duration::from_secs(3), async {
        loop {
            let event = agent.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for agent event")
}

/// Polls `condition` until it holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    with_timeout(embassy_time::Duration::from_secs(3), async {
        while !condition() {
            Timer::after_millis(1).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

pub async fn login(agent: &TestAgent) {
    agent
        .submit(stride_agent::AgentCommand::Login {
            username: "walker".to_owned(),
            password: PASSWORD.to_owned(),
        })
        .await;
    expect_event(agent, |event| {
        matches!(event, AgentEvent::SessionStarted { .. })
    })
    .await;
}
