//! Step API over HTTP.
//!
//! Requests use the blocking `reqwest` client on one long-lived worker thread
//! fed through a channel; each result is handed back to the executor through
//! a [`Signal`], so the runtime keeps sampling while a request is outstanding.
//! No explicit deadline is set, so the client's default timeout applies.

use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use stride_agent::{HomeSummary, Landmark, LoginError, StepApi};
use stride_core::api::{
    ApiError, HOME_PATH, LOGIN_PATH, SYNC_PATH, check_status, classify_sync_response,
};
use stride_core::sync::SyncAck;
use tracing::debug;

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    success: bool,
    data: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct SyncRequest {
    steps: u32,
}

#[derive(Deserialize)]
struct SuccessFlag {
    success: bool,
}

#[derive(Deserialize)]
struct HomeResponse {
    success: bool,
    data: Option<HomeData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomeData {
    user_info: UserInfo,
    ranking_info: Option<RankingInfo>,
    landmark_info: Option<LandmarkInfo>,
    current_location_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    nickname: String,
    total_steps: u32,
    representative_title: Option<String>,
}

#[derive(Deserialize)]
struct RankingInfo {
    rank: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LandmarkInfo {
    name: String,
    required_steps: u32,
}

impl HomeData {
    fn into_summary(self) -> HomeSummary {
        HomeSummary {
            nickname: self.user_info.nickname,
            total_steps: self.user_info.total_steps,
            representative_title: self.user_info.representative_title,
            rank: self.ranking_info.and_then(|ranking| ranking.rank),
            landmark: self.landmark_info.map(|landmark| Landmark {
                name: landmark.name,
                required_steps: landmark.required_steps,
            }),
            current_location: self.current_location_name,
        }
    }
}

/// HTTP client for the step back-end.
#[derive(Clone, Debug)]
pub struct HttpStepApi {
    client: Client,
    base_url: String,
    worker: HttpWorker,
}

impl HttpStepApi {
    /// Builds a client rooted at `base_url`, e.g. `http://localhost:8080`.
    ///
    /// # Errors
    ///
    /// Fails when the TLS backend cannot be initialised or the worker thread
    /// cannot be started.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let worker = HttpWorker::spawn().context("failed to start HTTP worker")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            worker,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl StepApi for HttpStepApi {
    async fn login(&self, username: &str, password: &str) -> Result<String, LoginError> {
        let request = self.client.post(self.url(LOGIN_PATH)).json(&LoginRequest {
            username,
            password,
        });
        let (status, body) = self.worker.run(move || send(request)).await??;
        parse_login(status, &body)
    }

    async fn sync_steps(&self, token: &str, steps: u32) -> Result<SyncAck, ApiError> {
        let request = self
            .client
            .post(self.url(SYNC_PATH))
            .bearer_auth(token)
            .json(&SyncRequest { steps });
        let (status, body) = self.worker.run(move || send(request)).await??;
        parse_sync(status, &body)
    }

    async fn fetch_home(&self, token: &str) -> Result<HomeSummary, ApiError> {
        let request = self.client.get(self.url(HOME_PATH)).bearer_auth(token);
        let (status, body) = self.worker.run(move || send(request)).await??;
        parse_home(status, &body)
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// Thread that runs blocking requests one at a time, in submission order.
///
/// Clones share the thread; it exits once every sender is dropped.
#[derive(Clone, Debug)]
struct HttpWorker {
    jobs: mpsc::Sender<Job>,
}

impl HttpWorker {
    fn spawn() -> io::Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("stride-http".to_owned())
            .spawn(move || {
                for job in queue {
                    job();
                }
            })?;
        Ok(Self { jobs })
    }

    /// Queues `work` and waits for its result without blocking the executor.
    async fn run<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let signal = Arc::new(Signal::<CriticalSectionRawMutex, T>::new());
        let done = Arc::clone(&signal);
        self.jobs
            .send(Box::new(move || done.signal(work())))
            .map_err(|_| {
                debug!("HTTP worker has stopped");
                ApiError::Transport
            })?;
        Ok(signal.wait().await)
    }
}

fn send(request: RequestBuilder) -> Result<(u16, Vec<u8>), ApiError> {
    let response = request.send().map_err(transport_error)?;
    let status = response.status().as_u16();
    let body = response.bytes().map_err(transport_error)?;
    debug!(status, bytes = body.len(), "HTTP response");
    Ok((status, body.to_vec()))
}

fn transport_error(error: reqwest::Error) -> ApiError {
    debug!(%error, "HTTP request failed");
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport
    }
}

fn parse_login(status: u16, body: &[u8]) -> Result<String, LoginError> {
    match serde_json::from_slice::<LoginResponse>(body) {
        Ok(LoginResponse {
            success: true,
            data: Some(token),
            ..
        }) if check_status(status).is_ok() => Ok(token),
        Ok(LoginResponse {
            success: false,
            message,
            ..
        }) => Err(LoginError::Denied(
            message.unwrap_or_else(|| "invalid credentials".to_owned()),
        )),
        _ => {
            check_status(status)?;
            Err(ApiError::Malformed.into())
        }
    }
}

fn parse_sync(status: u16, body: &[u8]) -> Result<SyncAck, ApiError> {
    let success = serde_json::from_slice::<SuccessFlag>(body)
        .ok()
        .map(|flag| flag.success);
    classify_sync_response(status, success)
}

fn parse_home(status: u16, body: &[u8]) -> Result<HomeSummary, ApiError> {
    check_status(status)?;
    let response: HomeResponse =
        serde_json::from_slice(body).map_err(|_| ApiError::Malformed)?;
    if !response.success {
        return Err(ApiError::Rejected);
    }
    response
        .data
        .map(HomeData::into_summary)
        .ok_or(ApiError::Malformed)
}
