//! Console front-end for the tracking agent.
//!
//! Each line is parsed, turned into an agent command or a sensor script, and
//! answered with the events the agent publishes in response. Replies are
//! prefixed `OK`, `WARN`, or `ERR` and mirrored to the transcript when one
//! is open.

use std::io;
use std::thread;
use std::time::{Duration, Instant as HostInstant};

use stride_agent::{AgentCommand, AgentEvent, HomeSummary, UploadReport};
use stride_core::session::{SensorStatus, StatusFormatter};
use stride_core::sync::UploadOutcome;

use crate::console::{HELP_TOPICS, ConsoleCommand, help_topic, help_topic_list, parse_command};
use crate::runtime::EmulatorAgent;
use crate::sensor::GaitControl;
use crate::transcript::{TranscriptLogger, TranscriptRole};

/// How long a command waits for the agent's answer.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct Session {
    agent: &'static EmulatorAgent,
    gait: GaitControl,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
    reply_timeout: Duration,
}

impl Session {
    #[must_use]
    pub fn new(
        agent: &'static EmulatorAgent,
        gait: GaitControl,
        transcript: Option<TranscriptLogger>,
    ) -> Self {
        Self {
            agent,
            gait,
            transcript,
            started_at: HostInstant::now(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Replaces the transcript, e.g. between scripted profiles.
    pub fn set_transcript(&mut self, transcript: Option<TranscriptLogger>) {
        self.transcript = transcript;
        self.started_at = HostInstant::now();
    }

    /// Handles one console line and returns the reply lines.
    ///
    /// # Errors
    ///
    /// Fails only when the transcript cannot be written.
    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, &[trimmed.to_owned()])?;

        let mut lines = self.pending_notices();
        match parse_command(trimmed) {
            Ok(command) => lines.extend(self.dispatch(command)),
            Err(error) => lines.push(format!("ERR syntax {error}")),
        }

        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    /// Events published without a command, such as a session resumed at start-up.
    ///
    /// # Errors
    ///
    /// Fails only when the transcript cannot be written.
    pub fn take_notices(&mut self) -> io::Result<Vec<String>> {
        let lines = self.pending_notices();
        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn dispatch(&mut self, command: ConsoleCommand) -> Vec<String> {
        match command {
            ConsoleCommand::Login { username, password } => self.request(
                AgentCommand::Login { username, password },
                |event| {
                    matches!(
                        event,
                        AgentEvent::LoginFailed(_)
                            | AgentEvent::HomeRefreshed(_)
                            | AgentEvent::RefreshFailed(_)
                            | AgentEvent::SessionExpired { .. }
                    )
                },
            ),
            ConsoleCommand::Logout => self.request(AgentCommand::Logout, |event| {
                matches!(
                    event,
                    AgentEvent::LoggedOut { .. } | AgentEvent::NotLoggedIn(_)
                )
            }),
            ConsoleCommand::Sync => self.request(AgentCommand::SyncNow, |event| {
                matches!(event, AgentEvent::Upload(_) | AgentEvent::NotLoggedIn(_))
            }),
            ConsoleCommand::Refresh => self.request(AgentCommand::Refresh, |event| {
                matches!(
                    event,
                    AgentEvent::HomeRefreshed(_)
                        | AgentEvent::RefreshFailed(_)
                        | AgentEvent::SessionExpired { .. }
                        | AgentEvent::NotLoggedIn(_)
                )
            }),
            ConsoleCommand::Walk(strides) => self.feed_motion("walk", |gait| gait.walk(strides)),
            ConsoleCommand::Shake(samples) => {
                self.feed_motion("shake", |gait| gait.shake(samples))
            }
            ConsoleCommand::Idle => {
                let dropped = self.gait.idle();
                vec![format!("OK idle dropped={dropped}")]
            }
            ConsoleCommand::Status => self.status_lines(),
            ConsoleCommand::History(count) => self.history_lines(count),
            ConsoleCommand::Help(topic) => help_lines(topic.as_deref()),
            ConsoleCommand::Exit => vec!["Session closed.".to_owned()],
        }
    }

    /// Submits `command` and collects events until `done` matches one.
    fn request(
        &mut self,
        command: AgentCommand,
        done: impl Fn(&AgentEvent) -> bool,
    ) -> Vec<String> {
        let label = command.label();
        if self.agent.try_submit(command).is_err() {
            return vec![format!("ERR busy: {label} not queued")];
        }

        let deadline = HostInstant::now() + self.reply_timeout;
        let mut lines = Vec::new();
        loop {
            if let Some(event) = self.agent.try_next_event() {
                lines.push(describe_event(&event));
                if done(&event) {
                    return lines;
                }
                continue;
            }
            if HostInstant::now() >= deadline {
                lines.push(format!("ERR {label} timed out waiting for the agent"));
                return lines;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Queues motion and waits until the sensor has delivered all of it.
    fn feed_motion(
        &mut self,
        label: &str,
        queue: impl FnOnce(&GaitControl) -> usize,
    ) -> Vec<String> {
        let before = self.agent.snapshot();
        if before.sensor != SensorStatus::Active {
            return vec![format!("ERR {label}: {}", before.sensor)];
        }

        let queued = queue(&self.gait);
        let interval = self.agent.config().sample_interval;
        let samples = u32::try_from(queued).unwrap_or(u32::MAX);
        let deadline = HostInstant::now() + interval.saturating_mul(samples) + self.reply_timeout;
        while self.gait.queued() > 0 && HostInstant::now() < deadline {
            if self.agent.snapshot().sensor != SensorStatus::Active {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        thread::sleep(interval);

        let after = self.agent.snapshot();
        let mut lines = self.pending_notices();
        if self.gait.queued() > 0 {
            lines.push(format!(
                "WARN {label} interrupted with {} samples queued",
                self.gait.queued()
            ));
        }
        lines.push(format!(
            "OK {label} samples={queued} steps=+{}",
            after.display.saturating_sub(before.display)
        ));
        lines.push(after.to_string());
        lines
    }

    fn status_lines(&self) -> Vec<String> {
        let snapshot = self.agent.snapshot();
        let mut lines = vec![snapshot.to_string()];

        let mut sync = String::new();
        if StatusFormatter::new(&snapshot)
            .write_sync_line(&mut sync)
            .is_ok()
        {
            lines.push(sync);
        }

        if let Some(home) = self.agent.home() {
            lines.extend(home_lines(&home, snapshot.display));
        }
        lines
    }

    fn history_lines(&self, count: usize) -> Vec<String> {
        let records = self.agent.history(count);
        if records.is_empty() {
            return vec!["no telemetry recorded".to_owned()];
        }
        records
            .iter()
            .map(|record| {
                format!(
                    "#{:<4} +{:>7}ms {} {}",
                    record.id,
                    self.agent.offset_ms(record.timestamp),
                    record.event,
                    record.details
                )
                .trim_end()
                .to_owned()
            })
            .collect()
    }

    fn pending_notices(&self) -> Vec<String> {
        std::iter::from_fn(|| self.agent.try_next_event())
            .map(|event| describe_event(&event))
            .collect()
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> io::Result<()> {
        let elapsed = self.started_at.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

/// True for the lines that close the console.
#[must_use]
pub fn should_terminate(line: &str) -> bool {
    matches!(parse_command(line), Ok(ConsoleCommand::Exit))
}

/// One-line rendering of an agent event.
#[must_use]
pub fn describe_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::SessionStarted { resumed: true } => {
            "OK session resumed with stored credential".to_owned()
        }
        AgentEvent::SessionStarted { resumed: false } => "OK logged in".to_owned(),
        AgentEvent::LoginFailed(error) => format!("ERR {error}"),
        AgentEvent::NotLoggedIn(command) => format!("ERR {command} requires login"),
        AgentEvent::SensorUnsupported => {
            "WARN sensor unsupported; steps will not be counted".to_owned()
        }
        AgentEvent::LoggedOut { discarded } => format!("OK logged out discarded={discarded}"),
        AgentEvent::SessionExpired { discarded } => {
            format!("ERR session expired; login required discarded={discarded}")
        }
        AgentEvent::Upload(report) => describe_upload(report),
        AgentEvent::HomeRefreshed(home) => {
            format!("OK home {} total={}", home.nickname, home.total_steps)
        }
        AgentEvent::RefreshFailed(error) => format!("ERR refresh {error}"),
    }
}

fn describe_upload(report: &UploadReport) -> String {
    match report {
        UploadReport::Skipped(reason) => format!("OK sync skipped ({reason})"),
        UploadReport::Finished { ticket, outcome } => match outcome {
            UploadOutcome::Acknowledged { steps, remaining } => {
                format!("OK sync #{} steps={steps} pending={remaining}", ticket.batch)
            }
            UploadOutcome::Retained { pending, error } => {
                format!(
                    "ERR sync #{} {error}; pending={pending} kept for retry",
                    ticket.batch
                )
            }
            UploadOutcome::Stale => {
                format!("OK sync #{} finished after the session ended", ticket.batch)
            }
        },
    }
}

fn home_lines(home: &HomeSummary, display: u32) -> Vec<String> {
    let mut head = format!("home: {}", home.nickname);
    if let Some(title) = &home.representative_title {
        head.push_str(&format!(" \"{title}\""));
    }
    if let Some(rank) = home.rank {
        head.push_str(&format!(" rank=#{rank}"));
    }
    if let Some(location) = &home.current_location {
        head.push_str(&format!(" at {location}"));
    }

    let mut lines = vec![head];
    if let (Some(landmark), Some(remaining)) = (&home.landmark, home.steps_to_landmark(display)) {
        lines.push(format!("next: {} in {remaining} steps", landmark.name));
    }
    lines
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match help_topic(target) {
            Some(detail) => vec![detail.to_owned()],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_owned()];
            lines.extend(HELP_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
            lines.push("Type `help <topic>` for a specific command.".to_owned());
            lines
        }
    }
}
