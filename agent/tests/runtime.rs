mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use stride_agent::{Agent, AgentCommand, AgentEvent, LoginError, UploadReport};
use stride_core::api::ApiError;
use stride_core::session::SensorStatus;
use stride_core::sync::{UploadOutcome, UploadSkip};
use stride_core::telemetry::{TelemetryEventKind, TelemetryPayload};
use support::{
    FakeApi, ISSUED_TOKEN, ScriptedSensor, SharedStore, agent, drive, expect_event,
    home_with_total, login, test_config, wait_until,
};

fn is_upload(event: &AgentEvent) -> bool {
    matches!(event, AgentEvent::Upload(_))
}

#[test]
fn login_then_sync_now_sends_the_detected_steps() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    let report = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(3);
        wait_until(|| agent.snapshot().pending == 3).await;

        agent.submit(AgentCommand::SyncNow).await;
        expect_event(&agent, is_upload).await
    });

    let AgentEvent::Upload(UploadReport::Finished { ticket, outcome }) = report else {
        panic!("expected finished upload, got {report:?}");
    };
    assert_eq!(ticket.steps, 3);
    assert_eq!(
        outcome,
        UploadOutcome::Acknowledged {
            steps: 3,
            remaining: 0
        }
    );
    assert_eq!(api.sync_calls(), vec![(ISSUED_TOKEN.to_owned(), 3)]);
    assert_eq!(store.current_token().as_deref(), Some(ISSUED_TOKEN));
    assert_eq!(agent.snapshot().display, 3);
}

#[test]
fn refused_login_stays_signed_out() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    let (failure, rejected) = drive(&agent, &sensor, &api, &store, async {
        agent
            .submit(AgentCommand::Login {
                username: "walker".to_owned(),
                password: "wrong".to_owned(),
            })
            .await;
        let failure = expect_event(&agent, |event| {
            matches!(event, AgentEvent::LoginFailed(_))
        })
        .await;

        agent.submit(AgentCommand::SyncNow).await;
        let rejected = expect_event(&agent, |event| {
            matches!(event, AgentEvent::NotLoggedIn(_))
        })
        .await;
        (failure, rejected)
    });

    assert_eq!(
        failure,
        AgentEvent::LoginFailed(LoginError::Denied("invalid credentials".to_owned()))
    );
    assert_eq!(rejected, AgentEvent::NotLoggedIn("sync"));
    assert_eq!(agent.snapshot().sensor, SensorStatus::LoginRequired);
    assert_eq!(store.current_token(), None);
    assert!(api.sync_calls().is_empty());
    assert_eq!(sensor.starts.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_upload_is_retried_with_the_accumulated_amount() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();
    api.push_sync(Err(ApiError::Status(503)));

    let (first, second) = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(2);
        wait_until(|| agent.snapshot().pending == 2).await;
        agent.submit(AgentCommand::SyncNow).await;
        let first = expect_event(&agent, is_upload).await;

        sensor.walk(1);
        wait_until(|| agent.snapshot().pending == 3).await;
        agent.submit(AgentCommand::SyncNow).await;
        let second = expect_event(&agent, is_upload).await;
        (first, second)
    });

    assert!(matches!(
        first,
        AgentEvent::Upload(UploadReport::Finished {
            outcome: UploadOutcome::Retained {
                pending: 2,
                error: ApiError::Status(503)
            },
            ..
        })
    ));
    assert!(matches!(
        second,
        AgentEvent::Upload(UploadReport::Finished {
            outcome: UploadOutcome::Acknowledged {
                steps: 3,
                remaining: 0
            },
            ..
        })
    ));
    let sent: Vec<u32> = api.sync_calls().into_iter().map(|(_, steps)| steps).collect();
    assert_eq!(sent, vec![2, 3]);
}

#[test]
fn steps_detected_during_an_upload_stay_pending() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    let report = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(5);
        wait_until(|| agent.snapshot().pending == 5).await;

        api.hold_next_sync();
        agent.submit(AgentCommand::SyncNow).await;
        wait_until(|| agent.snapshot().in_flight.is_some()).await;

        sensor.walk(2);
        wait_until(|| agent.snapshot().pending == 7).await;
        api.release_sync();
        expect_event(&agent, is_upload).await
    });

    assert!(matches!(
        report,
        AgentEvent::Upload(UploadReport::Finished {
            outcome: UploadOutcome::Acknowledged {
                steps: 5,
                remaining: 2
            },
            ..
        })
    ));
    let snapshot = agent.snapshot();
    assert_eq!(snapshot.pending, 2);
    assert_eq!(snapshot.display, 7);
    assert_eq!(snapshot.in_flight, None);
}

#[test]
fn periodic_tick_skips_while_an_upload_is_in_flight() {
    let agent: support::TestAgent =
        Agent::new(test_config().with_flush_interval(Duration::from_millis(10)));
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        api.hold_next_sync();
        sensor.walk(1);
        wait_until(|| agent.snapshot().in_flight.is_some()).await;

        let in_flight_skip = || {
            agent.history(64).iter().any(|record| {
                record.event == TelemetryEventKind::UploadSkipped
                    && matches!(record.details, TelemetryPayload::Skip(UploadSkip::InFlight(1)))
            })
        };
        wait_until(in_flight_skip).await;
        assert_eq!(api.sync_calls().len(), 1);

        api.release_sync();
        wait_until(|| agent.snapshot().pending == 0).await;
    });

    assert_eq!(api.sync_calls(), vec![(ISSUED_TOKEN.to_owned(), 1)]);
}

#[test]
fn missing_credential_skips_without_a_request() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    let report = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(2);
        wait_until(|| agent.snapshot().pending == 2).await;

        store.remove_token();
        agent.submit(AgentCommand::SyncNow).await;
        expect_event(&agent, is_upload).await
    });

    assert_eq!(
        report,
        AgentEvent::Upload(UploadReport::Skipped(UploadSkip::MissingCredential))
    );
    assert!(api.sync_calls().is_empty());
    assert_eq!(agent.snapshot().pending, 2);
}

#[test]
fn logout_discards_buffer_token_and_sensor() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();

    let (logged_out, rejected) = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(4);
        wait_until(|| agent.snapshot().pending == 4).await;

        agent.submit(AgentCommand::Logout).await;
        let logged_out = expect_event(&agent, |event| {
            matches!(event, AgentEvent::LoggedOut { .. })
        })
        .await;

        sensor.walk(3);
        agent.submit(AgentCommand::SyncNow).await;
        let rejected = expect_event(&agent, |event| {
            matches!(event, AgentEvent::NotLoggedIn(_))
        })
        .await;
        (logged_out, rejected)
    });

    assert_eq!(logged_out, AgentEvent::LoggedOut { discarded: 4 });
    assert_eq!(rejected, AgentEvent::NotLoggedIn("sync"));
    let snapshot = agent.snapshot();
    assert_eq!(snapshot.sensor, SensorStatus::LoggedOut);
    assert_eq!(snapshot.pending, 0);
    assert_eq!(snapshot.display, 0);
    assert!(api.sync_calls().is_empty());
    assert_eq!(store.current_token(), None);
    assert_eq!(sensor.starts.load(Ordering::SeqCst), 1);
    assert_eq!(sensor.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn stored_token_resumes_session_without_login() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::with_token("saved-token");

    let started = drive(&agent, &sensor, &api, &store, async {
        expect_event(&agent, |event| {
            matches!(event, AgentEvent::SessionStarted { .. })
        })
        .await
    });

    assert_eq!(started, AgentEvent::SessionStarted { resumed: true });
    assert_eq!(api.login_calls.load(Ordering::SeqCst), 0);
    assert_eq!(api.home_calls(), vec!["saved-token".to_owned()]);
}

#[test]
fn unsupported_sensor_keeps_session_in_buffering_only_mode() {
    let agent = agent();
    let sensor = ScriptedSensor::unavailable();
    let api = FakeApi::new();
    let store = SharedStore::new();

    drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        expect_event(&agent, |event| *event == AgentEvent::SensorUnsupported).await;
        sensor.walk(3);

        agent.submit(AgentCommand::SyncNow).await;
        let report = expect_event(&agent, is_upload).await;
        assert_eq!(
            report,
            AgentEvent::Upload(UploadReport::Skipped(UploadSkip::NothingPending))
        );
    });

    assert_eq!(agent.snapshot().sensor, SensorStatus::Unsupported);
    assert_eq!(agent.snapshot().pending, 0);
}

#[test]
fn home_refresh_replaces_display_and_later_steps_add_to_it() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();
    api.push_home(Ok(home_with_total(1_000)));
    api.push_home(Ok(home_with_total(5_000)));

    drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        wait_until(|| agent.snapshot().display == 1_000).await;
        sensor.walk(3);
        wait_until(|| agent.snapshot().display == 1_003).await;

        agent.submit(AgentCommand::Refresh).await;
        expect_event(&agent, |event| {
            matches!(event, AgentEvent::HomeRefreshed(summary) if summary.total_steps == 5_000)
        })
        .await;
        assert_eq!(agent.snapshot().display, 5_000);

        sensor.walk(1);
        wait_until(|| agent.snapshot().display == 5_001).await;
    });

    assert_eq!(agent.snapshot().pending, 4);
    assert_eq!(agent.home().map(|home| home.total_steps), Some(5_000));
}

#[test]
fn unauthorized_refresh_expires_the_session() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();
    api.push_home(Ok(home_with_total(0)));
    api.push_home(Err(ApiError::Unauthorized));

    let expired = drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(2);
        wait_until(|| agent.snapshot().pending == 2).await;

        agent.submit(AgentCommand::Refresh).await;
        expect_event(&agent, |event| {
            matches!(event, AgentEvent::SessionExpired { .. })
        })
        .await
    });

    assert_eq!(expired, AgentEvent::SessionExpired { discarded: 2 });
    assert_eq!(store.current_token(), None);
    assert_eq!(agent.snapshot().sensor, SensorStatus::LoginRequired);
    assert_eq!(agent.home(), None);
}

#[test]
fn rejected_sync_body_is_a_retained_failure() {
    let agent = agent();
    let sensor = ScriptedSensor::new();
    let api = FakeApi::new();
    let store = SharedStore::new();
    api.push_sync(Err(ApiError::Rejected));

    drive(&agent, &sensor, &api, &store, async {
        login(&agent).await;
        sensor.walk(1);
        wait_until(|| agent.snapshot().pending == 1).await;
        agent.submit(AgentCommand::SyncNow).await;
        expect_event(&agent, is_upload).await;
    });

    let snapshot = agent.snapshot();
    assert_eq!(snapshot.pending, 1);
    assert_eq!(snapshot.sync.failures, 1);
    assert_eq!(api.sync_calls().len(), 1);
}
