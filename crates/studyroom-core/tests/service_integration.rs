//! Timer service tests on tokio's paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use studyroom_core::{
    spawn_ticker, CoreError, EngineOptions, Event, Notification, Notifier, SessionType,
    SettingsPatch, TimerProgress, TimerService, TimerSettings, TimerStatus,
};

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().unwrap().push(notification.clone());
    }
}

fn one_minute_settings() -> TimerSettings {
    TimerSettings {
        work_duration: 1,
        short_break_duration: 1,
        long_break_duration: 2,
        sessions_until_long_break: 2,
        ..Default::default()
    }
}

/// Let spawned tasks process everything queued so far.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn ticker_drives_a_session_to_completion_and_advance() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (handle, service) = TimerService::spawn(
        one_minute_settings(),
        TimerProgress::default(),
        EngineOptions::default(),
        vec![notifier.clone() as Arc<dyn Notifier>],
    );
    let ticker = spawn_ticker(handle.clone());
    let mut events = handle.subscribe();

    handle.start().unwrap();
    settle().await;
    assert_eq!(handle.snapshot().state.status, TimerStatus::Running);

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    let remaining = handle.snapshot().state.time_remaining;
    assert_eq!(remaining, 30);

    tokio::time::sleep(Duration::from_secs(30)).await;
    let snap = handle.snapshot();
    assert_eq!(snap.state.status, TimerStatus::Completed);
    assert_eq!(snap.state.completed_sessions, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snap = handle.snapshot();
    assert_eq!(snap.state.current_session_type, SessionType::ShortBreak);
    assert_eq!(snap.state.status, TimerStatus::Idle);
    assert_eq!(snap.state.current_round, 2);

    let seen = notifier.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].session_type, SessionType::Work);
    assert_eq!(seen[0].next_session_type, SessionType::ShortBreak);

    let mut names = Vec::new();
    while let Ok(ev) = events.try_recv() {
        names.push(ev.name());
    }
    assert_eq!(names, vec!["timer_started", "session_completed", "session_initialized"]);

    handle.shutdown().unwrap();
    let progress = service.await.unwrap();
    assert_eq!(progress.completed_sessions, 1);
    assert_eq!(progress.current_round, 2);
    ticker.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pause_stops_the_countdown() {
    let (handle, _service) = TimerService::spawn(
        one_minute_settings(),
        TimerProgress::default(),
        EngineOptions::default(),
        Vec::new(),
    );
    let _ticker = spawn_ticker(handle.clone());

    handle.start().unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    handle.pause().unwrap();
    settle().await;
    let paused_at = handle.snapshot().state.time_remaining;
    assert_eq!(paused_at, 50);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(handle.snapshot().state.time_remaining, paused_at);
    assert_eq!(handle.snapshot().state.status, TimerStatus::Paused);

    handle.start().unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(handle.snapshot().state.time_remaining, 45);
}

#[tokio::test(start_paused = true)]
async fn auto_start_chains_sessions() {
    let settings = TimerSettings {
        auto_start_breaks: true,
        auto_start_sessions: true,
        ..one_minute_settings()
    };
    let (handle, _service) = TimerService::spawn(
        settings,
        TimerProgress::default(),
        EngineOptions::default(),
        Vec::new(),
    );
    let _ticker = spawn_ticker(handle.clone());

    handle.start().unwrap();
    // 60s work + 2s completion delay + 1s auto-start delay, plus a little slack.
    tokio::time::sleep(Duration::from_millis(63_500)).await;
    let snap = handle.snapshot();
    assert_eq!(snap.state.current_session_type, SessionType::ShortBreak);
    assert_eq!(snap.state.status, TimerStatus::Running);

    // 60s break + 3s of delays: back to work, running, round 2.
    tokio::time::sleep(Duration::from_secs(63)).await;
    let snap = handle.snapshot();
    assert_eq!(snap.state.current_session_type, SessionType::Work);
    assert_eq!(snap.state.status, TimerStatus::Running);
    assert_eq!(snap.state.current_round, 2);
    assert_eq!(snap.state.completed_sessions, 2);
}

#[tokio::test(start_paused = true)]
async fn skip_during_completion_delay_is_not_doubled() {
    let (handle, _service) = TimerService::spawn(
        one_minute_settings(),
        TimerProgress::default(),
        EngineOptions::default(),
        Vec::new(),
    );
    let _ticker = spawn_ticker(handle.clone());

    handle.start().unwrap();
    tokio::time::sleep(Duration::from_millis(60_500)).await;
    assert_eq!(handle.snapshot().state.status, TimerStatus::Completed);

    handle.skip().unwrap();
    settle().await;
    assert_eq!(handle.snapshot().state.current_session_type, SessionType::ShortBreak);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snap = handle.snapshot();
    assert_eq!(snap.state.current_session_type, SessionType::ShortBreak);
    assert_eq!(snap.state.current_round, 2);
    assert_eq!(snap.state.completed_sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn update_settings_reports_validation_errors() {
    let (handle, _service) = TimerService::spawn(
        TimerSettings::default(),
        TimerProgress::default(),
        EngineOptions::default(),
        Vec::new(),
    );

    let err = handle
        .update_settings(SettingsPatch {
            work_duration: Some(-5),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(handle.snapshot().settings.work_duration, 25);

    let updated = handle
        .update_settings(SettingsPatch {
            work_duration: Some(30),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.work_duration, 30);
    assert_eq!(handle.snapshot().state.time_remaining, 1800);
}

#[tokio::test(start_paused = true)]
async fn restored_progress_and_subject_flow_through() {
    let progress = TimerProgress {
        current_round: 2,
        cycle_id: None,
        completed_sessions: 5,
        subject_id: None,
    };
    let (handle, service) = TimerService::spawn(
        one_minute_settings(),
        progress,
        EngineOptions::default(),
        Vec::new(),
    );
    let mut events = handle.subscribe();

    handle.set_subject(Some("biology".into())).unwrap();
    handle.skip().unwrap();
    settle().await;

    let snap = handle.snapshot();
    assert_eq!(snap.state.current_session_type, SessionType::LongBreak);
    assert_eq!(snap.state.current_round, 1);
    assert!(snap.state.cycle_id.is_some());
    assert_eq!(snap.state.subject_id.as_deref(), Some("biology"));

    assert!(matches!(events.try_recv(), Ok(Event::SubjectChanged { .. })));
    assert!(matches!(events.try_recv(), Ok(Event::TimerSkipped { to: SessionType::LongBreak, .. })));

    drop(events);
    drop(handle);
    let final_progress = service.await.unwrap();
    assert_eq!(final_progress.completed_sessions, 5);
    assert_eq!(final_progress.subject_id.as_deref(), Some("biology"));
}

#[tokio::test(start_paused = true)]
async fn commands_fail_after_shutdown() {
    let (handle, service) = TimerService::spawn(
        TimerSettings::default(),
        TimerProgress::default(),
        EngineOptions::default(),
        Vec::new(),
    );
    handle.shutdown().unwrap();
    service.await.unwrap();
    assert!(matches!(handle.start(), Err(CoreError::ServiceClosed)));
}
