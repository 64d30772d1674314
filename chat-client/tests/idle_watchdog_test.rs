// chat-client/tests/idle_watchdog_test.rs
use actix::{Actor, Addr};
use chat_client::{
    ActivityPulse, ActivitySource, IdleWatchdog, RawInput, StartMonitoring, StopMonitoring,
    WatchdogSignals, WatchdogState, WatchdogStatus, WatchdogTimings,
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(3);

// 160ms of quiet, then a 3-tick warning of 30ms ticks
fn timings() -> WatchdogTimings {
    WatchdogTimings {
        idle_timeout: Duration::from_millis(250),
        warning_ticks: 3,
        tick: Duration::from_millis(30),
    }
}

fn start_watchdog() -> (Addr<IdleWatchdog>, WatchdogSignals) {
    let signals = WatchdogSignals::new();
    let watchdog = IdleWatchdog::new(timings(), signals.clone()).start();
    (watchdog, signals)
}

fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut values = Vec::new();
    while let Ok(value) = rx.try_recv() {
        values.push(value);
    }
    values
}

#[actix_rt::test]
async fn test_inactivity_counts_down_then_forces_logout_once() {
    let (watchdog, signals) = start_watchdog();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();

    watchdog.send(StartMonitoring).await.unwrap();
    timeout(WAIT, logouts.recv()).await.expect("no forced logout").unwrap();

    assert_eq!(drain(&mut warnings), vec![3, 2, 1, 0]);
    assert_eq!(watchdog.send(WatchdogStatus).await.unwrap(), WatchdogState::Expired);

    sleep(Duration::from_millis(300)).await;
    assert!(drain(&mut logouts).is_empty(), "logout must fire exactly once");
    assert!(drain(&mut warnings).is_empty());
}

#[actix_rt::test]
async fn test_steady_activity_never_warns() {
    let (watchdog, signals) = start_watchdog();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();

    watchdog.send(StartMonitoring).await.unwrap();
    for _ in 0..20 {
        sleep(Duration::from_millis(20)).await;
        watchdog.send(ActivityPulse).await.unwrap();
    }

    assert!(drain(&mut warnings).is_empty());
    assert!(drain(&mut logouts).is_empty());
    assert_eq!(watchdog.send(WatchdogStatus).await.unwrap(), WatchdogState::Counting);
}

#[actix_rt::test]
async fn test_activity_during_warning_cancels_logout() {
    let (watchdog, signals) = start_watchdog();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();

    watchdog.send(StartMonitoring).await.unwrap();
    let first = timeout(WAIT, warnings.recv()).await.expect("no warning").unwrap();
    assert_eq!(first, 3);

    watchdog.send(ActivityPulse).await.unwrap();

    // Whatever ticked before the pulse landed, the sequence ends hidden
    let seen = drain(&mut warnings);
    assert_eq!(seen.last(), Some(&0));
    assert!(seen.windows(2).all(|pair| pair[0] > pair[1]));
    assert_eq!(watchdog.send(WatchdogStatus).await.unwrap(), WatchdogState::Counting);

    // A fresh idle window is running, shorter waits stay quiet
    sleep(Duration::from_millis(100)).await;
    assert!(drain(&mut logouts).is_empty());
    assert!(drain(&mut warnings).is_empty());
}

#[actix_rt::test]
async fn test_new_idle_window_after_cancel_can_expire_again() {
    let (watchdog, signals) = start_watchdog();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();

    watchdog.send(StartMonitoring).await.unwrap();
    timeout(WAIT, warnings.recv()).await.expect("no warning").unwrap();
    watchdog.send(ActivityPulse).await.unwrap();
    drain(&mut warnings);

    timeout(WAIT, logouts.recv()).await.expect("no forced logout").unwrap();
    assert_eq!(drain(&mut warnings), vec![3, 2, 1, 0]);
}

#[actix_rt::test]
async fn test_stop_hides_warning_and_ignores_activity() {
    let (watchdog, signals) = start_watchdog();
    let mut warnings = signals.subscribe_warning();
    let mut logouts = signals.subscribe_force_logout();
    let mut activity = signals.subscribe_activity();

    watchdog.send(StartMonitoring).await.unwrap();
    timeout(WAIT, warnings.recv()).await.expect("no warning").unwrap();

    watchdog.send(StopMonitoring).await.unwrap();
    assert_eq!(drain(&mut warnings).last(), Some(&0));
    drain(&mut activity);

    watchdog.send(ActivityPulse).await.unwrap();
    assert!(drain(&mut activity).is_empty());
    assert_eq!(watchdog.send(WatchdogStatus).await.unwrap(), WatchdogState::Stopped);

    sleep(Duration::from_millis(400)).await;
    assert!(drain(&mut logouts).is_empty());
    assert!(drain(&mut warnings).is_empty());
}

#[actix_rt::test]
async fn test_start_after_stop_rearms() {
    let (watchdog, signals) = start_watchdog();
    let mut logouts = signals.subscribe_force_logout();

    watchdog.send(StartMonitoring).await.unwrap();
    watchdog.send(StopMonitoring).await.unwrap();
    watchdog.send(StartMonitoring).await.unwrap();

    assert_eq!(watchdog.send(WatchdogStatus).await.unwrap(), WatchdogState::Counting);
    timeout(WAIT, logouts.recv()).await.expect("no forced logout").unwrap();
}

#[actix_rt::test]
async fn test_activity_source_throttles_raw_input() {
    let (watchdog, signals) = start_watchdog();
    let mut activity = signals.subscribe_activity();
    let mut source = ActivitySource::new(Duration::from_secs(60), watchdog.clone().recipient());

    assert!(source.record(RawInput::PointerMove));
    assert!(!source.record(RawInput::KeyPress));
    assert!(!source.record(RawInput::Scroll));

    timeout(WAIT, activity.recv()).await.expect("no activity pulse").unwrap();
    sleep(Duration::from_millis(20)).await;
    assert!(drain(&mut activity).is_empty());

    source.detach();
    assert!(!source.is_attached());
    assert!(!source.record(RawInput::KeyPress));
}
