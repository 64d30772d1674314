// chat-client/src/actors/idle_watchdog.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult, SpawnHandle};
use common::InactivityConfig;
use std::time::Duration;
use tokio::sync::broadcast;

const SIGNAL_CAPACITY: usize = 64;

/// The user did something
#[derive(Message, Debug, Clone, Copy)]
#[rtype(result = "()")]
pub struct ActivityPulse;

/// Arm the first idle countdown. Sending it again restarts the countdown.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartMonitoring;

/// Cancel all timers and hide any warning
#[derive(Message)]
#[rtype(result = "()")]
pub struct StopMonitoring;

#[derive(Message)]
#[rtype(result = "WatchdogState")]
pub struct WatchdogStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Created, never started
    Idle,
    /// Waiting for the idle threshold
    Counting,
    /// Warning shown, seconds left
    Warning(u32),
    /// Forced logout emitted; the next pulse re-arms
    Expired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogTimings {
    pub idle_timeout: Duration,
    pub warning_ticks: u32,
    pub tick: Duration,
}

impl WatchdogTimings {
    pub fn from_config(config: &InactivityConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            warning_ticks: config.warning_seconds,
            tick: Duration::from_secs(1),
        }
    }

    pub fn warning_window(&self) -> Duration {
        self.tick * self.warning_ticks
    }

    /// Quiet time before the warning phase starts
    pub fn pre_warning_delay(&self) -> Duration {
        self.idle_timeout.saturating_sub(self.warning_window())
    }
}

/// Output channels of the watchdog. Each is a broadcast channel, so any
/// number of subscribers see every value published after they subscribe.
#[derive(Clone)]
pub struct WatchdogSignals {
    activity: broadcast::Sender<()>,
    warning: broadcast::Sender<u32>,
    force_logout: broadcast::Sender<()>,
}

impl Default for WatchdogSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogSignals {
    pub fn new() -> Self {
        let (activity, _) = broadcast::channel(SIGNAL_CAPACITY);
        let (warning, _) = broadcast::channel(SIGNAL_CAPACITY);
        let (force_logout, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            activity,
            warning,
            force_logout,
        }
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<()> {
        self.activity.subscribe()
    }

    /// Seconds left before logout; 0 hides the warning
    pub fn subscribe_warning(&self) -> broadcast::Receiver<u32> {
        self.warning.subscribe()
    }

    pub fn subscribe_force_logout(&self) -> broadcast::Receiver<()> {
        self.force_logout.subscribe()
    }

    // A channel without subscribers is fine; nobody is watching yet
    fn publish_activity(&self) {
        let _ = self.activity.send(());
    }

    fn publish_warning(&self, remaining: u32) {
        let _ = self.warning.send(remaining);
    }

    fn publish_force_logout(&self) {
        let _ = self.force_logout.send(());
    }
}

/// Restarts an idle countdown on every activity pulse, then runs a warning
/// countdown that ends in a forced logout unless activity arrives first
pub struct IdleWatchdog {
    timings: WatchdogTimings,
    signals: WatchdogSignals,
    state: WatchdogState,
    idle_timer: Option<SpawnHandle>,
    countdown: Option<SpawnHandle>,
}

impl IdleWatchdog {
    pub fn new(timings: WatchdogTimings, signals: WatchdogSignals) -> Self {
        Self {
            timings,
            signals,
            state: WatchdogState::Idle,
            idle_timer: None,
            countdown: None,
        }
    }

    fn on_activity(&mut self, ctx: &mut Context<Self>) {
        if self.state == WatchdogState::Stopped {
            tracing::trace!("Ignoring activity while monitoring is stopped");
            return;
        }

        self.signals.publish_activity();

        if self.cancel_countdown(ctx) {
            tracing::info!("Activity during warning, logout cancelled");
            self.signals.publish_warning(0);
        }

        self.arm_idle_timer(ctx);
    }

    fn arm_idle_timer(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.idle_timer.take() {
            ctx.cancel_future(handle);
        }

        self.state = WatchdogState::Counting;
        self.idle_timer = Some(ctx.run_later(self.timings.pre_warning_delay(), |act, ctx| {
            act.idle_timer = None;
            act.begin_warning(ctx);
        }));
    }

    fn begin_warning(&mut self, ctx: &mut Context<Self>) {
        let remaining = self.timings.warning_ticks;
        tracing::info!(remaining, "User inactive, showing logout warning");

        self.state = WatchdogState::Warning(remaining);
        self.signals.publish_warning(remaining);

        if remaining == 0 {
            self.expire();
            return;
        }

        self.countdown = Some(ctx.run_interval(self.timings.tick, |act, ctx| {
            act.tick(ctx);
        }));
    }

    fn tick(&mut self, ctx: &mut Context<Self>) {
        let remaining = match self.state {
            WatchdogState::Warning(n) => n.saturating_sub(1),
            _ => return,
        };

        tracing::debug!(remaining, "Time left before forced logout");
        self.state = WatchdogState::Warning(remaining);
        self.signals.publish_warning(remaining);

        if remaining == 0 {
            self.cancel_countdown(ctx);
            self.expire();
        }
    }

    fn expire(&mut self) {
        tracing::warn!("Inactivity limit reached, forcing logout");
        self.state = WatchdogState::Expired;
        self.signals.publish_force_logout();
    }

    fn cancel_countdown(&mut self, ctx: &mut Context<Self>) -> bool {
        match self.countdown.take() {
            Some(handle) => {
                ctx.cancel_future(handle);
                true
            },
            None => false,
        }
    }

    fn cancel_all(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.idle_timer.take() {
            ctx.cancel_future(handle);
        }
        self.cancel_countdown(ctx);
    }
}

impl Actor for IdleWatchdog {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!(
            idle_ms = self.timings.idle_timeout.as_millis() as u64,
            warning_ticks = self.timings.warning_ticks,
            "Idle watchdog started"
        );
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.cancel_all(ctx);
        tracing::debug!("Idle watchdog stopped");
    }
}

impl Handler<ActivityPulse> for IdleWatchdog {
    type Result = ();

    fn handle(&mut self, _msg: ActivityPulse, ctx: &mut Self::Context) -> Self::Result {
        self.on_activity(ctx);
    }
}

impl Handler<StartMonitoring> for IdleWatchdog {
    type Result = ();

    fn handle(&mut self, _msg: StartMonitoring, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Inactivity monitoring started");
        if self.state == WatchdogState::Stopped {
            self.state = WatchdogState::Idle;
        }
        self.on_activity(ctx);
    }
}

impl Handler<StopMonitoring> for IdleWatchdog {
    type Result = ();

    fn handle(&mut self, _msg: StopMonitoring, ctx: &mut Self::Context) -> Self::Result {
        tracing::info!("Inactivity monitoring stopped");
        self.cancel_all(ctx);
        self.state = WatchdogState::Stopped;
        self.signals.publish_warning(0);
    }
}

impl Handler<WatchdogStatus> for IdleWatchdog {
    type Result = MessageResult<WatchdogStatus>;

    fn handle(&mut self, _msg: WatchdogStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_from_config() {
        let timings = WatchdogTimings::from_config(&InactivityConfig {
            timeout_minutes: 1,
            warning_seconds: 20,
            check_activity_interval_ms: 1000,
        });
        assert_eq!(timings.idle_timeout, Duration::from_secs(60));
        assert_eq!(timings.warning_window(), Duration::from_secs(20));
        assert_eq!(timings.pre_warning_delay(), Duration::from_secs(40));
    }

    #[test]
    fn test_warning_longer_than_timeout_starts_immediately() {
        let timings = WatchdogTimings {
            idle_timeout: Duration::from_secs(5),
            warning_ticks: 10,
            tick: Duration::from_secs(1),
        };
        assert_eq!(timings.pre_warning_delay(), Duration::ZERO);
    }
}
