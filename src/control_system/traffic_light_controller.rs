use crate::config::SignalConfig;
use crate::control_system::duration_policy::DurationPolicy;
use crate::control_system::emergency::{EmergencyAlert, EmergencyOverride, Resolution};
use crate::control_system::intersection_state::IntersectionState;
use crate::control_system::signal::{Direction, LightState, Signal};
use crate::error::ControlError;
use crate::monitoring::status_publisher::{StatusPublisher, StatusSnapshot, TickObserver};
use crate::shared_data::{current_timestamp, VehicleCountUpdate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Advances every signal by one tick period and applies due transitions.
///
/// Timers always run down. While an emergency override is active no transition
/// fires; the override's own resolution restores normal operation.
pub fn advance_signals(state: &mut IntersectionState, config: &SignalConfig) {
    let policy = DurationPolicy::new(config);
    for direction in Direction::ALL {
        let signal = state.signal_mut(direction);
        signal.remaining_time = signal.remaining_time.saturating_sub(config.tick_period_secs);
    }
    if state.emergency_active {
        return;
    }

    // Lanes leaving green/yellow first, so a lane turning red frees the box for a
    // crossing lane in the same tick.
    for direction in Direction::ALL {
        let signal = state.signal(direction);
        if signal.state.is_active() && signal.remaining_time == 0 {
            transition(state, direction, &policy);
        }
    }
    for direction in Direction::ALL {
        if state.signal(direction).is_waiting() {
            transition(state, direction, &policy);
        }
    }

    prioritise_congested_lanes(state, &policy, config.high_traffic_threshold);
}

fn transition(state: &mut IntersectionState, direction: Direction, policy: &DurationPolicy) {
    match state.signal(direction).state {
        LightState::Green => {
            state
                .signal_mut(direction)
                .enter(LightState::Yellow, policy.yellow());
            state.cycle_count += 1;
            log::debug!("[TrafficController] {} GREEN -> YELLOW", direction);
        }
        LightState::Yellow => {
            let red = policy.red_duration(state, direction);
            state.signal_mut(direction).enter(LightState::Red, red);
            log::debug!("[TrafficController] {} YELLOW -> RED for {}s", direction, red);
        }
        LightState::Red => {
            if should_activate(state, direction) {
                let green = policy.green_duration(state, direction);
                state.signal_mut(direction).enter(LightState::Green, green);
                log::debug!(
                    "[TrafficController] {} RED -> GREEN for {}s ({} vehicles)",
                    direction,
                    green,
                    state.vehicle_count(direction)
                );
            } else {
                state.signal_mut(direction).waiting_ticks += 1;
            }
        }
    }
}

/// A red lane may turn green only when both crossing lanes are red and neither of
/// them has been waiting on an expired timer for longer than this lane.
pub fn should_activate(state: &IntersectionState, direction: Direction) -> bool {
    let own_wait = state.signal(direction).waiting_ticks;
    direction.perpendicular().iter().all(|&p| {
        let crossing = state.signal(p);
        crossing.state == LightState::Red
            && !(crossing.is_waiting() && crossing.waiting_ticks > own_wait)
    })
}

/// Cuts a crossing green short (down to the minimum green, never below) when a red
/// lane has heavy traffic, and pulls that red lane's timer in to match.
fn prioritise_congested_lanes(state: &mut IntersectionState, policy: &DurationPolicy, threshold: u32) {
    for direction in Direction::ALL {
        let waiting = state.vehicle_count(direction);
        let signal = state.signal(direction);
        if signal.state != LightState::Red || signal.remaining_time == 0 || waiting < threshold {
            continue;
        }

        let mut shortened = false;
        for crossing in direction.perpendicular() {
            let other = state.signal(crossing);
            let eligible = other.state == LightState::Green
                && other.elapsed() > 0
                && other.remaining_time > policy.min_green()
                && waiting > state.vehicle_count(crossing);
            if eligible {
                log::info!(
                    "[TrafficController] {} has {} vehicles waiting; cutting {} green from {}s to {}s",
                    direction,
                    waiting,
                    crossing,
                    other.remaining_time,
                    policy.min_green()
                );
                state.signal_mut(crossing).remaining_time = policy.min_green();
                shortened = true;
            }
        }

        if shortened {
            let clearance = direction
                .perpendicular()
                .iter()
                .map(|&p| time_to_red(state.signal(p), policy))
                .max()
                .unwrap_or(0);
            let signal = state.signal_mut(direction);
            signal.remaining_time = signal.remaining_time.min(clearance);
        }
    }
}

fn time_to_red(signal: &Signal, policy: &DurationPolicy) -> u64 {
    match signal.state {
        LightState::Green => signal.remaining_time.saturating_add(policy.yellow()),
        LightState::Yellow => signal.remaining_time,
        LightState::Red => 0,
    }
}

struct ControlState {
    intersection: IntersectionState,
    emergency: EmergencyOverride,
}

struct UpdateLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    config: SignalConfig,
    state: Mutex<ControlState>,
    publisher: StatusPublisher,
    observers: Mutex<Vec<Arc<dyn TickObserver>>>,
    update_loop: Mutex<Option<UpdateLoop>>,
    timers: Mutex<JoinSet<()>>,
    shutdown: CancellationToken,
    ready: AtomicBool,
    ticks: AtomicU64,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_loop(&self) -> MutexGuard<'_, Option<UpdateLoop>> {
        self.update_loop.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timers(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> Vec<Arc<dyn TickObserver>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn capture(state: &ControlState) -> StatusSnapshot {
        StatusSnapshot::capture(&state.intersection, &state.emergency)
    }

    fn tick(&self) -> Result<(), ControlError> {
        let snapshot = {
            let mut state = self.lock_state();
            advance_signals(&mut state.intersection, &self.config);
            state.intersection.last_updated = current_timestamp();
            debug_assert!(
                state.intersection.is_mutually_exclusive(),
                "crossing lanes active together: {:?}",
                state.intersection
            );
            let snapshot = Self::capture(&state);
            self.publisher.publish(snapshot.clone());
            snapshot
        };
        self.ticks.fetch_add(1, Ordering::SeqCst);

        for observer in self.observers() {
            observer
                .on_tick(&snapshot)
                .map_err(|e| ControlError::Observer {
                    observer: observer.name(),
                    error: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn resolve_emergency(&self, alert_id: &str, seq: u64) {
        let outcome = {
            let mut guard = self.lock_state();
            let state = &mut *guard;
            let outcome = state.emergency.resolve(
                &mut state.intersection,
                alert_id,
                seq,
                Instant::now(),
                &self.config,
            );
            if outcome != Resolution::Stale {
                state.intersection.last_updated = current_timestamp();
                self.publisher.publish(Self::capture(state));
            }
            outcome
        };

        match outcome {
            Resolution::Stale => {
                log::debug!("[Emergency] Timer for {} (#{}) no longer current", alert_id, seq)
            }
            Resolution::Superseded => {
                log::info!("[Emergency] Alert {} expired; a newer alert keeps the override", alert_id)
            }
            Resolution::Handover { lane, remaining } => log::warn!(
                "[Emergency] Alert {} expired; handing the override back to {} for {}s",
                alert_id,
                lane,
                remaining
            ),
            Resolution::Cleared => log::info!(
                "[Emergency] Alert {} expired; override deactivated, signals reset",
                alert_id
            ),
        }
    }
}

/// Handle to the intersection's signal controller. Cheap to clone; every clone
/// drives the same intersection.
///
/// All mutations (ticks, count updates, emergency activation and resolution) go
/// through one lock, so each is applied between ticks and never in the middle of one.
#[derive(Clone)]
pub struct TrafficLightController {
    inner: Arc<Inner>,
}

impl TrafficLightController {
    pub fn new(config: SignalConfig) -> Result<Self, ControlError> {
        config.validate()?;
        let intersection = IntersectionState::new(&config);
        let emergency = EmergencyOverride::new();
        let publisher = StatusPublisher::new(StatusSnapshot::capture(&intersection, &emergency));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ControlState {
                    intersection,
                    emergency,
                }),
                publisher,
                observers: Mutex::new(Vec::new()),
                update_loop: Mutex::new(None),
                timers: Mutex::new(JoinSet::new()),
                shutdown: CancellationToken::new(),
                ready: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &SignalConfig {
        &self.inner.config
    }

    pub fn add_observer(&self, observer: Arc<dyn TickObserver>) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Spawns the periodic update loop. Does nothing if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.shutdown.is_cancelled() {
            log::warn!("[TrafficController] start() after shutdown ignored");
            return;
        }
        let mut slot = self.inner.lock_loop();
        if slot.as_ref().is_some_and(|l| !l.task.is_finished()) {
            log::debug!("[TrafficController] update loop already running");
            return;
        }

        let cancel = self.inner.shutdown.child_token();
        let task = tokio::spawn(run_update_loop(Arc::clone(&self.inner), cancel.clone()));
        *slot = Some(UpdateLoop { cancel, task });
        self.inner.ready.store(true, Ordering::SeqCst);
        log::info!(
            "[TrafficController] Update loop started (tick every {}s)",
            self.inner.config.tick_period_secs
        );
    }

    /// Cancels the update loop and waits until it has exited.
    pub async fn stop(&self) {
        let running = self.inner.lock_loop().take();
        if let Some(update_loop) = running {
            update_loop.cancel.cancel();
            if let Err(e) = update_loop.task.await {
                log::error!("[TrafficController] update loop ended abnormally: {}", e);
            }
        }
    }

    /// Stops the loop, cancels pending emergency timers and waits for both. The
    /// controller cannot be restarted afterwards.
    pub async fn shutdown(&self) {
        log::info!("[TrafficController] Shutting down");
        self.inner.shutdown.cancel();
        self.stop().await;

        let mut timers = std::mem::take(&mut *self.inner.lock_timers());
        while timers.join_next().await.is_some() {}
        self.inner.ready.store(false, Ordering::SeqCst);
        log::info!("[TrafficController] Shut down");
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock_loop()
            .as_ref()
            .is_some_and(|l| !l.task.is_finished())
    }

    /// True once the loop has been started, until shutdown.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// Runs a single tick immediately, outside the periodic loop.
    pub fn step(&self) -> Result<(), ControlError> {
        self.inner.tick()
    }

    /// The most recently published snapshot. Served from the publisher, so reading
    /// status never contends with the control loop for the state lock.
    pub fn get_status(&self) -> StatusSnapshot {
        self.inner.publisher.latest()
    }

    /// Receiver that sees a fresh snapshot after every tick or update.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.publisher.subscribe()
    }

    /// Replaces the vehicle counts. They are read the next time a lane is given a
    /// green or red duration; running timers are not changed.
    pub fn update_vehicle_counts(&self, counts: &HashMap<Direction, u32>) {
        let mut state = self.inner.lock_state();
        state.intersection.replace_vehicle_counts(counts);
        state.intersection.last_updated = current_timestamp();
        self.inner.publisher.publish(Inner::capture(&state));
    }

    pub fn apply_count_update(&self, update: &VehicleCountUpdate) -> Result<(), ControlError> {
        let counts = update.counts()?;
        self.update_vehicle_counts(&counts);
        Ok(())
    }

    /// Preempts normal operation: the alert's lane turns green and every other lane
    /// red for the override duration, after which the alert resolves on its own.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn activate(&self, mut alert: EmergencyAlert) -> Result<(), ControlError> {
        if alert.override_duration == 0 {
            return Err(ControlError::invalid_alert("override duration must be positive"));
        }
        if alert.alert_id.trim().is_empty() {
            return Err(ControlError::invalid_alert("alert_id must not be empty"));
        }
        if self.inner.shutdown.is_cancelled() {
            return Err(ControlError::ShutDown);
        }
        alert.override_duration = alert
            .override_duration
            .min(self.inner.config.max_emergency_override_secs);

        let alert_id = alert.alert_id.clone();
        let duration = alert.override_duration;
        let lane = alert.detected_lane;
        let seq = {
            let mut guard = self.inner.lock_state();
            let state = &mut *guard;
            let seq = state
                .emergency
                .activate(&mut state.intersection, alert, Instant::now())?;
            state.intersection.last_updated = current_timestamp();
            self.inner.publisher.publish(Inner::capture(state));
            seq
        };
        log::warn!(
            "[Emergency] Override activated for {} lane by alert {} ({}s)",
            lane,
            alert_id,
            duration
        );
        self.schedule_resolution(alert_id, seq, Duration::from_secs(duration));
        Ok(())
    }

    fn schedule_resolution(&self, alert_id: String, seq: u64, after: Duration) {
        let inner = Arc::clone(&self.inner);
        let cancel = self.inner.shutdown.clone();
        let mut timers = self.inner.lock_timers();
        while timers.try_join_next().is_some() {}
        timers.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(after) => inner.resolve_emergency(&alert_id, seq),
            }
        });
    }
}

async fn run_update_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let period = inner.config.tick_period();
    let backoff = inner.config.error_backoff();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(period) => {}
        }
        match inner.tick() {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                log::error!(
                    "[TrafficController] tick failed ({}): {}; retrying in {:?}",
                    e.as_label(),
                    e,
                    backoff
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(backoff) => {}
                }
            }
            Err(e) => log::error!("[TrafficController] tick failed ({}): {}", e.as_label(), e),
        }
    }
    log::info!("[TrafficController] Update loop stopped");
}
