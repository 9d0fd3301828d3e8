//! # Controller Session
//!
//! One controller's complete input pipeline and the loop that drives it.
//!
//! Each tick:
//!
//! 1. drain the raw events buffered since the last tick
//! 2. classify them into the tick state
//! 3. dispatch the tick state into commands
//! 4. hand the commands to the executor
//!
//! The loop ends when the shutdown signal fires (after the current tick)
//! or when the event source closes (after the remaining events are
//! processed).

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{Config, EngineConfig};
use crate::controller::calibration::CalibrationTable;
use crate::controller::classifier::{ControllerTickState, InputClassifier};
use crate::controller::event::RawEvent;
use crate::controller::gamepad::GamepadEvents;
use crate::error::Result;
use crate::executor::ActionExecutor;
use crate::mapping::engine::{DispatchEngine, DispatchOutput, Notice};
use crate::mapping::profile::ProfileStore;
use crate::recorder::InputRecorder;

/// Asynchronous supplier of raw controller events.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Waits for the next event; `None` once the source is closed.
    async fn next_event(&mut self) -> Option<RawEvent>;
}

impl EventSource for GamepadEvents {
    async fn next_event(&mut self) -> Option<RawEvent> {
        self.next().await
    }
}

/// Why [`run_session`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The shutdown signal fired.
    Cancelled,
    /// The event source closed.
    Disconnected,
}

/// Tick state, classifier, engine, profiles and calibration of one controller.
#[derive(Debug)]
pub struct ControllerSession {
    state: ControllerTickState,
    classifier: InputClassifier,
    engine: DispatchEngine,
    profiles: ProfileStore,
    calibration: CalibrationTable,
    tick_period: Duration,
}

impl ControllerSession {
    /// Creates a session.
    #[must_use]
    pub fn new(profiles: ProfileStore, calibration: CalibrationTable, engine: &EngineConfig) -> Self {
        Self {
            state: ControllerTickState::new(),
            classifier: InputClassifier::with_rest_epsilon(engine.rest_epsilon),
            engine: DispatchEngine::new(engine.joystick_fire),
            profiles,
            calibration,
            tick_period: engine.tick_period(),
        }
    }

    /// Creates a session from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.profile_store(), config.calibration_table(), &config.engine)
    }

    /// Runs one tick over `events`.
    ///
    /// When the last controller disconnects, the events before the
    /// removal are dispatched, everything still held is released and the
    /// tick state is cleared.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_mapper::config::Config;
    /// use pad_mapper::controller::event::RawEvent;
    /// use pad_mapper::session::ControllerSession;
    ///
    /// let mut config = Config::default();
    /// config.profiles[0].buttons.insert("0".to_string(), "Key.space".to_string());
    /// let mut session = ControllerSession::from_config(&config);
    ///
    /// let output = session.tick(&[RawEvent::ButtonDown { button: 0 }]);
    /// assert_eq!(output.commands[0].to_string(), "Key.space = 1");
    /// ```
    pub fn tick(&mut self, events: &[RawEvent]) -> DispatchOutput {
        let mut output = DispatchOutput::default();
        for event in events {
            self.classifier.process_event(event, &mut self.state, &self.calibration);
            if matches!(event, RawEvent::DeviceRemoved { .. }) && self.classifier.connected_count() == 0 {
                output.append(self.engine.dispatch(&mut self.state, &mut self.profiles));
                let releases = self.engine.release_all();
                debug!("Releasing {} held actions after disconnect", releases.len());
                output.commands.extend(releases);
                self.state.reset();
            }
        }

        output.append(self.engine.dispatch(&mut self.state, &mut self.profiles));
        for command in &output.commands {
            debug!("Fire {}", command);
        }
        output
    }

    pub fn state(&self) -> &ControllerTickState {
        &self.state
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Number of controllers the classifier currently sees.
    pub fn connected_controllers(&self) -> usize {
        self.classifier.connected_count()
    }
}

/// Drives `session` from `source` until shutdown or disconnect.
///
/// Commands go to `executor`; execution failures are logged and the loop
/// continues. When `recorder` is given, raw events and commands are
/// recorded. `on_notice` sees every notice together with the profile
/// store as it is after the notice.
///
/// # Errors
///
/// Executor and recorder failures are logged, not returned.
pub async fn run_session<S, E, N>(
    session: &mut ControllerSession,
    source: &mut S,
    executor: &mut E,
    mut recorder: Option<&mut InputRecorder>,
    mut on_notice: N,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd>
where
    S: EventSource,
    E: ActionExecutor + ?Sized,
    N: FnMut(&Notice, &ProfileStore),
{
    let mut ticker = interval(session.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending: Vec<RawEvent> = Vec::new();
    let mut source_open = true;

    info!("Input loop running at {:?} per tick", session.tick_period());

    let end = loop {
        if *shutdown.borrow() {
            break SessionEnd::Cancelled;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break SessionEnd::Cancelled;
                }
            }

            _ = ticker.tick() => {
                let events = std::mem::take(&mut pending);

                if let Some(recorder) = recorder.as_deref_mut() {
                    for event in &events {
                        if let Err(e) = recorder.record_event(event) {
                            warn!("Failed to record event: {}", e);
                        }
                    }
                }

                let output = session.tick(&events);

                for command in &output.commands {
                    if let Some(recorder) = recorder.as_deref_mut() {
                        if let Err(e) = recorder.record_command(command) {
                            warn!("Failed to record command: {}", e);
                        }
                    }
                    if let Err(e) = executor.execute(command) {
                        warn!("Failed to execute {}: {}", command, e);
                    }
                }

                for notice in &output.notices {
                    info!("{}", notice);
                    on_notice(notice, session.profiles());
                }

                if !source_open {
                    break SessionEnd::Disconnected;
                }
            }

            event = source.next_event(), if source_open => {
                match event {
                    Some(event) => pending.push(event),
                    None => {
                        debug!("Event source closed");
                        source_open = false;
                    }
                }
            }
        }
    };

    if let Some(recorder) = recorder {
        if let Err(e) = recorder.flush() {
            warn!("Failed to flush recording: {}", e);
        }
    }

    match end {
        SessionEnd::Cancelled => info!("Input loop stopped"),
        SessionEnd::Disconnected => warn!("Controller disconnected"),
    }
    Ok(end)
}
