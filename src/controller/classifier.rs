//! # Input Event Classifier
//!
//! Folds batches of [`RawEvent`]s into a [`ControllerTickState`] without
//! firing any actions.
//!
//! ## Buttons
//!
//! | Event | Condition | Effect |
//! |-------|-----------|--------|
//! | Button down | not pressed, not held | added to `pressed_buttons` |
//! | Button up | held | moved from `held_buttons` to `released_buttons` |
//! | Button up | press not yet dispatched | added to `released_buttons` |
//!
//! ## Axes
//!
//! Each motion is calibrated through the [`CalibrationTable`]. A value
//! equal to the axis's calibrated `min` means the axis returned to rest
//! and its entry is removed from `axis_values`; any other value is stored.
//! The comparison is exact unless a rest epsilon is configured.
//!
//! ## Devices
//!
//! Connected controllers are tracked by id. When the last one goes away
//! the tick state is reset as soon as a controller connects again.
//!
//! ## Usage
//!
//! ```
//! use pad_mapper::controller::calibration::{AxisCalibration, CalibrationTable};
//! use pad_mapper::controller::classifier::{ControllerTickState, InputClassifier};
//! use pad_mapper::controller::event::RawEvent;
//!
//! let mut table = CalibrationTable::new();
//! table.insert(0, AxisCalibration::new(-1.0, 1.0, 0.1));
//!
//! let mut classifier = InputClassifier::new();
//! let mut state = ControllerTickState::new();
//!
//! classifier.classify(
//!     &[RawEvent::ButtonDown { button: 2 }, RawEvent::AxisMotion { axis: 0, value: 0.5 }],
//!     &mut state,
//!     &table,
//! );
//!
//! assert!(state.pressed_buttons.contains(&2));
//! assert_eq!(state.axis_values.get(&0), Some(&0.5));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::calibration::{calculate_axis_value, CalibrationTable};
use super::event::{AxisId, ButtonId, DeviceId, RawEvent};

/// Lifecycle phase of a single button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    /// Not pressed.
    Idle,
    /// Went down; the press has not been dispatched yet.
    Pressed,
    /// Down and already dispatched.
    Held,
    /// Went up; the release has not been dispatched yet.
    Released,
}

/// Per-controller input state carried between ticks.
///
/// `pressed_buttons` and `released_buttons` are edges consumed by the
/// dispatch engine; `held_buttons` and `axis_values` are levels.
/// `previous_axis_value` and `skip_axes` are dispatch bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerTickState {
    /// Buttons that went down since the last dispatch.
    pub pressed_buttons: BTreeSet<ButtonId>,
    /// Buttons currently held after their press was dispatched.
    pub held_buttons: BTreeSet<ButtonId>,
    /// Buttons that went up since the last dispatch.
    pub released_buttons: BTreeSet<ButtonId>,
    /// Current normalized value of each axis away from rest.
    pub axis_values: BTreeMap<AxisId, f64>,
    /// Last value the dispatch engine observed per axis.
    pub previous_axis_value: BTreeMap<AxisId, Option<f64>>,
    /// Axes suppressed from re-firing until they return to zero.
    pub skip_axes: BTreeSet<AxisId>,
}

impl ControllerTickState {
    /// Creates an empty state with every button idle and every axis at rest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all buttons, axes and dispatch bookkeeping.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns the lifecycle phase of `button`.
    ///
    /// A button released in the same batch it was pressed reports
    /// `Pressed` until the press is dispatched.
    #[must_use]
    pub fn button_phase(&self, button: ButtonId) -> ButtonPhase {
        if self.pressed_buttons.contains(&button) {
            ButtonPhase::Pressed
        } else if self.released_buttons.contains(&button) {
            ButtonPhase::Released
        } else if self.held_buttons.contains(&button) {
            ButtonPhase::Held
        } else {
            ButtonPhase::Idle
        }
    }

    /// Returns true if there is anything for the dispatch engine to look at.
    #[must_use]
    pub fn has_activity(&self) -> bool {
        !self.pressed_buttons.is_empty()
            || !self.released_buttons.is_empty()
            || !self.axis_values.is_empty()
            || self
                .previous_axis_value
                .values()
                .any(|v| v.is_some_and(|v| v != 0.0))
    }
}

/// Classifies raw events into tick state.
///
/// Owns only connection bookkeeping; the tick state itself is passed in
/// so one classifier never touches another controller's state.
#[derive(Debug, Default)]
pub struct InputClassifier {
    connected: BTreeSet<DeviceId>,
    reset_pending: bool,
    rest_epsilon: f64,
}

impl InputClassifier {
    /// Creates a classifier using exact rest detection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a classifier that treats axis values within `epsilon` of
    /// the calibrated minimum as "at rest".
    ///
    /// `0.0` keeps the exact comparison.
    #[must_use]
    pub fn with_rest_epsilon(epsilon: f64) -> Self {
        Self {
            rest_epsilon: epsilon.max(0.0),
            ..Self::default()
        }
    }

    /// Number of currently connected controllers.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }

    /// Returns true if `id` is connected.
    #[must_use]
    pub fn is_connected(&self, id: DeviceId) -> bool {
        self.connected.contains(&id)
    }

    /// Applies a batch of events to `state`.
    pub fn classify(
        &mut self,
        events: &[RawEvent],
        state: &mut ControllerTickState,
        calibration: &CalibrationTable,
    ) {
        for event in events {
            self.process_event(event, state, calibration);
        }
    }

    /// Applies a single event to `state`.
    pub fn process_event(
        &mut self,
        event: &RawEvent,
        state: &mut ControllerTickState,
        calibration: &CalibrationTable,
    ) {
        match *event {
            RawEvent::AxisMotion { axis, value } => {
                self.process_axis(axis, value, state, calibration);
            }
            RawEvent::ButtonDown { button } => {
                if !state.pressed_buttons.contains(&button) && !state.held_buttons.contains(&button) {
                    state.pressed_buttons.insert(button);
                }
            }
            RawEvent::ButtonUp { button } => {
                if state.held_buttons.remove(&button) || state.pressed_buttons.contains(&button) {
                    state.released_buttons.insert(button);
                }
            }
            RawEvent::DeviceAdded { id } => self.device_added(id, state),
            RawEvent::DeviceRemoved { id } => self.device_removed(id),
            RawEvent::Unknown { kind, code } => {
                info!("Unknown event type {} (code {}), dropping", kind, code);
            }
        }
    }

    fn process_axis(
        &self,
        axis: AxisId,
        raw: f64,
        state: &mut ControllerTickState,
        calibration: &CalibrationTable,
    ) {
        let Some(entry) = calibration.get(axis) else {
            warn!("No calibration for axis {}, skipping motion", axis);
            return;
        };

        let value = calculate_axis_value(raw, axis, calibration);
        if (value - entry.min).abs() <= self.rest_epsilon {
            state.axis_values.remove(&axis);
        } else {
            state.axis_values.insert(axis, value);
        }
    }

    fn device_added(&mut self, id: DeviceId, state: &mut ControllerTickState) {
        if self.reset_pending {
            debug!("Resetting input state after reconnect");
            state.reset();
            self.reset_pending = false;
        }
        if self.connected.insert(id) {
            info!("Controller {} connected", id);
        }
    }

    fn device_removed(&mut self, id: DeviceId) {
        if !self.connected.remove(&id) {
            warn!("Controller {} disconnected but was not tracked", id);
            return;
        }
        info!("Controller {} disconnected", id);
        if self.connected.is_empty() {
            self.reset_pending = true;
        }
    }
}
