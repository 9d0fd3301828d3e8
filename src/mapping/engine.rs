//! # Action Dispatch Engine
//!
//! Walks the classified [`ControllerTickState`] once per tick and fires
//! one [`ActionCommand`] per logical transition.
//!
//! ## Buttons
//!
//! Idle → Pressed → Held → Released → Idle. A press fires `(action, 1)`
//! and the button becomes held; holding fires nothing; a release fires
//! `(action, 0)`. Releases go to the action that was pressed, even if the
//! active profile changed in between.
//!
//! ## Axes
//!
//! | Current | Previous | Effect |
//! |---------|----------|--------|
//! | non-zero | any | fire `(action, value)` unless suppressed |
//! | zero / at rest | non-zero | fire `(action, 0)`, clear suppression |
//! | zero / at rest | zero / none | nothing |
//!
//! Triggers (axes 4 and 5) are suppressed after their first non-zero
//! sample until they return to zero. Sticks follow the
//! [`JoystickFirePolicy`].
//!
//! ## Built-in actions
//!
//! `SwapProfile` advances the [`ProfileStore`] and `PauseInputs` toggles
//! pause; both report a [`Notice`]. While paused only `PauseInputs` and
//! releases are emitted.
//!
//! ## Disconnects
//!
//! [`DispatchEngine::release_all`] releases every latched action so
//! nothing stays held while no controller is connected.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

use super::action::{ActionCommand, ActionTarget, ActionValue, BuiltinAction};
use super::profile::{Profile, ProfileStore};
use crate::controller::calibration::is_trigger;
use crate::controller::classifier::ControllerTickState;
use crate::controller::event::{AxisId, ButtonId};

/// How a deflected stick fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoystickFirePolicy {
    /// Fire every tick while the stick is away from zero.
    #[default]
    #[serde(rename = "continuous")]
    Continuous,
    /// Fire once when the stick leaves zero, then again on return.
    #[serde(rename = "once")]
    OncePerExcursion,
}

/// User-facing status change produced by a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// `SwapProfile` made `name` the active profile.
    ProfileSwitched { name: String },
    /// `PauseInputs` paused dispatch.
    InputsPaused,
    /// `PauseInputs` resumed dispatch.
    InputsResumed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ProfileSwitched { name } => write!(f, "Switched to profile: {}", name),
            Notice::InputsPaused => f.write_str("Inputs paused."),
            Notice::InputsResumed => f.write_str("Inputs resumed."),
        }
    }
}

/// Commands and notices produced by one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutput {
    /// Commands for the executor, in firing order.
    pub commands: Vec<ActionCommand>,
    /// Status changes caused by built-in actions.
    pub notices: Vec<Notice>,
}

impl DispatchOutput {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.notices.is_empty()
    }

    /// Moves `other`'s commands and notices after this output's.
    pub fn append(&mut self, other: DispatchOutput) {
        self.commands.extend(other.commands);
        self.notices.extend(other.notices);
    }
}

/// The per-controller dispatch state machine.
#[derive(Debug, Default)]
pub struct DispatchEngine {
    policy: JoystickFirePolicy,
    paused: bool,
    latched_buttons: BTreeMap<ButtonId, ActionTarget>,
    latched_axes: BTreeMap<AxisId, ActionTarget>,
}

impl DispatchEngine {
    /// Creates an engine with the given stick policy.
    #[must_use]
    pub fn new(policy: JoystickFirePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Returns true while inputs are paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Releases every latched button and axis.
    ///
    /// Returns `(action, 0)` for each action whose press has not been
    /// released yet, buttons first, and forgets the latches. Used when the
    /// last controller goes away so nothing stays held.
    pub fn release_all(&mut self) -> Vec<ActionCommand> {
        let buttons = std::mem::take(&mut self.latched_buttons)
            .into_values()
            .map(|action| ActionCommand::new(action, ActionValue::Edge(false)));
        let axes = std::mem::take(&mut self.latched_axes)
            .into_values()
            .map(|action| ActionCommand::new(action, ActionValue::Axis(0.0)));
        buttons.chain(axes).collect()
    }

    /// Consumes the edges in `state` and returns the resulting commands.
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_mapper::controller::classifier::ControllerTickState;
    /// use pad_mapper::mapping::action::ActionValue;
    /// use pad_mapper::mapping::engine::{DispatchEngine, JoystickFirePolicy};
    /// use pad_mapper::mapping::profile::{Profile, ProfileStore};
    ///
    /// let mut profiles = ProfileStore::new(vec![Profile::new("main").with_button(0, "Key.space")], "main");
    /// let mut engine = DispatchEngine::new(JoystickFirePolicy::Continuous);
    /// let mut state = ControllerTickState::new();
    ///
    /// state.pressed_buttons.insert(0);
    /// let output = engine.dispatch(&mut state, &mut profiles);
    ///
    /// assert_eq!(output.commands.len(), 1);
    /// assert_eq!(output.commands[0].value, ActionValue::Edge(true));
    /// assert!(state.held_buttons.contains(&0));
    /// ```
    pub fn dispatch(&mut self, state: &mut ControllerTickState, profiles: &mut ProfileStore) -> DispatchOutput {
        let fired = {
            let profile = profiles.active_profile();
            if profile.is_none() && state.has_activity() {
                warn!("No active profile, inputs ignored");
            }
            let mut fired = self.dispatch_buttons(state, profile);
            fired.extend(self.dispatch_axes(state, profile));
            fired
        };

        let mut output = DispatchOutput::default();
        for command in fired {
            self.emit(command, profiles, &mut output);
        }
        output
    }

    fn dispatch_buttons(&mut self, state: &mut ControllerTickState, profile: Option<&Profile>) -> Vec<ActionCommand> {
        let mut fired = Vec::new();

        for button in std::mem::take(&mut state.pressed_buttons) {
            match profile.and_then(|p| p.button_action(button)) {
                Some(action) => {
                    fired.push(ActionCommand::new(action.clone(), ActionValue::Edge(true)));
                    self.latched_buttons.insert(button, action.clone());
                }
                None => {
                    debug!("Button {} is not mapped", button);
                    self.latched_buttons.remove(&button);
                }
            }
            state.held_buttons.insert(button);
        }

        for button in std::mem::take(&mut state.released_buttons) {
            state.held_buttons.remove(&button);
            let action = self
                .latched_buttons
                .remove(&button)
                .or_else(|| profile.and_then(|p| p.button_action(button)).cloned());
            if let Some(action) = action {
                fired.push(ActionCommand::new(action, ActionValue::Edge(false)));
            }
        }

        fired
    }

    fn dispatch_axes(&mut self, state: &mut ControllerTickState, profile: Option<&Profile>) -> Vec<ActionCommand> {
        let mut fired = Vec::new();

        // Axes removed at rest still need their release
        let mut axes: BTreeSet<AxisId> = state.axis_values.keys().copied().collect();
        axes.extend(
            state
                .previous_axis_value
                .iter()
                .filter(|(_, previous)| previous.is_some_and(|v| v != 0.0))
                .map(|(axis, _)| *axis),
        );

        for axis in axes {
            let current = state.axis_values.get(&axis).copied().unwrap_or(0.0);
            let was_active = state
                .previous_axis_value
                .get(&axis)
                .copied()
                .flatten()
                .is_some_and(|v| v != 0.0);

            if current != 0.0 {
                let fires = !state.skip_axes.contains(&axis)
                    && (is_trigger(axis) || self.policy == JoystickFirePolicy::Continuous || !was_active);
                if fires {
                    match profile.and_then(|p| p.axis_action(axis)) {
                        Some(action) => {
                            fired.push(ActionCommand::new(action.clone(), ActionValue::Axis(current)));
                            self.latched_axes.insert(axis, action.clone());
                        }
                        None => {
                            debug!("Axis {} is not mapped", axis);
                            self.latched_axes.remove(&axis);
                        }
                    }
                }
                if is_trigger(axis) {
                    state.skip_axes.insert(axis);
                }
                state.previous_axis_value.insert(axis, Some(current));
            } else {
                if was_active {
                    let action = self
                        .latched_axes
                        .remove(&axis)
                        .or_else(|| profile.and_then(|p| p.axis_action(axis)).cloned());
                    if let Some(action) = action {
                        fired.push(ActionCommand::new(action, ActionValue::Axis(0.0)));
                    }
                }
                state.skip_axes.remove(&axis);
                state.axis_values.remove(&axis);
                state.previous_axis_value.insert(axis, None);
            }
        }

        fired
    }

    fn emit(&mut self, command: ActionCommand, profiles: &mut ProfileStore, output: &mut DispatchOutput) {
        let truthy = command.value.is_truthy();

        if command.action.is_builtin(BuiltinAction::PauseInputs) {
            if truthy {
                self.paused = !self.paused;
                output.notices.push(if self.paused {
                    Notice::InputsPaused
                } else {
                    Notice::InputsResumed
                });
            }
            output.commands.push(command);
            return;
        }

        if self.paused && truthy {
            debug!("Inputs paused, dropping {}", command);
            return;
        }

        if truthy && command.action.is_builtin(BuiltinAction::SwapProfile) {
            if let Some(profile) = profiles.advance() {
                output.notices.push(Notice::ProfileSwitched {
                    name: profile.name().to_string(),
                });
            }
        }

        output.commands.push(command);
    }
}
