//! # Virtual Device Executor
//!
//! Injects keyboard and mouse input through a uinput virtual device.
//!
//! | Action | Truthy value | Falsy value |
//! |--------|--------------|-------------|
//! | `Key.<name>` | key down | key up |
//! | `Button.<name>` | mouse button down | mouse button up |
//! | `MouseMoveHorizontal` / `Vertical` | `REL_X` / `REL_Y` by `value * mouse_speed` | nothing |
//! | `MouseScroll*` | `REL_WHEEL` / `REL_HWHEEL` by `scroll_step` | nothing |
//! | `ArrowKeysHorizontal` / `Vertical` | arrow down beyond ±0.5 | arrows up |
//! | `TestLog` | logged | logged |
//!
//! `SwapProfile`, `PauseInputs` and the empty action are handled by the
//! dispatch engine and produce no input here.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::keys::{key_code, mouse_button, supported_keys};
use super::ActionExecutor;
use crate::error::{MapperError, Result};
use crate::mapping::action::{ActionCommand, ActionTarget, ActionValue, BuiltinAction};

/// Name of the virtual device as seen by the system.
pub const DEVICE_NAME: &str = "pad-mapper virtual input";

const ARROW_THRESHOLD: f64 = 0.5;

/// One low-level input to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualInput {
    Key { key: Key, pressed: bool },
    Move { axis: RelativeAxisType, amount: i32 },
}

impl VirtualInput {
    fn to_event(self) -> InputEvent {
        match self {
            VirtualInput::Key { key, pressed } => InputEvent::new(EventType::KEY, key.code(), i32::from(pressed)),
            VirtualInput::Move { axis, amount } => InputEvent::new(EventType::RELATIVE, axis.0, amount),
        }
    }
}

/// Pointer tuning for translated commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSettings {
    /// Pixels per tick at full stick deflection.
    pub mouse_speed: f64,
    /// Wheel detents per scroll action.
    pub scroll_step: i32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            mouse_speed: 30.0,
            scroll_step: 1,
        }
    }
}

/// Translates a command into the inputs it produces.
///
/// # Examples
///
/// ```
/// use evdev::Key;
/// use pad_mapper::executor::virtual_device::{translate, OutputSettings, VirtualInput};
/// use pad_mapper::mapping::action::{ActionCommand, ActionTarget, ActionValue};
///
/// let command = ActionCommand::new(ActionTarget::parse("Key.space"), ActionValue::Edge(true));
/// assert_eq!(
///     translate(&command, &OutputSettings::default()),
///     vec![VirtualInput::Key { key: Key::KEY_SPACE, pressed: true }]
/// );
/// ```
#[must_use]
pub fn translate(command: &ActionCommand, settings: &OutputSettings) -> Vec<VirtualInput> {
    let value = command.value;
    let truthy = value.is_truthy();

    match &command.action {
        ActionTarget::Key(name) => match key_code(name.as_str()) {
            Some(key) => vec![VirtualInput::Key { key, pressed: truthy }],
            None => {
                warn!("Unknown key name '{}'", name.as_str());
                Vec::new()
            }
        },
        ActionTarget::MouseButton(name) => match mouse_button(name.as_str()) {
            Some(key) => vec![VirtualInput::Key { key, pressed: truthy }],
            None => {
                warn!("Unknown mouse button '{}'", name.as_str());
                Vec::new()
            }
        },
        ActionTarget::Builtin(builtin) => translate_builtin(*builtin, value, settings),
        ActionTarget::Custom(name) => {
            warn!("No action mapped for '{}'", name);
            Vec::new()
        }
    }
}

fn translate_builtin(builtin: BuiltinAction, value: ActionValue, settings: &OutputSettings) -> Vec<VirtualInput> {
    let truthy = value.is_truthy();
    let scroll = |axis: RelativeAxisType, direction: i32| {
        if truthy {
            vec![VirtualInput::Move { axis, amount: direction * settings.scroll_step }]
        } else {
            Vec::new()
        }
    };

    match builtin {
        BuiltinAction::MouseMoveHorizontal => mouse_move(RelativeAxisType::REL_X, value, settings),
        BuiltinAction::MouseMoveVertical => mouse_move(RelativeAxisType::REL_Y, value, settings),
        BuiltinAction::MouseScrollUp => scroll(RelativeAxisType::REL_WHEEL, 1),
        BuiltinAction::MouseScrollDown => scroll(RelativeAxisType::REL_WHEEL, -1),
        BuiltinAction::MouseScrollLeft => scroll(RelativeAxisType::REL_HWHEEL, -1),
        BuiltinAction::MouseScrollRight => scroll(RelativeAxisType::REL_HWHEEL, 1),
        BuiltinAction::ArrowKeysHorizontal => arrow_keys(value.as_f64(), Key::KEY_LEFT, Key::KEY_RIGHT),
        BuiltinAction::ArrowKeysVertical => arrow_keys(value.as_f64(), Key::KEY_UP, Key::KEY_DOWN),
        BuiltinAction::TestLog => {
            info!("Test Log: value={}", value);
            Vec::new()
        }
        BuiltinAction::SwapProfile | BuiltinAction::PauseInputs | BuiltinAction::Noop => Vec::new(),
    }
}

fn mouse_move(axis: RelativeAxisType, value: ActionValue, settings: &OutputSettings) -> Vec<VirtualInput> {
    let amount = (value.as_f64() * settings.mouse_speed).round() as i32;
    if amount == 0 {
        return Vec::new();
    }
    vec![VirtualInput::Move { axis, amount }]
}

fn arrow_keys(value: f64, negative: Key, positive: Key) -> Vec<VirtualInput> {
    if value > ARROW_THRESHOLD {
        vec![
            VirtualInput::Key { key: positive, pressed: true },
            VirtualInput::Key { key: negative, pressed: false },
        ]
    } else if value < -ARROW_THRESHOLD {
        vec![
            VirtualInput::Key { key: negative, pressed: true },
            VirtualInput::Key { key: positive, pressed: false },
        ]
    } else {
        vec![
            VirtualInput::Key { key: negative, pressed: false },
            VirtualInput::Key { key: positive, pressed: false },
        ]
    }
}

/// Tracks which keys are down so only real transitions are emitted.
#[derive(Debug, Default)]
pub struct KeyTracker {
    down: BTreeSet<u16>,
}

impl KeyTracker {
    /// Drops repeated presses and releases of keys that are not down.
    pub fn filter(&mut self, inputs: Vec<VirtualInput>) -> Vec<VirtualInput> {
        inputs
            .into_iter()
            .filter(|input| match *input {
                VirtualInput::Key { key, pressed: true } => self.down.insert(key.code()),
                VirtualInput::Key { key, pressed: false } => self.down.remove(&key.code()),
                VirtualInput::Move { .. } => true,
            })
            .collect()
    }

    /// Keys currently held down.
    pub fn held(&self) -> impl Iterator<Item = Key> + '_ {
        self.down.iter().map(|code| Key::new(*code))
    }
}

/// uinput-backed keyboard and mouse.
pub struct VirtualDeviceExecutor {
    device: VirtualDevice,
    settings: OutputSettings,
    keys: KeyTracker,
}

impl VirtualDeviceExecutor {
    /// Creates the virtual device.
    ///
    /// # Errors
    ///
    /// Returns `Executor` if `/dev/uinput` is not accessible.
    pub fn new(settings: OutputSettings) -> Result<Self> {
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for axis in [
            RelativeAxisType::REL_X,
            RelativeAxisType::REL_Y,
            RelativeAxisType::REL_WHEEL,
            RelativeAxisType::REL_HWHEEL,
        ] {
            axes.insert(axis);
        }

        let device = VirtualDeviceBuilder::new()
            .and_then(|builder| builder.name(DEVICE_NAME).with_keys(&supported_keys()))
            .and_then(|builder| builder.with_relative_axes(&axes))
            .and_then(|builder| builder.build())
            .map_err(|e| MapperError::Executor(format!("Failed to create uinput device: {}", e)))?;

        info!("Created virtual input device '{}'", DEVICE_NAME);
        Ok(Self {
            device,
            settings,
            keys: KeyTracker::default(),
        })
    }

    fn emit(&mut self, inputs: &[VirtualInput]) -> Result<()> {
        let events: Vec<InputEvent> = inputs.iter().map(|input| input.to_event()).collect();
        self.device
            .emit(&events)
            .map_err(|e| MapperError::Executor(format!("uinput emit failed: {}", e)))
    }
}

impl ActionExecutor for VirtualDeviceExecutor {
    fn execute(&mut self, command: &ActionCommand) -> Result<()> {
        let inputs = self.keys.filter(translate(command, &self.settings));
        if inputs.is_empty() {
            return Ok(());
        }
        debug!("{} -> {:?}", command, inputs);
        self.emit(&inputs)
    }
}

impl Drop for VirtualDeviceExecutor {
    fn drop(&mut self) {
        let releases: Vec<VirtualInput> = self
            .keys
            .held()
            .map(|key| VirtualInput::Key { key, pressed: false })
            .collect();
        if !releases.is_empty() {
            if let Err(e) = self.emit(&releases) {
                warn!("Failed to release held keys: {}", e);
            }
        }
    }
}
