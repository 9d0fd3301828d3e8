//! # Actions
//!
//! Action names from profiles are parsed once, when the configuration is
//! loaded, into an [`ActionTarget`]:
//!
//! | Action string | Target |
//! |---------------|--------|
//! | `Key.<name>` | [`ActionTarget::Key`] |
//! | `Button.<name>` | [`ActionTarget::MouseButton`] |
//! | `SwapProfile`, `MouseMoveHorizontal`, ... | [`ActionTarget::Builtin`] |
//! | `""` | [`BuiltinAction::Noop`] |
//! | anything else | [`ActionTarget::Custom`] |
//!
//! ```
//! use pad_mapper::mapping::action::{ActionTarget, BuiltinAction};
//!
//! assert_eq!(ActionTarget::parse("SwapProfile"), ActionTarget::Builtin(BuiltinAction::SwapProfile));
//! assert_eq!(ActionTarget::parse("Key.space").to_string(), "Key.space");
//! ```

use std::fmt;

const KEY_PREFIX: &str = "Key.";
const BUTTON_PREFIX: &str = "Button.";

/// Name of a keyboard key (the part after `Key.`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyName(String);

impl KeyName {
    /// Creates a key name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a mouse button (the part after `Button.`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ButtonName(String);

impl ButtonName {
    /// Creates a mouse button name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the button name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Actions with built-in meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAction {
    MouseMoveHorizontal,
    MouseMoveVertical,
    MouseScrollUp,
    MouseScrollDown,
    MouseScrollLeft,
    MouseScrollRight,
    SwapProfile,
    PauseInputs,
    ArrowKeysHorizontal,
    ArrowKeysVertical,
    TestLog,
    /// Explicitly mapped to nothing.
    Noop,
}

impl BuiltinAction {
    const ALL: [BuiltinAction; 12] = [
        BuiltinAction::MouseMoveHorizontal,
        BuiltinAction::MouseMoveVertical,
        BuiltinAction::MouseScrollUp,
        BuiltinAction::MouseScrollDown,
        BuiltinAction::MouseScrollLeft,
        BuiltinAction::MouseScrollRight,
        BuiltinAction::SwapProfile,
        BuiltinAction::PauseInputs,
        BuiltinAction::ArrowKeysHorizontal,
        BuiltinAction::ArrowKeysVertical,
        BuiltinAction::TestLog,
        BuiltinAction::Noop,
    ];

    /// The action string used in configuration files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BuiltinAction::MouseMoveHorizontal => "MouseMoveHorizontal",
            BuiltinAction::MouseMoveVertical => "MouseMoveVertical",
            BuiltinAction::MouseScrollUp => "MouseScrollUp",
            BuiltinAction::MouseScrollDown => "MouseScrollDown",
            BuiltinAction::MouseScrollLeft => "MouseScrollLeft",
            BuiltinAction::MouseScrollRight => "MouseScrollRight",
            BuiltinAction::SwapProfile => "SwapProfile",
            BuiltinAction::PauseInputs => "PauseInputs",
            BuiltinAction::ArrowKeysHorizontal => "ArrowKeysHorizontal",
            BuiltinAction::ArrowKeysVertical => "ArrowKeysVertical",
            BuiltinAction::TestLog => "TestLog",
            BuiltinAction::Noop => "",
        }
    }

    /// Looks up a built-in action by its configuration name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

/// Where a mapped input goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionTarget {
    /// Press/release a keyboard key.
    Key(KeyName),
    /// Press/release a mouse button.
    MouseButton(ButtonName),
    /// One of the built-in actions.
    Builtin(BuiltinAction),
    /// Any other name; passed to the executor as-is.
    Custom(String),
}

impl ActionTarget {
    /// Parses an action string from a profile.
    ///
    /// Never fails: unrecognized names become [`ActionTarget::Custom`].
    ///
    /// # Examples
    ///
    /// ```
    /// use pad_mapper::mapping::action::{ActionTarget, ButtonName, KeyName};
    ///
    /// assert_eq!(ActionTarget::parse("Key.ctrl"), ActionTarget::Key(KeyName::new("ctrl")));
    /// assert_eq!(ActionTarget::parse("Button.left"), ActionTarget::MouseButton(ButtonName::new("left")));
    /// assert_eq!(ActionTarget::parse("Jump"), ActionTarget::Custom("Jump".to_string()));
    /// ```
    #[must_use]
    pub fn parse(action: &str) -> Self {
        if let Some(builtin) = BuiltinAction::from_name(action) {
            return ActionTarget::Builtin(builtin);
        }
        match (action.strip_prefix(KEY_PREFIX), action.strip_prefix(BUTTON_PREFIX)) {
            (Some(key), _) if !key.is_empty() => ActionTarget::Key(KeyName::new(key)),
            (_, Some(button)) if !button.is_empty() => {
                ActionTarget::MouseButton(ButtonName::new(button))
            }
            _ => ActionTarget::Custom(action.to_string()),
        }
    }

    /// Returns true if this is the given built-in action.
    #[must_use]
    pub fn is_builtin(&self, builtin: BuiltinAction) -> bool {
        matches!(self, ActionTarget::Builtin(b) if *b == builtin)
    }
}

impl From<&str> for ActionTarget {
    fn from(action: &str) -> Self {
        Self::parse(action)
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Key(key) => write!(f, "{}{}", KEY_PREFIX, key.as_str()),
            ActionTarget::MouseButton(button) => write!(f, "{}{}", BUTTON_PREFIX, button.as_str()),
            ActionTarget::Builtin(builtin) => f.write_str(builtin.name()),
            ActionTarget::Custom(name) => f.write_str(name),
        }
    }
}

/// Value carried by a fired action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionValue {
    /// Button edge: `true` on press, `false` on release.
    Edge(bool),
    /// Axis sample: `-1.0..=1.0` for sticks, `0.0..=1.0` for triggers.
    Axis(f64),
}

impl ActionValue {
    /// Press edges and non-zero axis samples are truthy.
    #[must_use]
    pub fn is_truthy(self) -> bool {
        match self {
            ActionValue::Edge(pressed) => pressed,
            ActionValue::Axis(value) => value != 0.0,
        }
    }

    /// The value as a number (edges become `1.0`/`0.0`).
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            ActionValue::Edge(true) => 1.0,
            ActionValue::Edge(false) => 0.0,
            ActionValue::Axis(value) => value,
        }
    }
}

impl fmt::Display for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Edge(pressed) => write!(f, "{}", u8::from(*pressed)),
            ActionValue::Axis(value) => write!(f, "{:.3}", value),
        }
    }
}

/// A fired action, handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub action: ActionTarget,
    pub value: ActionValue,
}

impl ActionCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(action: ActionTarget, value: ActionValue) -> Self {
        Self { action, value }
    }
}

impl fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.action, self.value)
    }
}
