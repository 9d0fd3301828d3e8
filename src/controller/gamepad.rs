//! # Gamepad Device Module
//!
//! Finds a game controller under `/dev/input`, reads its axis ranges and
//! translates evdev events into [`RawEvent`]s.
//!
//! ## Controller Detection
//!
//! With no explicit path, the first `/dev/input/event*` device (in path
//! order) that reports `BTN_SOUTH` and at least one absolute axis is used.
//!
//! ## Axis Indices
//!
//! | Index | Standard | Sony (hid-sony) |
//! |-------|----------|-----------------|
//! | 0 | `ABS_X` | `ABS_X` |
//! | 1 | `ABS_Y` | `ABS_Y` |
//! | 2 | `ABS_RX` | `ABS_Z` |
//! | 3 | `ABS_RY` | `ABS_RZ` |
//! | 4 (L2) | `ABS_Z` | `ABS_RX` |
//! | 5 (R2) | `ABS_RZ` | `ABS_RY` |
//!
//! ## Button Indices
//!
//! South 0, East 1, West 2, North 3, Select 4, Mode 5, Start 6, L3 7,
//! R3 8, L1 9, R1 10, d-pad up/down/left/right 11-14, digital L2 15,
//! digital R2 16. Hat switches are reported as the d-pad buttons.

use evdev::{AbsoluteAxisType, Device, EventStream, EventType, InputEvent, InputEventKind, Key};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::calibration::normalize_joystick;
use super::event::{AxisId, ButtonId, DeviceId, RawEvent};
use crate::error::{MapperError, Result};

const DPAD_UP: ButtonId = 11;
const DPAD_DOWN: ButtonId = 12;
const DPAD_LEFT: ButtonId = 13;
const DPAD_RIGHT: ButtonId = 14;

/// Which evdev axis codes correspond to which axis indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceLayout {
    /// xpad / hid-playstation ordering: triggers on `ABS_Z`/`ABS_RZ`.
    #[default]
    Standard,
    /// Legacy hid-sony ordering: right stick on `ABS_Z`/`ABS_RZ`.
    Sony,
}

impl DeviceLayout {
    /// Returns the axis index for an evdev absolute axis, if mapped.
    ///
    /// # Examples
    ///
    /// ```
    /// use evdev::AbsoluteAxisType;
    /// use pad_mapper::controller::gamepad::DeviceLayout;
    ///
    /// assert_eq!(DeviceLayout::Standard.axis_index(AbsoluteAxisType::ABS_Z), Some(4));
    /// assert_eq!(DeviceLayout::Sony.axis_index(AbsoluteAxisType::ABS_Z), Some(2));
    /// assert_eq!(DeviceLayout::Standard.axis_index(AbsoluteAxisType::ABS_HAT0X), None);
    /// ```
    #[must_use]
    pub fn axis_index(self, axis: AbsoluteAxisType) -> Option<AxisId> {
        let index = match (self, axis) {
            (_, AbsoluteAxisType::ABS_X) => 0,
            (_, AbsoluteAxisType::ABS_Y) => 1,
            (DeviceLayout::Standard, AbsoluteAxisType::ABS_RX) => 2,
            (DeviceLayout::Standard, AbsoluteAxisType::ABS_RY) => 3,
            (DeviceLayout::Standard, AbsoluteAxisType::ABS_Z) => 4,
            (DeviceLayout::Standard, AbsoluteAxisType::ABS_RZ) => 5,
            (DeviceLayout::Sony, AbsoluteAxisType::ABS_Z) => 2,
            (DeviceLayout::Sony, AbsoluteAxisType::ABS_RZ) => 3,
            (DeviceLayout::Sony, AbsoluteAxisType::ABS_RX) => 4,
            (DeviceLayout::Sony, AbsoluteAxisType::ABS_RY) => 5,
            _ => return None,
        };
        Some(index)
    }

    /// The evdev axes this layout maps, in axis-index order.
    #[must_use]
    pub fn mapped_axes(self) -> [AbsoluteAxisType; 6] {
        match self {
            DeviceLayout::Standard => [
                AbsoluteAxisType::ABS_X,
                AbsoluteAxisType::ABS_Y,
                AbsoluteAxisType::ABS_RX,
                AbsoluteAxisType::ABS_RY,
                AbsoluteAxisType::ABS_Z,
                AbsoluteAxisType::ABS_RZ,
            ],
            DeviceLayout::Sony => [
                AbsoluteAxisType::ABS_X,
                AbsoluteAxisType::ABS_Y,
                AbsoluteAxisType::ABS_Z,
                AbsoluteAxisType::ABS_RZ,
                AbsoluteAxisType::ABS_RX,
                AbsoluteAxisType::ABS_RY,
            ],
        }
    }
}

/// Returns the button index for an evdev key, if it is a gamepad button.
#[must_use]
pub fn button_index(key: Key) -> Option<ButtonId> {
    let index = match key {
        Key::BTN_SOUTH => 0,
        Key::BTN_EAST => 1,
        Key::BTN_WEST => 2,
        Key::BTN_NORTH => 3,
        Key::BTN_SELECT => 4,
        Key::BTN_MODE => 5,
        Key::BTN_START => 6,
        Key::BTN_THUMBL => 7,
        Key::BTN_THUMBR => 8,
        Key::BTN_TL => 9,
        Key::BTN_TR => 10,
        Key::BTN_DPAD_UP => DPAD_UP,
        Key::BTN_DPAD_DOWN => DPAD_DOWN,
        Key::BTN_DPAD_LEFT => DPAD_LEFT,
        Key::BTN_DPAD_RIGHT => DPAD_RIGHT,
        Key::BTN_TL2 => 15,
        Key::BTN_TR2 => 16,
        _ => return None,
    };
    Some(index)
}

/// Human-readable name of a button index.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::gamepad::button_label;
///
/// assert_eq!(button_label(0), Some("South"));
/// assert_eq!(button_label(99), None);
/// ```
#[must_use]
pub fn button_label(button: ButtonId) -> Option<&'static str> {
    const LABELS: [&str; 17] = [
        "South", "East", "West", "North", "Select", "Mode", "Start", "Left Stick",
        "Right Stick", "Left Shoulder", "Right Shoulder", "D-pad Up", "D-pad Down",
        "D-pad Left", "D-pad Right", "Left Trigger", "Right Trigger",
    ];
    LABELS.get(usize::from(button)).copied()
}

/// Human-readable name of an axis index.
#[must_use]
pub fn axis_label(axis: AxisId) -> Option<&'static str> {
    const LABELS: [&str; 6] = [
        "Left Stick X", "Left Stick Y", "Right Stick X", "Right Stick Y", "Left Trigger",
        "Right Trigger",
    ];
    LABELS.get(usize::from(axis)).copied()
}

/// Raw `(minimum, maximum)` reported by the device, per evdev axis code.
pub type AxisRanges = BTreeMap<u16, (i32, i32)>;

/// Translates one evdev event into zero or more raw events.
///
/// Synchronization reports and key autorepeat produce nothing. Absolute
/// axes are scaled from their device range onto `-1.0..=1.0`; an axis
/// without a known range passes its raw value through clamped.
///
/// # Examples
///
/// ```
/// use evdev::{EventType, InputEvent, Key};
/// use pad_mapper::controller::event::RawEvent;
/// use pad_mapper::controller::gamepad::{translate_event, AxisRanges, DeviceLayout};
///
/// let event = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1);
/// let raw = translate_event(&event, DeviceLayout::Standard, &AxisRanges::new());
/// assert_eq!(raw, vec![RawEvent::ButtonDown { button: 0 }]);
/// ```
#[must_use]
pub fn translate_event(event: &InputEvent, layout: DeviceLayout, ranges: &AxisRanges) -> Vec<RawEvent> {
    match event.kind() {
        InputEventKind::Synchronization(_) => Vec::new(),
        InputEventKind::Key(key) => match (button_index(key), event.value()) {
            (Some(button), 1) => vec![RawEvent::ButtonDown { button }],
            (Some(button), 0) => vec![RawEvent::ButtonUp { button }],
            (Some(_), _) => Vec::new(),
            (None, _) => vec![unknown(event)],
        },
        InputEventKind::AbsAxis(AbsoluteAxisType::ABS_HAT0X) => {
            translate_hat(event.value(), DPAD_LEFT, DPAD_RIGHT)
        }
        InputEventKind::AbsAxis(AbsoluteAxisType::ABS_HAT0Y) => {
            translate_hat(event.value(), DPAD_UP, DPAD_DOWN)
        }
        InputEventKind::AbsAxis(axis) => match layout.axis_index(axis) {
            Some(index) => vec![RawEvent::AxisMotion {
                axis: index,
                value: scale_axis(event.value(), ranges.get(&axis.0).copied()),
            }],
            None => vec![unknown(event)],
        },
        _ => vec![unknown(event)],
    }
}

fn translate_hat(value: i32, negative: ButtonId, positive: ButtonId) -> Vec<RawEvent> {
    match value.signum() {
        -1 => vec![RawEvent::ButtonDown { button: negative }],
        1 => vec![RawEvent::ButtonDown { button: positive }],
        _ => vec![
            RawEvent::ButtonUp { button: negative },
            RawEvent::ButtonUp { button: positive },
        ],
    }
}

fn scale_axis(value: i32, range: Option<(i32, i32)>) -> f64 {
    match range {
        Some((min, max)) if min != max => normalize_joystick(f64::from(value), f64::from(min), f64::from(max)),
        _ => f64::from(value).clamp(-1.0, 1.0),
    }
}

fn unknown(event: &InputEvent) -> RawEvent {
    RawEvent::Unknown {
        kind: event.event_type().0,
        code: event.code(),
    }
}

/// Derives a device id from an `/dev/input/eventN` path (`N`), or `0`.
#[must_use]
pub fn device_id_from_path(path: &Path) -> DeviceId {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("event"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn is_gamepad(device: &Device) -> bool {
    let has_south = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH));
    let has_axes = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.iter().next().is_some());
    has_south && has_axes
}

/// A gamepad found under `/dev/input`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadInfo {
    pub path: PathBuf,
    pub name: String,
    /// Absolute axes reported, hats included.
    pub axis_count: usize,
    /// Keys that map to a button index.
    pub button_count: usize,
}

impl fmt::Display for GamepadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} axes, {} buttons)",
            self.path.display(),
            self.name,
            self.axis_count,
            self.button_count
        )
    }
}

/// Lists every connected gamepad in path order.
#[must_use]
pub fn list_gamepads() -> Vec<GamepadInfo> {
    sorted_devices()
        .into_iter()
        .filter(|(_, device)| is_gamepad(device))
        .map(|(path, device)| GamepadInfo {
            name: device.name().unwrap_or("unnamed").to_string(),
            axis_count: device.supported_absolute_axes().map_or(0, |axes| axes.iter().count()),
            button_count: device
                .supported_keys()
                .map_or(0, |keys| keys.iter().filter(|key| button_index(*key).is_some()).count()),
            path,
        })
        .collect()
}

// Path order keeps selection stable when several controllers are plugged in
fn sorted_devices() -> Vec<(PathBuf, Device)> {
    let mut devices: Vec<(PathBuf, Device)> = evdev::enumerate().collect();
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    devices
}

/// An opened game controller.
pub struct Gamepad {
    device: Device,
    device_path: String,
    device_id: DeviceId,
    layout: DeviceLayout,
    ranges: AxisRanges,
}

impl Gamepad {
    /// Opens the controller at `path`, or auto-detects one when `path` is empty.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: auto-detection found no gamepad
    /// - `Controller`: the device could not be opened or queried
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pad_mapper::controller::gamepad::{DeviceLayout, Gamepad};
    ///
    /// let gamepad = Gamepad::open("", DeviceLayout::Standard)?;
    /// println!("Connected to controller at: {}", gamepad.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, layout: DeviceLayout) -> Result<Self> {
        let (path, device) = if path.is_empty() {
            Self::detect()?
        } else {
            let device = Device::open(path)
                .map_err(|e| MapperError::Controller(format!("Failed to open {}: {}", path, e)))?;
            (PathBuf::from(path), device)
        };

        let ranges = Self::read_ranges(&device)?;
        let device_path = path.to_string_lossy().to_string();
        info!(
            "Opened controller '{}' at {}",
            device.name().unwrap_or("unnamed"),
            device_path
        );

        Ok(Self {
            device,
            device_id: device_id_from_path(&path),
            device_path,
            layout,
            ranges,
        })
    }

    fn detect() -> Result<(PathBuf, Device)> {
        for (path, device) in sorted_devices() {
            debug!(
                "Found input device: {} ({})",
                path.display(),
                device.name().unwrap_or("unnamed")
            );
            if is_gamepad(&device) {
                return Ok((path, device));
            }
        }

        Err(MapperError::ControllerNotFound)
    }

    fn read_ranges(device: &Device) -> Result<AxisRanges> {
        let Some(supported) = device.supported_absolute_axes() else {
            return Ok(AxisRanges::new());
        };
        let state = device
            .get_abs_state()
            .map_err(|e| MapperError::Controller(format!("Failed to read axis ranges: {}", e)))?;

        let ranges = supported
            .iter()
            .filter_map(|axis| {
                let info = state.get(usize::from(axis.0))?;
                Some((axis.0, (info.minimum, info.maximum)))
            })
            .collect();
        Ok(ranges)
    }

    /// The `/dev/input/eventN` path this controller was opened from.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Id reported in `DeviceAdded`/`DeviceRemoved` events.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Human-readable device name.
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Current scaled value of every mapped axis, keyed by axis index.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device state cannot be read.
    pub fn snapshot_axes(&self) -> Result<BTreeMap<AxisId, f64>> {
        let state = self
            .device
            .get_abs_state()
            .map_err(|e| MapperError::Controller(format!("Failed to read axis state: {}", e)))?;

        let snapshot = self
            .layout
            .mapped_axes()
            .into_iter()
            .filter_map(|axis| {
                let range = self.ranges.get(&axis.0).copied()?;
                let index = self.layout.axis_index(axis)?;
                let info = state.get(usize::from(axis.0))?;
                Some((index, scale_axis(info.value, Some(range))))
            })
            .collect();
        Ok(snapshot)
    }

    /// Converts the controller into an async stream of raw events.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device cannot be switched to non-blocking mode.
    pub fn into_events(self) -> Result<GamepadEvents> {
        let stream = self
            .device
            .into_event_stream()
            .map_err(|e| MapperError::Controller(format!("Failed to open event stream: {}", e)))?;

        let mut pending = VecDeque::new();
        pending.push_back(RawEvent::DeviceAdded { id: self.device_id });

        Ok(GamepadEvents {
            stream: Some(stream),
            pending,
            device_id: self.device_id,
            layout: self.layout,
            ranges: self.ranges,
        })
    }
}

/// Async event stream of one controller.
///
/// Starts with `DeviceAdded`; yields `DeviceRemoved` once when the device
/// goes away and `None` after that.
pub struct GamepadEvents {
    stream: Option<EventStream>,
    pending: VecDeque<RawEvent>,
    device_id: DeviceId,
    layout: DeviceLayout,
    ranges: AxisRanges,
}

impl GamepadEvents {
    /// Waits for the next raw event.
    pub async fn next(&mut self) -> Option<RawEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let stream = self.stream.as_mut()?;
            match stream.next_event().await {
                Ok(event) => {
                    self.pending
                        .extend(translate_event(&event, self.layout, &self.ranges));
                }
                Err(e) => {
                    warn!("Controller {} read failed: {}", self.device_id, e);
                    self.stream = None;
                    return Some(RawEvent::DeviceRemoved { id: self.device_id });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    fn abs(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    fn ranges() -> AxisRanges {
        let mut ranges = AxisRanges::new();
        ranges.insert(AbsoluteAxisType::ABS_X.0, (0, 255));
        ranges.insert(AbsoluteAxisType::ABS_Z.0, (0, 255));
        ranges
    }

    // ==================== Layout Tests ====================

    #[test]
    fn test_layouts_map_six_distinct_axes() {
        for layout in [DeviceLayout::Standard, DeviceLayout::Sony] {
            let indices: Vec<_> = layout
                .mapped_axes()
                .into_iter()
                .map(|axis| layout.axis_index(axis))
                .collect();
            assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(3), Some(4), Some(5)]);
        }
    }

    #[test]
    fn test_layout_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            layout: DeviceLayout,
        }
        let parsed: Wrapper = toml::from_str("layout = \"sony\"").unwrap();
        assert_eq!(parsed.layout, DeviceLayout::Sony);
    }

    // ==================== Translation Tests ====================

    #[test]
    fn test_translate_button_press_and_release() {
        let layout = DeviceLayout::Standard;
        assert_eq!(
            translate_event(&key(Key::BTN_EAST, 1), layout, &ranges()),
            vec![RawEvent::ButtonDown { button: 1 }]
        );
        assert_eq!(
            translate_event(&key(Key::BTN_EAST, 0), layout, &ranges()),
            vec![RawEvent::ButtonUp { button: 1 }]
        );
    }

    #[test]
    fn test_translate_ignores_autorepeat() {
        assert!(translate_event(&key(Key::BTN_SOUTH, 2), DeviceLayout::Standard, &ranges()).is_empty());
    }

    #[test]
    fn test_translate_non_gamepad_key_is_unknown() {
        let events = translate_event(&key(Key::KEY_A, 1), DeviceLayout::Standard, &ranges());
        assert_eq!(
            events,
            vec![RawEvent::Unknown { kind: EventType::KEY.0, code: Key::KEY_A.code() }]
        );
    }

    #[test]
    fn test_translate_axis_scales_to_unit_range() {
        let layout = DeviceLayout::Standard;
        assert_eq!(
            translate_event(&abs(AbsoluteAxisType::ABS_X, 0), layout, &ranges()),
            vec![RawEvent::AxisMotion { axis: 0, value: -1.0 }]
        );
        assert_eq!(
            translate_event(&abs(AbsoluteAxisType::ABS_Z, 255), layout, &ranges()),
            vec![RawEvent::AxisMotion { axis: 4, value: 1.0 }]
        );
    }

    #[test]
    fn test_translate_axis_without_range_is_clamped() {
        let events = translate_event(&abs(AbsoluteAxisType::ABS_Y, 7), DeviceLayout::Standard, &ranges());
        assert_eq!(events, vec![RawEvent::AxisMotion { axis: 1, value: 1.0 }]);
    }

    #[test]
    fn test_translate_sony_layout() {
        let events = translate_event(&abs(AbsoluteAxisType::ABS_Z, 0), DeviceLayout::Sony, &ranges());
        assert_eq!(events, vec![RawEvent::AxisMotion { axis: 2, value: -1.0 }]);
    }

    #[test]
    fn test_translate_hat_to_dpad() {
        let layout = DeviceLayout::Standard;
        assert_eq!(
            translate_event(&abs(AbsoluteAxisType::ABS_HAT0Y, -1), layout, &ranges()),
            vec![RawEvent::ButtonDown { button: DPAD_UP }]
        );
        assert_eq!(
            translate_event(&abs(AbsoluteAxisType::ABS_HAT0X, 1), layout, &ranges()),
            vec![RawEvent::ButtonDown { button: DPAD_RIGHT }]
        );
        assert_eq!(
            translate_event(&abs(AbsoluteAxisType::ABS_HAT0X, 0), layout, &ranges()),
            vec![
                RawEvent::ButtonUp { button: DPAD_LEFT },
                RawEvent::ButtonUp { button: DPAD_RIGHT },
            ]
        );
    }

    #[test]
    fn test_translate_unmapped_axis_is_unknown() {
        let events = translate_event(&abs(AbsoluteAxisType::ABS_WHEEL, 3), DeviceLayout::Standard, &ranges());
        assert!(matches!(events.as_slice(), [RawEvent::Unknown { .. }]));
    }

    #[test]
    fn test_translate_sync_is_dropped() {
        let sync = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        assert!(translate_event(&sync, DeviceLayout::Standard, &ranges()).is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(button_label(DPAD_LEFT), Some("D-pad Left"));
        assert_eq!(button_label(16), Some("Right Trigger"));
        assert_eq!(axis_label(4), Some("Left Trigger"));
        assert_eq!(axis_label(6), None);
    }

    #[test]
    fn test_device_id_from_path() {
        assert_eq!(device_id_from_path(Path::new("/dev/input/event17")), 17);
        assert_eq!(device_id_from_path(Path::new("/dev/input/js0")), 0);
    }

    #[test]
    fn test_gamepad_info_display() {
        let info = GamepadInfo {
            path: PathBuf::from("/dev/input/event5"),
            name: "Wireless Controller".to_string(),
            axis_count: 8,
            button_count: 13,
        };
        assert_eq!(info.to_string(), "/dev/input/event5: Wireless Controller (8 axes, 13 buttons)");
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_list_gamepads_with_real_hardware() {
        let gamepads = list_gamepads();
        assert!(!gamepads.is_empty());
        assert!(gamepads.iter().all(|info| info.button_count > 0));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let gamepad = Gamepad::open("", DeviceLayout::Standard).expect("Controller not found");
        assert!(gamepad.device_path().starts_with("/dev/input/event"));
        assert!(!gamepad.snapshot_axes().unwrap().is_empty());
    }

    // Integration test - only runs with real hardware
    #[tokio::test]
    #[ignore]
    async fn test_event_stream_with_real_hardware() {
        let gamepad = Gamepad::open("", DeviceLayout::Standard).expect("Controller not found");
        let id = gamepad.device_id();
        let mut events = gamepad.into_events().unwrap();

        assert_eq!(events.next().await, Some(RawEvent::DeviceAdded { id }));
        println!("Press any button...");
        let event = events.next().await;
        println!("Received event: {:?}", event);
        assert!(event.is_some());
    }
}
