//! # Raw Controller Events
//!
//! The device-neutral event vocabulary consumed by the classifier.
//!
//! The device layer decodes whatever the OS delivers into these events.
//! Axis values are already scaled to `-1.0..=1.0` but are not yet
//! calibrated or dead-zoned.

use serde::Serialize;

/// Raw axis index as reported by the device layer (0 = left stick X).
pub type AxisId = u8;

/// Raw button index as reported by the device layer (0 = south face button).
pub type ButtonId = u8;

/// Identifier of a connected controller instance.
pub type DeviceId = u32;

/// One decoded input event.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::event::RawEvent;
///
/// let event = RawEvent::AxisMotion { axis: 0, value: 0.5 };
/// assert!(!event.is_device_event());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    /// An axis moved to `value` (`-1.0..=1.0`, uncalibrated).
    AxisMotion { axis: AxisId, value: f64 },
    /// A button went down.
    ButtonDown { button: ButtonId },
    /// A button went up.
    ButtonUp { button: ButtonId },
    /// A controller was connected.
    DeviceAdded { id: DeviceId },
    /// A controller was disconnected.
    DeviceRemoved { id: DeviceId },
    /// Anything the device layer could not decode (`kind`/`code` are the OS values).
    Unknown { kind: u16, code: u16 },
}

impl RawEvent {
    /// Returns true for connect/disconnect events.
    #[must_use]
    pub fn is_device_event(&self) -> bool {
        matches!(
            self,
            RawEvent::DeviceAdded { .. } | RawEvent::DeviceRemoved { .. }
        )
    }
}
