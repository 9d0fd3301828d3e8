//! # Calibration Module
//!
//! Normalizes raw axis samples and applies deadzones.
//!
//! ## Joysticks
//!
//! Stick axes are mapped from their calibrated `min..=max` range onto
//! `-1.0..=1.0`:
//!
//! `normalized = 2 * (raw - min) / (max - min) - 1`
//!
//! ## Triggers
//!
//! Axes 4 and 5 are analog triggers. They always use the fixed range
//! `-1.0..=1.0` with no deadzone and are mapped onto `0.0..=1.0`:
//!
//! `normalized = (raw - min) / (max - min)`
//!
//! ## Deadzone
//!
//! Values whose magnitude is within the deadzone become exactly `0.0`.
//! Values outside it pass through unchanged; the live range is not
//! rescaled.
//!
//! ## Usage
//!
//! ```
//! use pad_mapper::controller::calibration::{
//!     calculate_axis_value, AxisCalibration, CalibrationTable,
//! };
//!
//! let mut table = CalibrationTable::new();
//! table.insert(0, AxisCalibration::new(-1.0, 1.0, 0.1));
//!
//! assert_eq!(calculate_axis_value(0.05, 0, &table), 0.0);
//! assert_eq!(calculate_axis_value(1.0, 0, &table), 1.0);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use super::event::AxisId;

/// Axis indices treated as analog triggers.
pub const TRIGGER_AXES: [AxisId; 2] = [4, 5];

/// Fixed raw range used for trigger axes.
pub const TRIGGER_MIN: f64 = -1.0;
/// Fixed raw range used for trigger axes.
pub const TRIGGER_MAX: f64 = 1.0;
/// Triggers never use a deadzone.
pub const TRIGGER_DEADZONE: f64 = 0.0;

/// Deadzone applied to stick axes when none is configured.
pub const DEFAULT_STICK_DEADZONE: f64 = 0.1;

fn default_deadzone() -> f64 {
    DEFAULT_STICK_DEADZONE
}

/// Calibrated range and deadzone for a single axis.
///
/// `min` and `max` are raw values recorded during calibration. A
/// calibration with `min == max` is degenerate: normalizing against it
/// yields `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCalibration {
    /// Raw value at the axis minimum.
    pub min: f64,
    /// Raw value at the axis maximum.
    pub max: f64,
    /// Deadzone half-width around zero, in normalized units.
    #[serde(default = "default_deadzone")]
    pub deadzone: f64,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 1.0,
            deadzone: DEFAULT_STICK_DEADZONE,
        }
    }
}

impl AxisCalibration {
    /// Creates a calibration entry.
    #[must_use]
    pub fn new(min: f64, max: f64, deadzone: f64) -> Self {
        Self { min, max, deadzone }
    }

    /// Returns true when the range is empty and normalization is undefined.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// Per-axis calibration lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    axes: BTreeMap<AxisId, AxisCalibration>,
}

impl CalibrationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `axis`.
    pub fn insert(&mut self, axis: AxisId, calibration: AxisCalibration) {
        self.axes.insert(axis, calibration);
    }

    /// Returns the entry for `axis`, if calibrated.
    #[must_use]
    pub fn get(&self, axis: AxisId) -> Option<&AxisCalibration> {
        self.axes.get(&axis)
    }

    /// Iterates entries in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (AxisId, &AxisCalibration)> {
        self.axes.iter().map(|(axis, cal)| (*axis, cal))
    }

    /// Calibrated axis indices in ascending order.
    #[must_use]
    pub fn axis_ids(&self) -> Vec<AxisId> {
        self.axes.keys().copied().collect()
    }

    /// Number of calibrated axes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Returns true when no axis is calibrated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

impl FromIterator<(AxisId, AxisCalibration)> for CalibrationTable {
    fn from_iter<I: IntoIterator<Item = (AxisId, AxisCalibration)>>(iter: I) -> Self {
        Self {
            axes: iter.into_iter().collect(),
        }
    }
}

/// Returns true if `axis` is an analog trigger.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::calibration::is_trigger;
///
/// assert!(is_trigger(4));
/// assert!(is_trigger(5));
/// assert!(!is_trigger(0));
/// ```
#[must_use]
pub fn is_trigger(axis: AxisId) -> bool {
    TRIGGER_AXES.contains(&axis)
}

/// Maps a raw stick value from `min..=max` onto `-1.0..=1.0`.
///
/// Returns `0.0` (and logs an error) when `min == max`.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::calibration::normalize_joystick;
///
/// assert_eq!(normalize_joystick(-1.0, -1.0, 1.0), -1.0);
/// assert_eq!(normalize_joystick(0.0, -1.0, 1.0), 0.0);
/// assert_eq!(normalize_joystick(5.0, -1.0, 1.0), 1.0); // clamped
/// assert_eq!(normalize_joystick(0.3, 0.3, 0.3), 0.0); // degenerate
/// ```
#[must_use]
pub fn normalize_joystick(raw: f64, min: f64, max: f64) -> f64 {
    if min == max {
        error!("Min == max ({}), cannot normalize joystick value", min);
        return 0.0;
    }
    let normalized = 2.0 * (raw - min) / (max - min) - 1.0;
    normalized.clamp(-1.0, 1.0)
}

/// Maps a raw trigger value from `min..=max` onto `0.0..=1.0`.
///
/// Returns `0.0` (and logs an error) when `min == max`.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::calibration::normalize_trigger;
///
/// assert_eq!(normalize_trigger(-1.0, -1.0, 1.0), 0.0);
/// assert_eq!(normalize_trigger(1.0, -1.0, 1.0), 1.0);
/// assert_eq!(normalize_trigger(0.0, -1.0, 1.0), 0.5);
/// ```
#[must_use]
pub fn normalize_trigger(raw: f64, min: f64, max: f64) -> f64 {
    if min == max {
        error!("Min == max ({}), cannot normalize trigger value", min);
        return 0.0;
    }
    let normalized = (raw - min) / (max - min);
    normalized.clamp(0.0, 1.0)
}

/// Zeroes values within the deadzone and passes everything else through.
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::calibration::apply_deadzone;
///
/// assert_eq!(apply_deadzone(0.1, 0.1), 0.0);
/// assert_eq!(apply_deadzone(-0.05, 0.1), 0.0);
/// assert_eq!(apply_deadzone(0.4, 0.1), 0.4);
/// ```
#[must_use]
pub fn apply_deadzone(value: f64, deadzone: f64) -> f64 {
    if value.abs() <= deadzone {
        0.0
    } else {
        value
    }
}

/// Computes the calibrated, dead-zoned value of a raw axis sample.
///
/// Trigger axes use the fixed trigger range; stick axes use their table
/// entry. If `axis` has no entry in `table` the raw value is returned
/// unchanged and an error is logged.
#[must_use]
pub fn calculate_axis_value(raw: f64, axis: AxisId, table: &CalibrationTable) -> f64 {
    let Some(calibration) = table.get(axis) else {
        error!("No calibration entry for axis {}, using raw value", axis);
        return raw;
    };

    if is_trigger(axis) {
        let normalized = normalize_trigger(raw, TRIGGER_MIN, TRIGGER_MAX);
        apply_deadzone(normalized, TRIGGER_DEADZONE)
    } else {
        let normalized = normalize_joystick(raw, calibration.min, calibration.max);
        apply_deadzone(normalized, calibration.deadzone)
    }
}
