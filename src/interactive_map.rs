//! # Interactive Mapping
//!
//! Binds actions by example: the user presses a controller button or
//! deflects an axis, then types the action it should fire. Each binding
//! goes into the active profile of the given [`ProfileStore`].
//!
//! Axes are detected on their calibrated value, so a trigger resting at
//! its raw minimum or a stick inside its deadzone is not picked up.

use std::io::{BufRead, Write};
use tracing::{info, warn};

use crate::controller::calibration::{calculate_axis_value, CalibrationTable};
use crate::controller::event::{AxisId, ButtonId, RawEvent};
use crate::controller::gamepad::{axis_label, button_label};
use crate::error::{MapperError, Result};
use crate::mapping::action::ActionTarget;
use crate::mapping::profile::ProfileStore;
use crate::session::EventSource;

/// Calibrated deflection an axis must reach to be detected.
pub const AXIS_DETECT_THRESHOLD: f64 = 0.5;

/// A controller input picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedInput {
    Button(ButtonId),
    Axis(AxisId),
}

impl DetectedInput {
    fn describe(self) -> String {
        match self {
            DetectedInput::Button(button) => match button_label(button) {
                Some(label) => format!("Button {} ({})", button, label),
                None => format!("Button {}", button),
            },
            DetectedInput::Axis(axis) => match axis_label(axis) {
                Some(label) => format!("Axis {} ({})", axis, label),
                None => format!("Axis {}", axis),
            },
        }
    }
}

/// Returns the input `event` selects, if any.
///
/// Button presses always select; axis motion selects once its calibrated
/// value reaches [`AXIS_DETECT_THRESHOLD`].
///
/// # Examples
///
/// ```
/// use pad_mapper::controller::calibration::{AxisCalibration, CalibrationTable};
/// use pad_mapper::controller::event::RawEvent;
/// use pad_mapper::interactive_map::{detect_input, DetectedInput};
///
/// let mut table = CalibrationTable::new();
/// table.insert(0, AxisCalibration::new(-1.0, 1.0, 0.1));
///
/// assert_eq!(detect_input(&RawEvent::AxisMotion { axis: 0, value: 0.2 }, &table), None);
/// assert_eq!(
///     detect_input(&RawEvent::AxisMotion { axis: 0, value: -0.9 }, &table),
///     Some(DetectedInput::Axis(0))
/// );
/// ```
#[must_use]
pub fn detect_input(event: &RawEvent, calibration: &CalibrationTable) -> Option<DetectedInput> {
    match *event {
        RawEvent::ButtonDown { button } => Some(DetectedInput::Button(button)),
        RawEvent::AxisMotion { axis, value } => {
            calibration.get(axis)?;
            let value = calculate_axis_value(value, axis, calibration);
            (value.abs() >= AXIS_DETECT_THRESHOLD).then_some(DetectedInput::Axis(axis))
        }
        _ => None,
    }
}

/// Runs the interactive mapping prompts until the user types `done` or
/// input ends.
///
/// Returns the number of bindings made. An empty or `skip` answer leaves
/// the detected input unchanged.
///
/// # Errors
///
/// - `Controller`: the controller went away while waiting for input
/// - `InvalidMapping`: no profile is configured
/// - `Io`: the terminal cannot be read or written
pub async fn run_interactive_mapping<S, R, W>(
    source: &mut S,
    calibration: &CalibrationTable,
    store: &mut ProfileStore,
    mut input: R,
    mut output: W,
) -> Result<usize>
where
    S: EventSource,
    R: BufRead,
    W: Write,
{
    let Some(profile) = store.active_profile() else {
        return Err(MapperError::InvalidMapping("no profiles configured".to_string()));
    };
    writeln!(output, "Mapping buttons and axes for profile '{}'", profile.name())?;

    let mut bound = 0;
    loop {
        write!(output, "Press Enter to map an input, or type 'done' to finish: ")?;
        output.flush()?;
        let Some(choice) = read_answer(&mut input)? else { break };
        if choice.eq_ignore_ascii_case("done") {
            break;
        }

        writeln!(output, "Waiting for controller input...")?;
        output.flush()?;
        let detected = wait_for_input(source, calibration).await?;
        let name = detected.describe();

        write!(output, "Detected {}. Action to bind (empty to skip): ", name)?;
        output.flush()?;
        let Some(answer) = read_answer(&mut input)? else { break };
        if answer.is_empty() || answer.eq_ignore_ascii_case("skip") {
            continue;
        }
        if answer.eq_ignore_ascii_case("done") {
            break;
        }

        let action = ActionTarget::parse(&answer);
        if let ActionTarget::Custom(custom) = &action {
            warn!("'{}' is not a known action; it will be ignored when fired", custom);
        }
        match detected {
            DetectedInput::Button(button) => store.add_button_mapping(button, action.clone())?,
            DetectedInput::Axis(axis) => store.add_axis_mapping(axis, action.clone())?,
        };
        writeln!(output, "Mapped {} to '{}'.", name, action)?;
        info!("Mapped {} to {}", name, action);
        bound += 1;
    }

    Ok(bound)
}

async fn wait_for_input<S: EventSource>(source: &mut S, calibration: &CalibrationTable) -> Result<DetectedInput> {
    loop {
        let Some(event) = source.next_event().await else {
            return Err(MapperError::Controller("controller disconnected while mapping".to_string()));
        };
        if let Some(detected) = detect_input(&event, calibration) {
            return Ok(detected);
        }
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::calibration::AxisCalibration;
    use crate::mapping::profile::Profile;
    use std::collections::VecDeque;

    struct ScriptedSource {
        events: VecDeque<RawEvent>,
    }

    impl EventSource for ScriptedSource {
        async fn next_event(&mut self) -> Option<RawEvent> {
            self.events.pop_front()
        }
    }

    fn source(events: Vec<RawEvent>) -> ScriptedSource {
        ScriptedSource { events: events.into() }
    }

    fn calibration() -> CalibrationTable {
        [0, 1, 4]
            .into_iter()
            .map(|axis| (axis, AxisCalibration::new(-1.0, 1.0, 0.1)))
            .collect()
    }

    fn store() -> ProfileStore {
        ProfileStore::new(vec![Profile::new("desktop").with_button(0, "Key.a")], "desktop")
    }

    // ==================== Detection Tests ====================

    #[test]
    fn test_button_press_is_detected() {
        assert_eq!(
            detect_input(&RawEvent::ButtonDown { button: 3 }, &calibration()),
            Some(DetectedInput::Button(3))
        );
        assert_eq!(detect_input(&RawEvent::ButtonUp { button: 3 }, &calibration()), None);
    }

    #[test]
    fn test_resting_trigger_is_not_detected() {
        let table = calibration();
        assert_eq!(detect_input(&RawEvent::AxisMotion { axis: 4, value: -1.0 }, &table), None);
        assert_eq!(
            detect_input(&RawEvent::AxisMotion { axis: 4, value: 0.5 }, &table),
            Some(DetectedInput::Axis(4))
        );
    }

    #[test]
    fn test_uncalibrated_axis_is_not_detected() {
        assert_eq!(detect_input(&RawEvent::AxisMotion { axis: 3, value: 1.0 }, &calibration()), None);
    }

    #[test]
    fn test_device_events_are_not_detected() {
        assert_eq!(detect_input(&RawEvent::DeviceAdded { id: 1 }, &calibration()), None);
    }

    // ==================== Prompt Tests ====================

    #[tokio::test]
    async fn test_binds_detected_inputs() {
        let mut events = source(vec![
            RawEvent::DeviceAdded { id: 1 },
            RawEvent::AxisMotion { axis: 1, value: 0.05 },
            RawEvent::ButtonDown { button: 2 },
            RawEvent::ButtonUp { button: 2 },
            RawEvent::AxisMotion { axis: 0, value: 0.8 },
        ]);
        let mut store = store();
        let mut output = Vec::<u8>::new();

        let bound = run_interactive_mapping(
            &mut events,
            &calibration(),
            &mut store,
            &b"\nKey.space\n\nMouseMoveHorizontal\ndone\n"[..],
            &mut output,
        )
        .await
        .unwrap();

        assert_eq!(bound, 2);
        let profile = store.active_profile().unwrap();
        assert_eq!(profile.button_action(2), Some(&ActionTarget::parse("Key.space")));
        assert_eq!(profile.axis_action(0), Some(&ActionTarget::parse("MouseMoveHorizontal")));
        assert_eq!(profile.button_action(0), Some(&ActionTarget::parse("Key.a")));

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Mapping buttons and axes for profile 'desktop'"));
        assert!(text.contains("Mapped Button 2 (West) to 'Key.space'."));
        assert!(text.contains("Mapped Axis 0 (Left Stick X) to 'MouseMoveHorizontal'."));
    }

    #[tokio::test]
    async fn test_skip_leaves_mapping_unchanged() {
        let mut events = source(vec![RawEvent::ButtonDown { button: 0 }]);
        let mut store = store();

        let bound = run_interactive_mapping(&mut events, &calibration(), &mut store, &b"\nskip\n"[..], Vec::<u8>::new())
            .await
            .unwrap();

        assert_eq!(bound, 0);
        assert_eq!(
            store.active_profile().unwrap().button_action(0),
            Some(&ActionTarget::parse("Key.a"))
        );
    }

    #[tokio::test]
    async fn test_done_before_any_input() {
        let mut events = source(vec![]);
        let mut store = store();

        let bound = run_interactive_mapping(&mut events, &calibration(), &mut store, &b"done\n"[..], Vec::<u8>::new())
            .await
            .unwrap();
        assert_eq!(bound, 0);
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_is_an_error() {
        let mut events = source(vec![RawEvent::DeviceRemoved { id: 1 }]);
        let mut store = store();

        let result = run_interactive_mapping(&mut events, &calibration(), &mut store, &b"\n"[..], Vec::<u8>::new()).await;
        assert!(matches!(result, Err(MapperError::Controller(_))));
    }

    #[tokio::test]
    async fn test_no_profiles_is_an_error() {
        let mut events = source(vec![]);
        let mut store = ProfileStore::new(Vec::new(), "missing");

        let result = run_interactive_mapping(&mut events, &calibration(), &mut store, &b""[..], Vec::<u8>::new()).await;
        assert!(matches!(result, Err(MapperError::InvalidMapping(_))));
    }
}
