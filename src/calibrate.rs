//! # Interactive Calibration
//!
//! Walks the user through each axis: move to the minimum and press Enter,
//! move to the maximum and press Enter, then enter a deadzone (empty input
//! keeps the default of `0.05` for triggers and `0.1` for sticks).
//!
//! Input, output and sampling are injected so the flow runs against real
//! stdin/stdout and a controller in the binary, and against buffers in
//! tests.

use std::io::{BufRead, Write};
use tracing::warn;

use crate::controller::calibration::{is_trigger, AxisCalibration, CalibrationTable};
use crate::controller::event::AxisId;
use crate::error::Result;

/// Default deadzone offered for trigger axes.
pub const DEFAULT_TRIGGER_DEADZONE_PROMPT: f64 = 0.05;
/// Default deadzone offered for stick axes.
pub const DEFAULT_STICK_DEADZONE_PROMPT: f64 = 0.1;

/// Runs the calibration prompts for `axes`.
///
/// `sample` returns the current raw value of an axis.
///
/// # Errors
///
/// Returns `Io` if input ends early or the terminal cannot be written,
/// or whatever error `sample` returns.
///
/// # Examples
///
/// ```
/// use pad_mapper::calibrate::run_calibration;
///
/// let input = b"\n\n0.2\n";
/// let mut output = Vec::<u8>::new();
/// let mut samples = vec![0.9, -0.9].into_iter();
///
/// let table = run_calibration(&[0], &input[..], &mut output, |_| Ok(samples.next().unwrap()))?;
///
/// let axis = table.get(0).unwrap();
/// assert_eq!((axis.min, axis.max, axis.deadzone), (-0.9, 0.9, 0.2));
/// # Ok::<(), pad_mapper::error::MapperError>(())
/// ```
pub fn run_calibration<R, W, F>(axes: &[AxisId], mut input: R, mut output: W, mut sample: F) -> Result<CalibrationTable>
where
    R: BufRead,
    W: Write,
    F: FnMut(AxisId) -> Result<f64>,
{
    writeln!(output, "Starting calibration...")?;
    let mut table = CalibrationTable::new();

    for &axis in axes {
        writeln!(output, "Calibrating axis {}. Move to minimum position and press Enter.", axis)?;
        output.flush()?;
        read_line(&mut input)?;
        let first = sample(axis)?;
        writeln!(output, "Minimum value for axis {}: {:.3}", axis, first)?;

        writeln!(output, "Move axis {} to maximum position and press Enter.", axis)?;
        output.flush()?;
        read_line(&mut input)?;
        let second = sample(axis)?;
        writeln!(output, "Maximum value for axis {}: {:.3}", axis, second)?;

        let (min, max) = if first <= second { (first, second) } else { (second, first) };
        if min == max {
            warn!("Axis {} did not move during calibration", axis);
            writeln!(output, "Warning: axis {} reported the same value at both ends.", axis)?;
        }

        let deadzone = prompt_deadzone(axis, &mut input, &mut output)?;
        table.insert(axis, AxisCalibration::new(min, max, deadzone));
    }

    writeln!(output, "Calibration complete.")?;
    Ok(table)
}

fn prompt_deadzone<R: BufRead, W: Write>(axis: AxisId, input: &mut R, output: &mut W) -> Result<f64> {
    let default = if is_trigger(axis) {
        DEFAULT_TRIGGER_DEADZONE_PROMPT
    } else {
        DEFAULT_STICK_DEADZONE_PROMPT
    };

    loop {
        write!(output, "Deadzone for axis {} [{}]: ", axis, default)?;
        output.flush()?;
        let line = read_line(input)?;
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<f64>() {
            Ok(value) if (0.0..1.0).contains(&value) => return Ok(value),
            _ => writeln!(output, "Enter a number between 0.0 and 1.0.")?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "calibration input ended").into());
    }
    Ok(line)
}
