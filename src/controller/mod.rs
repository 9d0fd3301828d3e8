//! # Controller Module
//!
//! Game controller input handling.
//!
//! This module handles:
//! - Controller detection and event decoding via evdev
//! - Axis calibration and deadzones
//! - Classifying raw events into per-tick button and axis state

pub mod calibration;
pub mod classifier;
pub mod event;
pub mod gamepad;
