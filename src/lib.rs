//! # Pad Mapper Library
//!
//! Map game controller buttons and axes to keyboard and mouse actions.
//!
//! Raw controller events are read through evdev, classified into per-tick
//! button and axis state, dispatched against the active mapping profile and
//! executed through a uinput virtual keyboard and mouse.
//!
//! - [`controller`]: raw events, calibration, classification, evdev device layer
//! - [`mapping`]: action vocabulary, profiles, dispatch engine
//! - [`executor`]: turning dispatched commands into system input
//! - [`session`]: the tick loop tying it together
//! - [`config`], [`calibrate`], [`interactive_map`], [`recorder`]:
//!   configuration, interactive calibration and binding, input recording

pub mod calibrate;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod interactive_map;
pub mod mapping;
pub mod recorder;
pub mod session;
