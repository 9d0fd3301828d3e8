//! # Mapping Module
//!
//! Turns classified controller state into action commands.
//!
//! - [`action`]: the action vocabulary parsed from profiles
//! - [`profile`]: named profiles and the active-profile store
//! - [`engine`]: the per-tick dispatch state machine

pub mod action;
pub mod engine;
pub mod profile;
