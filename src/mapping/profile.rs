//! # Profiles
//!
//! A profile maps button and axis indices to actions. The [`ProfileStore`]
//! holds the ordered profile list and the index of the active one;
//! advancing past the last profile wraps to the first.
//!
//! ```
//! use pad_mapper::mapping::profile::{Profile, ProfileStore};
//!
//! let profiles = vec![Profile::new("desktop"), Profile::new("game")];
//! let mut store = ProfileStore::new(profiles, "game");
//!
//! assert_eq!(store.active_index(), 1);
//! store.advance();
//! assert_eq!(store.active_profile().map(|p| p.name()), Some("desktop"));
//! ```

use std::collections::BTreeMap;
use tracing::{info, warn};

use super::action::ActionTarget;
use crate::controller::event::{AxisId, ButtonId};
use crate::controller::gamepad::{axis_label, button_label};
use crate::error::{MapperError, Result};

/// A named set of button and axis mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    buttons: BTreeMap<ButtonId, ActionTarget>,
    axes: BTreeMap<AxisId, ActionTarget>,
}

impl Profile {
    /// Creates an empty profile.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buttons: BTreeMap::new(),
            axes: BTreeMap::new(),
        }
    }

    /// Adds a button mapping (builder style).
    #[must_use]
    pub fn with_button(mut self, button: ButtonId, action: impl Into<ActionTarget>) -> Self {
        self.buttons.insert(button, action.into());
        self
    }

    /// Adds an axis mapping (builder style).
    #[must_use]
    pub fn with_axis(mut self, axis: AxisId, action: impl Into<ActionTarget>) -> Self {
        self.axes.insert(axis, action.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action mapped to `button`, if any.
    pub fn button_action(&self, button: ButtonId) -> Option<&ActionTarget> {
        self.buttons.get(&button)
    }

    /// Action mapped to `axis`, if any.
    pub fn axis_action(&self, axis: AxisId) -> Option<&ActionTarget> {
        self.axes.get(&axis)
    }

    pub fn buttons(&self) -> &BTreeMap<ButtonId, ActionTarget> {
        &self.buttons
    }

    pub fn axes(&self) -> &BTreeMap<AxisId, ActionTarget> {
        &self.axes
    }
}

/// Ordered profiles plus the active index.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    active: usize,
}

impl ProfileStore {
    /// Creates a store with `active_name` selected.
    ///
    /// An unknown name is logged and the first profile is selected.
    pub fn new(profiles: Vec<Profile>, active_name: &str) -> Self {
        let active = match profiles.iter().position(|p| p.name == active_name) {
            Some(index) => index,
            None => {
                if !profiles.is_empty() {
                    warn!(
                        "Profile '{}' not found, falling back to '{}'",
                        active_name, profiles[0].name
                    );
                }
                0
            }
        };
        Self { profiles, active }
    }

    /// The active profile, or `None` when no profiles are configured.
    pub fn active_profile(&self) -> Option<&Profile> {
        self.profiles.get(self.active)
    }

    fn active_profile_mut(&mut self) -> Result<&mut Profile> {
        self.profiles
            .get_mut(self.active)
            .ok_or_else(|| MapperError::InvalidMapping("no profiles configured".to_string()))
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Makes the next profile active, wrapping to the first.
    ///
    /// Returns the newly active profile.
    pub fn advance(&mut self) -> Option<&Profile> {
        if self.profiles.is_empty() {
            warn!("No profiles configured, cannot switch");
            return None;
        }
        self.active = (self.active + 1) % self.profiles.len();
        let profile = &self.profiles[self.active];
        info!("Switched to profile: {}", profile.name);
        Some(profile)
    }

    /// Makes the named profile active.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProfile` if no profile has that name.
    pub fn switch_to(&mut self, name: &str) -> Result<&Profile> {
        let index = self
            .profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| MapperError::UnknownProfile(name.to_string()))?;
        self.active = index;
        info!("Switched to profile: {}", name);
        Ok(&self.profiles[index])
    }

    /// Maps `button` to `action` in the active profile.
    ///
    /// Returns the action previously mapped, if any.
    pub fn add_button_mapping(&mut self, button: ButtonId, action: ActionTarget) -> Result<Option<ActionTarget>> {
        Ok(self.active_profile_mut()?.buttons.insert(button, action))
    }

    /// Maps `axis` to `action` in the active profile.
    ///
    /// Returns the action previously mapped, if any.
    pub fn add_axis_mapping(&mut self, axis: AxisId, action: ActionTarget) -> Result<Option<ActionTarget>> {
        Ok(self.active_profile_mut()?.axes.insert(axis, action))
    }

    /// Removes the mapping of `button` from the active profile.
    ///
    /// Returns the removed action, or `None` if the button was unmapped.
    pub fn remove_button_mapping(&mut self, button: ButtonId) -> Result<Option<ActionTarget>> {
        Ok(self.active_profile_mut()?.buttons.remove(&button))
    }

    /// Removes the mapping of `axis` from the active profile.
    ///
    /// Returns the removed action, or `None` if the axis was unmapped.
    pub fn remove_axis_mapping(&mut self, axis: AxisId) -> Result<Option<ActionTarget>> {
        Ok(self.active_profile_mut()?.axes.remove(&axis))
    }

    /// Lists the active profile's mappings, one per line.
    pub fn describe(&self) -> String {
        let Some(profile) = self.active_profile() else {
            return "No profiles configured.\n".to_string();
        };

        let mut out = format!("Profile: {}\n", profile.name);
        out.push_str("Button Mappings:\n");
        for (button, action) in &profile.buttons {
            let label = button_label(*button).unwrap_or("?");
            out.push_str(&format!("  Button {} ({}): {}\n", button, label, action));
        }
        out.push_str("Axis Mappings:\n");
        for (axis, action) in &profile.axes {
            let label = axis_label(*axis).unwrap_or("?");
            out.push_str(&format!("  Axis {} ({}): {}\n", axis, label, action));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::{BuiltinAction, KeyName};

    fn store() -> ProfileStore {
        ProfileStore::new(
            vec![
                Profile::new("desktop").with_button(0, "Key.space").with_axis(0, "MouseMoveHorizontal"),
                Profile::new("game").with_button(1, "Key.e"),
                Profile::new("media"),
            ],
            "desktop",
        )
    }

    // ==================== Profile Tests ====================

    #[test]
    fn test_profile_lookup() {
        let store = store();
        let profile = store.active_profile().unwrap();

        assert_eq!(profile.button_action(0), Some(&ActionTarget::Key(KeyName::new("space"))));
        assert_eq!(
            profile.axis_action(0),
            Some(&ActionTarget::Builtin(BuiltinAction::MouseMoveHorizontal))
        );
        assert_eq!(profile.button_action(5), None);
    }

    // ==================== Store Tests ====================

    #[test]
    fn test_new_selects_named_profile() {
        let store = ProfileStore::new(vec![Profile::new("a"), Profile::new("b")], "b");
        assert_eq!(store.active_index(), 1);
    }

    #[test]
    fn test_new_unknown_name_falls_back_to_first() {
        let store = ProfileStore::new(vec![Profile::new("a"), Profile::new("b")], "zzz");
        assert_eq!(store.active_index(), 0);
    }

    #[test]
    fn test_empty_store() {
        let mut store = ProfileStore::new(Vec::new(), "any");
        assert!(store.active_profile().is_none());
        assert!(store.advance().is_none());
        assert!(store.add_button_mapping(0, ActionTarget::parse("Key.a")).is_err());
        assert_eq!(store.describe(), "No profiles configured.\n");
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut store = store();
        let names: Vec<String> = (0..3)
            .map(|_| store.advance().unwrap().name().to_string())
            .collect();

        assert_eq!(names, vec!["game", "media", "desktop"]);
        assert_eq!(store.active_index(), 0);
    }

    #[test]
    fn test_switch_to() {
        let mut store = store();
        assert_eq!(store.switch_to("media").unwrap().name(), "media");
        assert_eq!(store.active_index(), 2);
    }

    #[test]
    fn test_switch_to_unknown_profile() {
        let mut store = store();
        let result = store.switch_to("racing");
        assert!(matches!(result, Err(MapperError::UnknownProfile(name)) if name == "racing"));
        assert_eq!(store.active_index(), 0);
    }

    // ==================== Mapping Edit Tests ====================

    #[test]
    fn test_add_and_remove_button_mapping() {
        let mut store = store();
        let previous = store.add_button_mapping(0, ActionTarget::parse("Key.enter")).unwrap();
        assert_eq!(previous, Some(ActionTarget::parse("Key.space")));

        let removed = store.remove_button_mapping(0).unwrap();
        assert_eq!(removed, Some(ActionTarget::parse("Key.enter")));
        assert_eq!(store.remove_button_mapping(0).unwrap(), None);
    }

    #[test]
    fn test_mapping_edits_touch_active_profile_only() {
        let mut store = store();
        store.switch_to("game").unwrap();
        store.add_axis_mapping(4, ActionTarget::parse("Button.left")).unwrap();

        assert_eq!(store.profiles()[1].axis_action(4), Some(&ActionTarget::parse("Button.left")));
        assert_eq!(store.profiles()[0].axis_action(4), None);
        assert_eq!(store.remove_axis_mapping(4).unwrap(), Some(ActionTarget::parse("Button.left")));
    }

    #[test]
    fn test_describe() {
        let text = store().describe();
        assert!(text.starts_with("Profile: desktop\n"));
        assert!(text.contains("Button 0 (South): Key.space"));
        assert!(text.contains("Axis 0 (Left Stick X): MouseMoveHorizontal"));
    }
}
