//! # Configuration Module
//!
//! Handles loading, validating and saving configuration from TOML files.
//!
//! Calibration and profile tables are keyed by axis/button index as
//! strings (`"0"`, `"4"`), the way TOML table keys must be written. They
//! are parsed into typed tables once, by [`Config::calibration_table`] and
//! [`Config::profile_store`].

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::controller::calibration::{AxisCalibration, CalibrationTable};
use crate::controller::event::AxisId;
use crate::controller::gamepad::DeviceLayout;
use crate::error::{MapperError, Result};
use crate::executor::virtual_device::OutputSettings;
use crate::executor::ExecutorBackend;
use crate::mapping::action::ActionTarget;
use crate::mapping::engine::JoystickFirePolicy;
use crate::mapping::profile::{Profile, ProfileStore};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the active profile
    #[serde(default)]
    pub current_profile: String,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

/// Controller device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// `/dev/input/eventN` path; empty means auto-detect
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub layout: DeviceLayout,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Dispatch engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    #[serde(default)]
    pub joystick_fire: JoystickFirePolicy,

    /// Distance from the calibrated minimum still treated as "at rest"
    #[serde(default)]
    pub rest_epsilon: f64,
}

/// Action executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub backend: ExecutorBackend,

    #[serde(default = "default_mouse_speed")]
    pub mouse_speed: f64,

    #[serde(default = "default_scroll_step")]
    pub scroll_step: i32,
}

/// Log file configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily log files; empty disables file logging
    #[serde(default)]
    pub dir: String,
}

/// Input recording configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_recording_dir")]
    pub dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Per-axis calibration, keyed by axis index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub axes: BTreeMap<String, AxisCalibration>,
}

/// One mapping profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,

    /// Button index -> action name
    #[serde(default)]
    pub buttons: BTreeMap<String, String>,

    /// Axis index -> action name
    #[serde(default)]
    pub axes: BTreeMap<String, String>,
}

// Default value functions
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_tick_rate_hz() -> u32 { 100 }

fn default_mouse_speed() -> f64 { 30.0 }
fn default_scroll_step() -> i32 { 1 }

fn default_recording_dir() -> String { "./recordings".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

const DEFAULT_PROFILE_NAME: &str = "default";
const DEFAULT_CALIBRATED_AXES: [AxisId; 6] = [0, 1, 2, 3, 4, 5];

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            layout: DeviceLayout::default(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            joystick_fire: JoystickFirePolicy::default(),
            rest_epsilon: 0.0,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            backend: ExecutorBackend::default(),
            mouse_speed: default_mouse_speed(),
            scroll_step: default_scroll_step(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_recording_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            axes: DEFAULT_CALIBRATED_AXES
                .iter()
                .map(|axis| (axis.to_string(), AxisCalibration::default()))
                .collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_profile: DEFAULT_PROFILE_NAME.to_string(),
            device: DeviceConfig::default(),
            engine: EngineConfig::default(),
            executor: ExecutorConfig::default(),
            logging: LoggingConfig::default(),
            recording: RecordingConfig::default(),
            calibration: CalibrationConfig::default(),
            profiles: vec![ProfileConfig {
                name: DEFAULT_PROFILE_NAME.to_string(),
                buttons: BTreeMap::new(),
                axes: BTreeMap::new(),
            }],
        }
    }
}

impl EngineConfig {
    /// Time between ticks.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            mouse_speed: self.mouse_speed,
            scroll_step: self.scroll_step,
        }
    }
}

fn invalid(message: impl Display) -> MapperError {
    MapperError::Config(toml::de::Error::custom(message))
}

fn parse_index(kind: &str, key: &str) -> Result<u8> {
    key.trim()
        .parse::<u8>()
        .map_err(|_| invalid(format!("{} index '{}' must be an integer between 0 and 255", kind, key)))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pad_mapper::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Config` if parsing or validation fails.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration back to a TOML file
    ///
    /// The file is replaced atomically: a sibling temporary file is
    /// written first and then renamed over `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigWrite` if serialization fails or `Io` if the file
    /// cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        let temp = path.with_extension("toml.tmp");
        fs::write(&temp, contents)?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate timing fields
        if self.device.reconnect_interval_ms == 0 || self.device.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.engine.tick_rate_hz == 0 || self.engine.tick_rate_hz > 1000 {
            return Err(invalid("tick_rate_hz must be between 1 and 1000"));
        }

        if !(0.0..=0.1).contains(&self.engine.rest_epsilon) {
            return Err(invalid("rest_epsilon must be between 0.0 and 0.1"));
        }

        // Validate executor tuning
        if !self.executor.mouse_speed.is_finite() || self.executor.mouse_speed <= 0.0 {
            return Err(invalid("mouse_speed must be greater than 0"));
        }

        if self.executor.scroll_step < 1 {
            return Err(invalid("scroll_step must be at least 1"));
        }

        // Validate recording limits
        if self.recording.enabled && self.recording.dir.is_empty() {
            return Err(invalid("recording dir cannot be empty when enabled"));
        }

        if self.recording.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.recording.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        // Validate calibration entries
        for (key, axis) in &self.calibration.axes {
            parse_index("axis", key)?;
            if !(0.0..1.0).contains(&axis.deadzone) {
                return Err(invalid(format!("deadzone for axis {} must be between 0.0 and 1.0", key)));
            }
            if axis.is_degenerate() {
                warn!("Axis {} calibration has min == max ({}); it will read as 0.0", key, axis.min);
            }
        }

        // Validate profiles
        if self.profiles.is_empty() {
            return Err(invalid("at least one profile must be configured"));
        }

        let mut names = BTreeSet::new();
        for profile in &self.profiles {
            if profile.name.is_empty() {
                return Err(invalid("profile name cannot be empty"));
            }
            if !names.insert(profile.name.as_str()) {
                return Err(invalid(format!("duplicate profile name '{}'", profile.name)));
            }
            for key in profile.buttons.keys() {
                parse_index("button", key)?;
            }
            for key in profile.axes.keys() {
                parse_index("axis", key)?;
            }
        }

        if !names.contains(self.current_profile.as_str()) {
            return Err(invalid(format!(
                "current_profile '{}' does not match any profile",
                self.current_profile
            )));
        }

        Ok(())
    }

    /// Calibration table with parsed axis indices.
    ///
    /// Entries with unparseable keys are skipped (they are rejected by
    /// [`Config::validate`]).
    #[must_use]
    pub fn calibration_table(&self) -> CalibrationTable {
        self.calibration
            .axes
            .iter()
            .filter_map(|(key, axis)| Some((key.trim().parse::<AxisId>().ok()?, *axis)))
            .collect()
    }

    /// Replaces the calibration section.
    pub fn set_calibration(&mut self, table: &CalibrationTable) {
        self.calibration.axes = table
            .iter()
            .map(|(axis, calibration)| (axis.to_string(), *calibration))
            .collect();
    }

    /// Profiles with action names parsed, and `current_profile` selected.
    #[must_use]
    pub fn profile_store(&self) -> ProfileStore {
        let profiles = self
            .profiles
            .iter()
            .map(|config| {
                let mut profile = Profile::new(config.name.clone());
                for (key, action) in &config.buttons {
                    if let Ok(button) = key.trim().parse() {
                        profile = profile.with_button(button, ActionTarget::parse(action));
                    }
                }
                for (key, action) in &config.axes {
                    if let Ok(axis) = key.trim().parse() {
                        profile = profile.with_axis(axis, ActionTarget::parse(action));
                    }
                }
                profile
            })
            .collect();
        ProfileStore::new(profiles, &self.current_profile)
    }

    /// Writes profile mappings and the active profile back from `store`.
    pub fn apply_profiles(&mut self, store: &ProfileStore) {
        self.profiles = store
            .profiles()
            .iter()
            .map(|profile| ProfileConfig {
                name: profile.name().to_string(),
                buttons: profile
                    .buttons()
                    .iter()
                    .map(|(button, action)| (button.to_string(), action.to_string()))
                    .collect(),
                axes: profile
                    .axes()
                    .iter()
                    .map(|(axis, action)| (axis.to_string(), action.to_string()))
                    .collect(),
            })
            .collect();
        if let Some(active) = store.active_profile() {
            self.current_profile = active.name().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::action::BuiltinAction;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        let mut config = Config::default();
        config.current_profile = "desktop".to_string();
        config.profiles = vec![
            ProfileConfig {
                name: "desktop".to_string(),
                buttons: BTreeMap::from([
                    ("0".to_string(), "Key.space".to_string()),
                    ("9".to_string(), "SwapProfile".to_string()),
                ]),
                axes: BTreeMap::from([("0".to_string(), "MouseMoveHorizontal".to_string())]),
            },
            ProfileConfig {
                name: "game".to_string(),
                buttons: BTreeMap::from([("1".to_string(), "Key.e".to_string())]),
                axes: BTreeMap::new(),
            },
        ];
        config
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_default_config() {
        assert!(Config::default().validate().is_ok());
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_tick_rate() {
        let mut config = create_valid_config();
        config.engine.tick_rate_hz = 0;
        assert!(config.validate().is_err());

        config.engine.tick_rate_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_reconnect_interval() {
        let mut config = create_valid_config();
        config.device.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_rest_epsilon() {
        let mut config = create_valid_config();
        config.engine.rest_epsilon = 0.5;
        assert!(config.validate().is_err());

        config.engine.rest_epsilon = -0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_executor_tuning() {
        let mut config = create_valid_config();
        config.executor.mouse_speed = 0.0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.executor.scroll_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_recording_limits() {
        let mut config = create_valid_config();
        config.recording.max_records_per_file = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.recording.max_files_to_keep = 0;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.recording.enabled = true;
        config.recording.dir.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_deadzone() {
        let mut config = create_valid_config();
        config.calibration.axes.insert("1".to_string(), AxisCalibration::new(-1.0, 1.0, 1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_calibration_is_not_an_error() {
        let mut config = create_valid_config();
        config.calibration.axes.insert("1".to_string(), AxisCalibration::new(0.3, 0.3, 0.1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_index_keys() {
        let mut config = create_valid_config();
        config.calibration.axes.insert("x".to_string(), AxisCalibration::default());
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.profiles[0].buttons.insert("300".to_string(), "Key.a".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_rules() {
        let mut config = create_valid_config();
        config.profiles.clear();
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.profiles[1].name = "desktop".to_string();
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.current_profile = "missing".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    // ==================== Conversion Tests ====================

    #[test]
    fn test_calibration_table() {
        let mut config = create_valid_config();
        config.calibration.axes.clear();
        config.calibration.axes.insert("0".to_string(), AxisCalibration::new(-0.9, 0.95, 0.1));
        config.calibration.axes.insert("4".to_string(), AxisCalibration::new(-1.0, 1.0, 0.0));

        let table = config.calibration_table();
        assert_eq!(table.axis_ids(), vec![0, 4]);
        assert_eq!(table.get(0).unwrap().max, 0.95);
    }

    #[test]
    fn test_set_calibration() {
        let mut config = create_valid_config();
        let table: CalibrationTable = [(2, AxisCalibration::new(-0.8, 0.8, 0.2))].into_iter().collect();

        config.set_calibration(&table);

        assert_eq!(config.calibration.axes.len(), 1);
        assert_eq!(config.calibration.axes["2"].deadzone, 0.2);
    }

    #[test]
    fn test_profile_store_parses_actions() {
        let store = create_valid_config().profile_store();

        assert_eq!(store.len(), 2);
        assert_eq!(store.active_index(), 0);
        let profile = store.active_profile().unwrap();
        assert_eq!(profile.button_action(9), Some(&ActionTarget::Builtin(BuiltinAction::SwapProfile)));
        assert_eq!(profile.axis_action(0), Some(&ActionTarget::parse("MouseMoveHorizontal")));
    }

    #[test]
    fn test_apply_profiles_round_trip() {
        let mut config = create_valid_config();
        let mut store = config.profile_store();
        store.advance();
        store.add_button_mapping(3, ActionTarget::parse("Button.right")).unwrap();

        config.apply_profiles(&store);

        assert_eq!(config.current_profile, "game");
        assert_eq!(config.profiles[1].buttons["3"], "Button.right");
        assert_eq!(config.profiles[0].buttons["0"], "Key.space");
    }

    // ==================== File Tests ====================

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
current_profile = "main"

[engine]
tick_rate_hz = 60
joystick_fire = "once"

[calibration.axes."0"]
min = -0.98
max = 0.97

[[profiles]]
name = "main"

[profiles.buttons]
"0" = "Key.space"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.engine.tick_rate_hz, 60);
        assert_eq!(config.engine.joystick_fire, JoystickFirePolicy::OncePerExcursion);
        assert_eq!(config.calibration.axes["0"].deadzone, 0.1);
        assert_eq!(config.device.reconnect_interval_ms, 1000);
        assert_eq!(config.executor.backend, ExecutorBackend::Uinput);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"current_profile = [").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(Config::load(temp_file.path()), Err(MapperError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(Config::load("/nonexistent/pad-mapper.toml"), Err(MapperError::Io(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = create_valid_config();
        config.engine.joystick_fire = JoystickFirePolicy::OncePerExcursion;
        config.device.layout = DeviceLayout::Sony;

        config.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();

        assert_eq!(reloaded, config);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_tick_period() {
        let engine = EngineConfig::default();
        assert_eq!(engine.tick_period(), Duration::from_millis(10));
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.current_profile, "desktop");
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.calibration_table().len(), 6);
        assert_eq!(config.profile_store().active_profile().unwrap().name(), "desktop");
    }
}
