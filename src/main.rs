//! # Pad Mapper
//!
//! Map game controller buttons and axes to keyboard and mouse actions.
//!
//! # Commands
//!
//! - `run [--dry-run]`: read the controller and execute mapped actions
//! - `list`: print the active profile's mappings
//! - `add (-b ID... | -x ID...) -a NAME`: map inputs to an action
//! - `remove (-b ID... | -x ID...)`: unmap inputs
//! - `map`: bind actions by pressing controller inputs
//! - `switch [NAME]`: select a profile, or the next one when omitted
//! - `check`: list connected controllers
//! - `calibrate`: interactive axis calibration
//! - `log`: record raw controller events until Ctrl+C
//!
//! # Examples
//!
//! ```bash
//! pad-mapper --config config/default.toml add -b 0 1 -a Key.space
//! pad-mapper run --dry-run
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pad_mapper::calibrate::run_calibration;
use pad_mapper::config::{Config, LoggingConfig};
use pad_mapper::controller::gamepad::{list_gamepads, Gamepad};
use pad_mapper::error::MapperError;
use pad_mapper::executor::{ActionExecutor, ExecutorBackend, LogExecutor, VirtualDeviceExecutor};
use pad_mapper::interactive_map::run_interactive_mapping;
use pad_mapper::mapping::action::ActionTarget;
use pad_mapper::mapping::engine::Notice;
use pad_mapper::recorder::InputRecorder;
use pad_mapper::session::{run_session, ControllerSession, SessionEnd};

/// Config file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the daily log files
const LOG_FILE_NAME: &str = "pad-mapper.log";

/// Map game controller inputs to keyboard and mouse actions
#[derive(Parser, Debug)]
#[command(name = "pad-mapper", version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the mapping loop
    Run {
        /// Log actions instead of injecting input
        #[arg(long)]
        dry_run: bool,
    },
    /// List the active profile's mappings
    List,
    /// Map buttons or axes to an action
    Add {
        #[command(flatten)]
        inputs: InputSelection,

        /// Action name, e.g. Key.space or MouseMoveHorizontal
        #[arg(short, long)]
        action: String,
    },
    /// Remove button or axis mappings
    Remove {
        #[command(flatten)]
        inputs: InputSelection,
    },
    /// Bind actions by pressing controller buttons or moving axes
    Map,
    /// Switch to a profile, or the next one when no name is given
    Switch { name: Option<String> },
    /// List connected controllers
    Check,
    /// Calibrate controller axes
    Calibrate,
    /// Record raw controller events until Ctrl+C
    Log,
}

/// Buttons or axes an edit applies to
#[derive(Args, Debug, PartialEq)]
#[group(required = true, multiple = false)]
struct InputSelection {
    /// Button indices
    #[arg(short, long, num_args = 1.., value_name = "ID")]
    buttons: Vec<u8>,

    /// Axis indices
    #[arg(short = 'x', long, num_args = 1.., value_name = "ID")]
    axes: Vec<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging);

    info!("Pad Mapper v{} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Using configuration {}", cli.config.display());

    match cli.command {
        Command::Run { dry_run } => run(&cli.config, config, dry_run).await,
        Command::List => {
            print!("{}", config.profile_store().describe());
            Ok(())
        }
        Command::Add { inputs, action } => add_mappings(&cli.config, config, &inputs, &action),
        Command::Remove { inputs } => remove_mappings(&cli.config, config, &inputs),
        Command::Map => map_inputs(&cli.config, config).await,
        Command::Switch { name } => switch_profile(&cli.config, config, name.as_deref()),
        Command::Check => {
            check_controllers();
            Ok(())
        }
        Command::Calibrate => calibrate(&cli.config, config),
        Command::Log => log_inputs(&config).await,
    }
}

/// Loads `path`, falling back to defaults when the file does not exist yet.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        eprintln!("Config {} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Sets up stderr logging plus an optional daily log file.
///
/// The returned guard must stay alive for buffered file output to be written.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    if logging.dir.is_empty() {
        tracing_subscriber::registry().with(filter).with(stderr_layer).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logging.dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Some(guard)
}

/// Spawns the Ctrl+C listener and returns the shutdown receiver.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                let _ = tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so receivers do not see a shutdown
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}

/// Sleeps for `period`; returns true if shutdown was requested meanwhile.
async fn wait_or_shutdown(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(period) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

fn build_executor(config: &Config, dry_run: bool) -> Result<Box<dyn ActionExecutor>> {
    if dry_run || config.executor.backend == ExecutorBackend::Log {
        info!("Dry run: actions are logged, not executed");
        return Ok(Box::new(LogExecutor::new()));
    }
    let executor = VirtualDeviceExecutor::new(config.executor.output_settings())
        .context("Failed to create virtual keyboard and mouse (is /dev/uinput writable?)")?;
    Ok(Box::new(executor))
}

async fn run(config_path: &Path, mut config: Config, dry_run: bool) -> Result<()> {
    let mut shutdown = shutdown_signal();
    let mut executor = build_executor(&config, dry_run)?;
    let mut recorder = if config.recording.enabled {
        Some(InputRecorder::new(
            &config.recording.dir,
            config.recording.max_records_per_file,
            config.recording.max_files_to_keep,
        )?)
    } else {
        None
    };

    let mut session = ControllerSession::from_config(&config);
    let reconnect = Duration::from_millis(config.device.reconnect_interval_ms);

    info!(
        "Active profile: {}",
        session.profiles().active_profile().map_or("<none>", |p| p.name())
    );
    info!("Press Ctrl+C to exit");

    loop {
        let opened = Gamepad::open(&config.device.path, config.device.layout).and_then(Gamepad::into_events);
        let mut events = match opened {
            Ok(events) => events,
            Err(e) => {
                warn!("{}; retrying in {:?}", e, reconnect);
                if wait_or_shutdown(reconnect, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        let end = run_session(
            &mut session,
            &mut events,
            executor.as_mut(),
            recorder.as_mut(),
            |notice, profiles| {
                if let Notice::ProfileSwitched { .. } = notice {
                    config.apply_profiles(profiles);
                    if let Err(e) = config.save(config_path) {
                        warn!("Failed to save active profile: {}", e);
                    }
                }
            },
            &mut shutdown,
        )
        .await?;

        match end {
            SessionEnd::Cancelled => break,
            SessionEnd::Disconnected => {
                info!("Reconnecting in {:?}", reconnect);
                if wait_or_shutdown(reconnect, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    info!("Pad Mapper stopped");
    Ok(())
}

fn add_mappings(config_path: &Path, mut config: Config, inputs: &InputSelection, action: &str) -> Result<()> {
    let target = ActionTarget::parse(action);
    if let ActionTarget::Custom(name) = &target {
        warn!("'{}' is not a known action; it will be ignored when fired", name);
    }

    let mut store = config.profile_store();
    for &button in &inputs.buttons {
        match store.add_button_mapping(button, target.clone())? {
            Some(previous) => println!("Button {} remapped from {} to {}", button, previous, target),
            None => println!("Button {} mapped to {}", button, target),
        }
    }
    for &axis in &inputs.axes {
        match store.add_axis_mapping(axis, target.clone())? {
            Some(previous) => println!("Axis {} remapped from {} to {}", axis, previous, target),
            None => println!("Axis {} mapped to {}", axis, target),
        }
    }

    config.apply_profiles(&store);
    config.save(config_path)?;
    Ok(())
}

fn remove_mappings(config_path: &Path, mut config: Config, inputs: &InputSelection) -> Result<()> {
    let mut store = config.profile_store();
    for &button in &inputs.buttons {
        match store.remove_button_mapping(button)? {
            Some(action) => println!("Button {} unmapped (was {})", button, action),
            None => println!("Button {} was not mapped", button),
        }
    }
    for &axis in &inputs.axes {
        match store.remove_axis_mapping(axis)? {
            Some(action) => println!("Axis {} unmapped (was {})", axis, action),
            None => println!("Axis {} was not mapped", axis),
        }
    }

    config.apply_profiles(&store);
    config.save(config_path)?;
    Ok(())
}

async fn map_inputs(config_path: &Path, mut config: Config) -> Result<()> {
    let mut events = Gamepad::open(&config.device.path, config.device.layout)?.into_events()?;
    let mut store = config.profile_store();

    let bound = run_interactive_mapping(
        &mut events,
        &config.calibration_table(),
        &mut store,
        io::stdin().lock(),
        io::stdout(),
    )
    .await?;

    if bound == 0 {
        println!("No mappings changed.");
        return Ok(());
    }
    config.apply_profiles(&store);
    config.save(config_path)?;
    println!("Saved {} mappings to {}", bound, config_path.display());
    Ok(())
}

fn check_controllers() {
    let gamepads = list_gamepads();
    if gamepads.is_empty() {
        println!("No controllers detected.");
        return;
    }
    println!("Detected {} controller(s):", gamepads.len());
    for info in &gamepads {
        println!("  {}", info);
    }
}

fn switch_profile(config_path: &Path, mut config: Config, name: Option<&str>) -> Result<()> {
    let mut store = config.profile_store();
    let active = match name {
        Some(name) => store.switch_to(name)?.name().to_string(),
        None => store
            .advance()
            .context("No profiles configured")?
            .name()
            .to_string(),
    };
    println!("Switched to profile: {}", active);

    config.apply_profiles(&store);
    config.save(config_path)?;
    Ok(())
}

fn calibrate(config_path: &Path, mut config: Config) -> Result<()> {
    let gamepad = Gamepad::open(&config.device.path, config.device.layout)?;
    let axes = config.calibration_table().axis_ids();

    let table = run_calibration(&axes, io::stdin().lock(), io::stdout(), |axis| {
        gamepad
            .snapshot_axes()?
            .get(&axis)
            .copied()
            .ok_or_else(|| MapperError::Controller(format!("Axis {} is not reported by the controller", axis)))
    })?;

    config.set_calibration(&table);
    config.save(config_path)?;
    println!("Calibration saved to {}", config_path.display());
    Ok(())
}

async fn log_inputs(config: &Config) -> Result<()> {
    let mut shutdown = shutdown_signal();
    let mut recorder = InputRecorder::new(
        &config.recording.dir,
        config.recording.max_records_per_file,
        config.recording.max_files_to_keep,
    )?;
    let mut events = Gamepad::open(&config.device.path, config.device.layout)?.into_events()?;

    println!("Logging inputs to {}. Press Ctrl+C to stop.", config.recording.dir);

    let mut recorded: u64 = 0;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.next() => match event {
                Some(event) => {
                    if event.is_device_event() {
                        info!("{:?}", event);
                    } else {
                        debug!("{:?}", event);
                    }
                    recorder.record_event(&event)?;
                    recorded += 1;
                }
                None => {
                    warn!("Controller disconnected");
                    break;
                }
            }
        }
    }

    recorder.flush()?;
    info!("Recorded {} events", recorded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    // ==================== CLI Tests ====================

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_config_path() {
        let cli = Cli::try_parse_from(["pad-mapper", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.command, Command::List);
    }

    #[test]
    fn test_parse_run_dry_run() {
        let cli = Cli::try_parse_from(["pad-mapper", "-c", "my.toml", "run", "--dry-run"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("my.toml"));
        assert_eq!(cli.command, Command::Run { dry_run: true });
    }

    #[test]
    fn test_parse_add_buttons() {
        let cli = Cli::try_parse_from(["pad-mapper", "add", "-b", "0", "3", "-a", "Key.space"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Add {
                inputs: InputSelection {
                    buttons: vec![0, 3],
                    axes: vec![],
                },
                action: "Key.space".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_remove_axes() {
        let cli = Cli::try_parse_from(["pad-mapper", "remove", "--axes", "2"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Remove {
                inputs: InputSelection {
                    buttons: vec![],
                    axes: vec![2],
                },
            }
        );
    }

    #[test]
    fn test_add_requires_exactly_one_input_kind() {
        assert!(Cli::try_parse_from(["pad-mapper", "add", "-a", "Key.a"]).is_err());
        assert!(Cli::try_parse_from(["pad-mapper", "add", "-b", "0", "-x", "1", "-a", "Key.a"]).is_err());
    }

    #[test]
    fn test_parse_map_and_check() {
        assert_eq!(Cli::try_parse_from(["pad-mapper", "map"]).unwrap().command, Command::Map);
        assert_eq!(Cli::try_parse_from(["pad-mapper", "check"]).unwrap().command, Command::Check);
    }

    #[test]
    fn test_parse_switch_optional_name() {
        let cli = Cli::try_parse_from(["pad-mapper", "switch"]).unwrap();
        assert_eq!(cli.command, Command::Switch { name: None });

        let cli = Cli::try_parse_from(["pad-mapper", "switch", "game"]).unwrap();
        assert_eq!(cli.command, Command::Switch { name: Some("game".to_string()) });
    }

    // ==================== Command Tests ====================

    fn saved_config(dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.profiles.push(pad_mapper::config::ProfileConfig {
            name: "game".to_string(),
            buttons: Default::default(),
            axes: Default::default(),
        });
        config.save(&path).unwrap();
        path
    }

    #[test]
    fn test_add_and_remove_mappings_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_config(dir.path());
        let inputs = InputSelection {
            buttons: vec![0, 1],
            axes: vec![],
        };

        add_mappings(&path, Config::load(&path).unwrap(), &inputs, "Key.space").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.profiles[0].buttons.get("1").map(String::as_str), Some("Key.space"));

        let inputs = InputSelection {
            buttons: vec![0],
            axes: vec![],
        };
        remove_mappings(&path, config, &inputs).unwrap();
        let config = Config::load(&path).unwrap();
        assert!(!config.profiles[0].buttons.contains_key("0"));
        assert!(config.profiles[0].buttons.contains_key("1"));
    }

    #[test]
    fn test_switch_profile_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = saved_config(dir.path());

        switch_profile(&path, Config::load(&path).unwrap(), None).unwrap();
        assert_eq!(Config::load(&path).unwrap().current_profile, "game");

        switch_profile(&path, Config::load(&path).unwrap(), Some("default")).unwrap();
        assert_eq!(Config::load(&path).unwrap().current_profile, "default");

        assert!(switch_profile(&path, Config::load(&path).unwrap(), Some("missing")).is_err());
    }

    #[tokio::test]
    async fn test_wait_or_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        assert!(!wait_or_shutdown(Duration::from_millis(1), &mut rx).await);

        tx.send(true).unwrap();
        assert!(wait_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }
}
