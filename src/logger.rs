//! log4rs setup.
//!
//! Three routes: the root logger writes `app.log`, mutations logged under
//! `firestore_driver::audit` go to `audit.log`, and `dev6!` bench lines
//! (`firestore_driver::dev6`) go to `dev6.log` when enabled.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use parking_lot::Mutex;

use crate::utils::devlog::DEV_TARGET;

pub const AUDIT_TARGET: &str = "firestore_driver::audit";
pub const DEFAULT_RETENTION: u32 = 7;
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

static HANDLE: OnceLock<Mutex<Option<Handle>>> = OnceLock::new();

// First call installs the logger, later calls swap its config.
fn install(config: Config) -> Result<(), Box<dyn Error>> {
    let mut slot = HANDLE.get_or_init(|| Mutex::new(None)).lock();
    match slot.as_ref() {
        Some(handle) => handle.set_config(config),
        None => *slot = Some(log4rs::init_config(config)?),
    }
    Ok(())
}

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, name: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&base.join(format!("{name}.{{}}.log")).display().to_string(), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?)
}

/// Routes logging to rolling files under `dir` (current directory if `None`).
///
/// # Errors
/// The directory cannot be created or an appender cannot open its file.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    configure_logging_with_dev(dir, level, retention, false)
}

/// As [`configure_logging`], additionally persisting `dev6!` lines to `dev6.log`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_logging_with_dev(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_dev6: bool,
) -> Result<(), Box<dyn Error>> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&base)?;
    let keep = retention.unwrap_or(DEFAULT_RETENTION).max(1);
    let lvl = parse_level(level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, lvl));
    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build(DEV_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
    };
    install(builder.build(Root::builder().appender("app").build(lvl))?)
}

/// Logs to stderr only; used by the CLI when no log directory is configured.
///
/// # Errors
/// The logger config fails to build.
pub fn configure_console(level: Option<&str>) -> Result<(), Box<dyn Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().additive(false).build(DEV_TARGET, LevelFilter::Off))
        .build(Root::builder().appender("stderr").build(parse_level(level.or(Some("warn")))))?;
    install(config)
}

/// Reads `FIRESTORE_DRIVER_LOG_DIR`, `FIRESTORE_DRIVER_LOG_LEVEL`,
/// `FIRESTORE_DRIVER_LOG_RETENTION` and `FIRESTORE_DRIVER_DEV6`. Without a log
/// directory, logging goes to stderr.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn Error>> {
    let dir = std::env::var("FIRESTORE_DRIVER_LOG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from);
    let level = std::env::var("FIRESTORE_DRIVER_LOG_LEVEL").ok();
    let retention =
        std::env::var("FIRESTORE_DRIVER_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let dev6 = std::env::var("FIRESTORE_DRIVER_DEV6")
        .is_ok_and(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    match dir {
        Some(d) => configure_logging_with_dev(Some(&d), level.as_deref(), retention, dev6),
        None => configure_console(level.as_deref()),
    }
}
