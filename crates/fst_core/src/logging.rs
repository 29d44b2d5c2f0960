//! Process logging for the `fst` binaries.
//!
//! # Responsibility
//! - Start rolling file logs from the `[logging]` settings section.
//! - Route panics through the logger as single-line events.
//!
//! # Invariants
//! - A process logs to one directory at one level; asking again with the
//!   same settings is a no-op, asking with different settings is an error.
//! - Warnings and errors are duplicated to stderr.
//! - Nothing in here panics.

use crate::config::LoggingSettings;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, LogSpecification, Logger,
    LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "fst";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    program: &'static str,
    level: LevelFilter,
    dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn describe(&self) -> String {
        describe(self.program, self.level, &self.dir)
    }
}

fn describe(program: &str, level: LevelFilter, dir: &Path) -> String {
    format!("{program} at {level} in {}", dir.display())
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    Directory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// Logging already runs with other settings.
    Conflict {
        active: String,
        requested: String,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected off|error|warn|info|debug|trace"
            ),
            Self::Directory { dir, source } => {
                write!(f, "cannot use log directory {}: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "cannot start logger: {err}"),
            Self::Conflict { active, requested } => {
                write!(f, "logging already runs as {active}; refusing {requested}")
            }
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Directory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts file logging for `program` (`fst_cli`, `fst_web`).
///
/// A relative `settings.dir` is resolved against the working directory.
/// Log files are named `fst_<program>*.log` and rotate at 10 MiB, keeping five.
pub fn init_logging(
    program: &'static str,
    settings: &LoggingSettings,
) -> Result<(), LoggingError> {
    let level = parse_level(settings.level.as_str())?;
    let dir = resolve_dir(&settings.dir)?;

    let active = ACTIVE.get_or_try_init(|| start(program, level, &dir))?;
    if active.program != program || active.level != level || active.dir != dir {
        return Err(LoggingError::Conflict {
            active: active.describe(),
            requested: describe(program, level, &dir),
        });
    }
    Ok(())
}

fn start(
    program: &'static str,
    level: LevelFilter,
    dir: &Path,
) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
        dir: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::with(LogSpecification::builder().default(level).build())
        .log_to_file(
            FileSpec::default()
                .directory(dir)
                .basename(LOG_FILE_BASENAME)
                .discriminant(program),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .duplicate_to_stderr(Duplicate::Warn)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_start module=logging status=ok program={program} version={} level={level} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        dir.display()
    );

    Ok(ActiveLogger {
        program,
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

fn resolve_dir(dir: &Path) -> Result<PathBuf, LoggingError> {
    if dir.as_os_str().is_empty() {
        return Err(LoggingError::Directory {
            dir: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty path"),
        });
    }
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|source| LoggingError::Directory {
            dir: dir.to_path_buf(),
            source,
        })
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_string());
        error!(
            "event=panic module=logging status=error location={location} payload={}",
            one_line(payload.as_str(), PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Collapses line breaks and cuts `value` to `limit` characters.
fn one_line(value: &str, limit: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    match flat.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
