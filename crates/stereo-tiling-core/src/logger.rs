//! Stderr logger for pipeline runs.
//!
//! Filtering follows a directive string such as
//! `info,correspondence=debug,stereo_tiling_orchestrator::pool=trace`: one
//! default level plus per-module overrides. A module directive applies to a
//! record when the record target starts with it or has it as one of its
//! `::` segments; the longest matching directive wins.
//!
//! Lines look like `[  12.034s  INFO engine] message`: elapsed time since the
//! logger was installed, level, and the last segment of the record target.
//!
//! ```
//! use log::LevelFilter;
//!
//! stereo_tiling_core::init_with_directives("warn,engine=debug").unwrap();
//! assert_eq!(LevelFilter::Debug, log::max_level());
//! ```

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the directives, read by [`init_from_env`]
/// and by `init_tracing`.
pub const LOG_ENV: &str = "STEREO_TILING_LOG";

#[derive(Clone, Debug, PartialEq)]
struct Directives {
    default: LevelFilter,
    modules: Vec<(String, LevelFilter)>,
}

impl Directives {
    /// Unparsable entries are skipped; a missing default means `info`.
    fn parse(spec: &str) -> Self {
        let mut default = LevelFilter::Info;
        let mut modules = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((module, level)) => {
                    if let Ok(level) = LevelFilter::from_str(level.trim()) {
                        modules.push((module.trim().to_string(), level));
                    }
                }
                None => {
                    if let Ok(level) = LevelFilter::from_str(entry) {
                        default = level;
                    }
                }
            }
        }
        Self { default, modules }
    }

    fn uniform(level: LevelFilter) -> Self {
        Self {
            default: level,
            modules: Vec::new(),
        }
    }

    fn level_for(&self, target: &str) -> LevelFilter {
        self.modules
            .iter()
            .filter(|(m, _)| target.starts_with(m.as_str()) || target.split("::").any(|s| s == m))
            .max_by_key(|(m, _)| m.len())
            .map_or(self.default, |(_, level)| *level)
    }

    fn max_level(&self) -> LevelFilter {
        self.modules
            .iter()
            .map(|(_, level)| *level)
            .fold(self.default, Ord::max)
    }
}

struct PipelineLogger {
    directives: Directives,
    started: Instant,
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for PipelineLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.directives.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<PipelineLogger> = OnceLock::new();

fn install(directives: Directives) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let max = directives.max_level();
    let logger = LOGGER.get_or_init(|| PipelineLogger {
        directives,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(max);
    Ok(())
}

/// Install the logger with one level for every module.
///
/// Only the first successful call installs anything.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    install(Directives::uniform(level))
}

/// Install the logger with a directive string (see the module docs).
pub fn init_with_directives(spec: &str) -> Result<(), log::SetLoggerError> {
    install(Directives::parse(spec))
}

/// Install the logger with the directives of `STEREO_TILING_LOG`, `info`
/// when unset.
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    init_with_directives(&std::env::var(LOG_ENV).unwrap_or_default())
}

/// Install a `tracing` fmt subscriber filtered by `STEREO_TILING_LOG`, then
/// `RUST_LOG`, then `info`. Errors from an installed subscriber are ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_timer(fmt::time::Uptime::default()).finish().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_shortened() {
        assert_eq!("engine", short_target("stereo_tiling_correspondence::engine"));
        assert_eq!("plain", short_target("plain"));
    }

    #[test]
    fn directives_pick_longest_match() {
        let d = Directives::parse(
            "warn, engine=debug ,stereo_tiling_orchestrator=info,stereo_tiling_orchestrator::pool=trace,bogus=loud",
        );
        assert_eq!(LevelFilter::Warn, d.default);
        assert_eq!(3, d.modules.len());
        assert_eq!(LevelFilter::Debug, d.level_for("stereo_tiling_correspondence::engine"));
        assert_eq!(LevelFilter::Info, d.level_for("stereo_tiling_orchestrator::wrapper"));
        assert_eq!(LevelFilter::Trace, d.level_for("stereo_tiling_orchestrator::pool"));
        assert_eq!(LevelFilter::Warn, d.level_for("stereo_tiling_core::grid"));
        assert_eq!(LevelFilter::Trace, d.max_level());
    }

    #[test]
    fn empty_spec_means_info() {
        assert_eq!(Directives::uniform(LevelFilter::Info), Directives::parse(""));
        assert_eq!(LevelFilter::Off, Directives::parse("off").max_level());
    }
}
