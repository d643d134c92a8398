//! Structured logging setup: the same `log` facade used throughout this
//! workspace, wired to `env_logger` since a standalone daemon has no
//! desktop shell to supply a GUI-integrated log sink.

use std::io::Write;

/// Initializes the global logger with `level` as the default filter,
/// overridable by `RUST_LOG` (env_logger's own convention, left intact so
/// operators can still reach for the familiar knob).
pub fn init(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(parse_level(level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} [{}] {}",
            chrono::Utc::now().to_rfc3339(),
            record.level(),
            record.target(),
            record.args()
        )
    });
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    }
    let _ = builder.try_init();
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("garbage"), log::LevelFilter::Info);
        assert_eq!(parse_level("DEBUG"), log::LevelFilter::Debug);
    }
}
