//! Stderr logging setup for the command-line tool.

use colored::{Color, Colorize};
use log::Level;

/// Installs a stderr logger with per-level coloring. Call once, before any
/// diagnostics are emitted.
pub fn init(level: log::LevelFilter) {
    // A failed apply means a logger is already installed; keep it.
    let _ = fern::Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            let color = match record.level() {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                Level::Info => Color::Green,
                Level::Debug => Color::Magenta,
                Level::Trace => Color::Blue,
            };
            out.finish(format_args!(
                "{} {}",
                (record.level().to_string().to_lowercase() + ":")
                    .color(color),
                message
            ))
        })
        .chain(std::io::stderr())
        .apply();
}
