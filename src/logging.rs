//! Terminal logger initialization.
//!
//! All progress, warnings and errors go through the `log` facade; this sets up
//! a coloured terminal logger whose level follows the `-v` flag count.

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode};

/// Crates that are only interesting when something is badly wrong.
const NOISY_CRATES: &[&str] = &["notify", "tower_http", "axum", "hyper", "mio"];

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize the global logger. Safe to call more than once; later calls
/// are ignored.
pub fn initialize(verbosity: u8) {
    let mut builder = ConfigBuilder::new();
    builder
        .set_time_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_level_padding(LevelPadding::Right);
    for target in NOISY_CRATES {
        builder.add_filter_ignore_str(*target);
    }

    // only fails if a logger is already installed
    let _ = TermLogger::init(
        level_for(verbosity),
        builder.build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}
