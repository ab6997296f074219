//! Direction-tagged logging. Wire input logs through [`incoming!`], wire
//! output through [`outgoing!`], and everything the server does on its own
//! through [`internal!`]; the direction ends up as the event's target
//! (`mailgate::incoming`, ...) so subscribers can filter on it.

use tracing::metadata::LevelFilter;
use tracing_subscriber::{Layer, filter::FilterFn, prelude::*};

#[macro_export]
macro_rules! log {
    (direction = $direction:literal, level = $level:ident, $($arg:tt)+) => {
        $crate::tracing::event!(
            target: concat!("mailgate::", $direction),
            $crate::tracing::Level::$level,
            $($arg)+
        )
    };
}

#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!(direction = "incoming", level = $level, $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::incoming!(level = TRACE, $($arg)+)
    };
}

#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!(direction = "outgoing", level = $level, $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::outgoing!(level = TRACE, $($arg)+)
    };
}

#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!(direction = "internal", level = $level, $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::internal!(level = TRACE, $($arg)+)
    };
}

/// Install a subscriber for hosts that bring none of their own. The level
/// comes from `MAILGATE_LOG` (anything `LevelFilter` parses: error, warn,
/// info, debug, trace, off); unset or unparseable falls back to TRACE in
/// debug builds and INFO otherwise.
pub fn init() {
    let fallback = if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let level = std::env::var("MAILGATE_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(fallback);

    // Release builds only show this crate's targets; debug builds let
    // everything through.
    let only_mailgate = FilterFn::new(|metadata| {
        cfg!(debug_assertions) || metadata.target().starts_with("mailgate")
    });

    let format = tracing_subscriber::fmt::layer()
        .compact()
        .with_ansi(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339());

    tracing_subscriber::registry()
        .with(format.with_filter(level).with_filter(only_mailgate))
        .init();
}
