// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Parse a `trace|debug|info|warn|error` level, case-insensitive.
/// Falls back to INFO if the level is absent or invalid.
pub fn parse_level(log_level: Option<&str>) -> Level {
    log_level
        .and_then(|s| s.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// Install the global fmt subscriber at the requested level.
///
/// Returns `false` when a subscriber was already installed; that one is
/// kept and the attempt is logged at debug level.
pub fn init_logging(log_level: Option<&str>) -> bool {
    let level = parse_level(log_level);
    match FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            debug!("Logging already initialised, keeping it ({}); requested level {}", e, level);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("debug")), Level::DEBUG);
        assert_eq!(parse_level(Some("WARN")), Level::WARN);
        assert_eq!(parse_level(Some(" trace ")), Level::TRACE);
        assert_eq!(parse_level(Some("loud")), Level::INFO);
        assert_eq!(parse_level(None), Level::INFO);
    }

    #[test]
    fn test_second_init_keeps_existing_subscriber() {
        init_logging(Some("error"));
        assert!(!init_logging(Some("debug")));
    }
}
