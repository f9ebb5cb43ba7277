//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity level
#[must_use]
pub const fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info,beacon_voiceprint=info",
        1 => "info,beacon_voiceprint=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Install a fmt subscriber; `RUST_LOG` takes precedence over `verbosity`
///
/// Does nothing if a global subscriber is already installed.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_levels() {
        assert_eq!(filter_for(0), "info,beacon_voiceprint=info");
        assert_eq!(filter_for(9), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(0);
        init(3);
    }
}
