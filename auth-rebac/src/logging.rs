use crate::config::LoggingConfig;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Build the filter: `RUST_LOG` wins, then configured directives
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = format!("auth_rebac={}", config.level);
        if let Some(ref extra) = config.directives {
            directives.push(',');
            directives.push_str(extra);
        }
        directives.into()
    })
}

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed, which makes the
/// call safe to repeat from tests and embedding services.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_level(true),
            )
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_repeatable() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: true,
            directives: Some("auth_rebac::engine=trace".to_string()),
        };
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
