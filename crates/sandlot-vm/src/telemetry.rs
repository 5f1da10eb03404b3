//! Logging initialization for embedders.
//!
//! The runtime itself only emits `tracing` events; orchestrator processes
//! call [`init_telemetry`] once to decide where they go.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber with an env-style filter.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_rejected() {
        assert!(init_telemetry("sandlot_vm=notalevel", false).is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_telemetry("info", true);
        assert!(init_telemetry("info", false).is_err());
    }
}
