//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the config is resolved.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `level` accepts a plain level (`"info"`, `"debug"`, …) or a full
/// `EnvFilter` directive such as `"campus_market=debug,tower=warn"`.
/// `RUST_LOG` is only consulted when `level` does not parse.
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
            AppError::Logger(format!(
                "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
            ))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_info_succeeds_or_already_init() {
        // May already be set by a prior test in the same process — both outcomes are fine.
        match init("info") {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
