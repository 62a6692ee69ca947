//! Logger setup for hosts that don't install their own.

/// Environment variable holding the filter, in `env_logger` syntax.
pub const LOG_ENV: &str = "DRAWBRIDGE_LOG";

/// Initialise logging. Without `DRAWBRIDGE_LOG` the level is `warn`, or
/// `debug` when `debug` is set. Calling this more than once is harmless.
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let env = env_logger::Env::new().filter_or(LOG_ENV, level);

    let _ = env_logger::Builder::from_env(env).format_timestamp_millis().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init(false);
        init(true);
        log::debug!("logger installed");
    }
}
