use cfg_if::cfg_if;
pub use log::{debug, error, info, trace, warn};

cfg_if! {
    if #[cfg(feature = "logger_env")] {
        use crate::config::DEFAULT_LOG_LEVEL;

        /// Installs `env_logger` as the `log` backend, defaulting to the crate
        /// log level unless `RUST_LOG` overrides it. Safe to call more than
        /// once; later calls keep whatever backend is already installed.
        ///
        /// An embedded breaker has no say over the process-wide logger, so the
        /// embedding application may skip this and install its own backend.
        pub fn logger_init() {
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(DEFAULT_LOG_LEVEL),
            )
            .try_init()
            .ok();
        }
    } else {
        /// No backend feature selected: transition logs go wherever the
        /// embedding application points the `log` facade.
        pub fn logger_init() {}
    }
}
