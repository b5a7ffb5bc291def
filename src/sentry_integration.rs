use failure::Error as FailureError;
use sentry;
use sentry::integrations::panic::register_panic_handler;

#[derive(Debug, Deserialize, Clone)]
pub struct SentryConfig {
    pub dsn: String,
}

pub fn init(sentry_config: Option<&SentryConfig>) -> Option<sentry::internals::ClientInitGuard> {
    sentry_config.map(|config_sentry| {
        info!("Initializing Sentry integration");
        let guard = sentry::init(config_sentry.dsn.as_str());
        if guard.is_enabled() {
            register_panic_handler();
        }
        guard
    })
}

/// Reports an error that ends the process
pub fn capture_fatal(err: &FailureError) {
    sentry::integrations::failure::capture_error(err);
}
