use log::LevelFilter;
use std::sync::Once;
use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter as TracingLevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize the global logger from `RUST_LOG`, defaulting to `info`.
/// This should be called once at the start of the application
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

/// Initialize logger with custom log level
pub fn init_logger_with_level(level: Level) {
    install(EnvFilter::default().add_directive(TracingLevelFilter::from_level(level).into()));
}

/// Initialize logger from configured filter directives, e.g. `debug` or
/// `rust_upstream_pool=debug,info`
pub fn init_logger_with_config(directives: &str) {
    install(build_filter(directives));
}

/// Parse `RUST_LOG`-style directives, falling back to `info` when they are invalid
pub fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives.trim()).unwrap_or_else(|e| {
        eprintln!("Warning: Invalid log filter '{}': {}; using info", directives, e);
        EnvFilter::new("info")
    })
}

fn install(filter: EnvFilter) {
    INIT.call_once(|| {
        FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_level(true)
            .init();

        // Bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }

        // The EnvFilter decides what is emitted
        log::set_max_level(LevelFilter::Trace);
    });
}
