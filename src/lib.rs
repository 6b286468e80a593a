// Data orchestration for the district school dashboards: coordinated metric
// fetches, import-then-refresh, on-demand analyses and insight parsing.

pub mod api;
pub mod error;
pub mod notification;
pub mod parser;
pub mod ranking;
pub mod services;
pub mod state;
pub mod types;

/// Initialize env_logger with `info` as the default filter. `RUST_LOG` overrides.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
