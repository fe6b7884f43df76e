//! Tracing initialization.
//!
//! - `LOG_LEVEL` holds the filter directives (default `info`).
//! - `LOG_FORMAT=json` switches to structured JSON lines.
//!
//! Logs go to stderr; stdout is left for command output.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info,nejm_scrap=info,reqwest=warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
