//! One-shot `tracing` subscriber setup for the binary and the fixture runner.
//!
//! Logs go to stderr so stdout stays a clean JSON stream.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

static INIT_ONCE: Once = Once::new();

/// `RUST_LOG` wins over `verbose`; 0 = warn, 1 = debug, 2+ = trace.
pub fn init(format: LogFormat, verbose: u8) {
    INIT_ONCE.call_once(|| {
        let fallback = match verbose {
            0 => "json_whens=warn",
            1 => "json_whens=debug",
            _ => "json_whens=trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);
        // a subscriber installed elsewhere (tests, embedding) keeps priority
        let _ = match format {
            LogFormat::Human => builder.finish().try_init(),
            LogFormat::Json => builder.json().finish().try_init(),
        };
    });
}
