//! # Tracing Module
//!
//! Environment-aware console logging using the tracing ecosystem.
//! The monitor is usually run in a container or a terminal, so logs go to
//! stdout with ANSI colours only when attached to a TTY. The CLI uses
//! [`init_cli_tracing`] instead, which writes to stderr and defaults to `warn`
//! so command output on stdout stays machine-readable.
//!
//! Configuration comes from environment variables:
//!
//! ```bash
//! # Environment name (development, test, production)
//! export CHAOS_ENV=production
//!
//! # Explicit level or filter directives (falls back to RUST_LOG)
//! export LOG_LEVEL=info
//!
//! # Emit one JSON object per line instead of human-readable output
//! export CHAOS_LOG_FORMAT=json
//! ```

use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Where console logs are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
}

/// Initialize console logging
///
/// Safe to call more than once; only the first call installs a subscriber,
/// and an already-installed global subscriber (e.g. from a test harness) is
/// left in place.
pub fn init_tracing() {
    let environment = get_environment();
    let log_level = get_log_level(&environment);
    install(Output::Stdout, environment, log_level);
}

/// Initialize logging for the command-line front end
///
/// Logs go to stderr so stdout carries only command output. The level is
/// `level` when given, else `LOG_LEVEL`/`RUST_LOG`, else `warn`.
pub fn init_cli_tracing(level: Option<&str>) {
    let log_level = cli_log_level(level, explicit_log_level());
    install(Output::Stderr, get_environment(), log_level);
}

fn install(output: Output, environment: String, log_level: String) {
    TRACING_INITIALIZED.get_or_init(|| {
        let use_json = use_json_format();
        let (console_layer, use_ansi) = match output {
            Output::Stdout => {
                let ansi = IsTerminal::is_terminal(&std::io::stdout());
                (console_layer(std::io::stdout, use_json, ansi, &log_level), ansi)
            }
            Output::Stderr => {
                let ansi = IsTerminal::is_terminal(&std::io::stderr());
                (console_layer(std::io::stderr, use_json, ansi, &log_level), ansi)
            }
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                output = ?output,
                ansi_colors = use_ansi,
                json = use_json,
                "Console logging initialized"
            );
        }
    });
}

fn console_layer<W>(
    writer: W,
    use_json: bool,
    use_ansi: bool,
    log_level: &str,
) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    if use_json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_current_span(false)
            .with_filter(EnvFilter::new(log_level))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(use_ansi)
            .with_filter(EnvFilter::new(log_level))
            .boxed()
    }
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CHAOS_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Level set explicitly through `LOG_LEVEL` or `RUST_LOG`
fn explicit_log_level() -> Option<String> {
    std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .map(|level| level.to_lowercase())
}

/// Get log level based on environment variables or environment defaults
fn get_log_level(environment: &str) -> String {
    explicit_log_level().unwrap_or_else(|| default_level_for(environment).to_string())
}

fn cli_log_level(flag: Option<&str>, explicit: Option<String>) -> String {
    flag.map(str::to_string)
        .or(explicit)
        .unwrap_or_else(|| "warn".to_string())
}

fn default_level_for(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn use_json_format() -> bool {
    std::env::var("CHAOS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log health probe operations
#[macro_export]
macro_rules! log_probe {
    // Full form with service name
    ($level:ident, $operation:expr, service: $service:expr, $($key:ident: $value:expr),* $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            service = %$service,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "PROBE_{} ({})", $operation, $service
        );
    };
    // Simple form - just operation
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "PROBE_{}", $operation
        );
    };
}

/// Log poll cycle operations
#[macro_export]
macro_rules! log_cycle {
    // Simple form - just operation
    ($level:ident, $operation:expr $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "CYCLE_{}", $operation
        );
    };
    // Generic form with additional fields
    ($level:ident, $operation:expr, $($key:ident: $value:expr),+ $(,)?) => {
        tracing::$level!(
            operation = %$operation,
            $($key = ?$value,)*
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "CYCLE_{}", $operation
        );
    };
}
