/*!
 * Structured Tracing
 * Subscriber setup and loading-session spans using the tracing crate
 *
 * Features:
 * - Session ids for correlating the log lines of one `load_all` call
 * - JSON-formatted logs for structured parsing
 * - Thread names in every line, so worker activity is attributable
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Environment variable selecting JSON output
pub const TRACE_JSON_ENV: &str = "ASSET_RUNTIME_TRACE_JSON";

/// Sessions slower than this are logged at warn level
const SLOW_SESSION: Duration = Duration::from_secs(2);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - ASSET_RUNTIME_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Generate a unique id for one loading session
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one loading session
pub struct SessionSpan {
    span: Span,
    start: Instant,
    session_id: String,
}

impl SessionSpan {
    pub fn new(operation: &str) -> Self {
        let session_id = generate_session_id();
        let span = span!(
            Level::INFO,
            "session",
            session = %session_id,
            operation = operation,
            assets = tracing::field::Empty,
            failed = tracing::field::Empty,
        );

        debug!(parent: &span, operation, "session started");
        Self {
            span,
            start: Instant::now(),
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record_assets(&self, count: usize) {
        self.span.record("assets", count);
    }

    pub fn record_failed(&self, count: usize) {
        self.span.record("failed", count);
    }

    /// Enter the span on the current thread
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for SessionSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();

        if duration > SLOW_SESSION {
            warn!(
                session = %self.session_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow loading session"
            );
        } else {
            debug!(
                session = %self.session_id,
                duration_ms = duration.as_millis() as u64,
                "session completed"
            );
        }
    }
}
