/*!
 * Monitoring
 * Tracing subscriber setup and loading-session spans
 */

mod tracer;

pub use tracer::{generate_session_id, init_tracing, SessionSpan, TRACE_JSON_ENV};
