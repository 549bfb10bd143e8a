//! The one built-in native function the spec names (spec.md §6 native ABI).

use std::sync::OnceLock;
use std::time::Instant;

use wispc_core::Value;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed since the process started, as an IEEE double — the
/// smallest useful clock a spec with no persisted timers can expose.
pub fn clock(_args: &[Value]) -> Result<Value, String> {
    let start = PROCESS_START.get_or_init(Instant::now);
    Ok(Value::Number(start.elapsed().as_secs_f64()))
}
