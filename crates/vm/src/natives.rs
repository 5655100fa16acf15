//! Built-in native functions installed into every fresh `Vm`.

use std::time::{SystemTime, UNIX_EPOCH};

use rlox_core::Value;

/// Seconds since the Unix epoch, standing in for wall-clock elapsed
/// time the way a `clock() / CLOCKS_PER_SEC` native would in C.
pub fn clock_native(_argc: usize, _args: &[Value]) -> Result<Value, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| "System clock is before the Unix epoch.".to_string())?;
    Ok(Value::Number(elapsed.as_secs_f64()))
}
