use serde::Serialize;

/// Logs `value` as pretty JSON at debug level. Serialization is skipped
/// entirely when debug logging is off.
pub(crate) fn debug_json<T>(label: &str, value: &T)
where
    T: Serialize,
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    tracing::debug!("{label}:\n{pretty_json}");
}
