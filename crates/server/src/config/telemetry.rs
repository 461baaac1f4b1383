use serde::Deserialize;

/// Log output configuration.
#[derive(Debug, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}
