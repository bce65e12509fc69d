//! Demo configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vidcap_ipc::{CaptureOptions, SourceFormat};

/// Settings for a scripted capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Format the synthetic backend produces.
    pub format: SourceFormat,

    /// Capture interface options.
    pub options: CaptureOptions,

    /// Camera device id used for the first target.
    pub camera_id: String,

    /// Time spent in each scripted step, in milliseconds.
    pub step_millis: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            format: SourceFormat::default(),
            options: CaptureOptions::default(),
            camera_id: "cam0".to_string(),
            step_millis: 500,
        }
    }
}

impl DemoConfig {
    /// Load a config from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Duration of one scripted step.
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DemoConfig =
            serde_json::from_str(r#"{ "camera_id": "usb-1", "format": { "width": 640, "height": 480, "fps": 15 } }"#)
                .unwrap();

        assert_eq!(config.camera_id, "usb-1");
        assert_eq!(config.format.fps, 15);
        assert_eq!(config.step_millis, 500);
        assert_eq!(config.options, CaptureOptions::default());
    }
}
