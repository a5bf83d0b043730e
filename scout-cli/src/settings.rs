//! Settings file handling

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use scout_detect::DeviceProfile;
use serde::{Deserialize, Serialize};

/// On-disk settings
///
/// ```json
/// {
///   "Devices to Scan For": [
///     { "Name": "Meter", "Send": "ID?", "Receive": "METER-OK", "Baudrate": 9600 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Devices the scanner should look for
    #[serde(rename = "Devices to Scan For")]
    pub devices: Vec<DeviceProfile>,
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.name.as_str()) {
                bail!("duplicate device name in settings: {}", device.name);
            }
        }
        Ok(())
    }
}
