//! Session options and config file loading.

use std::path::Path;

use racing_wheel_hid_g29_protocol::{
    Autocenter, InputDecoder, MIN_RANGE_DEGREES, Platform, RelayTransform, ReportLayout,
};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Options fixed for the lifetime of one connection.
///
/// ```yaml
/// autocenter: [0.4, 0.6]   # false | true | [strength, rate]
/// debug: true
/// range: 540               # degrees
/// platform: windows        # relay framing override
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
    pub autocenter: Autocenter,
    /// Log every report and event at `info` instead of `debug`/`trace`.
    pub debug: bool,
    /// Logical rotation range in degrees. `None` uses the full hardware range.
    pub range: Option<u16>,
    /// Overrides the host platform when picking the relay transform.
    pub platform: Option<Platform>,
    /// Overrides the built-in input report layout.
    pub layout: Option<ReportLayout>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            autocenter: Autocenter::Default,
            debug: false,
            range: None,
            platform: None,
            layout: None,
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn with_autocenter(mut self, autocenter: Autocenter) -> Self {
        self.autocenter = autocenter;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_range(mut self, degrees: u16) -> Self {
        self.range = Some(degrees);
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Check the layout override and autocenter values.
    pub fn validate(&self) -> SessionResult<()> {
        if let Some(layout) = &self.layout {
            layout.validate()?;
        }
        if let Autocenter::Custom { strength, rate } = self.autocenter {
            if !(strength.is_finite() && rate.is_finite()) {
                return Err(SessionError::config("autocenter values must be finite"));
            }
        }
        Ok(())
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    pub fn relay_transform(&self) -> RelayTransform {
        RelayTransform::for_platform(self.platform())
    }

    /// Decoder for a wheel that has been sent `range`. The firmware already
    /// maps its full axis onto the configured rotation, so the range becomes
    /// the hardware span and no software rescale is applied.
    pub fn decoder(&self) -> InputDecoder {
        let mut layout = self.layout.clone().unwrap_or_default();
        if let Some(range) = self.range {
            layout.hardware_degrees = range.clamp(MIN_RANGE_DEGREES, layout.hardware_degrees);
        }
        InputDecoder::new(layout, None)
    }

    pub fn from_yaml_str(yaml: &str) -> SessionResult<Self> {
        let options: Self =
            serde_yaml::from_str(yaml).map_err(|e| SessionError::config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_json_str(json: &str) -> SessionResult<Self> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| SessionError::config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::config(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(SessionError::config(format!(
                "{}: expected a .yaml, .yml or .json file",
                path.display()
            ))),
        }
    }
}
