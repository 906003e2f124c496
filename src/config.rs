use std::{path::PathBuf, str::FromStr, sync::LazyLock};

use camera_bus::{SourceConfig, encoder::DEFAULT_QUALITY};

use crate::sensor::SensorConfig;

/// Stream port of the camera firmware, kept off the primary web port.
pub const DEFAULT_PORT: u16 = 81;
pub const DEFAULT_WEB_ROOT: &str = "www";
pub const DEFAULT_DOCUMENT: &str = "index.html";

pub struct CamConfig {
    port: u16,
    source: SourceConfig,
    web_root: PathBuf,
    sensor: SensorConfig,
    jpeg_quality: u8,
}

impl Default for CamConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            source: SourceConfig::default(),
            web_root: PathBuf::from(DEFAULT_WEB_ROOT),
            sensor: SensorConfig::default(),
            jpeg_quality: DEFAULT_QUALITY,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("ignoring {}='{}': {}", name, raw, e);
                default
            }
        },
        Err(_) => default,
    }
}

impl CamConfig {
    /// Defaults, overridden by `CAMSTREAM_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let jpeg_quality: u8 = env_or("CAMSTREAM_JPEG_QUALITY", defaults.jpeg_quality);
        Self {
            port: env_or("CAMSTREAM_PORT", defaults.port),
            source: env_or("CAMSTREAM_SOURCE", defaults.source),
            web_root: env_or("CAMSTREAM_WEB_ROOT", defaults.web_root),
            sensor: env_or("CAMSTREAM_SENSOR", defaults.sensor),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn web_root(&self) -> &PathBuf {
        &self.web_root
    }

    pub fn sensor(&self) -> &SensorConfig {
        &self.sensor
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

pub fn config() -> &'static CamConfig {
    static CONFIG: LazyLock<CamConfig> = LazyLock::new(CamConfig::from_env);
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CamConfig::default();
        assert_eq!(config.port(), 81);
        assert_eq!(config.web_root(), &PathBuf::from("www"));
        assert_eq!(config.jpeg_quality(), 80);
        assert_eq!(config.source(), &SourceConfig::default());
    }

    #[test]
    fn test_env_or_falls_back_on_bad_value() {
        std::env::set_var("CAMSTREAM_TEST_BAD_PORT", "eighty");
        assert_eq!(env_or("CAMSTREAM_TEST_BAD_PORT", 81u16), 81);
        std::env::set_var("CAMSTREAM_TEST_BAD_PORT", "8081");
        assert_eq!(env_or("CAMSTREAM_TEST_BAD_PORT", 81u16), 8081);
        assert_eq!(env_or("CAMSTREAM_TEST_UNSET", 7u16), 7);
    }
}
