//! Temperature / humidity sensor access.
//!
//! Readings are `f32` with NaN meaning the sensor did not answer, the same
//! convention DHT-style drivers use.

use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use serde::Serialize;

pub trait EnvSensor: Send + Sync {
    /// Degrees Celsius, NaN on failure.
    fn read_temperature(&self) -> f32;
    /// Relative humidity in percent, NaN on failure.
    fn read_humidity(&self) -> f32;
}

/// A DHT11/DHT22 exposed by the Linux IIO `dht11` driver.
pub struct IioSensor {
    dir: PathBuf,
}

impl IioSensor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // IIO reports milli-units
    fn read_milli(&self, name: &str) -> f32 {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(milli) => milli as f32 / 1000.0,
                Err(e) => {
                    log::warn!("{}: unexpected value '{}': {}", path.display(), raw.trim(), e);
                    f32::NAN
                }
            },
            Err(e) => {
                // the dht11 driver returns EIO on checksum/timing errors
                log::warn!("{}: {}", path.display(), e);
                f32::NAN
            }
        }
    }
}

impl EnvSensor for IioSensor {
    fn read_temperature(&self) -> f32 {
        self.read_milli("in_temp_input")
    }

    fn read_humidity(&self) -> f32 {
        self.read_milli("in_humidityrelative_input")
    }
}

/// Constant readings.
pub struct FixedSensor {
    pub temperature: f32,
    pub humidity: f32,
}

impl EnvSensor for FixedSensor {
    fn read_temperature(&self) -> f32 {
        self.temperature
    }

    fn read_humidity(&self) -> f32 {
        self.humidity
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SensorConfig {
    Iio(PathBuf),
    Fixed { temperature: f32, humidity: f32 },
    None,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig::Iio(PathBuf::from("/sys/bus/iio/devices/iio:device0"))
    }
}

impl SensorConfig {
    pub fn open(&self) -> Box<dyn EnvSensor> {
        match self {
            SensorConfig::Iio(dir) => Box::new(IioSensor::new(dir.clone())),
            SensorConfig::Fixed {
                temperature,
                humidity,
            } => Box::new(FixedSensor {
                temperature: *temperature,
                humidity: *humidity,
            }),
            SensorConfig::None => Box::new(FixedSensor {
                temperature: f32::NAN,
                humidity: f32::NAN,
            }),
        }
    }
}

/// Accepts `iio:<dir>`, `fixed:<temperature>,<humidity>` and `none`.
impl FromStr for SensorConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(SensorConfig::None);
        }
        if let Some(dir) = s.strip_prefix("iio:") {
            if dir.is_empty() {
                anyhow::bail!("iio sensor needs a device directory");
            }
            return Ok(SensorConfig::Iio(PathBuf::from(dir)));
        }
        if let Some(values) = s.strip_prefix("fixed:") {
            let (t, h) = values
                .split_once(',')
                .ok_or_else(|| anyhow::anyhow!("expected fixed:<temperature>,<humidity>"))?;
            return Ok(SensorConfig::Fixed {
                temperature: t.trim().parse()?,
                humidity: h.trim().parse()?,
            });
        }
        anyhow::bail!("unknown sensor '{}'", s)
    }
}

impl Display for SensorConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorConfig::Iio(dir) => write!(f, "iio:{}", dir.display()),
            SensorConfig::Fixed {
                temperature,
                humidity,
            } => write!(f, "fixed:{},{}", temperature, humidity),
            SensorConfig::None => write!(f, "none"),
        }
    }
}

/// A reading as served to clients, rounded to one decimal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EnvReading {
    pub temperature: f64,
    pub humidity: f64,
}

fn round1(v: f32) -> f64 {
    (v as f64 * 10.0).round() / 10.0
}

impl EnvReading {
    /// `None` when either value is NaN or infinite.
    pub fn from_raw(temperature: f32, humidity: f32) -> Option<Self> {
        if !temperature.is_finite() || !humidity.is_finite() {
            return None;
        }
        Some(Self {
            temperature: round1(temperature),
            humidity: round1(humidity),
        })
    }

    pub fn read(sensor: &dyn EnvSensor) -> Option<Self> {
        let humidity = sensor.read_humidity();
        let temperature = sensor.read_temperature();
        Self::from_raw(temperature, humidity)
    }
}
