//! # Accelerometer abstraction
//! The rest of the system only talks to the accelerometer through the [`AccelSensor`] trait.
//! Values are exchanged as [`SensorValue`], a fixed point number with an integer part and a
//! fractional part in millionths.
//!
//! [`configure`] brings a sensor into the state the flip detection needs: a sampling
//! frequency, a slope threshold and an armed delta trigger.
pub mod fxos8700;

use core::fmt::{self, Debug};
use core::future;

use postcard::experimental::max_size::MaxSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ufmt::{derive::uDebug, uDisplay};

use crate::flip::AxisSign;

const MICROS_PER_UNIT: i64 = 1_000_000;

/// Fixed point sensor reading. Both parts carry the sign of the value,
/// so -0.5 is `{ integer: 0, micro: -500_000 }`.
#[derive(
    Copy, Clone, Debug, uDebug, Default, PartialEq, Eq, Serialize, Deserialize, MaxSize,
)]
pub struct SensorValue {
    pub integer: i32,
    pub micro: i32,
}

impl SensorValue {
    pub const fn new(integer: i32, micro: i32) -> Self {
        Self { integer, micro }
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self {
            integer: (micros / MICROS_PER_UNIT) as i32,
            micro: (micros % MICROS_PER_UNIT) as i32,
        }
    }

    pub const fn as_micros(self) -> i64 {
        self.integer as i64 * MICROS_PER_UNIT + self.micro as i64
    }

    pub fn from_f32(value: f32) -> Self {
        Self::from_micros(libm::round(value as f64 * MICROS_PER_UNIT as f64) as i64)
    }

    pub fn to_f32(self) -> f32 {
        (self.as_micros() as f64 / MICROS_PER_UNIT as f64) as f32
    }

    /// Sign of the integer part. Values with a magnitude below 1 have no sign.
    pub fn sign(self) -> AxisSign {
        match self.integer {
            i if i > 0 => AxisSign::Positive,
            i if i < 0 => AxisSign::Negative,
            _ => AxisSign::Unknown,
        }
    }

    fn split_abs(self) -> (bool, u64, [u8; 6]) {
        let micros = self.as_micros();
        let abs = micros.unsigned_abs();
        let mut frac = abs % MICROS_PER_UNIT as u64;
        let mut digits = [b'0'; 6];
        for d in digits.iter_mut().rev() {
            *d = b'0' + (frac % 10) as u8;
            frac /= 10;
        }
        (micros < 0, abs / MICROS_PER_UNIT as u64, digits)
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (negative, integer, digits) = self.split_abs();
        let sign = if negative { "-" } else { "" };
        let frac = core::str::from_utf8(&digits).unwrap_or("000000");
        write!(f, "{sign}{integer}.{frac}")
    }
}

impl uDisplay for SensorValue {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let (negative, integer, digits) = self.split_abs();
        if negative {
            f.write_str("-")?;
        }
        ufmt::uwrite!(f, "{}.", integer)?;
        f.write_str(core::str::from_utf8(&digits).unwrap_or("000000"))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorChannel {
    AccelX,
    AccelY,
    AccelZ,
    AccelXyz,
    All,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorAttribute {
    /// Sampling frequency in Hz
    SamplingFrequency,
    /// Acceleration delta in m/s² which fires a [`TriggerType::Delta`] trigger
    SlopeThreshold,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerType {
    /// Acceleration changed by more than the slope threshold
    Delta,
    /// A new sample is available
    DataReady,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SensorTrigger {
    pub kind: TriggerType,
    pub channel: SensorChannel,
}

/// One acceleration sample in m/s²
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AccelSample {
    pub x: SensorValue,
    pub y: SensorValue,
    pub z: SensorValue,
}

pub trait AccelSensor {
    type Error: Debug;

    fn set_attribute(
        &mut self,
        channel: SensorChannel,
        attribute: SensorAttribute,
        value: SensorValue,
    ) -> impl future::Future<Output = Result<(), Self::Error>>;

    /// Arm the interrupt source of the device
    fn set_trigger(
        &mut self,
        trigger: SensorTrigger,
    ) -> impl future::Future<Output = Result<(), Self::Error>>;

    /// Read a new sample from the device into the local cache and acknowledge
    /// any pending interrupt
    fn fetch_sample(&mut self) -> impl future::Future<Output = Result<(), Self::Error>>;

    /// Returns the sample cached by the last [`AccelSensor::fetch_sample`]
    fn read_accel(&self) -> Result<AccelSample, Self::Error>;
}

/// Runtime adjustable sensor configuration, persisted in flash
#[derive(Copy, Clone, Debug, uDebug, PartialEq, Eq, Serialize, Deserialize, MaxSize)]
pub struct SensorSettings {
    pub sampling_frequency: SensorValue,
    pub slope_threshold: SensorValue,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: SensorValue::new(6, 250_000),
            slope_threshold: SensorValue::new(10, 0),
        }
    }
}

#[derive(Error, Debug)]
pub enum SetupError<E> {
    #[error("Could not set sampling frequency: {0:?}")]
    SamplingFrequency(E),
    #[error("Could not set slope threshold: {0:?}")]
    SlopeThreshold(E),
    #[error("Could not set trigger: {0:?}")]
    Trigger(E),
}

/// Apply `settings` and arm the delta trigger on all three axes
pub async fn configure<S: AccelSensor>(
    sensor: &mut S,
    settings: &SensorSettings,
) -> Result<(), SetupError<S::Error>> {
    sensor
        .set_attribute(
            SensorChannel::All,
            SensorAttribute::SamplingFrequency,
            settings.sampling_frequency,
        )
        .await
        .map_err(SetupError::SamplingFrequency)?;
    sensor
        .set_attribute(
            SensorChannel::All,
            SensorAttribute::SlopeThreshold,
            settings.slope_threshold,
        )
        .await
        .map_err(SetupError::SlopeThreshold)?;
    sensor
        .set_trigger(SensorTrigger {
            kind: TriggerType::Delta,
            channel: SensorChannel::AccelXyz,
        })
        .await
        .map_err(SetupError::Trigger)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::test_support::MockSensor;
    use embassy_futures::block_on;
    use std::string::ToString;

    #[test]
    fn value_conversions() {
        assert_eq!(SensorValue::from_f32(6.25), SensorValue::new(6, 250_000));
        assert_eq!(SensorValue::from_f32(-0.5), SensorValue::new(0, -500_000));
        assert_eq!(SensorValue::new(-9, -810_000).as_micros(), -9_810_000);
        assert_eq!(SensorValue::new(10, 0).to_f32(), 10.0);
    }

    #[test]
    fn value_display() {
        assert_eq!(SensorValue::new(6, 250_000).to_string(), "6.250000");
        assert_eq!(SensorValue::new(0, -5).to_string(), "-0.000005");
        let mut out = std::string::String::new();
        ufmt::uwrite!(out, "{}", SensorValue::new(-9, -810_000)).unwrap();
        assert_eq!(out, "-9.810000");
    }

    #[test]
    fn configure_applies_settings_in_order() {
        let mut sensor = MockSensor::new();
        block_on(configure(&mut sensor, &SensorSettings::default())).unwrap();
        assert_eq!(
            sensor.attributes,
            [
                (
                    SensorChannel::All,
                    SensorAttribute::SamplingFrequency,
                    SensorValue::new(6, 250_000)
                ),
                (
                    SensorChannel::All,
                    SensorAttribute::SlopeThreshold,
                    SensorValue::new(10, 0)
                ),
            ]
        );
        assert_eq!(
            sensor.trigger,
            Some(SensorTrigger {
                kind: TriggerType::Delta,
                channel: SensorChannel::AccelXyz
            })
        );
    }

    #[test]
    fn configure_stops_at_first_failure() {
        let mut sensor = MockSensor::new();
        sensor.fail_attribute = Some(SensorAttribute::SlopeThreshold);
        let res = block_on(configure(&mut sensor, &SensorSettings::default()));
        assert!(matches!(res, Err(SetupError::SlopeThreshold(_))));
        assert_eq!(sensor.trigger, None);
    }
}
