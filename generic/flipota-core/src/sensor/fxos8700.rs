use core::fmt::Debug;

use embedded_hal_async::i2c::I2c;
use fxos8700::{AccelRange, Fxos8700, InterruptPin, Odr, registers::InterruptFlags};
use thiserror::Error;

use super::{
    AccelSample, AccelSensor, SensorAttribute, SensorChannel, SensorTrigger, SensorValue,
    TriggerType,
};

/// Standard gravity in micro m/s²
const MICRO_MS2_PER_G: i64 = 9_806_650;
const TRANSIENT_MICRO_G_PER_COUNT: i64 = 63_000;
const TRANSIENT_MAX_COUNTS: i64 = 127;
// well above what the 7 bit threshold can express
const THRESHOLD_CLAMP_MICROS: i64 = 1_000_000_000;

#[derive(Error, Debug)]
pub enum AccelError<E> {
    #[error("Accelerometer bus error: {0:?}")]
    Bus(fxos8700::Error<E>),
    #[error("Attribute, trigger or channel not supported")]
    Unsupported,
    #[error("No sample has been fetched yet")]
    NoSample,
}

impl<E> From<fxos8700::Error<E>> for AccelError<E> {
    fn from(value: fxos8700::Error<E>) -> Self {
        AccelError::Bus(value)
    }
}

/// [`AccelSensor`] implementation on top of the FXOS8700 driver
pub struct Fxos8700Accel<I2C> {
    driver: Fxos8700<I2C>,
    irq_pin: InterruptPin,
    sample: Option<AccelSample>,
}

fn to_ms2(raw: i16, range: AccelRange) -> SensorValue {
    let micro_g = raw as i64 * range.micro_g_per_lsb() as i64;
    SensorValue::from_micros(micro_g * MICRO_MS2_PER_G / 1_000_000)
}

/// Transient threshold register value for `threshold` in m/s². Thresholds above the
/// register range saturate, thresholds of zero or below have no meaning.
fn threshold_counts(threshold: SensorValue) -> Option<u8> {
    let micros = threshold.as_micros();
    if micros <= 0 {
        return None;
    }
    let micro_g = micros.min(THRESHOLD_CLAMP_MICROS) * 1_000_000 / MICRO_MS2_PER_G;
    Some((micro_g / TRANSIENT_MICRO_G_PER_COUNT).clamp(1, TRANSIENT_MAX_COUNTS) as u8)
}

/// Slowest output data rate covering `frequency` in Hz, if the chip can sample that fast
pub fn output_data_rate(frequency: SensorValue) -> Option<Odr> {
    let micros = frequency.as_micros();
    if micros <= 0 {
        return None;
    }
    Odr::at_least(u32::try_from(micros / 1_000).ok()?)
}

fn accepts_channel(channel: SensorChannel) -> bool {
    matches!(channel, SensorChannel::All | SensorChannel::AccelXyz)
}

impl<I2C, E> Fxos8700Accel<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    pub fn new(driver: Fxos8700<I2C>, irq_pin: InterruptPin) -> Self {
        Self {
            driver,
            irq_pin,
            sample: None,
        }
    }

    /// Check the device identity and bring it into measurement mode
    pub async fn init(&mut self, range: AccelRange) -> Result<(), AccelError<E>> {
        self.driver.init(range).await?;
        Ok(())
    }

    pub fn driver(&mut self) -> &mut Fxos8700<I2C> {
        &mut self.driver
    }
}

impl<I2C, E> AccelSensor for Fxos8700Accel<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    type Error = AccelError<E>;

    async fn set_attribute(
        &mut self,
        channel: SensorChannel,
        attribute: SensorAttribute,
        value: SensorValue,
    ) -> Result<(), Self::Error> {
        if !accepts_channel(channel) {
            return Err(AccelError::Unsupported);
        }
        match attribute {
            SensorAttribute::SamplingFrequency => {
                let odr = output_data_rate(value).ok_or(AccelError::Unsupported)?;
                self.driver.set_output_data_rate(odr).await?;
            }
            SensorAttribute::SlopeThreshold => {
                let counts = threshold_counts(value).ok_or(AccelError::Unsupported)?;
                self.driver.set_transient_threshold(counts).await?;
            }
        }
        Ok(())
    }

    async fn set_trigger(&mut self, trigger: SensorTrigger) -> Result<(), Self::Error> {
        if !accepts_channel(trigger.channel) {
            return Err(AccelError::Unsupported);
        }
        match trigger.kind {
            TriggerType::Delta => self.driver.enable_transient_interrupt(self.irq_pin).await?,
            TriggerType::DataReady => self.driver.enable_data_ready_interrupt(self.irq_pin).await?,
        }
        Ok(())
    }

    async fn fetch_sample(&mut self) -> Result<(), Self::Error> {
        let pending = self.driver.interrupt_source().await?;
        if pending.contains(InterruptFlags::TRANS) {
            self.driver.clear_transient().await?;
        }
        let raw = self.driver.read_raw().await?;
        let range = self.driver.range();
        self.sample = Some(AccelSample {
            x: to_ms2(raw[0], range),
            y: to_ms2(raw[1], range),
            z: to_ms2(raw[2], range),
        });
        Ok(())
    }

    fn read_accel(&self) -> Result<AccelSample, Self::Error> {
        self.sample.ok_or(AccelError::NoSample)
    }
}
