#![no_std]
//! Async driver for the accelerometer of the NXP FXOS8700 6-axis sensor.
//!
//! Only the parts needed for motion triggered sampling are covered: output data rate,
//! measurement range, the transient (high-pass filtered slope) detector and the
//! data-ready interrupt. The magnetometer is switched off by [`Fxos8700::init`].

pub mod registers;

use core::fmt::Debug;

use embedded_hal_async::i2c::I2c;
use registers::*;

/// I2C address with SA0 = 1 and SA1 = 1, as found on most breakout boards
pub const DEFAULT_ADDRESS: u8 = 0x1F;

#[derive(Debug)]
pub enum Error<E> {
    I2c(E),
    InvalidDevice(u8),
}

/// Output data rates available in accelerometer-only mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Odr {
    Hz800,
    Hz400,
    Hz200,
    Hz100,
    Hz50,
    Hz12_5,
    Hz6_25,
    Hz1_5625,
}

impl Odr {
    /// Ordered from slowest to fastest
    const ALL: [Odr; 8] = [
        Odr::Hz1_5625,
        Odr::Hz6_25,
        Odr::Hz12_5,
        Odr::Hz50,
        Odr::Hz100,
        Odr::Hz200,
        Odr::Hz400,
        Odr::Hz800,
    ];

    fn bits(self) -> u8 {
        match self {
            Odr::Hz800 => 0,
            Odr::Hz400 => 1,
            Odr::Hz200 => 2,
            Odr::Hz100 => 3,
            Odr::Hz50 => 4,
            Odr::Hz12_5 => 5,
            Odr::Hz6_25 => 6,
            Odr::Hz1_5625 => 7,
        }
    }

    /// The rate in millihertz, rounded down
    pub fn millihertz(self) -> u32 {
        match self {
            Odr::Hz800 => 800_000,
            Odr::Hz400 => 400_000,
            Odr::Hz200 => 200_000,
            Odr::Hz100 => 100_000,
            Odr::Hz50 => 50_000,
            Odr::Hz12_5 => 12_500,
            Odr::Hz6_25 => 6_250,
            Odr::Hz1_5625 => 1_562,
        }
    }

    /// Returns the slowest rate which is at least `millihertz`,
    /// or `None` if the request is faster than the chip can sample.
    pub fn at_least(millihertz: u32) -> Option<Odr> {
        Self::ALL.into_iter().find(|odr| odr.millihertz() >= millihertz)
    }
}

/// Full scale range of the accelerometer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AccelRange {
    #[default]
    G2,
    G4,
    G8,
}

impl AccelRange {
    fn bits(self) -> u8 {
        match self {
            AccelRange::G2 => 0b00,
            AccelRange::G4 => 0b01,
            AccelRange::G8 => 0b10,
        }
    }

    /// Sensitivity of one LSB of the 14 bit output in micro g
    pub fn micro_g_per_lsb(self) -> i32 {
        match self {
            AccelRange::G2 => 244,
            AccelRange::G4 => 488,
            AccelRange::G8 => 976,
        }
    }
}

/// Output pin an interrupt source is routed to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterruptPin {
    Int1,
    Int2,
}

pub struct Fxos8700<I2C> {
    i2c: I2C,
    address: u8,
    range: AccelRange,
    odr: Odr,
}

impl<I2C, E> Fxos8700<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            range: AccelRange::default(),
            odr: Odr::Hz100,
        }
    }

    pub fn destroy(self) -> I2C {
        self.i2c
    }

    pub fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn range(&self) -> AccelRange {
        self.range
    }

    pub fn output_data_rate(&self) -> Odr {
        self.odr
    }

    async fn read_reg(&mut self, reg: Register) -> Result<u8, Error<E>> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[reg.into()], &mut buf)
            .await
            .map_err(Error::I2c)?;
        Ok(buf[0])
    }

    async fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[reg.into(), value])
            .await
            .map_err(Error::I2c)
    }

    /// Puts the device into standby and returns the previous CTRL_REG1 value.
    /// Most configuration registers can only be written in standby.
    async fn enter_standby(&mut self) -> Result<u8, Error<E>> {
        let ctrl1 = self.read_reg(Register::CtrlReg1).await?;
        self.write_reg(Register::CtrlReg1, ctrl1 & !CtrlReg1Flags::ACTIVE.bits())
            .await?;
        Ok(ctrl1)
    }

    pub async fn who_am_i(&mut self) -> Result<u8, Error<E>> {
        self.read_reg(Register::WhoAmI).await
    }

    /// Verify the device identity and bring it into active accelerometer-only mode
    pub async fn init(&mut self, range: AccelRange) -> Result<(), Error<E>> {
        let id = self.who_am_i().await?;
        if id != WHO_AM_I_VALUE {
            return Err(Error::InvalidDevice(id));
        }
        self.write_reg(Register::CtrlReg1, 0).await?;
        self.write_reg(Register::MCtrlReg1, M_CTRL_REG1_ACCEL_ONLY)
            .await?;
        self.write_reg(Register::XyzDataCfg, range.bits() & XYZ_DATA_CFG_FS_MASK)
            .await?;
        self.write_reg(Register::CtrlReg2, CTRL_REG2_MODS_HIGH_RES)
            .await?;
        // push-pull, active low
        self.write_reg(Register::CtrlReg3, 0).await?;
        self.write_reg(
            Register::CtrlReg1,
            (self.odr.bits() << CTRL_REG1_DR_LOC) | CtrlReg1Flags::ACTIVE.bits(),
        )
        .await?;
        self.range = range;
        Ok(())
    }

    pub async fn set_output_data_rate(&mut self, odr: Odr) -> Result<(), Error<E>> {
        let ctrl1 = self.enter_standby().await?;
        let ctrl1 = (ctrl1 & !CTRL_REG1_DR_MASK) | (odr.bits() << CTRL_REG1_DR_LOC);
        self.write_reg(Register::CtrlReg1, ctrl1).await?;
        self.odr = odr;
        Ok(())
    }

    /// Set the transient detection threshold in counts of 0.063 g
    pub async fn set_transient_threshold(&mut self, counts: u8) -> Result<(), Error<E>> {
        let ctrl1 = self.enter_standby().await?;
        self.write_reg(Register::TransientThs, counts & TRANSIENT_THS_MASK)
            .await?;
        self.write_reg(Register::TransientCount, 0).await?;
        self.write_reg(Register::CtrlReg1, ctrl1).await
    }

    async fn enable_interrupt(
        &mut self,
        source: InterruptFlags,
        pin: InterruptPin,
    ) -> Result<(), Error<E>> {
        let ctrl1 = self.enter_standby().await?;
        let enabled = InterruptFlags::from_bits_retain(self.read_reg(Register::CtrlReg4).await?);
        self.write_reg(Register::CtrlReg4, (enabled | source).bits())
            .await?;
        let mut routing =
            InterruptFlags::from_bits_retain(self.read_reg(Register::CtrlReg5).await?);
        routing.set(source, pin == InterruptPin::Int1);
        self.write_reg(Register::CtrlReg5, routing.bits()).await?;
        self.write_reg(Register::CtrlReg1, ctrl1).await
    }

    /// Arm the high-pass filtered transient detector on all three axes.
    /// The event is latched until [`Fxos8700::clear_transient`] is called.
    pub async fn enable_transient_interrupt(&mut self, pin: InterruptPin) -> Result<(), Error<E>> {
        let ctrl1 = self.enter_standby().await?;
        let cfg = TransientCfgFlags::ELE
            | TransientCfgFlags::XTEFE
            | TransientCfgFlags::YTEFE
            | TransientCfgFlags::ZTEFE;
        self.write_reg(Register::TransientCfg, cfg.bits()).await?;
        self.write_reg(Register::CtrlReg1, ctrl1).await?;
        self.enable_interrupt(InterruptFlags::TRANS, pin).await
    }

    pub async fn enable_data_ready_interrupt(&mut self, pin: InterruptPin) -> Result<(), Error<E>> {
        self.enable_interrupt(InterruptFlags::DRDY, pin).await
    }

    pub async fn interrupt_source(&mut self) -> Result<InterruptFlags, Error<E>> {
        Ok(InterruptFlags::from_bits_retain(
            self.read_reg(Register::IntSource).await?,
        ))
    }

    /// Reading the transient source register releases the latched event
    pub async fn clear_transient(&mut self) -> Result<TransientSrcFlags, Error<E>> {
        Ok(TransientSrcFlags::from_bits_retain(
            self.read_reg(Register::TransientSrc).await?,
        ))
    }

    /// Read the three 14 bit acceleration values
    pub async fn read_raw(&mut self) -> Result<[i16; 3], Error<E>> {
        // status followed by X, Y and Z, each MSB first
        let mut buf = [0u8; 7];
        self.i2c
            .write_read(self.address, &[Register::Status.into()], &mut buf)
            .await
            .map_err(Error::I2c)?;
        let axis = |msb: u8, lsb: u8| i16::from_be_bytes([msb, lsb]) >> 2;
        Ok([
            axis(buf[1], buf[2]),
            axis(buf[3], buf[4]),
            axis(buf[5], buf[6]),
        ])
    }
}
