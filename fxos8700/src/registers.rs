use bitflags::bitflags;

/// Register map of the accelerometer half of the FXOS8700.
/// The magnetometer is only touched to switch it off.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    Status = 0x00,
    OutXMsb = 0x01,
    IntSource = 0x0C,
    WhoAmI = 0x0D,
    XyzDataCfg = 0x0E,
    TransientCfg = 0x1D,
    TransientSrc = 0x1E,
    TransientThs = 0x1F,
    TransientCount = 0x20,
    CtrlReg1 = 0x2A,
    CtrlReg2 = 0x2B,
    CtrlReg3 = 0x2C,
    CtrlReg4 = 0x2D,
    CtrlReg5 = 0x2E,
    MCtrlReg1 = 0x5B,
}

impl From<Register> for u8 {
    fn from(r: Register) -> u8 {
        r as u8
    }
}

pub const WHO_AM_I_VALUE: u8 = 0xC7;

/// Data rate bits of CTRL_REG1
pub const CTRL_REG1_DR_MASK: u8 = 0b0011_1000;
pub const CTRL_REG1_DR_LOC: u8 = 3;

/// Full scale bits of XYZ_DATA_CFG
pub const XYZ_DATA_CFG_FS_MASK: u8 = 0b0000_0011;

/// Transient threshold is a 7 bit value, bit 7 selects the debounce counter mode
pub const TRANSIENT_THS_MASK: u8 = 0x7F;

/// Oversampling mode "high resolution" in CTRL_REG2
pub const CTRL_REG2_MODS_HIGH_RES: u8 = 0b10;

/// M_CTRL_REG1 hybrid mode select: accelerometer only
pub const M_CTRL_REG1_ACCEL_ONLY: u8 = 0b00;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CtrlReg1Flags: u8 {
        const ACTIVE = 1 << 0;
        const F_READ = 1 << 1;
        const LNOISE = 1 << 2;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CtrlReg3Flags: u8 {
        const PP_OD = 1 << 0;
        const IPOL  = 1 << 1;
    }
}

bitflags! {
    /// Interrupt enable bits of CTRL_REG4. The same bit layout is used by
    /// CTRL_REG5 (routing, 1 = INT1) and INT_SOURCE (pending sources).
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct InterruptFlags: u8 {
        const DRDY   = 1 << 0;
        const A_VECM = 1 << 1;
        const FF_MT  = 1 << 2;
        const PULSE  = 1 << 3;
        const LNDPRT = 1 << 4;
        const TRANS  = 1 << 5;
        const FIFO   = 1 << 6;
        const ASLP   = 1 << 7;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TransientCfgFlags: u8 {
        const HPF_BYP = 1 << 0;
        const XTEFE   = 1 << 1;
        const YTEFE   = 1 << 2;
        const ZTEFE   = 1 << 3;
        const ELE     = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TransientSrcFlags: u8 {
        const X_POL   = 1 << 0;
        const X_EVENT = 1 << 1;
        const Y_POL   = 1 << 2;
        const Y_EVENT = 1 << 3;
        const Z_POL   = 1 << 4;
        const Z_EVENT = 1 << 5;
        const EA      = 1 << 6;
    }
}
