//! Host side stand-ins for the hardware the core talks to
extern crate std;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec;
use std::vec::Vec;

use embedded_hal::digital::{ErrorKind as PinErrorKind, ErrorType as PinErrorType, InputPin};
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::{ErrorKind, ErrorType as I2cErrorType, I2c, Operation};
use embedded_storage::nor_flash::{
    ErrorType as FlashErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

use crate::boot::{BootImage, ImageState};
use crate::sensor::{AccelSample, AccelSensor, SensorAttribute, SensorChannel, SensorTrigger, SensorValue};
use crate::update::staged::SlotActivator;
use crate::update::{ProbeResponse, UpdateClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// I2C device backed by a plain register array with auto incrementing address
pub struct RegisterFileI2c {
    regs: [u8; 0x80],
    pointer: usize,
    reads: Vec<u8>,
}

impl RegisterFileI2c {
    pub fn fxos8700() -> Self {
        let mut regs = [0u8; 0x80];
        regs[fxos8700::registers::Register::WhoAmI as usize] =
            fxos8700::registers::WHO_AM_I_VALUE;
        Self {
            regs,
            pointer: 0,
            reads: Vec::new(),
        }
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.regs[addr as usize]
    }

    pub fn set(&mut self, addr: u8, value: u8) {
        self.regs[addr as usize] = value;
    }

    pub fn was_read(&self, addr: u8) -> bool {
        self.reads.contains(&addr)
    }
}

impl I2cErrorType for RegisterFileI2c {
    type Error = ErrorKind;
}

impl I2c for RegisterFileI2c {
    async fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    self.pointer = bytes[0] as usize;
                    for b in &bytes[1..] {
                        self.regs[self.pointer] = *b;
                        self.pointer += 1;
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        self.reads.push(self.pointer as u8);
                        *b = self.regs[self.pointer];
                        self.pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Scripted accelerometer. Every fetch moves the next queued sample into the cache.
#[derive(Default)]
pub struct MockSensor {
    pub attributes: Vec<(SensorChannel, SensorAttribute, SensorValue)>,
    pub trigger: Option<SensorTrigger>,
    pub fail_attribute: Option<SensorAttribute>,
    /// Sampling frequencies above this are rejected like an unsupported rate
    pub max_sampling_frequency: Option<SensorValue>,
    pub fail_fetch: bool,
    pub fail_read: bool,
    pub fetches: usize,
    pub queued: VecDeque<AccelSample>,
    current: Option<AccelSample>,
}

impl MockSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_z(values: &[i32]) -> Self {
        let mut sensor = Self::new();
        for z in values {
            sensor.queued.push_back(AccelSample {
                z: SensorValue::new(*z, 0),
                ..Default::default()
            });
        }
        sensor
    }
}

impl AccelSensor for MockSensor {
    type Error = MockError;

    async fn set_attribute(
        &mut self,
        channel: SensorChannel,
        attribute: SensorAttribute,
        value: SensorValue,
    ) -> Result<(), MockError> {
        if self.fail_attribute == Some(attribute) {
            return Err(MockError);
        }
        if attribute == SensorAttribute::SamplingFrequency
            && self
                .max_sampling_frequency
                .is_some_and(|max| value.as_micros() > max.as_micros())
        {
            return Err(MockError);
        }
        self.attributes.push((channel, attribute, value));
        Ok(())
    }

    async fn set_trigger(&mut self, trigger: SensorTrigger) -> Result<(), MockError> {
        self.trigger = Some(trigger);
        Ok(())
    }

    async fn fetch_sample(&mut self) -> Result<(), MockError> {
        self.fetches += 1;
        if self.fail_fetch {
            return Err(MockError);
        }
        if let Some(sample) = self.queued.pop_front() {
            self.current = Some(sample);
        }
        Ok(())
    }

    fn read_accel(&self) -> Result<AccelSample, MockError> {
        if self.fail_read {
            return Err(MockError);
        }
        self.current.ok_or(MockError)
    }
}

/// Update client answering every probe with the same scripted response
pub struct MockUpdateClient {
    pub probe_response: Result<ProbeResponse, MockError>,
    pub update_result: Result<(), MockError>,
    pub probes: usize,
    pub updates: usize,
}

impl MockUpdateClient {
    pub fn new(probe_response: Result<ProbeResponse, MockError>) -> Self {
        Self {
            probe_response,
            update_result: Ok(()),
            probes: 0,
            updates: 0,
        }
    }
}

impl UpdateClient for MockUpdateClient {
    type Error = MockError;

    async fn probe(&mut self) -> Result<ProbeResponse, MockError> {
        self.probes += 1;
        self.probe_response
    }

    async fn update(&mut self) -> Result<(), MockError> {
        self.updates += 1;
        self.update_result
    }
}

pub struct MockBootImage {
    pub state: Result<ImageState, MockError>,
    pub fail_mark: bool,
    pub marks: usize,
}

impl MockBootImage {
    pub fn new(state: ImageState) -> Self {
        Self {
            state: Ok(state),
            fail_mark: false,
            marks: 0,
        }
    }
}

impl BootImage for MockBootImage {
    type Error = MockError;

    fn image_state(&mut self) -> Result<ImageState, MockError> {
        self.state
    }

    fn mark_valid(&mut self) -> Result<(), MockError> {
        self.marks += 1;
        if self.fail_mark {
            return Err(MockError);
        }
        self.state = Ok(ImageState::Valid);
        Ok(())
    }
}

pub struct MockSlots {
    pub next_slot_ready: bool,
    pub fail_activate: bool,
    pub activations: usize,
}

impl MockSlots {
    pub fn new(next_slot_ready: bool) -> Self {
        Self {
            next_slot_ready,
            fail_activate: false,
            activations: 0,
        }
    }
}

impl SlotActivator for MockSlots {
    type Error = MockError;

    fn next_slot_ready(&mut self) -> Result<bool, MockError> {
        Ok(self.next_slot_ready)
    }

    fn activate_next_slot(&mut self) -> Result<(), MockError> {
        if self.fail_activate {
            return Err(MockError);
        }
        self.activations += 1;
        Ok(())
    }
}

/// Interrupt line starting at a fixed level. A line with scripted edges delivers that many
/// falling edges and then fails, otherwise edges never arrive.
pub struct MockPin {
    low: bool,
    edges: Option<usize>,
}

impl MockPin {
    pub fn low() -> Self {
        Self {
            low: true,
            edges: None,
        }
    }

    /// Idle high line which delivers `edges` falling edges before it breaks
    pub fn with_edges(edges: usize) -> Self {
        Self {
            low: false,
            edges: Some(edges),
        }
    }
}

impl PinErrorType for MockPin {
    type Error = PinErrorKind;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.low)
    }
}

impl Wait for MockPin {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        core::future::pending().await
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        core::future::pending().await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        core::future::pending().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        match self.edges.as_mut() {
            None => core::future::pending().await,
            Some(0) => Err(PinErrorKind::Other),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
        }
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_falling_edge().await
    }
}

/// Console output collected in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct ConsoleSink {
    out: Rc<RefCell<Vec<u8>>>,
}

impl ConsoleSink {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.out.borrow()).into_owned()
    }
}

impl embedded_io::ErrorType for ConsoleSink {
    type Error = core::convert::Infallible;
}

impl embedded_io::Write for ConsoleSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.out.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io_async::Write for ConsoleSink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        embedded_io::Write::write(self, buf)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Console input replaying a fixed byte sequence
pub struct ScriptedInput {
    bytes: VecDeque<u8>,
}

impl ScriptedInput {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl embedded_io::ErrorType for ScriptedInput {
    type Error = core::convert::Infallible;
}

impl embedded_io_async::Read for ScriptedInput {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            let Some(b) = self.bytes.pop_front() else {
                break;
            };
            buf[n] = b;
            n += 1;
        }
        Ok(n)
    }
}

/// NOR flash in RAM, sized to hold every page the key-value store may use
pub struct RamFlash {
    data: Vec<u8>,
}

impl RamFlash {
    pub fn new() -> Self {
        Self {
            data: vec![0xFF; ekv::config::MAX_PAGE_COUNT * ekv::config::PAGE_SIZE],
        }
    }
}

impl FlashErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = ekv::config::PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let (from, to) = (from as usize, to as usize);
        if to > self.data.len() || from > to {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.data[from..to].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }
}
