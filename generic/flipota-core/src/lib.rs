#![no_std]
//! Hardware agnostic parts of a firmware which checks for updates whenever the device is
//! turned over.
//!
//! An accelerometer trigger wakes the [`app`] loop through the binary semaphore in [`trigger`].
//! The [`flip`] detector watches the sign of the Z axis and a change of sign runs an update
//! check through the [`update`] client. Board crates provide the sensor bus, the flash and the
//! bootloader access by implementing the traits in [`sensor`], [`flash`], [`boot`] and
//! [`update::staged`].

pub mod app;
pub mod boot;
pub mod cli;
pub mod flash;
pub mod flip;
pub mod reboot;
pub mod sensor;
pub mod system_settings;
pub mod trigger;
pub mod update;

#[cfg(test)]
mod test_support;
