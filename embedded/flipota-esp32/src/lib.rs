#![no_std]
//! ESP32-S3 glue for the flip-to-update firmware: the shared flash driver, the bootloader's
//! OTA slots and the executor tasks.

pub mod boot;
pub mod flash;
pub mod tasks;
