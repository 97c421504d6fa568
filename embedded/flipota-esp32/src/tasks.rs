//! Executor tasks of the board. Embassy tasks can not be generic, so this is where the
//! concrete peripheral types meet the generic loops of the core crate.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::Timer;
use esp_hal::{Async, gpio::Input, i2c::master::I2c, usb_serial_jtag::UsbSerialJtag};
use flipota_core::cli::CLIHandler;
use flipota_core::reboot::{REQUEST_REBOOT, wait_for_reboot};
use flipota_core::sensor::fxos8700::Fxos8700Accel;
use flipota_core::system_settings::log_toggles::{LogToggleReceiver, LogToggleSender};
use flipota_core::trigger::{SampleReady, trigger_loop};
use log::error;

use crate::flash::FlashHandler;

pub type BoardAccel = Fxos8700Accel<I2c<'static, Async>>;
pub type SharedAccel = Mutex<CriticalSectionRawMutex, BoardAccel>;
pub type BoardSampleReady = SampleReady<CriticalSectionRawMutex>;

#[embassy_executor::task]
pub async fn accel_trigger_task(
    sensor: &'static SharedAccel,
    irq: Input<'static>,
    ready: &'static BoardSampleReady,
    log_receiver: LogToggleReceiver,
) {
    let e = trigger_loop(sensor, irq, ready, log_receiver).await;
    error!("Stopped serving the accelerometer interrupt: {e:?}");
}

#[embassy_executor::task]
pub async fn reboot_task() {
    wait_for_reboot(&REQUEST_REBOOT).await;
    // let the log output drain
    Timer::after_millis(100).await;
    esp_hal::system::software_reset();
}

#[embassy_executor::task]
pub async fn menu_handler(
    serial: UsbSerialJtag<'static, Async>,
    flash: &'static FlashHandler,
    log_toggle_sender: LogToggleSender,
) {
    let (mut rx, tx) = serial.split();

    let Some(mut cli) = CLIHandler::new(flash, log_toggle_sender, tx).await else {
        error!("Could not start the CLI");
        return;
    };
    loop {
        cli.run(&mut rx, flash).await;
    }
}
