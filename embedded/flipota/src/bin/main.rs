#![no_std]
#![no_main]

extern crate alloc;

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use esp_backtrace as _;
use esp_bootloader_esp_idf::partitions::{DataPartitionSubType, PartitionType};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::{
    clock::CpuClock,
    gpio::{Input, InputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    time::Rate,
    usb_serial_jtag::UsbSerialJtag,
};
use flipota_core::app::FlipUpdateApp;
use flipota_core::boot::confirm_boot_image;
use flipota_core::flash::FlashHandling;
use flipota_core::sensor::fxos8700::Fxos8700Accel;
use flipota_core::sensor::SensorSettings;
use flipota_core::system_settings::log_toggles::{LogToggleReceiver, LogToggleWatcher};
use flipota_core::update::staged::StagedUpdateClient;
use flipota_core::update::{NoUpdateClient, UpdateClient};
use flipota_esp32::boot::EspOtaSlots;
use flipota_esp32::flash::{FlashHandler, share_flash};
use flipota_esp32::tasks::{
    BoardSampleReady, SharedAccel, accel_trigger_task, menu_handler, reboot_task,
};
use fxos8700::{AccelRange, Fxos8700, InterruptPin};
use log::{error, info};
use static_cell::StaticCell;

esp_bootloader_esp_idf::esp_app_desc!();

type LogWatcher = LogToggleWatcher<CriticalSectionRawMutex, 3>;

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);

    esp_alloc::heap_allocator!(size: 32 * 1024);

    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);
    info!("Running the app");

    let shared_flash = share_flash(peripherals.FLASH);
    // a failed confirmation only costs us the rollback protection, keep going
    let _ = confirm_boot_image(&mut EspOtaSlots::new(shared_flash));

    // without the settings storage there is no console and nothing to install, the
    // orientation is still watched
    let flash = match FlashHandler::new(
        shared_flash,
        PartitionType::Data(DataPartitionSubType::Fat),
    )
    .await
    {
        Ok(f) => {
            static FLASH: StaticCell<FlashHandler> = StaticCell::new();
            Some(&*FLASH.init(f))
        }
        Err(e) => {
            error!("Could not mount the settings storage, running without it: {e}");
            None
        }
    };
    let settings = match flash {
        Some(flash) => flash.restore().await.sensor_settings.unwrap_or_default(),
        None => SensorSettings::default(),
    };

    static LOG_TOGGLES: StaticCell<LogWatcher> = StaticCell::new();
    let log_toggles: &LogWatcher = LOG_TOGGLES.init(LogToggleWatcher::new());

    // FXOS8700 on I2C0, INT1 is open drain and active low
    let pin_accel_sda = peripherals.GPIO8;
    let pin_accel_scl = peripherals.GPIO9;
    let pin_accel_int1 = peripherals.GPIO10;

    let i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    ) {
        Ok(i2c) => i2c
            .with_sda(pin_accel_sda)
            .with_scl(pin_accel_scl)
            .into_async(),
        Err(e) => {
            error!("Could not configure the I2C bus: {e:?}");
            return;
        }
    };
    let mut accel = Fxos8700Accel::new(
        Fxos8700::new(i2c, fxos8700::DEFAULT_ADDRESS),
        InterruptPin::Int1,
    );
    if let Err(e) = accel.init(AccelRange::G2).await {
        error!("Could not get fxos8700 device: {e}");
        return;
    }
    static ACCEL: StaticCell<SharedAccel> = StaticCell::new();
    let accel: &SharedAccel = ACCEL.init(Mutex::new(accel));
    static SAMPLE_READY: StaticCell<BoardSampleReady> = StaticCell::new();
    let ready: &BoardSampleReady = SAMPLE_READY.init(BoardSampleReady::new());

    let irq = Input::new(pin_accel_int1, InputConfig::default().with_pull(Pull::Up));
    spawner.must_spawn(accel_trigger_task(
        accel,
        irq,
        ready,
        log_toggles
            .dyn_receiver()
            .expect("Could not get log toggle receiver"),
    ));
    spawner.must_spawn(reboot_task());

    let log_receiver = log_toggles
        .dyn_receiver()
        .expect("Could not get log toggle receiver");
    match flash {
        Some(flash) => {
            let serial = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
            spawner
                .spawn(menu_handler(serial, flash, log_toggles.dyn_sender()))
                .ok();
            info!("All tasks spawned");
            let updater = StagedUpdateClient::new(flash, EspOtaSlots::new(shared_flash));
            run_app(accel, ready, updater, log_receiver, &settings).await;
        }
        None => {
            info!("All tasks spawned");
            run_app(accel, ready, NoUpdateClient, log_receiver, &settings).await;
        }
    }
}

async fn run_app<U: UpdateClient>(
    accel: &'static SharedAccel,
    ready: &'static BoardSampleReady,
    updater: U,
    log_receiver: LogToggleReceiver,
    settings: &SensorSettings,
) {
    let mut app = FlipUpdateApp::new(accel, ready, updater, log_receiver);
    if app.setup_or_default(settings).await.is_err() {
        return;
    }
    let e = app.run().await;
    error!("Stopped watching the device orientation: {e}");
}
