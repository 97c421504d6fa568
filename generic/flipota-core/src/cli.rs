use crate::app::{UPDATE_CHECK_REQUEST, last_accel_z};
use crate::flash::{FlashError, FlashHandling, FlashKeys};
use crate::reboot::{REQUEST_REBOOT, RebootReason};
use crate::sensor::fxos8700::output_data_rate;
use crate::sensor::{SensorSettings, SensorValue};
use crate::system_settings::log_toggles::{
    LogChannel, LogChannelToggles, LogToggleSender, LogToggles,
};
use crate::update::staged::StagedImage;
use core::fmt::Write as _;
use embedded_cli::{Command, CommandGroup, cli::CliBuilder};
use embedded_io_async::{Read, Write};
use embedded_storage::nor_flash::NorFlash;
use log::info;
use postcard::experimental::max_size::MaxSize;
use thiserror::Error;
use ufmt::uwrite;

const ENTER: u8 = b'\r';

#[derive(Error, Debug)]
pub enum HandlerError<FE, IO: embedded_io::Error> {
    #[error("Flash access failed: {0}")]
    FlashError(#[from] FlashError<FE>),
    #[error("Failed to write to console {0:#?}")]
    ConsoleWriteError(#[from] IO),
    #[error("Invalid value, expected {0}")]
    InvalidValue(&'static str),
}

struct Context {
    sender: LogToggleSender,
    logging_config: LogToggles,
    sensor_settings: SensorSettings,
    interface_open: bool,
}

#[derive(CommandGroup)]
enum RootGroup {
    Base(Base),
    Logging(Logging),
    Storage(Flash),
    Update(Update),
    Sensor(Sensor),
}

#[derive(Command)]
#[command(help_title = "Basic commands")]
enum Base {
    /// Exit the CLI. This will start logging out all enabled channels. Press enter to open the CLI again
    Exit,
    /// Restart the device
    Reboot,
}

// These names will be converted to CLI commands, and they need the prefix
#[allow(clippy::enum_variant_names)]
#[derive(Command)]
#[command(help_title = "Manage Logging output")]
enum Logging {
    /// Enable printing of a certain log cannel
    LogEnable {
        /// Which logging channel to enable
        channel: LogChannel,
    },
    /// Disable printing of a certain log channel
    LogDisable {
        /// Which logging channel to disable
        channel: LogChannel,
    },
    /// List all available logging channels
    LogList,
}

#[derive(Command)]
#[command(help_title = "Manage values stored in flash")]
enum Flash {
    /// Format the flash. All settings return to their defaults
    FlashFormat,
}

#[allow(clippy::enum_variant_names)]
#[derive(Command)]
#[command(help_title = "Firmware updates")]
enum Update {
    /// Run an update check right now, without turning the device over
    UpdateCheck,
    /// Announce that an image was written to the inactive slot
    UpdateStage {
        /// Version number of the staged image
        version: u32,
    },
    /// Forget the staged image
    UpdateClear,
    /// Show the staged image, if any
    UpdateStatus,
}

#[allow(clippy::enum_variant_names)]
#[derive(Command)]
#[command(help_title = "Accelerometer settings, applied after a reboot")]
enum Sensor {
    /// Set the sampling frequency
    SensorRate {
        /// Frequency in Hz
        hz: f32,
    },
    /// Set the acceleration change which wakes up the device
    SensorThreshold {
        /// Threshold in m/s²
        ms2: f32,
    },
    /// Show the stored settings and the last Z reading
    SensorShow,
}

async fn set_log<F: NorFlash>(
    toggles: &mut LogChannelToggles,
    flash: &impl FlashHandling<F>,
    channel: &LogChannel,
    state: bool,
) -> Result<(), FlashError<F::Error>> {
    toggles.set(channel, state);
    flash
        .store::<_, { LogChannelToggles::POSTCARD_MAX_SIZE }>(&FlashKeys::LogChannels, toggles)
        .await?;
    Ok(())
}

fn positive(value: f32, expected: &'static str) -> Result<SensorValue, &'static str> {
    if value.is_finite() && value > 0.0 {
        Ok(SensorValue::from_f32(value))
    } else {
        Err(expected)
    }
}

type Console<TX> = embedded_cli::cli::Cli<TX, <TX as embedded_io::ErrorType>::Error, [u8; 255], [u8; 255]>;

pub struct CLIHandler<TX: Write + embedded_io::Write> {
    context: Context,
    cli: Console<TX>,
}

impl<TX: Write + embedded_io::Write> CLIHandler<TX> {
    pub async fn new<F: NorFlash>(
        flash: &impl FlashHandling<F>,
        log_toggle_sender: LogToggleSender,
        mut tx: TX,
    ) -> Option<Self> {
        let restored = flash.restore().await;
        let context = Context {
            sender: log_toggle_sender,
            logging_config: LogToggles {
                active: true,
                config: restored.log_toggles.unwrap_or_default(),
            },
            sensor_settings: restored.sensor_settings.unwrap_or_default(),
            interface_open: false,
        };
        context.sender.send(context.logging_config.clone());

        let command_buffer = [0u8; 255];
        let history_buffer = [0u8; 255];

        // CliBuilder::build() writes the prompt synchronously. Make sure the
        // host side is actually listening before handing the writer over.
        Write::write(&mut tx, b"\0").await.ok();
        Write::flush(&mut tx).await.ok();
        let cli = CliBuilder::default()
            .writer(tx)
            .command_buffer(command_buffer)
            .history_buffer(history_buffer)
            .build()
            .ok()?;

        info!("CLI is ready and operational. Press enter to open it");
        Some(Self { context, cli })
    }

    pub fn is_open(&self) -> bool {
        self.context.interface_open
    }

    fn set_open(&mut self, open: bool) {
        self.context.interface_open = open;
        self.context.logging_config.active = !open;
        self.context
            .sender
            .send(self.context.logging_config.clone());
    }

    /// Process one byte from `rx`. Complete commands are executed before this returns.
    pub async fn run<F: NorFlash, RX: Read>(&mut self, rx: &mut RX, flash: &impl FlashHandling<F>) {
        let mut buf: [u8; 1] = [0; 1];
        if !matches!(rx.read(&mut buf).await, Ok(1)) {
            return;
        }

        // if the interface is not open open it and skip processing the CLI
        if !self.context.interface_open {
            if buf[0] != ENTER {
                return;
            }
            self.set_open(true);
        }

        // the processor is synchronous, the command is executed once it returns
        let mut pending = None;
        let _ = self.cli.process_byte::<RootGroup, _>(
            buf[0],
            &mut RootGroup::processor(|_cli, command| {
                pending = Some(command);
                Ok(())
            }),
        );
        let Some(command) = pending else {
            return;
        };
        if let Err(e) = self.handle(command, flash).await {
            let _ = self.cli.write(|writer| {
                let _ = write!(writer, "Failed to handle command: {}", e);
                Ok(())
            });
        }
    }

    async fn handle<F: NorFlash>(
        &mut self,
        command: RootGroup,
        flash: &impl FlashHandling<F>,
    ) -> Result<(), HandlerError<F::Error, TX::Error>> {
        match command {
            RootGroup::Base(Base::Exit) => self.set_open(false),
            RootGroup::Base(Base::Reboot) => REQUEST_REBOOT.signal(RebootReason::UserRequest),
            RootGroup::Logging(logging) => self.handle_logging(logging, flash).await?,
            RootGroup::Storage(Flash::FlashFormat) => {
                flash.format().await?;
                self.context.logging_config.config = LogChannelToggles::default();
                self.context.sensor_settings = SensorSettings::default();
                self.cli.write(|w| uwrite!(w, "Formatted flash"))?;
            }
            RootGroup::Update(update) => self.handle_update(update, flash).await?,
            RootGroup::Sensor(sensor) => self.handle_sensor(sensor, flash).await?,
        }
        Ok(())
    }

    async fn handle_logging<F: NorFlash>(
        &mut self,
        command: Logging,
        flash: &impl FlashHandling<F>,
    ) -> Result<(), HandlerError<F::Error, TX::Error>> {
        match command {
            Logging::LogList => {
                let config = &self.context.logging_config.config;
                self.cli
                    .write(|w| uwrite!(w, "Available logging channels: \n{}", config))?;
                return Ok(());
            }
            Logging::LogEnable { channel } => {
                set_log(&mut self.context.logging_config.config, flash, &channel, true).await?;
                self.cli
                    .write(|w| uwrite!(w, "Enabled logging for channel {}", channel))?;
            }
            Logging::LogDisable { channel } => {
                set_log(&mut self.context.logging_config.config, flash, &channel, false).await?;
                self.cli
                    .write(|w| uwrite!(w, "Disabled logging for channel {}", channel))?;
            }
        }
        self.context
            .sender
            .send(self.context.logging_config.clone());
        Ok(())
    }

    async fn handle_update<F: NorFlash>(
        &mut self,
        command: Update,
        flash: &impl FlashHandling<F>,
    ) -> Result<(), HandlerError<F::Error, TX::Error>> {
        match command {
            Update::UpdateCheck => {
                UPDATE_CHECK_REQUEST.signal(());
                self.cli.write(|w| uwrite!(w, "Update check requested"))?;
            }
            Update::UpdateStage { version } => {
                flash
                    .store::<_, { StagedImage::POSTCARD_MAX_SIZE }>(
                        &FlashKeys::StagedImage,
                        &StagedImage { version },
                    )
                    .await?;
                self.cli.write(|w| {
                    uwrite!(w, "Image version {} staged. Turn the device over to install it", version)
                })?;
            }
            Update::UpdateClear => {
                flash.remove(&FlashKeys::StagedImage).await?;
                self.cli.write(|w| uwrite!(w, "Staged image cleared"))?;
            }
            Update::UpdateStatus => {
                let mut buffer = [0u8; StagedImage::POSTCARD_MAX_SIZE];
                let staged: Option<StagedImage> =
                    flash.load(FlashKeys::StagedImage, &mut buffer).await?;
                match staged {
                    Some(image) => self
                        .cli
                        .write(|w| uwrite!(w, "Staged image version {}", image.version))?,
                    None => self.cli.write(|w| uwrite!(w, "No image staged"))?,
                }
            }
        }
        Ok(())
    }

    async fn handle_sensor<F: NorFlash>(
        &mut self,
        command: Sensor,
        flash: &impl FlashHandling<F>,
    ) -> Result<(), HandlerError<F::Error, TX::Error>> {
        let mut settings = self.context.sensor_settings;
        match command {
            Sensor::SensorShow => {
                let last_z = SensorValue::from_f32(last_accel_z());
                self.cli.write(|w| {
                    uwrite!(
                        w,
                        "Sampling frequency: {} Hz\nSlope threshold: {} m/s2\nLast Z: {} m/s2",
                        settings.sampling_frequency,
                        settings.slope_threshold,
                        last_z
                    )
                })?;
                return Ok(());
            }
            Sensor::SensorRate { hz } => {
                let rate = positive(hz, "a frequency above 0 Hz")
                    .map_err(HandlerError::InvalidValue)?;
                // a rate the chip cannot run at would fail the sensor setup on every boot
                if output_data_rate(rate).is_none() {
                    return Err(HandlerError::InvalidValue("a frequency of at most 800 Hz"));
                }
                settings.sampling_frequency = rate;
            }
            Sensor::SensorThreshold { ms2 } => {
                settings.slope_threshold =
                    positive(ms2, "a threshold above 0 m/s2").map_err(HandlerError::InvalidValue)?;
            }
        }
        flash
            .store::<_, { SensorSettings::POSTCARD_MAX_SIZE }>(&FlashKeys::SensorSettings, &settings)
            .await?;
        self.context.sensor_settings = settings;
        self.cli
            .write(|w| uwrite!(w, "Stored. The new settings apply after a reboot"))?;
        Ok(())
    }
}
