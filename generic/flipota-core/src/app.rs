//! # Flip to update
//! Main loop of the firmware. Every trigger of the accelerometer wakes the loop, the Z axis
//! of the fetched sample is fed to a [`FlipDetector`] and turning the device over starts an
//! update check. A check can also be requested from the console through
//! [`UPDATE_CHECK_REQUEST`].
use core::sync::atomic::Ordering;

use atomic_float::AtomicF32;
use embassy_futures::select::{Either, select};
use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex},
    mutex::Mutex,
    signal::Signal,
};
use log::{error, info, warn};
use thiserror::Error;

use crate::flip::FlipDetector;
use crate::reboot::{REQUEST_REBOOT, RebootSignal};
use crate::sensor::{AccelSensor, SensorSettings, SetupError, configure};
use crate::system_settings::log_toggles::{LogChannel, LogToggleReceiver, may_log};
use crate::trigger::SampleReady;
use crate::update::{UpdateCheckOutcome, UpdateClient, run_update_check};

pub type CheckRequest = Signal<CriticalSectionRawMutex, ()>;

/// Raised to run an update check without turning the device over
pub static UPDATE_CHECK_REQUEST: CheckRequest = Signal::new();

static LAST_ACCEL_Z: AtomicF32 = AtomicF32::new(0.0);

/// Z acceleration of the last sample the application looked at, in m/s²
pub fn last_accel_z() -> f32 {
    LAST_ACCEL_Z.load(Ordering::Relaxed)
}

#[derive(Error, Debug)]
pub enum AppError<E> {
    #[error("Sensor setup failed: {0}")]
    Setup(#[from] SetupError<E>),
    #[error("Could not read the sensor value: {0:?}")]
    SensorRead(E),
}

pub struct FlipUpdateApp<'a, M: RawMutex, S, U> {
    sensor: &'a Mutex<M, S>,
    ready: &'a SampleReady<M>,
    updater: U,
    detector: FlipDetector,
    log_receiver: LogToggleReceiver,
    check_request: &'a CheckRequest,
    reboot: &'a RebootSignal<CriticalSectionRawMutex>,
}

impl<'a, M, S, U> FlipUpdateApp<'a, M, S, U>
where
    M: RawMutex,
    S: AccelSensor,
    U: UpdateClient,
{
    pub fn new(
        sensor: &'a Mutex<M, S>,
        ready: &'a SampleReady<M>,
        updater: U,
        log_receiver: LogToggleReceiver,
    ) -> Self {
        Self::with_signals(
            sensor,
            ready,
            updater,
            log_receiver,
            &UPDATE_CHECK_REQUEST,
            &REQUEST_REBOOT,
        )
    }

    pub fn with_signals(
        sensor: &'a Mutex<M, S>,
        ready: &'a SampleReady<M>,
        updater: U,
        log_receiver: LogToggleReceiver,
        check_request: &'a CheckRequest,
        reboot: &'a RebootSignal<CriticalSectionRawMutex>,
    ) -> Self {
        Self {
            sensor,
            ready,
            updater,
            detector: FlipDetector::new(),
            log_receiver,
            check_request,
            reboot,
        }
    }

    pub fn updater(&mut self) -> &mut U {
        &mut self.updater
    }

    pub fn detector(&self) -> &FlipDetector {
        &self.detector
    }

    /// Program the sensor and arm its trigger
    pub async fn setup(&mut self, settings: &SensorSettings) -> Result<(), AppError<S::Error>> {
        configure(&mut *self.sensor.lock().await, settings)
            .await
            .inspect_err(|e| error!("{e}"))?;
        info!("Rotate the device to ask updates from the server");
        Ok(())
    }

    /// Like [`Self::setup`], but settings the sensor rejects are replaced by the defaults so
    /// a bad stored configuration cannot keep the device from watching its orientation
    pub async fn setup_or_default(
        &mut self,
        settings: &SensorSettings,
    ) -> Result<(), AppError<S::Error>> {
        let defaults = SensorSettings::default();
        match self.setup(settings).await {
            Err(e) if *settings != defaults => {
                warn!("Stored sensor settings rejected ({e}), retrying with the defaults");
                self.setup(&defaults).await
            }
            res => res,
        }
    }

    /// Wait for the next sample or check request and handle it.
    /// Returns the outcome of the update check if one ran.
    pub async fn step(
        &mut self,
    ) -> Result<Option<UpdateCheckOutcome<U::Error>>, AppError<S::Error>> {
        match select(self.ready.take(), self.check_request.wait()).await {
            Either::First(()) => self.on_sample().await,
            Either::Second(()) => {
                info!("Update check requested from the console");
                Ok(Some(run_update_check(&mut self.updater, self.reboot).await))
            }
        }
    }

    async fn on_sample(
        &mut self,
    ) -> Result<Option<UpdateCheckOutcome<U::Error>>, AppError<S::Error>> {
        let sample = self.sensor.lock().await.read_accel().map_err(|e| {
            error!("Could not read the sensor value: {e:?}");
            AppError::SensorRead(e)
        })?;
        LAST_ACCEL_Z.store(sample.z.to_f32(), Ordering::Relaxed);
        may_log(&mut self.log_receiver, LogChannel::Samples, || {
            info!("Accel x: {} y: {} z: {}", sample.x, sample.y, sample.z);
        });

        let Some(flip) = self.detector.observe(sample.z) else {
            return Ok(None);
        };
        info!("Device turned over ({:?} -> {:?})", flip.from, flip.to);
        Ok(Some(run_update_check(&mut self.updater, self.reboot).await))
    }

    /// Serve samples until the sensor can no longer be read
    pub async fn run(&mut self) -> AppError<S::Error> {
        loop {
            if let Err(e) = self.step().await {
                return e;
            }
        }
    }
}
