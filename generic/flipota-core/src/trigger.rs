//! Glue between the accelerometer interrupt line and the application loop.
//!
//! The interrupt side fetches the sample right away so the device releases its latched
//! interrupt, then hands over to the application through a binary semaphore.

use embassy_sync::{blocking_mutex::raw::RawMutex, mutex::Mutex, signal::Signal};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use log::{debug, error};

use crate::sensor::AccelSensor;
use crate::system_settings::log_toggles::{LogChannel, LogToggleReceiver, may_log};

/// Binary semaphore: any number of gives before a take collapse into one
pub struct SampleReady<M: RawMutex>(Signal<M, ()>);

impl<M: RawMutex> SampleReady<M> {
    pub const fn new() -> Self {
        Self(Signal::new())
    }

    pub fn give(&self) {
        self.0.signal(());
    }

    pub async fn take(&self) {
        self.0.wait().await
    }

    pub fn try_take(&self) -> bool {
        self.0.try_take().is_some()
    }

    pub fn is_given(&self) -> bool {
        self.0.signaled()
    }
}

impl<M: RawMutex> Default for SampleReady<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a fresh sample and wake the application. Returns whether the semaphore was given.
pub async fn handle_trigger<M: RawMutex, S: AccelSensor>(
    sensor: &Mutex<M, S>,
    ready: &SampleReady<M>,
) -> bool {
    if let Err(e) = sensor.lock().await.fetch_sample().await {
        error!("sensor sample fetch failed: {e:?}");
        return false;
    }
    ready.give();
    true
}

/// Serve the active low interrupt line of the accelerometer until the line can no longer
/// be watched. Returns the error of the pin.
pub async fn trigger_loop<M, S, P>(
    sensor: &Mutex<M, S>,
    mut irq: P,
    ready: &SampleReady<M>,
    mut log_receiver: LogToggleReceiver,
) -> P::Error
where
    M: RawMutex,
    S: AccelSensor,
    P: Wait + InputPin,
{
    // an edge that happened before we started listening would otherwise be lost
    if irq.is_low().unwrap_or(false) {
        handle_trigger(sensor, ready).await;
    }
    loop {
        if let Err(e) = irq.wait_for_falling_edge().await {
            error!("Waiting on the accelerometer interrupt failed: {e:?}");
            return e;
        }
        let given = handle_trigger(sensor, ready).await;
        may_log(&mut log_receiver, LogChannel::Trigger, || {
            debug!("Accelerometer trigger handled, sample ready: {given}");
        });
    }
}
