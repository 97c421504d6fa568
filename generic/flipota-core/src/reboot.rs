use embassy_sync::{
    blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex},
    signal::Signal,
};
use log::info;

pub type RebootSignal<M> = Signal<M, RebootReason>;

/// Raised by the update check after an install and by the console
pub static REQUEST_REBOOT: RebootSignal<CriticalSectionRawMutex> = Signal::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RebootReason {
    UpdateInstalled,
    UserRequest,
}

/// Waits until a reboot is requested through `signal`.
/// The caller is expected to reset the system once this returns.
pub async fn wait_for_reboot<M: RawMutex>(signal: &RebootSignal<M>) -> RebootReason {
    let reason = signal.wait().await;
    match reason {
        RebootReason::UpdateInstalled => info!("Update installed. Rebooting into the new image..."),
        RebootReason::UserRequest => info!("Reboot requested. Rebooting..."),
    }
    reason
}
