//! # Update check
//! The update transport is not part of this crate. Anything that can answer "is there an
//! update?" and "install it" implements [`UpdateClient`]. [`run_update_check`] drives one
//! check and requests a reboot through the [`crate::reboot`] signal when a new image was
//! installed.
//!
//! [`staged::StagedUpdateClient`] is a ready made client for images which were written into
//! the inactive slot by an external tool.
pub mod staged;

use core::convert::Infallible;
use core::fmt::Debug;
use core::future;

use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{error, info};

use crate::reboot::{RebootReason, RebootSignal};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProbeResponse {
    HasUpdate,
    NoUpdate,
}

pub trait UpdateClient {
    type Error: Debug;

    /// Ask whether a new image is available
    fn probe(&mut self) -> impl future::Future<Output = Result<ProbeResponse, Self::Error>>;

    /// Install the image announced by the last probe so that it boots on the next reset
    fn update(&mut self) -> impl future::Future<Output = Result<(), Self::Error>>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateCheckOutcome<E> {
    /// A new image is installed and a reboot was requested
    Installed,
    NoUpdate,
    InstallFailed(E),
    ProbeFailed(E),
}

pub async fn run_update_check<U: UpdateClient, M: RawMutex>(
    client: &mut U,
    reboot: &RebootSignal<M>,
) -> UpdateCheckOutcome<U::Error> {
    info!("Starting the update check");
    match client.probe().await {
        Ok(ProbeResponse::HasUpdate) => match client.update().await {
            Ok(()) => {
                reboot.signal(RebootReason::UpdateInstalled);
                UpdateCheckOutcome::Installed
            }
            Err(e) => {
                // the image was offered, so this is not also reported as "No update found"
                error!("Error installing update: {e:?}");
                UpdateCheckOutcome::InstallFailed(e)
            }
        },
        Ok(ProbeResponse::NoUpdate) => {
            info!("No update found");
            UpdateCheckOutcome::NoUpdate
        }
        Err(e) => {
            error!("Invalid response: {e:?}");
            UpdateCheckOutcome::ProbeFailed(e)
        }
    }
}

/// Client for a device without a place to take updates from. Every check finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUpdateClient;

impl UpdateClient for NoUpdateClient {
    type Error = Infallible;

    async fn probe(&mut self) -> Result<ProbeResponse, Infallible> {
        Ok(ProbeResponse::NoUpdate)
    }

    async fn update(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockError, MockUpdateClient};
    use embassy_futures::block_on;
    use embassy_sync::{blocking_mutex::raw::NoopRawMutex, signal::Signal};

    #[test]
    fn install_requests_reboot() {
        let reboot: RebootSignal<NoopRawMutex> = Signal::new();
        let mut client = MockUpdateClient::new(Ok(ProbeResponse::HasUpdate));
        let outcome = block_on(run_update_check(&mut client, &reboot));
        assert_eq!(outcome, UpdateCheckOutcome::Installed);
        assert_eq!(reboot.try_take(), Some(RebootReason::UpdateInstalled));
    }

    #[test]
    fn failed_install_keeps_running() {
        let reboot: RebootSignal<NoopRawMutex> = Signal::new();
        let mut client = MockUpdateClient::new(Ok(ProbeResponse::HasUpdate));
        client.update_result = Err(MockError);
        let outcome = block_on(run_update_check(&mut client, &reboot));
        assert_eq!(outcome, UpdateCheckOutcome::InstallFailed(MockError));
        assert!(!reboot.signaled());
    }

    #[test]
    fn no_update_does_not_install() {
        let reboot: RebootSignal<NoopRawMutex> = Signal::new();
        let mut client = MockUpdateClient::new(Ok(ProbeResponse::NoUpdate));
        let outcome = block_on(run_update_check(&mut client, &reboot));
        assert_eq!(outcome, UpdateCheckOutcome::NoUpdate);
        assert_eq!(client.updates, 0);
        assert!(!reboot.signaled());
    }

    #[test]
    fn probe_error_is_reported() {
        let reboot: RebootSignal<NoopRawMutex> = Signal::new();
        let mut client = MockUpdateClient::new(Err(MockError));
        let outcome = block_on(run_update_check(&mut client, &reboot));
        assert_eq!(outcome, UpdateCheckOutcome::ProbeFailed(MockError));
        assert_eq!(client.updates, 0);
    }

    #[test]
    fn storeless_client_never_installs() {
        let reboot: RebootSignal<NoopRawMutex> = Signal::new();
        let outcome = block_on(run_update_check(&mut NoUpdateClient, &reboot));
        assert_eq!(outcome, UpdateCheckOutcome::NoUpdate);
        assert!(!reboot.signaled());
    }
}
