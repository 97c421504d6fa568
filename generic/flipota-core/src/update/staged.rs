use core::fmt::Debug;
use core::marker::PhantomData;

use embedded_storage::nor_flash::NorFlash;
use log::{info, warn};
use postcard::experimental::max_size::MaxSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ufmt::derive::uDebug;

use super::{ProbeResponse, UpdateClient};
use crate::flash::{FlashError, FlashErrorType, FlashHandling, FlashKeys};

/// Record announcing that the inactive slot holds an image ready to be activated
#[derive(Copy, Clone, Debug, uDebug, PartialEq, Eq, Serialize, Deserialize, MaxSize)]
pub struct StagedImage {
    pub version: u32,
}

/// Access to the A/B image slots of the bootloader
pub trait SlotActivator {
    type Error: Debug;

    /// Whether the inactive slot starts with a plausible image
    fn next_slot_ready(&mut self) -> Result<bool, Self::Error>;

    /// Make the inactive slot the one to boot on the next reset
    fn activate_next_slot(&mut self) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum StagedUpdateError<FE, SE> {
    #[error("Could not access the staging record: {0}")]
    Storage(#[from] FlashError<FE>),
    #[error("Could not access the update slot: {0:?}")]
    Slot(SE),
    #[error("No image is staged")]
    NothingStaged,
}

/// Update client which installs images staged in the inactive slot
pub struct StagedUpdateClient<'a, H, F, A> {
    store: &'a H,
    slots: A,
    _flash: PhantomData<F>,
}

impl<'a, H, F, A> StagedUpdateClient<'a, H, F, A>
where
    H: FlashHandling<F>,
    F: NorFlash,
    A: SlotActivator,
{
    pub fn new(store: &'a H, slots: A) -> Self {
        Self {
            store,
            slots,
            _flash: PhantomData,
        }
    }

    pub async fn staged(&self) -> Result<Option<StagedImage>, FlashErrorType<F>> {
        let mut buffer = [0u8; StagedImage::POSTCARD_MAX_SIZE];
        self.store.load(FlashKeys::StagedImage, &mut buffer).await
    }
}

impl<H, F, A> UpdateClient for StagedUpdateClient<'_, H, F, A>
where
    H: FlashHandling<F>,
    F: NorFlash,
    A: SlotActivator,
{
    type Error = StagedUpdateError<F::Error, A::Error>;

    async fn probe(&mut self) -> Result<ProbeResponse, Self::Error> {
        let Some(image) = self.staged().await? else {
            return Ok(ProbeResponse::NoUpdate);
        };
        if !self
            .slots
            .next_slot_ready()
            .map_err(StagedUpdateError::Slot)?
        {
            warn!(
                "Image version {} is staged but the update slot is empty",
                image.version
            );
            return Ok(ProbeResponse::NoUpdate);
        }
        info!("Staged image version {} found", image.version);
        Ok(ProbeResponse::HasUpdate)
    }

    async fn update(&mut self) -> Result<(), Self::Error> {
        let image = self.staged().await?.ok_or(StagedUpdateError::NothingStaged)?;
        // the record goes first, a stale record would re-activate the old image later
        self.store.remove(&FlashKeys::StagedImage).await?;
        self.slots
            .activate_next_slot()
            .map_err(StagedUpdateError::Slot)?;
        info!("Activated image version {}", image.version);
        Ok(())
    }
}
