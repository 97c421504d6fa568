//! Access to the OTA bookkeeping of the ESP-IDF bootloader.
use embedded_storage::ReadStorage;
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::{self, PARTITION_TABLE_MAX_LEN};
use esp_storage::FlashStorage;
use flipota_core::boot::{BootImage, ImageState};
use flipota_core::update::staged::SlotActivator;
use log::info;

use crate::flash::SharedFlash;

/// First byte of every ESP application image
const ESP_IMAGE_MAGIC: u8 = 0xE9;

pub struct EspOtaSlots {
    flash: &'static SharedFlash,
}

impl EspOtaSlots {
    pub fn new(flash: &'static SharedFlash) -> Self {
        Self { flash }
    }

    fn with_updater<R>(
        &mut self,
        f: impl FnOnce(&mut OtaUpdater<'_, FlashStorage<'static>>) -> Result<R, partitions::Error>,
    ) -> Result<R, partitions::Error> {
        self.flash.lock(|storage| {
            let mut storage = storage.borrow_mut();
            let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
            let mut ota = OtaUpdater::new(&mut *storage, &mut buffer)?;
            f(&mut ota)
        })
    }
}

fn image_state(state: OtaImageState) -> ImageState {
    #[allow(unreachable_patterns)]
    match state {
        OtaImageState::New => ImageState::New,
        OtaImageState::PendingVerify => ImageState::PendingVerify,
        OtaImageState::Valid => ImageState::Valid,
        OtaImageState::Invalid => ImageState::Invalid,
        OtaImageState::Aborted => ImageState::Aborted,
        _ => ImageState::Undefined,
    }
}

impl BootImage for EspOtaSlots {
    type Error = partitions::Error;

    fn image_state(&mut self) -> Result<ImageState, Self::Error> {
        self.with_updater(|ota| {
            let slot = ota.selected_partition()?;
            let state = ota.current_ota_state()?;
            info!("Running from {slot:?}, image state {state:?}");
            Ok(image_state(state))
        })
    }

    fn mark_valid(&mut self) -> Result<(), Self::Error> {
        self.with_updater(|ota| ota.set_current_ota_state(OtaImageState::Valid))
    }
}

impl SlotActivator for EspOtaSlots {
    type Error = partitions::Error;

    fn next_slot_ready(&mut self) -> Result<bool, Self::Error> {
        self.with_updater(|ota| {
            let (mut slot, kind) = ota.next_partition()?;
            let mut magic = [0u8; 4];
            slot.read(0, &mut magic)?;
            info!("Update slot {kind:?} starts with {:#04x}", magic[0]);
            Ok(magic[0] == ESP_IMAGE_MAGIC)
        })
    }

    fn activate_next_slot(&mut self) -> Result<(), Self::Error> {
        self.with_updater(|ota| {
            ota.activate_next_partition()?;
            ota.set_current_ota_state(OtaImageState::New)
        })
    }
}
