use core::cell::RefCell;

use embassy_embedded_hal::flash::partition::BlockingPartition;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embedded_storage::nor_flash::ErrorType;
use esp_bootloader_esp_idf::partitions::{self, PartitionType};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use flipota_core::flash::{FlashError, FlashHandling, FlashType, PersistentStorage};
use log::{info, warn};
use static_cell::StaticCell;
use thiserror::Error;

/// The one flash driver of the chip, shared by the settings store and the OTA slots
pub type SharedFlash = Mutex<CriticalSectionRawMutex, RefCell<FlashStorage<'static>>>;
pub type ESPFlashType = BlockingPartition<'static, CriticalSectionRawMutex, FlashStorage<'static>>;
pub type ESPFlashError = FlashError<<ESPFlashType as ErrorType>::Error>;

#[derive(Error, Debug)]
pub enum FlashSetupError {
    #[error("Could not read the partition table: {0:?}")]
    PartitionTable(partitions::Error),
    #[error("Could not find the settings partition")]
    MissingPartition,
    #[error("Failed to format flash: {0}")]
    Format(ESPFlashError),
}

pub fn share_flash(flash: FLASH<'static>) -> &'static SharedFlash {
    static SHARED_FLASH: StaticCell<SharedFlash> = StaticCell::new();
    SHARED_FLASH.init(Mutex::new(RefCell::new(
        FlashStorage::new(flash).multicore_auto_park(),
    )))
}

pub struct FlashHandler {
    flash: FlashType<ESPFlashType>,
}

impl FlashHandling<ESPFlashType> for FlashHandler {
    fn get_flash(&self) -> &FlashType<ESPFlashType> {
        &self.flash
    }
}

impl FlashHandler {
    /// Mount the key-value store living in `partition`, formatting it on first boot
    pub async fn new(
        shared: &'static SharedFlash,
        partition: PartitionType,
    ) -> Result<Self, FlashSetupError> {
        let (offset, len) = shared.lock(|storage| {
            let mut pt_mem = [0u8; partitions::PARTITION_TABLE_MAX_LEN];
            let mut storage = storage.borrow_mut();
            let pt = partitions::read_partition_table(&mut *storage, &mut pt_mem)
                .map_err(FlashSetupError::PartitionTable)?;
            let entry = pt
                .find_partition(partition)
                .map_err(FlashSetupError::PartitionTable)?
                .ok_or(FlashSetupError::MissingPartition)?;
            Ok::<_, FlashSetupError>((entry.offset(), entry.len()))
        })?;
        info!("Storing data into partition with offset: {offset}");
        let region = BlockingPartition::new(shared, offset, len);

        let flash = FlashType::new(PersistentStorage::new(0, region), ekv::Config::default());
        if flash.mount().await.is_ok() {
            info!("Flash mounted successfully");
        } else {
            warn!("Failed to mount flash. Assuming first boot, formatting...");
            flash
                .format()
                .await
                .map_err(|e| FlashSetupError::Format(FlashError::from(e)))?;
        }

        Ok(Self { flash })
    }
}
