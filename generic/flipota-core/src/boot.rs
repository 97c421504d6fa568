//! Confirmation of the running firmware image.
//!
//! After an update the bootloader starts the new image on probation. Unless the image is
//! marked valid it will roll back to the previous image on the next reset.

use core::fmt::Debug;

use log::{error, info};

/// State of the running image as recorded by the bootloader
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageState {
    /// Freshly activated, not yet booted
    New,
    /// Booted once, waiting for the application to confirm it
    PendingVerify,
    Valid,
    Invalid,
    Aborted,
    /// No update bookkeeping exists, e.g. the image was flashed directly
    Undefined,
}

pub trait BootImage {
    type Error: Debug;

    fn image_state(&mut self) -> Result<ImageState, Self::Error>;
    fn mark_valid(&mut self) -> Result<(), Self::Error>;
}

/// Mark the running image as good so the bootloader keeps it.
/// Returns `true` if the state had to be written.
pub fn confirm_boot_image<B: BootImage>(boot: &mut B) -> Result<bool, B::Error> {
    info!("Confirming the boot image");
    let state = boot.image_state().inspect_err(|e| {
        error!("Error to confirm the image, state unreadable: {e:?}");
    })?;
    if state == ImageState::Valid {
        info!("Boot image already confirmed");
        return Ok(false);
    }
    boot.mark_valid().inspect_err(|e| {
        error!("Error to confirm the image: {e:?}");
    })?;
    info!("Boot image confirmed (was {state:?})");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockBootImage, MockError};

    #[test]
    fn pending_image_gets_confirmed() {
        let mut boot = MockBootImage::new(ImageState::PendingVerify);
        assert_eq!(confirm_boot_image(&mut boot), Ok(true));
        assert_eq!(boot.state, Ok(ImageState::Valid));
    }

    #[test]
    fn valid_image_is_not_rewritten() {
        let mut boot = MockBootImage::new(ImageState::Valid);
        assert_eq!(confirm_boot_image(&mut boot), Ok(false));
        assert_eq!(boot.marks, 0);
    }

    #[test]
    fn failure_is_reported() {
        let mut boot = MockBootImage::new(ImageState::New);
        boot.fail_mark = true;
        assert_eq!(confirm_boot_image(&mut boot), Err(MockError));

        let mut boot = MockBootImage::new(ImageState::New);
        boot.state = Err(MockError);
        assert_eq!(confirm_boot_image(&mut boot), Err(MockError));
        assert_eq!(boot.marks, 0);
    }
}
