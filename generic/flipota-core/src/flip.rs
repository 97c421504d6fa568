//! Detection of the device being turned over.
//!
//! The detector only looks at the sign of a single acceleration axis. When the device rests
//! face up gravity pulls along one direction of that axis, when it is turned over the sign
//! of the reading changes.

use crate::sensor::SensorValue;

/// Last known orientation of the observed axis
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AxisSign {
    #[default]
    Unknown,
    Positive,
    Negative,
}

/// A change of orientation reported by [`FlipDetector::observe`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flip {
    pub from: AxisSign,
    pub to: AxisSign,
}

#[derive(Debug)]
pub struct FlipDetector {
    last: AxisSign,
}

impl Default for FlipDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FlipDetector {
    /// The device is assumed to start face down, so the first face up reading is a flip
    pub const fn new() -> Self {
        Self {
            last: AxisSign::Negative,
        }
    }

    pub fn last_sign(&self) -> AxisSign {
        self.last
    }

    /// Feed a new reading of the observed axis.
    ///
    /// Readings without a sign (integer part zero) are ignored. Every reading with the sign
    /// opposite to the last known orientation is a flip.
    pub fn observe(&mut self, value: SensorValue) -> Option<Flip> {
        let sign = value.sign();
        if sign == AxisSign::Unknown {
            return None;
        }
        let previous = self.last;
        if previous == sign {
            return None;
        }
        self.last = sign;
        Some(Flip {
            from: previous,
            to: sign,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reading_face_down_is_silent() {
        let mut det = FlipDetector::new();
        assert_eq!(det.observe(SensorValue::new(-9, -810_000)), None);
        assert_eq!(det.last_sign(), AxisSign::Negative);
    }

    #[test]
    fn first_reading_face_up_is_a_flip() {
        let mut det = FlipDetector::new();
        assert_eq!(
            det.observe(SensorValue::new(9, 810_000)),
            Some(Flip {
                from: AxisSign::Negative,
                to: AxisSign::Positive
            })
        );
        assert_eq!(det.last_sign(), AxisSign::Positive);
        assert_eq!(det.observe(SensorValue::new(9, 0)), None);
    }

    #[test]
    fn sign_change_is_a_flip() {
        let mut det = FlipDetector::new();
        det.observe(SensorValue::new(9, 0));
        let flip = det.observe(SensorValue::new(-9, -500_000));
        assert_eq!(
            flip,
            Some(Flip {
                from: AxisSign::Positive,
                to: AxisSign::Negative
            })
        );
        // and back again
        assert!(det.observe(SensorValue::new(3, 0)).is_some());
    }

    #[test]
    fn same_sign_is_ignored() {
        let mut det = FlipDetector::new();
        det.observe(SensorValue::new(-9, 0));
        assert_eq!(det.observe(SensorValue::new(-2, 0)), None);
        assert_eq!(det.last_sign(), AxisSign::Negative);
    }

    #[test]
    fn readings_below_one_keep_state() {
        let mut det = FlipDetector::new();
        det.observe(SensorValue::new(9, 0));
        // sideways: integer part is zero, even though the value is negative
        assert_eq!(det.observe(SensorValue::new(0, -900_000)), None);
        assert_eq!(det.last_sign(), AxisSign::Positive);
        assert!(det.observe(SensorValue::new(-1, 0)).is_some());
    }
}
