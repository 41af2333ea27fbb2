use crate::prelude::*;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// First and last measurement index polled with GetValues.
pub const VAR_START: u8 = 0x10;
pub const VAR_END: u8 = 0x18;
/// Highest index the protocol uses for measured values.
pub const VALUE_RANGE_END: u8 = 0x2a;
pub const MEASUREMENT_COUNT: usize = (VAR_END - VAR_START + 1) as usize;

/// Exponent byte meaning "use the default scale for this measurement".
pub const EXPONENT_SENTINEL: i8 = 11;

const MIN_EXPONENT: i8 = -3;
const MAX_EXPONENT: i8 = 10;
const POWERS_OF_TEN: [f64; 14] = [
    0.001,
    0.01,
    0.1,
    1.0,
    10.0,
    100.0,
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
    100_000_000.0,
    1_000_000_000.0,
    10_000_000_000.0,
];

// {{{ MeasurementIndex
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MeasurementIndex {
    Power = 0x10,
    EnergyTotal = 0x11,
    EnergyDay = 0x12,
    EnergyYear = 0x13,
    AcCurrent = 0x14,
    AcVoltage = 0x15,
    AcFrequency = 0x16,
    DcCurrent = 0x17,
    DcVoltage = 0x18,
}

impl MeasurementIndex {
    pub const ALL: [MeasurementIndex; MEASUREMENT_COUNT] = [
        Self::Power,
        Self::EnergyTotal,
        Self::EnergyDay,
        Self::EnergyYear,
        Self::AcCurrent,
        Self::AcVoltage,
        Self::AcFrequency,
        Self::DcCurrent,
        Self::DcVoltage,
    ];

    /// Position in a per-inverter measurement table.
    pub fn slot(self) -> usize {
        (u8::from(self) - VAR_START) as usize
    }

    /// Scale the devices report during normal operation, substituted for
    /// the startup sentinel.
    pub fn baseline_exponent(self) -> i8 {
        match self {
            Self::Power => 0,
            Self::EnergyTotal | Self::EnergyDay | Self::EnergyYear => 3,
            Self::AcCurrent => -2,
            Self::AcVoltage => 0,
            Self::AcFrequency => -2,
            Self::DcCurrent => -2,
            Self::DcVoltage => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Power => "POWER NOW",
            Self::EnergyTotal => "ENERGY TOTAL",
            Self::EnergyDay => "ENERGY DAY",
            Self::EnergyYear => "ENERGY YEAR",
            Self::AcCurrent => "AC Current",
            Self::AcVoltage => "AC Voltage",
            Self::AcFrequency => "AC Frequency",
            Self::DcCurrent => "DC Current",
            Self::DcVoltage => "DC Voltage",
        }
    }
}
// }}}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExponentFault {
    Underflow(i8),
    Overflow(i8),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decoded {
    pub value: f64,
    pub exponent: i8,
    pub fault: Option<ExponentFault>,
}

/// 10^n for n in [-3, 10].
pub fn ten_to_the(n: i8) -> Option<f64> {
    if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&n) {
        return None;
    }
    Some(POWERS_OF_TEN[(n - MIN_EXPONENT) as usize])
}

pub fn decode(magnitude_hi: u8, magnitude_lo: u8, exponent_byte: u8, index: u8) -> Decoded {
    let magnitude = u16::from_be_bytes([magnitude_hi, magnitude_lo]);
    let mut exponent = exponent_byte as i8;

    if exponent == EXPONENT_SENTINEL {
        if let Ok(index) = MeasurementIndex::try_from(index) {
            exponent = index.baseline_exponent();
        }
    }

    let (value, fault) = match ten_to_the(exponent) {
        Some(scale) => (magnitude as f64 * scale, None),
        None if exponent < MIN_EXPONENT => (0.0, Some(ExponentFault::Underflow(exponent))),
        None if magnitude > 0 => (0.0, Some(ExponentFault::Overflow(exponent))),
        None => (0.0, None),
    };

    match fault {
        Some(ExponentFault::Underflow(e)) => debug!(
            "Exponent underflow: {:02x} for index 0x{:02x} (val {})",
            e, index, magnitude
        ),
        Some(ExponentFault::Overflow(e)) => debug!(
            "Exponent overflow: {:02x} for index 0x{:02x} (val {})",
            e, index, magnitude
        ),
        None => {}
    }

    Decoded {
        value,
        exponent,
        fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_by_exponent() {
        assert_eq!(decode(0x00, 0xe6, 0x00, 0x15).value, 230.0);
        let hz = decode(0x13, 0x87, (-2i8) as u8, 0x16).value;
        assert!((hz - 49.99).abs() < 1e-9);
    }

    #[test]
    fn sentinel_uses_baseline() {
        let d = decode(0x00, 0x89, 11, MeasurementIndex::EnergyTotal.into());
        assert_eq!(d.exponent, 3);
        assert_eq!(d.value, 137_000.0);
        assert_eq!(d.fault, None);
    }

    #[test]
    fn sentinel_is_transparent_for_zero() {
        let power = MeasurementIndex::Power;
        let sentinel = decode(0, 0, 11, power.into());
        let baseline = decode(0, 0, power.baseline_exponent() as u8, power.into());
        assert_eq!(sentinel.value, baseline.value);
    }

    #[test]
    fn underflow_is_zero() {
        let d = decode(0, 100, (-4i8) as u8, 0x10);
        assert_eq!(d.value, 0.0);
        assert_eq!(d.fault, Some(ExponentFault::Underflow(-4)));
    }

    #[test]
    fn sentinel_outside_polled_range_overflows() {
        let d = decode(0, 100, 11, 0x20);
        assert_eq!(d.value, 0.0);
        assert_eq!(d.fault, Some(ExponentFault::Overflow(11)));
    }

    #[test]
    fn zero_magnitude_overflow_is_not_a_fault() {
        assert_eq!(decode(0, 0, 20, 0x20).fault, None);
    }

    #[test]
    fn table_bounds() {
        assert_eq!(ten_to_the(-3), Some(0.001));
        assert_eq!(ten_to_the(10), Some(10_000_000_000.0));
        assert_eq!(ten_to_the(-4), None);
        assert_eq!(ten_to_the(11), None);
    }

    #[test]
    fn slots_are_contiguous() {
        for (i, index) in MeasurementIndex::ALL.iter().enumerate() {
            assert_eq!(index.slot(), i);
        }
    }
}
