use crate::prelude::*;

use crate::fronius::packet::MAX_INVERTERS;
use crate::fronius::value::MEASUREMENT_COUNT;

/// An inverter number as set on the device (IG-NR), 1..=12.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InverterAddress(u8);

impl InverterAddress {
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position among the configured server connections.
    pub fn connection(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for InverterAddress {
    type Error = BridgeError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if raw == 0 || raw > MAX_INVERTERS {
            return Err(BridgeError::AddressOutOfRange(raw));
        }
        Ok(Self(raw))
    }
}

impl std::fmt::Display for InverterAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest sanitised readings for one inverter, in measurement slot order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InverterRecord {
    pub values: [f64; MEASUREMENT_COUNT],
    pub rejections: [u8; MEASUREMENT_COUNT],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_bounds() {
        assert!(InverterAddress::try_from(0).is_err());
        assert_eq!(InverterAddress::try_from(1).unwrap().connection(), 0);
        assert_eq!(InverterAddress::try_from(12).unwrap().get(), 12);
        assert_eq!(
            InverterAddress::try_from(13),
            Err(BridgeError::AddressOutOfRange(13))
        );
    }
}
