use thiserror::Error;

/// Failures callers need to tell apart. Everything else travels as
/// `anyhow::Error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Queue full - ignoring command {0}")]
    QueueFull(String),

    #[error("Got inverter number {address} more than max({servers}). Change IG-NR to below this.")]
    AddressAboveServers { address: u8, servers: u8 },

    #[error("Got inverter number {0}; discarding")]
    CorruptDiscovery(u8),

    #[error("Trying to send data for inverter {address} - max declared was {servers}")]
    ReportAddressAboveServers { address: u8, servers: u8 },

    #[error("inverter number {0} out of bounds (1..={max})", max = crate::fronius::packet::MAX_INVERTERS)]
    AddressOutOfRange(u8),

    #[error("serial port {device}: too many retries ({retries})")]
    SerialRetriesExhausted { device: String, retries: u32 },
}

impl BridgeError {
    /// Configuration problems an operator has to fix on the inverters.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AddressAboveServers { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_discovery_overflow_is_fatal() {
        assert!(BridgeError::AddressAboveServers { address: 3, servers: 2 }.is_fatal());
        assert!(!BridgeError::CorruptDiscovery(34).is_fatal());
        assert!(!BridgeError::QueueFull("GetDevType".to_string()).is_fatal());
    }

    #[test]
    fn messages() {
        assert_eq!(
            BridgeError::AddressOutOfRange(13).to_string(),
            "inverter number 13 out of bounds (1..=12)"
        );
    }
}
