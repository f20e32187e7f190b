//! Communicating with the external reader using host card emulation

use std::fmt::{Display, Formatter};

/// A service the host NFC stack calls into while the device emulates a card.
/// The host owns the lifecycle: implementations never initiate a call themselves.
pub trait HostApduService {
    /// Handles the command APDU sent by the reader, then returns the response APDU.
    fn handle_command(&self, command: &[u8]) -> Vec<u8>;

    /// Notifies that the link to the reader has ended.
    fn handle_deactivation(&self, reason: DeactivationReason);
}

/// A reason code reported by the host when the emulated card is deactivated.
/// Any value is accepted; the known codes only change how it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DeactivationReason(i32);

impl DeactivationReason {
    /// The NFC link to the reader was lost.
    pub const LINK_LOSS: Self = Self(0);

    /// The reader selected another application.
    pub const DESELECTED: Self = Self(1);

    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw code supplied by the host.
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl From<i32> for DeactivationReason {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<DeactivationReason> for i32 {
    fn from(reason: DeactivationReason) -> Self {
        reason.0
    }
}

impl Display for DeactivationReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::LINK_LOSS => write!(f, "link loss ({})", self.0),
            Self::DESELECTED => write!(f, "deselected ({})", self.0),
            _ => write!(f, "unknown ({})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!("link loss (0)", DeactivationReason::from(0).to_string());
        assert_eq!("deselected (1)", DeactivationReason::from(1).to_string());
        assert_eq!("unknown (-1)", DeactivationReason::from(-1).to_string());
        assert_eq!(
            "unknown (2147483647)",
            DeactivationReason::from(i32::MAX).to_string()
        );
    }

    #[test]
    fn test_code_round_trip() {
        assert_eq!(-7, i32::from(DeactivationReason::new(-7)));
        assert_eq!(1, DeactivationReason::DESELECTED.code());
    }
}
