//! ISO/IEC 7816-4 status words.

use std::fmt::{Display, Formatter};

/// The trailer of a response APDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    /// Normal processing, no further qualification.
    pub const OK: Self = Self::new(0x90, 0x00);

    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Reads the status word from the last two octets of a response.
    pub fn from_response(response: &[u8]) -> Option<Self> {
        match response {
            [.., sw1, sw2] => Some(Self::new(*sw1, *sw2)),
            _ => None,
        }
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.sw1, self.sw2]
    }

    /// Determines whether the status word indicates success or not.
    pub const fn is_ok(self) -> bool {
        matches!((self.sw1, self.sw2), (0x90, 0x00))
    }
}

impl From<StatusWord> for Vec<u8> {
    fn from(sw: StatusWord) -> Self {
        sw.to_bytes().to_vec()
    }
}

impl Display for StatusWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}{:02X}", self.sw1, self.sw2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response() {
        assert_eq!(
            Some(StatusWord::OK),
            StatusWord::from_response(&[0x01, 0x02, 0x90, 0x00])
        );
        assert_eq!(
            Some(StatusWord::new(0x6A, 0x82)),
            StatusWord::from_response(&[0x6A, 0x82])
        );
        assert_eq!(None, StatusWord::from_response(&[0x90]));
        assert_eq!(None, StatusWord::from_response(&[]));
    }

    #[test]
    fn test_display() {
        assert_eq!("9000", StatusWord::OK.to_string());
        assert_eq!("6A82", StatusWord::new(0x6A, 0x82).to_string());
    }

    #[test]
    fn test_is_ok() {
        assert!(StatusWord::OK.is_ok());
        assert!(!StatusWord::new(0x6A, 0x82).is_ok());
    }
}
