use std::fmt;

use zeroize::Zeroizing;

use crate::error::{EddsaError, EddsaResult};

/// PKCS#11 user PIN, wiped on drop
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    /// Upper bound accepted by common tokens (`ulMaxPinLen`)
    pub const MAX_LENGTH: usize = 255;

    /// # Errors
    ///
    /// Returns `EddsaError::SessionUnavailable` for an empty or oversized PIN
    pub fn new(pin: impl Into<String>) -> EddsaResult<Self> {
        let pin = Zeroizing::new(pin.into());
        if pin.is_empty() {
            return Err(EddsaError::SessionUnavailable {
                reason: "empty user PIN".to_string(),
            });
        }
        if pin.len() > Self::MAX_LENGTH {
            return Err(EddsaError::SessionUnavailable {
                reason: format!("user PIN longer than {} bytes", Self::MAX_LENGTH),
            });
        }
        Ok(Self(pin))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_valid() {
        let pin = Pin::new("1234").unwrap();
        assert_eq!(pin.expose(), "1234");
    }

    #[test]
    fn test_pin_empty() {
        assert!(matches!(
            Pin::new(""),
            Err(EddsaError::SessionUnavailable { .. })
        ));
    }

    #[test]
    fn test_pin_too_long() {
        assert!(Pin::new("9".repeat(Pin::MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_pin_debug_redacted() {
        let pin = Pin::new("8675309").unwrap();
        let debug_str = format!("{:?}", pin);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("8675309"));
    }
}
