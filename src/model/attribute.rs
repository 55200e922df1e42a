//! Typed binary key attributes

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{EddsaError, EddsaResult};

/// DER tag of an OCTET STRING, used to wrap the public point
pub const TAG_OCTET_STRING: u8 = 0x04;

/// Byte-valued PKCS#11 key attribute kinds handled by this backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// `CKA_EC_PARAMS`: curve identifier
    EcParams,
    /// `CKA_EC_POINT`: DER-wrapped public point
    EcPoint,
    /// `CKA_VALUE`: private scalar
    Value,
    /// `CKA_LABEL`
    Label,
    /// `CKA_ID`
    Id,
}

impl AttributeType {
    /// True for attributes that hold private key material
    pub fn is_secret(self) -> bool {
        matches!(self, AttributeType::Value)
    }
}

/// One attribute record: a tag and an owned buffer
///
/// The buffer is zeroed when the record is dropped, whatever its tag.
/// Equality runs in constant time over the value.
#[derive(Clone)]
pub struct Attribute {
    kind: AttributeType,
    value: Zeroizing<Vec<u8>>,
}

impl Attribute {
    pub fn new(kind: AttributeType, value: Vec<u8>) -> Self {
        Self {
            kind,
            value: Zeroizing::new(value),
        }
    }

    pub fn from_slice(kind: AttributeType, value: &[u8]) -> Self {
        Self::new(kind, value.to_vec())
    }

    /// Wrap a raw public point as `0x04 <len> <point>`
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidEncoding` if the point does not fit a
    /// one-byte length
    pub fn ec_point(point: &[u8]) -> EddsaResult<Self> {
        let len = u8::try_from(point.len())
            .map_err(|_| EddsaError::encoding(format!("point of {} bytes", point.len())))?;
        let mut value = Vec::with_capacity(point.len() + 2);
        value.push(TAG_OCTET_STRING);
        value.push(len);
        value.extend_from_slice(point);
        Ok(Self::new(AttributeType::EcPoint, value))
    }

    pub fn kind(&self) -> AttributeType {
        self.kind
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Strip the octet-string marker from an `EcPoint` value
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidEncoding` if the marker byte, the length
    /// byte or the total length disagree with `expected_len`
    pub fn raw_point(&self, expected_len: usize) -> EddsaResult<&[u8]> {
        let value = self.value();
        if value.len() != expected_len + 2 {
            return Err(EddsaError::encoding(format!(
                "EC point is {} bytes, expected {}",
                value.len(),
                expected_len + 2
            )));
        }
        if value[0] != TAG_OCTET_STRING {
            return Err(EddsaError::encoding(format!(
                "EC point marker 0x{:02x}",
                value[0]
            )));
        }
        if usize::from(value[1]) != expected_len {
            return Err(EddsaError::encoding(format!(
                "EC point length byte {}",
                value[1]
            )));
        }
        Ok(&value[2..])
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && bool::from(self.value().ct_eq(other.value()))
    }
}

impl Eq for Attribute {}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_secret() {
            write!(f, "{:?}([REDACTED; {}])", self.kind, self.len())
        } else {
            write!(f, "{:?}({})", self.kind, hex::encode(self.value()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ec_point_wraps_with_marker() {
        let attr = Attribute::ec_point(&[7u8; 32]).unwrap();
        assert_eq!(attr.kind(), AttributeType::EcPoint);
        assert_eq!(attr.len(), 34);
        assert_eq!(&attr.value()[..2], &[0x04, 32]);
        assert_eq!(attr.raw_point(32).unwrap(), &[7u8; 32]);
    }

    #[test]
    fn test_raw_point_rejects_bad_marker() {
        let mut bytes = vec![0x03, 32];
        bytes.extend_from_slice(&[1u8; 32]);
        let attr = Attribute::new(AttributeType::EcPoint, bytes);
        assert!(matches!(
            attr.raw_point(32),
            Err(EddsaError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn test_raw_point_rejects_length_byte_mismatch() {
        let mut bytes = vec![0x04, 31];
        bytes.extend_from_slice(&[1u8; 32]);
        let attr = Attribute::new(AttributeType::EcPoint, bytes);
        assert!(attr.raw_point(32).is_err());
    }

    #[test]
    fn test_raw_point_rejects_wrong_size() {
        let attr = Attribute::ec_point(&[1u8; 32]).unwrap();
        assert!(attr.raw_point(57).is_err());
    }

    #[test]
    fn test_equality_compares_kind_and_value() {
        let value = Attribute::new(AttributeType::Value, vec![0xab; 32]);
        assert_eq!(value, Attribute::new(AttributeType::Value, vec![0xab; 32]));
        assert_ne!(value, Attribute::new(AttributeType::Value, vec![0xab; 31]));
        assert_ne!(value, Attribute::new(AttributeType::Id, vec![0xab; 32]));

        let mut flipped = vec![0xab; 32];
        flipped[31] ^= 0x01;
        assert_ne!(value, Attribute::new(AttributeType::Value, flipped));
    }

    #[test]
    fn test_secret_debug_redacted() {
        let attr = Attribute::new(AttributeType::Value, vec![0xab; 32]);
        let debug_str = format!("{:?}", attr);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("abab"));
    }

    #[test]
    fn test_public_debug_shows_hex() {
        let attr = Attribute::new(AttributeType::Label, b"zsk".to_vec());
        assert!(format!("{:?}", attr).contains("7a736b"));
    }
}
