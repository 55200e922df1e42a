//! Tagged elements of a DNSSEC private-key file

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{EddsaError, EddsaResult};
use crate::model::Algorithm;

/// Tag namespace shared by Ed25519 and Ed448 files: `15 << 4`
const EDDSA_TAG_BASE: u16 = 15 << 4;

/// The element kinds an EdDSA private-key file may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivateTag {
    /// Raw private scalar
    PrivateKey,
    /// Engine name, a NUL-terminated string
    Engine,
    /// Token label, a NUL-terminated string
    Label,
}

impl PrivateTag {
    /// Numeric tag used by the TLV codec
    pub fn code(self) -> u16 {
        match self {
            PrivateTag::PrivateKey => EDDSA_TAG_BASE,
            PrivateTag::Engine => EDDSA_TAG_BASE + 1,
            PrivateTag::Label => EDDSA_TAG_BASE + 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        [PrivateTag::PrivateKey, PrivateTag::Engine, PrivateTag::Label]
            .into_iter()
            .find(|tag| tag.code() == code)
    }

    /// Field name in the text file layout
    pub fn field_name(self) -> &'static str {
        match self {
            PrivateTag::PrivateKey => "PrivateKey",
            PrivateTag::Engine => "Engine",
            PrivateTag::Label => "Label",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        [PrivateTag::PrivateKey, PrivateTag::Engine, PrivateTag::Label]
            .into_iter()
            .find(|tag| tag.field_name() == name)
    }

    /// True for elements stored as text rather than base64
    pub fn is_text(self) -> bool {
        !matches!(self, PrivateTag::PrivateKey)
    }
}

/// One (tag, length, bytes) element
///
/// Equality runs in constant time over the data.
#[derive(Clone)]
pub struct PrivateElement {
    tag: PrivateTag,
    data: Zeroizing<Vec<u8>>,
}

impl PrivateElement {
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidPrivateKeyFile` when the data does not fit
    /// the codec's 16-bit length field
    pub fn new(tag: PrivateTag, data: Vec<u8>) -> EddsaResult<Self> {
        if data.len() > usize::from(u16::MAX) {
            return Err(EddsaError::private_file(format!(
                "{} element of {} bytes",
                tag.field_name(),
                data.len()
            )));
        }
        Ok(Self {
            tag,
            data: Zeroizing::new(data),
        })
    }

    /// String element stored with its terminating NUL
    pub fn c_string(tag: PrivateTag, text: &str) -> EddsaResult<Self> {
        let mut data = Vec::with_capacity(text.len() + 1);
        data.extend_from_slice(text.as_bytes());
        data.push(0);
        Self::new(tag, data)
    }

    pub fn tag(&self) -> PrivateTag {
        self.tag
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Declared length, always equal to `data().len()`
    pub fn length(&self) -> u16 {
        // Bounded by the check in `new`.
        self.data.len() as u16
    }

    /// Read a string element, dropping the terminating NUL
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidPrivateKeyFile` for interior NULs or
    /// non-UTF-8 data
    pub fn as_c_str(&self) -> EddsaResult<&str> {
        let bytes = self.data.strip_suffix(&[0]).unwrap_or(&self.data);
        if bytes.contains(&0) {
            return Err(EddsaError::private_file(format!(
                "{} contains a NUL byte",
                self.tag.field_name()
            )));
        }
        std::str::from_utf8(bytes).map_err(|_| {
            EddsaError::private_file(format!("{} is not UTF-8", self.tag.field_name()))
        })
    }
}

impl PartialEq for PrivateElement {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && bool::from(self.data().ct_eq(other.data()))
    }
}

impl Eq for PrivateElement {}

impl fmt::Debug for PrivateElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            PrivateTag::PrivateKey => write!(f, "PrivateKey([REDACTED; {}])", self.data.len()),
            tag => write!(
                f,
                "{}({:?})",
                tag.field_name(),
                String::from_utf8_lossy(&self.data)
            ),
        }
    }
}

/// Ordered element list written to or read from a private-key file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKeyFile {
    algorithm: Algorithm,
    elements: Vec<PrivateElement>,
}

impl PrivateKeyFile {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            elements: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn push(&mut self, element: PrivateElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[PrivateElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element carrying `tag`
    pub fn find(&self, tag: PrivateTag) -> Option<&PrivateElement> {
        self.elements.iter().find(|element| element.tag() == tag)
    }
}
