//! EdDSA algorithm variants and their fixed sizes

use std::fmt;

use crate::error::{EddsaError, EddsaResult};

/// DER `OBJECT IDENTIFIER 1.3.101.112` (id-Ed25519, RFC 8410)
const ED25519_PARAMS: &[u8] = &[0x06, 0x03, 0x2b, 0x65, 0x70];
/// DER `OBJECT IDENTIFIER 1.3.101.113` (id-Ed448, RFC 8410)
const ED448_PARAMS: &[u8] = &[0x06, 0x03, 0x2b, 0x65, 0x71];

/// DER `PrintableString "edwards25519"`, accepted on input only
const ED25519_PARAMS_NAMED: &[u8] = b"\x13\x0cedwards25519";
/// DER `PrintableString "edwards448"`, accepted on input only
const ED448_PARAMS_NAMED: &[u8] = b"\x13\x0aedwards448";

/// Edwards curve signature algorithm
///
/// Every size in the DNSSEC encoding is fixed by the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Ed25519, DNSSEC algorithm 15
    Ed25519,
    /// Ed448, DNSSEC algorithm 16
    Ed448,
}

impl Algorithm {
    /// DNSSEC algorithm number (RFC 8080)
    pub fn dnssec_number(self) -> u8 {
        match self {
            Algorithm::Ed25519 => 15,
            Algorithm::Ed448 => 16,
        }
    }

    /// Look up an algorithm by its DNSSEC number
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidAlgorithm` for anything but 15 or 16
    pub fn from_dnssec_number(number: u8) -> EddsaResult<Self> {
        match number {
            15 => Ok(Algorithm::Ed25519),
            16 => Ok(Algorithm::Ed448),
            other => Err(EddsaError::InvalidAlgorithm {
                algorithm: format!("DNSSEC algorithm {}", other),
            }),
        }
    }

    /// Length of the raw public point (the DNSKEY wire encoding)
    pub fn point_len(self) -> usize {
        match self {
            Algorithm::Ed25519 => 32,
            Algorithm::Ed448 => 57,
        }
    }

    /// Length of the raw private scalar
    pub fn scalar_len(self) -> usize {
        self.point_len()
    }

    /// Length of a raw signature
    pub fn signature_len(self) -> usize {
        match self {
            Algorithm::Ed25519 => 64,
            Algorithm::Ed448 => 114,
        }
    }

    /// Key size in bits as reported for DNSSEC keys
    pub fn key_bits(self) -> u32 {
        (self.point_len() * 8) as u32
    }

    /// Curve parameters for `CKA_EC_PARAMS`
    pub fn ec_params(self) -> &'static [u8] {
        match self {
            Algorithm::Ed25519 => ED25519_PARAMS,
            Algorithm::Ed448 => ED448_PARAMS,
        }
    }

    /// Identify the curve named by a `CKA_EC_PARAMS` value
    ///
    /// Both the OID form and the PKCS#11 3.0 printable-string form are
    /// recognized.
    ///
    /// # Errors
    ///
    /// Returns `EddsaError::InvalidAlgorithm` if the parameters name
    /// another curve
    pub fn from_ec_params(params: &[u8]) -> EddsaResult<Self> {
        if params == ED25519_PARAMS || params == ED25519_PARAMS_NAMED {
            Ok(Algorithm::Ed25519)
        } else if params == ED448_PARAMS || params == ED448_PARAMS_NAMED {
            Ok(Algorithm::Ed448)
        } else {
            Err(EddsaError::InvalidAlgorithm {
                algorithm: format!("curve parameters {}", hex::encode(params)),
            })
        }
    }

    /// Mnemonic used in private-key files
    pub fn mnemonic(self) -> &'static str {
        match self {
            Algorithm::Ed25519 => "ED25519",
            Algorithm::Ed448 => "ED448",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
