//! EdDSA (Ed25519/Ed448) DNSSEC keys backed by PKCS#11 tokens
//!
//! Keys are generated, stored and used for signing inside an HSM. The
//! crate maps them to the DNSKEY wire form and to the text private-key
//! file, which names token-resident keys by a `pkcs11:` URI label.

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::HsmConfig;
pub use error::{EddsaError, EddsaResult};

// Re-export public API
pub use api::EddsaProvider;
pub use use_cases::{ContextUsage, SigningContext};
